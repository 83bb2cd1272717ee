//! Scanner wire types
//!
//! Models the subset of semgrep's `--json` payload the server consumes. The scanner
//! reports far more than we use; deserializing only `check_id`, `start.line` and
//! `extra.message` keeps us insulated from payload additions between scanner versions.
//!
//! `Finding` is the internal representation handed to the diagnostics pipeline. The
//! full rule identifier is kept on it so fix dispatch can match on structured rule
//! identity instead of re-parsing rendered messages.

use serde::{Deserialize, Serialize};

/// Top-level shape of the scanner's JSON output. A missing `results` field is
/// treated as zero findings, not a malformed payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerOutput {
    #[serde(default)]
    pub results: Vec<RawFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub check_id: String,
    pub start: RawPosition,
    pub extra: RawExtra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosition {
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtra {
    pub message: String,
}

/// One issue reported by the external scanner. Immutable; lives for one scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Dotted rule path, e.g. `rules.security.hardcoded-secret`.
    pub rule_id: String,

    pub message: String,

    /// 1-based source line of the violation.
    pub line: u32,
}

impl Finding {
    /// Short display label: the segment after the last `.`, or the whole
    /// identifier when it has none.
    pub fn rule_label(&self) -> &str {
        rule_label(&self.rule_id)
    }
}

impl From<RawFinding> for Finding {
    fn from(raw: RawFinding) -> Self {
        Self {
            rule_id: raw.check_id,
            message: raw.extra.message,
            line: raw.start.line,
        }
    }
}

pub fn rule_label(rule_id: &str) -> &str {
    rule_id.rsplit('.').next().unwrap_or(rule_id)
}
