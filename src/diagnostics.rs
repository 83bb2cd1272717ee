//! Diagnostic conversion and storage
//!
//! Translates findings into LSP diagnostics. The scanner only reports a 1-based
//! start line, so the diagnostic range spans from column 0 to a sentinel column the
//! client clamps to the actual line length. Severity is fixed at WARNING: findings
//! are advisory, never build-blocking.
//!
//! The full rule identifier rides along in the diagnostic `code` and `data` fields
//! instead of being discarded after label extraction, so fix selection can dispatch
//! on structured rule identity rather than message substrings.

use crate::proto::Finding;
use dashmap::DashMap;
use lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Url,
};
use std::sync::Arc;
use tracing::debug;

pub const DIAGNOSTIC_SOURCE: &str = "cogtrust";

/// Key under which the rule identifier is stored in `Diagnostic::data`.
pub const RULE_ID_KEY: &str = "rule_id";

#[derive(Debug, Clone, Default)]
pub struct DiagnosticsMapper;

impl DiagnosticsMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map_findings(&self, findings: &[Finding]) -> Vec<Diagnostic> {
        findings.iter().map(|f| self.finding_to_diagnostic(f)).collect()
    }

    pub fn finding_to_diagnostic(&self, finding: &Finding) -> Diagnostic {
        let line = finding.line.saturating_sub(1);

        Diagnostic {
            range: Range {
                start: Position { line, character: 0 },
                // Sentinel end column; the client clamps it to the line length.
                end: Position {
                    line,
                    character: u32::MAX,
                },
            },
            severity: Some(DiagnosticSeverity::WARNING),
            code: Some(NumberOrString::String(finding.rule_id.clone())),
            code_description: None,
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: format!("[{}] {}", finding.rule_label(), finding.message),
            related_information: None,
            tags: None,
            data: Some(serde_json::json!({ RULE_ID_KEY: finding.rule_id })),
        }
    }
}

/// Per-document diagnostic sets, replaced wholesale on every scan.
///
/// Owned by the server and handed out by clone (shared maps under the hood);
/// scan completion threads write entries concurrently. There is no merge
/// operation: the latest scan of a document always wins.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    entries: Arc<DashMap<Url, Vec<Diagnostic>>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Replaces the entry for `uri` with `diagnostics` in one step.
    pub fn set(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        debug!("Storing {} diagnostics for {}", diagnostics.len(), uri);
        self.entries.insert(uri, diagnostics);
    }

    pub fn get(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.entries.get(uri).map(|entry| entry.value().clone())
    }

    pub fn document_count(&self) -> usize {
        self.entries.len()
    }

    /// Drops all entries. Called once at server shutdown.
    pub fn shutdown(&self) {
        self.entries.clear();
    }
}

impl Clone for DiagnosticsStore {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule_id: &str, message: &str, line: u32) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            message: message.to_string(),
            line,
        }
    }

    #[test]
    fn test_finding_to_diagnostic_range() {
        let mapper = DiagnosticsMapper::new();
        let diagnostic =
            mapper.finding_to_diagnostic(&finding("rules.secrets.hardcoded-secret", "msg", 10));

        assert_eq!(diagnostic.range.start, Position { line: 9, character: 0 });
        assert_eq!(diagnostic.range.end.line, 9);
        assert_eq!(diagnostic.range.end.character, u32::MAX);
    }

    #[test]
    fn test_finding_to_diagnostic_first_line() {
        let mapper = DiagnosticsMapper::new();
        let diagnostic = mapper.finding_to_diagnostic(&finding("rule", "msg", 1));

        assert_eq!(diagnostic.range.start.line, 0);
    }

    #[test]
    fn test_finding_to_diagnostic_severity_is_warning() {
        let mapper = DiagnosticsMapper::new();
        let diagnostic = mapper.finding_to_diagnostic(&finding("rule", "msg", 1));

        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::WARNING));
    }

    #[test]
    fn test_finding_to_diagnostic_message_composition() {
        let mapper = DiagnosticsMapper::new();
        let diagnostic = mapper.finding_to_diagnostic(&finding(
            "rules.secrets.hardcoded-secret",
            "Hardcoded secret detected",
            3,
        ));

        assert_eq!(
            diagnostic.message,
            "[hardcoded-secret] Hardcoded secret detected"
        );
        assert_eq!(diagnostic.source, Some(DIAGNOSTIC_SOURCE.to_string()));
    }

    #[test]
    fn test_finding_to_diagnostic_preserves_rule_id() {
        let mapper = DiagnosticsMapper::new();
        let diagnostic =
            mapper.finding_to_diagnostic(&finding("rules.secrets.hardcoded-secret", "msg", 3));

        assert_eq!(
            diagnostic.code,
            Some(NumberOrString::String(
                "rules.secrets.hardcoded-secret".to_string()
            ))
        );
        let data = diagnostic.data.unwrap();
        assert_eq!(
            data.get(RULE_ID_KEY).and_then(|v| v.as_str()),
            Some("rules.secrets.hardcoded-secret")
        );
    }

    #[test]
    fn test_map_findings_preserves_order() {
        let mapper = DiagnosticsMapper::new();
        let findings = vec![finding("a.first", "one", 1), finding("b.second", "two", 2)];

        let diagnostics = mapper.map_findings(&findings);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].message.contains("first"));
        assert!(diagnostics[1].message.contains("second"));
    }

    #[test]
    fn test_store_set_replaces_wholesale() {
        let store = DiagnosticsStore::new();
        let mapper = DiagnosticsMapper::new();
        let uri = Url::parse("file:///tmp/app.py").unwrap();

        store.set(
            uri.clone(),
            mapper.map_findings(&[finding("a.one", "one", 1), finding("a.two", "two", 2)]),
        );
        assert_eq!(store.get(&uri).unwrap().len(), 2);

        store.set(uri.clone(), mapper.map_findings(&[finding("a.three", "three", 3)]));

        let diagnostics = store.get(&uri).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("three"));
        assert_eq!(store.document_count(), 1);
    }

    #[test]
    fn test_store_empty_scan_clears_entry() {
        let store = DiagnosticsStore::new();
        let mapper = DiagnosticsMapper::new();
        let uri = Url::parse("file:///tmp/app.py").unwrap();

        store.set(uri.clone(), mapper.map_findings(&[finding("a.one", "one", 1)]));
        store.set(uri.clone(), Vec::new());

        assert!(store.get(&uri).unwrap().is_empty());
    }

    #[test]
    fn test_store_shutdown_clears_all() {
        let store = DiagnosticsStore::new();
        let uri = Url::parse("file:///tmp/app.py").unwrap();
        store.set(uri.clone(), Vec::new());

        store.shutdown();
        assert_eq!(store.document_count(), 0);
        assert!(store.get(&uri).is_none());
    }
}
