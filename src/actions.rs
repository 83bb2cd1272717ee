//! Quick fixes and remediation edits
//!
//! Two fixed remediation recipes: replacing a hardcoded secret with an
//! environment-variable accessor, and inserting an authorization decorator above a
//! route handler. Fix selection dispatches on the rule identifier the mapper stashes
//! in the diagnostic, falling back to the rendered message for diagnostics whose
//! `data` field did not survive the client round trip. Diagnostics from other
//! sources match neither path and get no fix.
//!
//! Each recipe builds a complete `WorkspaceEdit`; the client applies it atomically
//! or not at all.

use crate::diagnostics::RULE_ID_KEY;
use crate::proto::rule_label;
use lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Command, Diagnostic, NumberOrString,
    Position, Range, TextEdit, Url, WorkspaceEdit,
};
use std::collections::HashMap;

pub const SECRET_RULE_LABEL: &str = "hardcoded-secret";
pub const AUTH_RULE_LABEL: &str = "missing-authorization";

/// Fixed replacement for a flagged secret. Not parameterized; the user renames
/// the variable afterwards.
pub const SECRET_PLACEHOLDER: &str = "process.env.MY_SECRET";

pub const AUTH_ANNOTATION: &str = "@login_required\n";

pub const CMD_RUN_SCAN: &str = "cogtrust.runScan";
pub const CMD_FIX_SECRET: &str = "cogtrust.fixHardcodedSecret";
pub const CMD_FIX_AUTH: &str = "cogtrust.fixMissingAuth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixKind {
    ReplaceSecret,
    AddLoginRequired,
}

impl FixKind {
    /// Picks the remediation for a diagnostic, or `None` when the diagnostic
    /// did not come from a rule we have a recipe for.
    pub fn for_diagnostic(diagnostic: &Diagnostic) -> Option<Self> {
        if let Some(rule_id) = rule_id_of(diagnostic) {
            return Self::for_rule_label(rule_label(&rule_id));
        }

        // The message embeds the rule label as `[label] ...`, so containment
        // still identifies our own diagnostics.
        if diagnostic.message.contains(SECRET_RULE_LABEL) {
            Some(Self::ReplaceSecret)
        } else if diagnostic.message.contains(AUTH_RULE_LABEL) {
            Some(Self::AddLoginRequired)
        } else {
            None
        }
    }

    fn for_rule_label(label: &str) -> Option<Self> {
        match label {
            SECRET_RULE_LABEL => Some(Self::ReplaceSecret),
            AUTH_RULE_LABEL => Some(Self::AddLoginRequired),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ReplaceSecret => "Replace with env variable",
            Self::AddLoginRequired => "Add @login_required decorator",
        }
    }

    pub fn command_id(&self) -> &'static str {
        match self {
            Self::ReplaceSecret => CMD_FIX_SECRET,
            Self::AddLoginRequired => CMD_FIX_AUTH,
        }
    }
}

fn rule_id_of(diagnostic: &Diagnostic) -> Option<String> {
    if let Some(data) = &diagnostic.data {
        if let Some(id) = data.get(RULE_ID_KEY).and_then(|v| v.as_str()) {
            return Some(id.to_string());
        }
    }

    match &diagnostic.code {
        Some(NumberOrString::String(id)) => Some(id.clone()),
        _ => None,
    }
}

/// Offers at most one fix per diagnostic, bound to the matching remediation
/// command with the document and diagnostic range as arguments.
pub fn provide_fixes(uri: &Url, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            let kind = FixKind::for_diagnostic(diagnostic)?;

            Some(CodeActionOrCommand::CodeAction(CodeAction {
                title: kind.title().to_string(),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                command: Some(Command {
                    title: kind.title().to_string(),
                    command: kind.command_id().to_string(),
                    arguments: Some(vec![
                        serde_json::json!(uri),
                        serde_json::json!(diagnostic.range),
                    ]),
                }),
                ..Default::default()
            }))
        })
        .collect()
}

/// Remediation A: overwrite exactly the diagnostic range with the placeholder.
/// The original secret value is neither inspected nor preserved.
pub fn secret_replacement_edit(uri: &Url, range: Range) -> WorkspaceEdit {
    single_edit(
        uri,
        TextEdit {
            range,
            new_text: SECRET_PLACEHOLDER.to_string(),
        },
    )
}

/// Remediation B: insert the decorator line directly above the diagnostic's
/// start line. No duplicate check; re-applying inserts again.
pub fn auth_annotation_edit(uri: &Url, range: Range) -> WorkspaceEdit {
    let insert_at = Position {
        line: range.start.line,
        character: 0,
    };

    single_edit(
        uri,
        TextEdit {
            range: Range {
                start: insert_at,
                end: insert_at,
            },
            new_text: AUTH_ANNOTATION.to_string(),
        },
    )
}

fn single_edit(uri: &Url, edit: TextEdit) -> WorkspaceEdit {
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), vec![edit]);

    WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }
}
