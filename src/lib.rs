//! Cogtrust LSP Server
//!
//! Integrates semgrep security scanning with code editors through LSP. Developers
//! see hardcoded secrets and missing authorization checks as inline warnings the
//! moment they save, with one-click remediations for both. Typing-time advisories
//! nudge toward secure patterns before a scan ever runs.
//!
//! Scanner execution lives on a dedicated worker thread so the protocol loop
//! stays responsive; scan completions publish diagnostics asynchronously and the
//! latest scan of a document always wins.

pub mod actions;
pub mod config;
pub mod diagnostics;
pub mod hints;
pub mod proto;
pub mod scan;
pub mod scanner;
pub mod server;
pub mod workspace;

pub use config::CogtrustConfig;
pub use diagnostics::{DiagnosticsMapper, DiagnosticsStore};
pub use scan::ScanManager;
pub use scanner::SemgrepRunner;
pub use server::CogtrustLspServer;
pub use workspace::WorkspaceManager;
