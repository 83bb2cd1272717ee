//! Scanner invocation
//!
//! Shells out to the external semgrep process and parses its JSON output into
//! findings. The invocation is fixed: `<binary> --config <rules-dir> --json <file>`.
//! Awaiting the child process is the only suspension point in the scan pipeline.
//!
//! Execution failures (spawn error, non-zero exit) are kept distinct from output
//! failures (unparseable stdout): the former points at the user's code or scanner
//! setup, the latter at a scanner/server version mismatch, and the two deserve
//! different log lines. Scanner stderr is logged regardless of outcome; it carries
//! progress chatter that is not an error signal by itself.

use crate::proto::{Finding, ScannerOutput};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("scanner execution failed: {reason}")]
    Execution { reason: String },

    #[error("scanner output could not be parsed: {source}")]
    Output {
        #[source]
        source: serde_json::Error,
    },
}

pub type ScannerResult<T> = std::result::Result<T, ScannerError>;

#[derive(Debug, Clone)]
pub struct SemgrepRunner {
    binary: PathBuf,
    rules_dir: PathBuf,
}

impl SemgrepRunner {
    pub fn new(binary: PathBuf, rules_dir: PathBuf) -> Self {
        Self { binary, rules_dir }
    }

    /// Runs one scan of `target` to completion and returns its findings.
    ///
    /// A payload without a `results` field is a successful scan with zero
    /// findings; the caller must not treat it as an error.
    pub async fn run(&self, target: &Path) -> ScannerResult<Vec<Finding>> {
        info!("Running scanner on {}", target.display());

        let output = Command::new(&self.binary)
            .arg("--config")
            .arg(&self.rules_dir)
            .arg("--json")
            .arg(target)
            .output()
            .await
            .map_err(|e| ScannerError::Execution {
                reason: e.to_string(),
            })?;

        if !output.stderr.is_empty() {
            debug!(
                "Scanner stderr for {}: {}",
                target.display(),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        if !output.status.success() {
            return Err(ScannerError::Execution {
                reason: format!("scanner exited with {}", output.status),
            });
        }

        let parsed: ScannerOutput = serde_json::from_slice(&output.stdout)
            .map_err(|source| ScannerError::Output { source })?;

        let findings: Vec<Finding> = parsed.results.into_iter().map(Finding::from).collect();
        debug!(
            "Scanner reported {} findings for {}",
            findings.len(),
            target.display()
        );

        Ok(findings)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Installs a shell script in place of the scanner binary so tests control
    /// exit status and stdout exactly.
    fn fake_scanner(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-semgrep");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn runner_for(binary: PathBuf) -> SemgrepRunner {
        SemgrepRunner::new(binary, PathBuf::from("semgrep-rules"))
    }

    #[tokio::test]
    async fn test_run_parses_findings() {
        let dir = TempDir::new().unwrap();
        let binary = fake_scanner(
            &dir,
            r#"echo '{"results":[{"check_id":"rules.secrets.hardcoded-secret","start":{"line":4},"extra":{"message":"Hardcoded secret detected"}}]}'"#,
        );

        let findings = runner_for(binary)
            .run(Path::new("app.py"))
            .await
            .unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "rules.secrets.hardcoded-secret");
        assert_eq!(findings[0].line, 4);
        assert_eq!(findings[0].message, "Hardcoded secret detected");
    }

    #[tokio::test]
    async fn test_run_missing_results_field_is_zero_findings() {
        let dir = TempDir::new().unwrap();
        let binary = fake_scanner(&dir, r#"echo '{"errors":[]}'"#);

        let findings = runner_for(binary).run(Path::new("app.py")).await.unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let binary = fake_scanner(&dir, "echo 'boom' >&2\nexit 2");

        let err = runner_for(binary).run(Path::new("app.py")).await.unwrap_err();
        assert!(matches!(err, ScannerError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_run_spawn_failure_is_execution_error() {
        let runner = runner_for(PathBuf::from("/nonexistent/fake-semgrep"));

        let err = runner.run(Path::new("app.py")).await.unwrap_err();
        assert!(matches!(err, ScannerError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_run_malformed_output_is_output_error() {
        let dir = TempDir::new().unwrap();
        let binary = fake_scanner(&dir, "echo 'not json at all'");

        let err = runner_for(binary).run(Path::new("app.py")).await.unwrap_err();
        assert!(matches!(err, ScannerError::Output { .. }));
    }

    #[tokio::test]
    async fn test_run_logs_stderr_without_failing() {
        let dir = TempDir::new().unwrap();
        let binary = fake_scanner(
            &dir,
            "echo 'scanning 1 file' >&2\necho '{\"results\":[]}'",
        );

        let findings = runner_for(binary).run(Path::new("app.py")).await.unwrap();
        assert!(findings.is_empty());
    }
}
