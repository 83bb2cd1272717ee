//! Scan orchestration
//!
//! Dedicated worker thread owning a tokio runtime; the LSP loop stays responsive
//! while scanner processes run. Requests arrive over a std mpsc channel and each
//! scan becomes a spawned task bounded by a concurrency semaphore.
//!
//! Overlapping scans of the same file are deliberately not serialized or
//! cancelled: each request runs independently and whichever completion publishes
//! last wins. No timeout is imposed on the external process; a hung scanner hangs
//! its own task only.

pub mod messages;

pub use messages::ScanRequest;

use crate::scanner::SemgrepRunner;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct ScanManager {
    runner: SemgrepRunner,
    max_concurrent: usize,
}

impl ScanManager {
    pub fn new(runner: SemgrepRunner, max_concurrent: usize) -> Self {
        Self {
            runner,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Blocks on the request channel until `Shutdown` or disconnect. Runs on
    /// its own thread.
    pub fn run(self, request_rx: std::sync::mpsc::Receiver<ScanRequest>) {
        let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

        rt.block_on(async {
            let concurrency_limit = Arc::new(Semaphore::new(self.max_concurrent));
            let runner = Arc::new(self.runner);
            let mut active_tasks = JoinSet::new();

            loop {
                match request_rx.recv() {
                    Ok(ScanRequest::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Ok(ScanRequest::ScanFile { path, response_tx }) => {
                        let operation_id = Uuid::new_v4();
                        let runner = Arc::clone(&runner);
                        let concurrency_limit = Arc::clone(&concurrency_limit);

                        active_tasks.spawn(async move {
                            let _permit = concurrency_limit.acquire().await.unwrap();

                            debug!("Scan {} started for {}", operation_id, path.display());
                            let start = Instant::now();

                            match runner.run(&path).await {
                                Ok(findings) => {
                                    debug!(
                                        "Scan {} completed with {} findings in {:?}",
                                        operation_id,
                                        findings.len(),
                                        start.elapsed()
                                    );
                                    let _ = response_tx.send(Ok(findings));
                                }
                                Err(e) => {
                                    debug!("Scan {} failed: {}", operation_id, e);
                                    let _ = response_tx.send(Err(e));
                                }
                            }
                        });
                    }
                    Err(_) => {
                        info!("Request channel disconnected, shutting down");
                        break;
                    }
                }

                while let Some(result) = active_tasks.try_join_next() {
                    match result {
                        Ok(()) => debug!("Scan task completed"),
                        Err(e) if e.is_cancelled() => debug!("Scan task was cancelled"),
                        Err(e) => warn!("Scan task panicked: {}", e),
                    }
                }
            }

            while let Some(result) = active_tasks.join_next().await {
                if let Err(e) = result {
                    error!("Scan task failed during shutdown: {}", e);
                }
            }

            info!("ScanManager shutdown complete");
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fake_scanner(dir: &TempDir, body: &str) -> SemgrepRunner {
        let path = dir.path().join("fake-semgrep");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        SemgrepRunner::new(path, PathBuf::from("semgrep-rules"))
    }

    #[test]
    fn test_manager_answers_scan_requests_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let runner = fake_scanner(&dir, r#"echo '{"results":[]}'"#);

        let (request_tx, request_rx) = std::sync::mpsc::channel();
        let worker = std::thread::spawn(move || ScanManager::new(runner, 4).run(request_rx));

        let (response_tx, response_rx) = std::sync::mpsc::channel();
        request_tx
            .send(ScanRequest::ScanFile {
                path: PathBuf::from("app.py"),
                response_tx,
            })
            .unwrap();

        let findings = response_rx.recv().unwrap().unwrap();
        assert!(findings.is_empty());

        request_tx.send(ScanRequest::Shutdown).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn test_manager_forwards_scanner_errors() {
        let dir = TempDir::new().unwrap();
        let runner = fake_scanner(&dir, "exit 1");

        let (request_tx, request_rx) = std::sync::mpsc::channel();
        let worker = std::thread::spawn(move || ScanManager::new(runner, 1).run(request_rx));

        let (response_tx, response_rx) = std::sync::mpsc::channel();
        request_tx
            .send(ScanRequest::ScanFile {
                path: PathBuf::from("app.py"),
                response_tx,
            })
            .unwrap();

        assert!(response_rx.recv().unwrap().is_err());

        drop(request_tx);
        worker.join().unwrap();
    }
}
