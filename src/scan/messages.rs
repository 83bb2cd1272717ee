//! Scan messages
//!
//! Typed requests for the scan worker channel instead of generic
//! `serde_json::Value`, so channel communication is validated at compile time.

use crate::proto::Finding;
use crate::scanner::ScannerResult;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ScanRequest {
    ScanFile {
        path: PathBuf,
        response_tx: std::sync::mpsc::Sender<ScannerResult<Vec<Finding>>>,
    },
    Shutdown,
}
