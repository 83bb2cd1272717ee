//! LSP server implementation
//!
//! Routes protocol requests to the scan, diagnostics and remediation components
//! rather than embedding any pipeline logic directly. Scan results arrive on a
//! worker channel; completion handling runs on short-lived threads so the message
//! loop never waits on the external scanner. Server→client applyEdit requests
//! are tracked by id; their responses drive follow-up work such as the
//! fix-confirmation re-scan, which must not read the file before the edit lands.
//!
//! Scan failures are logged and leave the previous diagnostics for the document
//! untouched; the user sees no failure notification, only the log channel does.
//! Overlapping scans of one document race and the last publish wins.

use crate::{
    actions::{self, FixKind, CMD_FIX_AUTH, CMD_FIX_SECRET, CMD_RUN_SCAN},
    config::CogtrustConfig,
    diagnostics::{DiagnosticsMapper, DiagnosticsStore},
    hints,
    proto::Finding,
    scan::ScanRequest,
    scanner::ScannerResult,
    workspace::WorkspaceManager,
};
use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use dashmap::DashMap;
use lsp_server::{Connection, Message, Notification, Request, RequestId, Response};
use lsp_types::{
    notification::{
        DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument,
        Notification as _, PublishDiagnostics, ShowMessage,
    },
    request::{ApplyWorkspaceEdit, CodeActionRequest, ExecuteCommand, Request as _},
    ApplyWorkspaceEditParams, ApplyWorkspaceEditResponse, CodeActionParams, Diagnostic,
    ExecuteCommandParams, MessageType, PublishDiagnosticsParams, Range, ShowMessageParams, Url,
    WorkspaceEdit,
};
use std::sync::{
    atomic::{AtomicI32, Ordering},
    mpsc,
};
use tracing::{debug, error};

/// Follow-up action keyed by the id of an outstanding server→client request.
#[derive(Debug)]
enum PendingEdit {
    /// Re-scan the document once the client confirms the secret replacement
    /// has been applied.
    ConfirmSecretFix { uri: Url },
}

pub struct CogtrustLspServer {
    workspace: WorkspaceManager,
    store: DiagnosticsStore,
    mapper: DiagnosticsMapper,
    config: CogtrustConfig,
    scan_tx: mpsc::Sender<ScanRequest>,
    next_request_id: AtomicI32,
    pending_edits: DashMap<RequestId, PendingEdit>,
}

impl CogtrustLspServer {
    pub fn new(
        workspace: WorkspaceManager,
        scan_tx: mpsc::Sender<ScanRequest>,
        config: CogtrustConfig,
    ) -> Self {
        Self {
            workspace,
            store: DiagnosticsStore::new(),
            mapper: DiagnosticsMapper::new(),
            config,
            scan_tx,
            next_request_id: AtomicI32::new(1),
            pending_edits: DashMap::new(),
        }
    }

    pub fn shutdown(&self) {
        self.store.shutdown();
    }

    pub fn process_request(&self, connection: &Connection, req: Request) {
        let req_id = req.id.clone();

        let result = match req.method.as_str() {
            CodeActionRequest::METHOD => self.handle_code_action(connection, req),
            ExecuteCommand::METHOD => self.handle_execute_command(connection, req),
            _ => {
                debug!("Received unhandled request: {}", req.method);
                Ok(())
            }
        };

        if let Err(e) = result {
            let response = Response::new_err(req_id, -32603, e.to_string());
            let _ = connection.sender.send(response.into());
        }
    }

    pub fn process_notification(&self, connection: &Connection, not: Notification) {
        let method = not.method.clone();
        let result = match not.method.as_str() {
            DidOpenTextDocument::METHOD => self.handle_did_open(not),
            DidChangeTextDocument::METHOD => self.handle_did_change(connection, not),
            DidSaveTextDocument::METHOD => self.handle_did_save(connection, not),
            DidCloseTextDocument::METHOD => self.handle_did_close(not),
            _ => {
                debug!("Received unhandled notification: {}", method);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Error processing notification {}: {}", method, e);
        }
    }

    fn handle_code_action(&self, connection: &Connection, req: Request) -> Result<()> {
        let params: CodeActionParams = serde_json::from_value(req.params)?;

        let fixes = actions::provide_fixes(&params.text_document.uri, &params.context.diagnostics);

        let response = Response::new_ok(req.id, fixes);
        connection.sender.send(response.into())?;
        Ok(())
    }

    fn handle_execute_command(&self, connection: &Connection, req: Request) -> Result<()> {
        let params: ExecuteCommandParams = serde_json::from_value(req.params)?;

        match params.command.as_str() {
            CMD_RUN_SCAN => self.execute_run_scan(connection, req.id, &params.arguments),
            CMD_FIX_SECRET => self.execute_fix_secret(connection, req.id, &params.arguments),
            CMD_FIX_AUTH => self.execute_fix_auth(connection, req.id, &params.arguments),
            _ => {
                let response = Response::new_err(
                    req.id,
                    -32601,
                    format!("Unknown command: {}", params.command),
                );
                connection.sender.send(response.into())?;
                Ok(())
            }
        }
    }

    fn execute_run_scan(
        &self,
        connection: &Connection,
        req_id: RequestId,
        arguments: &[serde_json::Value],
    ) -> Result<()> {
        let Some(value) = arguments.first() else {
            show_message(
                &connection.sender,
                MessageType::INFO,
                "No active document to scan.",
            )?;
            let response = Response::new_ok(
                req_id,
                serde_json::json!({ "success": false, "message": "No active document to scan." }),
            );
            connection.sender.send(response.into())?;
            return Ok(());
        };

        let uri: Url = serde_json::from_value(value.clone())?;
        self.scan_and_publish(connection, uri, Some(req_id))
    }

    fn execute_fix_secret(
        &self,
        connection: &Connection,
        req_id: RequestId,
        arguments: &[serde_json::Value],
    ) -> Result<()> {
        let (uri, range) = extract_uri_and_range(arguments)?;

        let edit = actions::secret_replacement_edit(&uri, range);
        let edit_id = self.send_apply_edit(connection, FixKind::ReplaceSecret.title(), edit)?;

        // The confirmation re-scan must not start until the client has
        // answered the applyEdit request; scanning earlier would read the
        // pre-edit file and report the secret as still present.
        self.pending_edits
            .insert(edit_id, PendingEdit::ConfirmSecretFix { uri });

        let response = Response::new_ok(req_id, serde_json::json!({ "success": true }));
        connection.sender.send(response.into())?;
        Ok(())
    }

    /// Handles responses to our own server→client requests. Everything else
    /// coming back on the response channel is ignored.
    pub fn process_response(&self, connection: &Connection, resp: Response) {
        let Some((_, pending)) = self.pending_edits.remove(&resp.id) else {
            debug!("Received response for untracked request: {:?}", resp.id);
            return;
        };

        let applied = resp
            .result
            .and_then(|value| serde_json::from_value::<ApplyWorkspaceEditResponse>(value).ok())
            .map(|r| r.applied)
            .unwrap_or(false);

        match pending {
            PendingEdit::ConfirmSecretFix { uri } => {
                if !applied {
                    debug!("Client did not apply the secret fix for {}, skipping confirmation scan", uri);
                    return;
                }

                if let Err(e) = self.confirm_secret_fix(connection, uri) {
                    error!("Failed to queue confirmation scan: {}", e);
                }
            }
        }
    }

    /// Re-scans the file after the secret replacement landed; success is only
    /// announced when nothing remains. A remaining count stays silent.
    fn confirm_secret_fix(&self, connection: &Connection, uri: Url) -> Result<()> {
        let path = uri
            .to_file_path()
            .map_err(|_| anyhow!("Unsupported document URI: {}", uri))?;
        let response_rx = self.request_scan(path.clone())?;
        let sender = connection.sender.clone();

        std::thread::spawn(move || match response_rx.recv() {
            Ok(Ok(findings)) if findings.is_empty() => {
                let _ = show_message(
                    &sender,
                    MessageType::INFO,
                    "Fix confirmed. No remaining issues.",
                );
            }
            Ok(Ok(findings)) => {
                debug!(
                    "Confirmation scan still reports {} findings for {}",
                    findings.len(),
                    path.display()
                );
            }
            Ok(Err(e)) => error!("Confirmation scan of {} failed: {}", path.display(), e),
            Err(e) => error!("Scan response channel closed: {}", e),
        });

        Ok(())
    }

    fn execute_fix_auth(
        &self,
        connection: &Connection,
        req_id: RequestId,
        arguments: &[serde_json::Value],
    ) -> Result<()> {
        let (uri, range) = extract_uri_and_range(arguments)?;

        let edit = actions::auth_annotation_edit(&uri, range);
        self.send_apply_edit(connection, FixKind::AddLoginRequired.title(), edit)?;

        show_message(
            &connection.sender,
            MessageType::INFO,
            "Authorization decorator added.",
        )?;

        let response = Response::new_ok(req_id, serde_json::json!({ "success": true }));
        connection.sender.send(response.into())?;
        Ok(())
    }

    fn handle_did_open(&self, not: Notification) -> Result<()> {
        let params: lsp_types::DidOpenTextDocumentParams = serde_json::from_value(not.params)?;

        debug!("Document opened: {}", params.text_document.uri);
        self.workspace.add_document(params.text_document);
        Ok(())
    }

    fn handle_did_change(&self, connection: &Connection, not: Notification) -> Result<()> {
        let params: lsp_types::DidChangeTextDocumentParams = serde_json::from_value(not.params)?;

        // Only the first content-change fragment is inspected; simultaneous
        // extra edits in the same event are ignored.
        if let Some(change) = params.content_changes.first() {
            if self.config.hints.enabled {
                for advisory in hints::advisories_for_fragment(&change.text) {
                    show_message(&connection.sender, MessageType::INFO, &advisory)?;
                }
            }

            self.workspace
                .update_document(&params.text_document.uri, params.text_document.version)?;
        }

        Ok(())
    }

    fn handle_did_save(&self, connection: &Connection, not: Notification) -> Result<()> {
        let params: lsp_types::DidSaveTextDocumentParams = serde_json::from_value(not.params)?;
        let uri = params.text_document.uri;

        debug!("Document saved: {}", uri);

        if !self.config.scan.on_save {
            return Ok(());
        }

        let Some(doc) = self.workspace.get_document(&uri) else {
            debug!("Saved document {} is not tracked, skipping scan", uri);
            return Ok(());
        };

        if !self.config.scan.scans_language(&doc.language_id) {
            debug!("Skipping on-save scan for language {}", doc.language_id);
            return Ok(());
        }

        self.scan_and_publish(connection, uri, None)
    }

    fn handle_did_close(&self, not: Notification) -> Result<()> {
        let params: lsp_types::DidCloseTextDocumentParams = serde_json::from_value(not.params)?;

        self.workspace.remove_document(&params.text_document.uri);
        Ok(())
    }

    /// Queues a scan of `uri` and handles completion on a short-lived thread:
    /// store replacement, diagnostics publish and the findings-count message.
    /// With `respond_to` set, the scan also answers an executeCommand request.
    fn scan_and_publish(
        &self,
        connection: &Connection,
        uri: Url,
        respond_to: Option<RequestId>,
    ) -> Result<()> {
        let path = uri
            .to_file_path()
            .map_err(|_| anyhow!("Unsupported document URI: {}", uri))?;
        let response_rx = self.request_scan(path.clone())?;

        let sender = connection.sender.clone();
        let store = self.store.clone();
        let mapper = self.mapper.clone();
        let version = self.workspace.get_document(&uri).map(|doc| doc.version);

        std::thread::spawn(move || match response_rx.recv() {
            Ok(Ok(findings)) => {
                let count = findings.len();
                let diagnostics = mapper.map_findings(&findings);
                store.set(uri.clone(), diagnostics.clone());

                if let Err(e) = publish_diagnostics(&sender, &uri, diagnostics, version) {
                    error!("Failed to publish diagnostics for {}: {}", uri, e);
                }

                let _ = show_message(
                    &sender,
                    MessageType::INFO,
                    &format!("Found {} issues in {}", count, path.display()),
                );

                if let Some(req_id) = respond_to {
                    let _ = show_message(
                        &sender,
                        MessageType::INFO,
                        "Semgrep scan complete. Check Problems tab.",
                    );
                    let response = Response::new_ok(
                        req_id,
                        serde_json::json!({ "success": true, "findings_count": count }),
                    );
                    let _ = sender.send(response.into());
                }
            }
            Ok(Err(e)) => {
                // The previous diagnostics entry stays in place; failures are
                // surfaced on the log channel only.
                error!("Scan of {} failed: {}", path.display(), e);

                if let Some(req_id) = respond_to {
                    let response = Response::new_err(req_id, -32603, e.to_string());
                    let _ = sender.send(response.into());
                }
            }
            Err(e) => {
                error!("Scan response channel closed: {}", e);

                if let Some(req_id) = respond_to {
                    let response =
                        Response::new_err(req_id, -32603, format!("Internal error: {}", e));
                    let _ = sender.send(response.into());
                }
            }
        });

        Ok(())
    }

    fn request_scan(
        &self,
        path: std::path::PathBuf,
    ) -> Result<mpsc::Receiver<ScannerResult<Vec<Finding>>>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.scan_tx
            .send(ScanRequest::ScanFile { path, response_tx })
            .map_err(|_| anyhow!("Scan worker is not running"))?;
        Ok(response_rx)
    }

    fn send_apply_edit(
        &self,
        connection: &Connection,
        label: &str,
        edit: WorkspaceEdit,
    ) -> Result<RequestId> {
        let params = ApplyWorkspaceEditParams {
            label: Some(label.to_string()),
            edit,
        };

        let id = RequestId::from(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let request = Request::new(id.clone(), ApplyWorkspaceEdit::METHOD.to_string(), params);
        connection.sender.send(request.into())?;
        Ok(id)
    }
}

fn publish_diagnostics(
    sender: &Sender<Message>,
    uri: &Url,
    diagnostics: Vec<Diagnostic>,
    version: Option<i32>,
) -> Result<()> {
    let params = PublishDiagnosticsParams {
        uri: uri.clone(),
        diagnostics,
        version,
    };

    let notification = Notification::new(PublishDiagnostics::METHOD.to_string(), params);
    sender.send(notification.into())?;
    Ok(())
}

fn show_message(sender: &Sender<Message>, typ: MessageType, message: &str) -> Result<()> {
    let params = ShowMessageParams {
        typ,
        message: message.to_string(),
    };

    let notification = Notification::new(ShowMessage::METHOD.to_string(), params);
    sender.send(notification.into())?;
    Ok(())
}

fn extract_uri_and_range(args: &[serde_json::Value]) -> Result<(Url, Range)> {
    let uri = args
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Missing document argument"))?;
    let range = args
        .get(1)
        .cloned()
        .ok_or_else(|| anyhow!("Missing range argument"))?;

    Ok((serde_json::from_value(uri)?, serde_json::from_value(range)?))
}
