//! Cogtrust LSP server entry point
//!
//! Spawns a dedicated worker thread for scanner invocations to keep the LSP
//! message loop responsive while semgrep runs.

use anyhow::Result;
use lsp_server::{Connection, Message};
use lsp_types::{
    CodeActionOptions, InitializeParams, ServerCapabilities, TextDocumentSyncCapability,
    TextDocumentSyncKind, WorkDoneProgressOptions,
};
use std::{env, path::PathBuf, sync::mpsc, thread};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cogtrust_lsp::{scan::ScanRequest, *};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("cogtrust-lsp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // All logging goes to stderr; stdout belongs to the protocol stream.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Cogtrust LSP server");

    let (connection, io_threads) = Connection::stdio();

    let server_capabilities = serde_json::to_value(ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        code_action_provider: Some(lsp_types::CodeActionProviderCapability::Options(
            CodeActionOptions {
                code_action_kinds: Some(vec![lsp_types::CodeActionKind::QUICKFIX]),
                work_done_progress_options: WorkDoneProgressOptions {
                    work_done_progress: Some(false),
                },
                resolve_provider: Some(false),
            },
        )),
        execute_command_provider: Some(lsp_types::ExecuteCommandOptions {
            commands: vec![
                actions::CMD_RUN_SCAN.to_string(),
                actions::CMD_FIX_SECRET.to_string(),
                actions::CMD_FIX_AUTH.to_string(),
            ],
            work_done_progress_options: WorkDoneProgressOptions {
                work_done_progress: Some(false),
            },
        }),
        ..Default::default()
    })?;

    let init_params = connection.initialize(server_capabilities)?;
    let init_params: InitializeParams = serde_json::from_value(init_params)?;

    let config = if let Some(options) = &init_params.initialization_options {
        config::CogtrustConfig::from_lsp_value(options.clone())
    } else {
        config::CogtrustConfig::default()
    };

    main_loop(connection, init_params, config)?;

    io_threads.join()?;
    info!("Shutting down Cogtrust LSP server");
    Ok(())
}

fn main_loop(
    connection: Connection,
    init_params: InitializeParams,
    config: config::CogtrustConfig,
) -> Result<()> {
    info!("Starting main loop");

    let workspace = WorkspaceManager::new(&init_params)?;

    let rules_dir = config
        .scanner
        .resolved_rules_dir(workspace.workspace_root().map(PathBuf::as_path));
    let runner = scanner::SemgrepRunner::new(config.scanner.binary_path.clone(), rules_dir);

    let (scan_tx, scan_rx) = mpsc::channel::<ScanRequest>();
    let max_concurrent = config.scan.max_concurrent_scans;
    let scan_thread = thread::spawn(move || {
        scan::ScanManager::new(runner, max_concurrent).run(scan_rx);
    });

    let server = CogtrustLspServer::new(workspace, scan_tx.clone(), config);

    for msg in &connection.receiver {
        match msg {
            Message::Request(req) => {
                if connection.handle_shutdown(&req)? {
                    let _ = scan_tx.send(ScanRequest::Shutdown);
                    break;
                }

                server.process_request(&connection, req);
            }
            Message::Notification(not) => {
                server.process_notification(&connection, not);
            }
            Message::Response(resp) => {
                server.process_response(&connection, resp);
            }
        }
    }

    server.shutdown();
    scan_thread
        .join()
        .map_err(|_| anyhow::anyhow!("Scan worker thread panicked"))?;

    Ok(())
}
