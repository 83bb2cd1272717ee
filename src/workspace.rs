//! Workspace management
//!
//! Tracks open documents so save events can be filtered by language and
//! diagnostics publishes can carry the document version the client expects.
//! Document text is not retained; the scanner reads the saved file from disk.
//! DashMap lets scan completion threads read document state while the LSP loop
//! updates individual entries without blocking.

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use lsp_types::{InitializeParams, TextDocumentItem, Url};
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub uri: Url,
    pub language_id: String,
    pub version: i32,
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    open_documents: Arc<DashMap<Url, DocumentInfo>>,

    workspace_root: Option<PathBuf>,
}

impl WorkspaceManager {
    pub fn new(init_params: &InitializeParams) -> Result<Self> {
        let workspace_root = Self::determine_workspace_root(init_params);
        info!("Initialized workspace with root: {:?}", workspace_root);

        Ok(Self {
            open_documents: Arc::new(DashMap::new()),
            workspace_root,
        })
    }

    pub fn workspace_root(&self) -> Option<&PathBuf> {
        self.workspace_root.as_ref()
    }

    pub fn add_document(&self, document: TextDocumentItem) {
        debug!("Adding document: {}", document.uri);

        let doc_info = DocumentInfo {
            uri: document.uri.clone(),
            language_id: document.language_id,
            version: document.version,
        };
        self.open_documents.insert(document.uri, doc_info);
    }

    pub fn update_document(&self, uri: &Url, version: i32) -> Result<()> {
        let mut doc = self
            .open_documents
            .get_mut(uri)
            .ok_or_else(|| anyhow!("Document not found: {}", uri))?;

        doc.version = version;
        debug!("Updated document: {} (version {})", uri, version);
        Ok(())
    }

    pub fn remove_document(&self, uri: &Url) {
        debug!("Removing document: {}", uri);
        self.open_documents.remove(uri);
    }

    pub fn get_document(&self, uri: &Url) -> Option<DocumentInfo> {
        self.open_documents.get(uri).map(|doc| doc.clone())
    }

    pub fn is_document_open(&self, uri: &Url) -> bool {
        self.open_documents.contains_key(uri)
    }

    fn determine_workspace_root(init_params: &InitializeParams) -> Option<PathBuf> {
        if let Some(folders) = &init_params.workspace_folders {
            if let Some(first_folder) = folders.first() {
                if let Ok(path) = first_folder.uri.to_file_path() {
                    return Some(path);
                }
            }
        }

        #[allow(deprecated)]
        if let Some(root_uri) = &init_params.root_uri {
            if let Ok(path) = root_uri.to_file_path() {
                return Some(path);
            }
        }

        warn!("No workspace root found in initialization parameters");
        None
    }
}
