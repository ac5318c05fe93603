/// PHPNaHa: PHP namespace navigation over LSP.
///
/// The crate indexes `class`/`interface` declarations of a project into a
/// [`catalogue::NamespaceCatalogue`] and answers navigation and import
/// questions from it.  Everything below [`Backend`] is protocol-agnostic;
/// the `LanguageServer` implementation lives in `server`.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tower_lsp::Client;
use tower_lsp::lsp_types::{MessageType, Position, Url};

pub mod actions;
pub mod catalogue;
pub mod composer;
pub mod config;
pub mod indexer;
pub mod insertion;
pub mod resolver;
pub mod scanner;
mod server;
pub mod types;
pub mod util;

pub use server::Command;

use crate::catalogue::{CatalogueRegistry, ProjectKey, SharedCatalogue};
use crate::composer::ProjectLayout;
use crate::config::Config;
use crate::indexer::{IndexBuilder, RebuildHandle, RebuildSummary};
use crate::resolver::CursorContext;
use crate::scanner::FileScanner;

/// Everything derived from the current set of workspace folders.
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    pub roots: Vec<PathBuf>,
    pub key: ProjectKey,
    pub config: Config,
    pub layout: ProjectLayout,
}

/// A document an action works on: its URI and current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    pub text: String,
}

impl Document {
    pub fn path(&self) -> Option<PathBuf> {
        self.uri.to_file_path().ok()
    }
}

pub struct Backend {
    name: String,
    version: String,
    client: Option<Client>,
    registry: Arc<CatalogueRegistry>,
    /// One rebuild worker per project, so switching folders never cancels
    /// another project's rebuild.
    indexers: Mutex<HashMap<ProjectKey, Arc<IndexBuilder>>>,
    project: RwLock<ProjectState>,
    /// Config file given on the command line; overrides discovery.
    config_path: Option<PathBuf>,
    open_files: Mutex<HashMap<String, String>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_client(Some(client))
    }

    pub fn new_test() -> Self {
        Self::with_client(None)
    }

    /// A client-less backend already pointed at `roots`.
    pub fn new_test_with_workspace(roots: Vec<PathBuf>) -> Self {
        let backend = Self::new_test();
        backend.set_workspace_roots(roots);
        backend
    }

    fn with_client(client: Option<Client>) -> Self {
        Self {
            name: "PHPNaHa".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            client,
            registry: Arc::new(CatalogueRegistry::new()),
            indexers: Mutex::new(HashMap::new()),
            project: RwLock::new(ProjectState::default()),
            config_path: None,
            open_files: Mutex::new(HashMap::new()),
        }
    }

    /// Always load configuration from `path` instead of discovering it.
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn registry(&self) -> &Arc<CatalogueRegistry> {
        &self.registry
    }

    pub fn project(&self) -> ProjectState {
        self.project.read().clone()
    }

    /// The catalogue of the current project.
    pub fn catalogue(&self) -> SharedCatalogue {
        self.registry.catalogue_for(self.project.read().key)
    }

    /// Switch to a new folder set: recompute the project key, reload the
    /// configuration and the PSR-4 layout of the first folder.
    pub fn set_workspace_roots(&self, roots: Vec<PathBuf>) {
        let first = roots.first().cloned();
        let config = self.load_config(first.as_deref());
        let layout = first
            .as_deref()
            .map(ProjectLayout::load)
            .unwrap_or_default();
        let key = ProjectKey::from_folders(&roots);

        tracing::debug!(
            project = %key,
            roots = roots.len(),
            psr4 = layout.mappings().len(),
            "workspace folders changed"
        );

        self.indexer_for(key)
            .set_scanner(FileScanner::new(config.index.clone()));
        *self.project.write() = ProjectState {
            roots,
            key,
            config,
            layout,
        };
    }

    fn indexer_for(&self, key: ProjectKey) -> Arc<IndexBuilder> {
        Arc::clone(self.indexers.lock().entry(key).or_default())
    }

    /// Ask every project's in-flight rebuild to stop.
    pub fn cancel_indexing(&self) {
        for indexer in self.indexers.lock().values() {
            indexer.cancel();
        }
    }

    fn load_config(&self, workspace_root: Option<&Path>) -> Config {
        let loaded = match &self.config_path {
            Some(path) => Config::load_from_path(path).map(|c| (c, Some(path.clone()))),
            None => Config::load_for_workspace(workspace_root),
        };
        match loaded {
            Ok((config, Some(path))) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                config
            }
            Ok((config, None)) => config,
            Err(err) => {
                tracing::warn!(error = %err, "using default configuration");
                Config::default()
            }
        }
    }

    /// Rebuild the current project's catalogue in the background.
    ///
    /// Only an earlier rebuild of the same project is cancelled.
    /// Indexing start and finish are also reported to the client when one
    /// is connected and a tokio runtime is available.
    pub fn start_rebuild(&self) -> RebuildHandle {
        let (roots, key) = {
            let project = self.project.read();
            (project.roots.clone(), project.key)
        };
        let catalogue = self.registry.catalogue_for(key);

        let notify = self
            .client
            .clone()
            .zip(tokio::runtime::Handle::try_current().ok());
        if let Some((client, runtime)) = &notify {
            let client = client.clone();
            let message = format!("Beginning indexing of {} folder(s)", roots.len());
            runtime.spawn(async move { client.log_message(MessageType::INFO, message).await });
        }

        self.indexer_for(key)
            .start_with(catalogue, roots, move |summary: RebuildSummary| {
                let Some((client, runtime)) = notify else {
                    return;
                };
                if summary.cancelled {
                    return;
                }
                let message = format!(
                    "Finished indexing: {} class(es) in {} file(s)",
                    summary.entries_added, summary.files_scanned
                );
                runtime.spawn(async move { client.log_message(MessageType::INFO, message).await });
            })
    }

    // ─── Documents ──────────────────────────────────────────────────────

    pub fn open_document(&self, uri: &str, text: String) {
        self.open_files.lock().insert(uri.to_string(), text);
    }

    pub fn close_document(&self, uri: &str) {
        self.open_files.lock().remove(uri);
    }

    /// The buffer text of `uri`, or the file on disk when it is not open.
    pub fn document(&self, uri: &Url) -> Option<Document> {
        let text = match self.open_files.lock().get(uri.as_str()) {
            Some(text) => text.clone(),
            None => std::fs::read_to_string(uri.to_file_path().ok()?).ok()?,
        };
        Some(Document {
            uri: uri.clone(),
            text,
        })
    }

    pub fn cursor_context(&self, document: &Document, position: Position) -> Option<CursorContext> {
        CursorContext::from_document(&document.text, position)
    }

    async fn log(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
