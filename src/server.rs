/// LSP server trait implementation.
///
/// This module contains the `impl LanguageServer for Backend` block and
/// the `workspace/executeCommand` plumbing: commands are turned into an
/// [`Outcome`] by the actions module, and the outcome is then carried out
/// with client requests (`window/showMessageRequest` for choices,
/// `window/showDocument` to open files, `workspace/applyEdit` for edits).
use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Value, json};
use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;

use crate::actions::{
    CopyQualifiedName, FindSubclasses, FollowUp, GotoDefinition, InsertNamespaceStatement,
    InsertUseStatement, OpenClassFile, Outcome, Previewable, candidate_for_label, display_names,
};
use crate::types::{NamespaceEntry, Resolution};
use crate::util::{path_to_uri, uri_to_path};
use crate::{Backend, Document};

/// Commands accepted by `workspace/executeCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    IndexProjectNamespaces,
    IndexStatus,
    OpenClassFile,
    GotoDefinition,
    InsertUseStatement,
    InsertNamespaceStatement,
    CopyNamespaceAndClass,
    FindSubclasses,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::IndexProjectNamespaces,
        Command::IndexStatus,
        Command::OpenClassFile,
        Command::GotoDefinition,
        Command::InsertUseStatement,
        Command::InsertNamespaceStatement,
        Command::CopyNamespaceAndClass,
        Command::FindSubclasses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::IndexProjectNamespaces => "phpnaha.indexProjectNamespaces",
            Command::IndexStatus => "phpnaha.indexStatus",
            Command::OpenClassFile => "phpnaha.openClassFile",
            Command::GotoDefinition => "phpnaha.gotoDefinition",
            Command::InsertUseStatement => "phpnaha.insertUseStatement",
            Command::InsertNamespaceStatement => "phpnaha.insertNamespaceStatement",
            Command::CopyNamespaceAndClass => "phpnaha.copyNamespaceAndClass",
            Command::FindSubclasses => "phpnaha.findSubclasses",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// First command argument of the cursor-driven commands.  The position is
/// optional; commands that need a token reject arguments without one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentArgument {
    text_document: TextDocumentIdentifier,
    #[serde(default)]
    position: Option<Position>,
}

/// The candidate list shown for a choice; its first entry is previewed
/// while the user decides.
struct CandidateList;

impl Previewable for CandidateList {}

impl Backend {
    fn document_argument(&self, arguments: &[Value]) -> Result<(Document, Option<Position>)> {
        let raw = arguments
            .first()
            .cloned()
            .ok_or_else(|| Error::invalid_params("expected a text document argument"))?;
        let arg: DocumentArgument = serde_json::from_value(raw)
            .map_err(|err| Error::invalid_params(format!("invalid document argument: {}", err)))?;
        let document = self.document(&arg.text_document.uri).ok_or_else(|| {
            Error::invalid_params(format!("cannot read {}", arg.text_document.uri))
        })?;
        Ok((document, arg.position))
    }

    /// Run `command` against the current project without touching the
    /// client.  Returns what should happen and the document it applies to.
    pub fn command_outcome(
        &self,
        command: Command,
        arguments: &[Value],
    ) -> Result<(Outcome, Option<Document>)> {
        let project = self.project();
        let catalogue = self.catalogue();

        if command == Command::OpenClassFile {
            let filter = arguments.first().and_then(Value::as_str).map(str::to_string);
            let outcome = OpenClassFile { filter }.run(&catalogue.read());
            return Ok((outcome, None));
        }

        let (document, position) = self.document_argument(arguments)?;
        let ctx = position.and_then(|p| self.cursor_context(&document, p));

        let outcome = match command {
            Command::GotoDefinition => match &ctx {
                Some(ctx) => GotoDefinition::new(&project.layout).run(&catalogue.read(), ctx),
                None => Outcome::Nothing,
            },
            Command::InsertUseStatement => match &ctx {
                Some(ctx) => InsertUseStatement::run(&catalogue.read(), ctx, &document.text),
                None => Outcome::Nothing,
            },
            Command::InsertNamespaceStatement => match document.path() {
                Some(path) => InsertNamespaceStatement::new(&project.layout).run(&path, &document.text),
                None => Outcome::Nothing,
            },
            Command::CopyNamespaceAndClass => {
                CopyQualifiedName::run(&catalogue.read(), ctx.as_ref(), &document.text)
            }
            Command::FindSubclasses => match &ctx {
                Some(ctx) => FindSubclasses.run(&catalogue.read(), ctx),
                None => Outcome::Nothing,
            },
            Command::IndexProjectNamespaces | Command::IndexStatus | Command::OpenClassFile => {
                Outcome::Nothing
            }
        };
        Ok((outcome, Some(document)))
    }

    /// Entry count and identity of the current project's catalogue.
    pub fn index_status(&self) -> Value {
        let project = self.project();
        json!({
            "project": project.key.to_string(),
            "roots": project.roots.len(),
            "entries": self.catalogue().read().len(),
        })
    }

    /// Carry out an outcome, asking the user first when it is a choice.
    async fn deliver(&self, outcome: Outcome, document: Option<&Document>) -> Result<Option<Value>> {
        let Outcome::Choose {
            candidates,
            follow_up,
        } = outcome
        else {
            return self.perform(outcome, document).await;
        };

        if follow_up == FollowUp::Open
            && let Some(first) = candidates.first()
        {
            self.perform(CandidateList.preview(first), document).await?;
        }

        let Some(entry) = self.choose(&candidates).await else {
            return Ok(None);
        };
        let text = document.map(|d| d.text.as_str()).unwrap_or("");
        self.perform(follow_up.complete(&entry, text), document).await
    }

    async fn choose(&self, candidates: &[NamespaceEntry]) -> Option<NamespaceEntry> {
        let client = self.client.as_ref()?;
        let labels = display_names(candidates, &self.project.read().roots);
        let actions = labels
            .iter()
            .map(|title| MessageActionItem {
                title: title.clone(),
                properties: HashMap::new(),
            })
            .collect();

        let picked = match client
            .show_message_request(MessageType::INFO, "Select a class", Some(actions))
            .await
        {
            Ok(picked) => picked?,
            Err(err) => {
                tracing::warn!(error = %err, "selection request failed");
                return None;
            }
        };
        candidate_for_label(candidates, &labels, &picked.title).cloned()
    }

    async fn perform(&self, outcome: Outcome, document: Option<&Document>) -> Result<Option<Value>> {
        match outcome {
            Outcome::Nothing | Outcome::Choose { .. } => Ok(None),
            Outcome::Clipboard(text) => Ok(Some(Value::String(text))),
            Outcome::Open { path, preview } => {
                self.show_file(path, preview).await;
                Ok(None)
            }
            Outcome::Edit(edit) => {
                let Some(document) = document else {
                    return Ok(None);
                };
                let Some(client) = &self.client else {
                    return Ok(None);
                };
                let text_edit = edit.to_text_edit(&document.text);
                let workspace_edit = WorkspaceEdit {
                    changes: Some(HashMap::from([(document.uri.clone(), vec![text_edit])])),
                    ..WorkspaceEdit::default()
                };
                match client.apply_edit(workspace_edit).await {
                    Ok(response) if !response.applied => {
                        tracing::debug!(reason = ?response.failure_reason, "edit rejected by client");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "applyEdit failed"),
                }
                Ok(None)
            }
        }
    }

    async fn show_file(&self, path: PathBuf, preview: bool) {
        let Some(client) = &self.client else {
            return;
        };
        let Some(uri) = path_to_uri(&path) else {
            tracing::debug!(path = %path.display(), "cannot express path as a URI");
            return;
        };
        let params = ShowDocumentParams {
            uri,
            external: Some(false),
            take_focus: Some(!preview),
            selection: None,
        };
        if let Err(err) = client.show_document(params).await {
            tracing::warn!(error = %err, "showDocument failed");
        }
    }
}

fn location_of(entry: &NamespaceEntry) -> Option<Location> {
    Some(Location {
        uri: path_to_uri(entry.path())?,
        range: Range::default(),
    })
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root_uri = params.root_uri;
        let mut roots: Vec<PathBuf> = params
            .workspace_folders
            .unwrap_or_default()
            .iter()
            .filter_map(|folder| uri_to_path(folder.uri.as_str()))
            .collect();
        if roots.is_empty()
            && let Some(root) = root_uri.and_then(|uri| uri.to_file_path().ok())
        {
            roots.push(root);
        }
        self.set_workspace_roots(roots);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: Command::ALL.iter().map(|c| c.name().to_string()).collect(),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let project = self.project();
        self.log(
            MessageType::INFO,
            format!(
                "PHPNaHa initialized! {} folder(s), {} PSR-4 mapping(s)",
                project.roots.len(),
                project.layout.mappings().len()
            ),
        )
        .await;
        // The worker outlives the handle; completion is reported via the log.
        drop(self.start_rebuild());
    }

    async fn shutdown(&self) -> Result<()> {
        self.cancel_indexing();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.open_document(doc.uri.as_str(), doc.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        if let Some(change) = params.content_changes.into_iter().next() {
            self.open_document(params.text_document.uri.as_str(), change.text);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.close_document(params.text_document.uri.as_str());
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut roots = self.project().roots;
        for removed in &params.event.removed {
            if let Some(path) = uri_to_path(removed.uri.as_str()) {
                roots.retain(|root| root != &path);
            }
        }
        for added in &params.event.added {
            if let Some(path) = uri_to_path(added.uri.as_str())
                && !roots.contains(&path)
            {
                roots.push(path);
            }
        }
        self.set_workspace_roots(roots);
        drop(self.start_rebuild());
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(document) = self.document(&uri) else {
            return Ok(None);
        };
        let Some(ctx) = self.cursor_context(&document, position) else {
            return Ok(None);
        };

        let project = self.project();
        let catalogue = self.catalogue();
        let resolution = GotoDefinition::new(&project.layout).resolve(&catalogue.read(), &ctx);

        Ok(match resolution {
            Resolution::NotFound => None,
            Resolution::Single(entry) => location_of(&entry).map(GotoDefinitionResponse::Scalar),
            Resolution::Multiple(entries) => {
                let locations: Vec<Location> = entries.iter().filter_map(location_of).collect();
                Some(GotoDefinitionResponse::Array(locations))
            }
        })
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let Some(command) = Command::from_name(&params.command) else {
            return Err(Error::method_not_found());
        };
        tracing::debug!(command = command.name(), "executing command");

        match command {
            Command::IndexProjectNamespaces => {
                drop(self.start_rebuild());
                Ok(None)
            }
            Command::IndexStatus => Ok(Some(self.index_status())),
            _ => {
                let (outcome, document) = self.command_outcome(command, &params.arguments)?;
                self.deliver(outcome, document.as_ref()).await
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
