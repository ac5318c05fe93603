/// Editor actions, independent of the protocol that carries them.
///
/// Every action turns the catalogue plus cursor/document context into an
/// [`Outcome`]: something for the host to do (open a file, show a list,
/// apply a one-line edit, put text on the clipboard) or nothing at all.
/// When an action needs the user to pick among candidates it returns
/// [`Outcome::Choose`] with a [`FollowUp`] saying what to do with the pick.
///
/// Shared behaviour lives in two small capability traits:
///
///   - [`Previewable`]: opening a highlighted candidate transiently and a
///     selected one for real.
///   - [`PathResolvable`]: moving between a class name and a file path via
///     the project's PSR-4 layout.
use std::path::{Path, PathBuf};

use crate::catalogue::NamespaceCatalogue;
use crate::composer::ProjectLayout;
use crate::insertion::StatementInserter;
use crate::resolver::{CursorContext, ImportStatement, TokenResolver, file_namespace};
use crate::scanner::{DeclarationExtractor, LinePatternExtractor};
use crate::types::{LineEdit, NamespaceEntry, Resolution};

/// What the host should do after an action ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Nothing,
    Open { path: PathBuf, preview: bool },
    Choose {
        candidates: Vec<NamespaceEntry>,
        follow_up: FollowUp,
    },
    Edit(LineEdit),
    Clipboard(String),
}

/// What to do with the candidate the user picks from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Open,
    InsertUse,
    CopyName,
}

impl FollowUp {
    /// Finish the action for the chosen `entry`.  `document` is the text of
    /// the file the action started from.
    pub fn complete(self, entry: &NamespaceEntry, document: &str) -> Outcome {
        match self {
            FollowUp::Open => open(entry, false),
            FollowUp::InsertUse => InsertUseStatement::edit_for(entry, document),
            FollowUp::CopyName => Outcome::Clipboard(entry.qualified_name().to_string()),
        }
    }
}

fn open(entry: &NamespaceEntry, preview: bool) -> Outcome {
    Outcome::Open {
        path: entry.path().to_path_buf(),
        preview,
    }
}

/// Candidate labels for a selection list, in order.
///
/// Labels are unique.  A name shared by several candidates is suffixed with
/// the candidate's path, relative to the first of `roots` containing it, and
/// a label that still collides gets its list position appended.
pub fn display_names(candidates: &[NamespaceEntry], roots: &[PathBuf]) -> Vec<String> {
    let shared = |name: &str| candidates.iter().filter(|e| e.name() == name).count() > 1;
    let labels: Vec<String> = candidates
        .iter()
        .map(|entry| {
            if !shared(entry.name()) {
                return entry.name().to_string();
            }
            let path = roots
                .iter()
                .find_map(|root| entry.path().strip_prefix(root).ok())
                .unwrap_or(entry.path());
            format!("{} ({})", entry.name(), path.display())
        })
        .collect();

    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if labels.iter().filter(|other| *other == label).count() > 1 {
                format!("{} #{}", label, i + 1)
            } else {
                label.clone()
            }
        })
        .collect()
}

/// The candidate whose label, as produced by [`display_names`], is `title`.
pub fn candidate_for_label<'a>(
    candidates: &'a [NamespaceEntry],
    labels: &[String],
    title: &str,
) -> Option<&'a NamespaceEntry> {
    let index = labels.iter().position(|label| label == title)?;
    candidates.get(index)
}

/// Actions whose candidates can be opened.
pub trait Previewable {
    /// Open the highlighted candidate without committing to it.
    fn preview(&self, entry: &NamespaceEntry) -> Outcome {
        open(entry, true)
    }

    /// Open the chosen candidate.
    fn select(&self, entry: &NamespaceEntry) -> Outcome {
        open(entry, false)
    }

    /// Navigate directly on a single match, otherwise ask.
    fn navigate(&self, resolution: Resolution) -> Outcome {
        match resolution {
            Resolution::NotFound => Outcome::Nothing,
            Resolution::Single(entry) => self.select(&entry),
            Resolution::Multiple(candidates) => Outcome::Choose {
                candidates,
                follow_up: FollowUp::Open,
            },
        }
    }
}

/// Actions that map between class names and files.
pub trait PathResolvable {
    fn layout(&self) -> &ProjectLayout;

    fn namespace_for_path(&self, path: &Path) -> Option<String> {
        self.layout().namespace_for_path(path)
    }

    fn path_for_class(&self, fqn: &str) -> Option<PathBuf> {
        self.layout().resolve_class_path(fqn)
    }
}

// ─── Open class file ────────────────────────────────────────────────────────

/// List every indexed class (optionally filtered) for the user to open.
#[derive(Debug, Default)]
pub struct OpenClassFile {
    pub filter: Option<String>,
}

impl Previewable for OpenClassFile {}

impl OpenClassFile {
    pub fn run(&self, catalogue: &NamespaceCatalogue) -> Outcome {
        let candidates = match self.filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => catalogue.find_containing(filter),
            _ => catalogue.all().to_vec(),
        };
        if candidates.is_empty() {
            return Outcome::Nothing;
        }
        Outcome::Choose {
            candidates,
            follow_up: FollowUp::Open,
        }
    }
}

// ─── Go to definition ───────────────────────────────────────────────────────

pub struct GotoDefinition<'a> {
    layout: &'a ProjectLayout,
}

impl Previewable for GotoDefinition<'_> {}

impl PathResolvable for GotoDefinition<'_> {
    fn layout(&self) -> &ProjectLayout {
        self.layout
    }
}

impl<'a> GotoDefinition<'a> {
    pub fn new(layout: &'a ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn run(&self, catalogue: &NamespaceCatalogue, ctx: &CursorContext) -> Outcome {
        self.navigate(self.resolve(catalogue, ctx))
    }

    /// Catalogue resolution, falling back to the PSR-4 layout when the
    /// catalogue has nothing (e.g. before the first rebuild finished).
    pub fn resolve(&self, catalogue: &NamespaceCatalogue, ctx: &CursorContext) -> Resolution {
        let resolution = TokenResolver::new(catalogue).resolve(ctx);
        if !resolution.is_empty() {
            return resolution;
        }
        TokenResolver::resolve_base_type(ctx)
            .and_then(|fqn| {
                let path = self.path_for_class(&fqn)?;
                NamespaceEntry::new(&fqn, path)
            })
            .map_or(Resolution::NotFound, Resolution::Single)
    }
}

// ─── Insert use statement ───────────────────────────────────────────────────

pub struct InsertUseStatement;

impl InsertUseStatement {
    pub fn run(catalogue: &NamespaceCatalogue, ctx: &CursorContext, document: &str) -> Outcome {
        match TokenResolver::new(catalogue).resolve(ctx) {
            Resolution::NotFound => Outcome::Nothing,
            Resolution::Single(entry) => Self::edit_for(&entry, document),
            Resolution::Multiple(candidates) => Outcome::Choose {
                candidates,
                follow_up: FollowUp::InsertUse,
            },
        }
    }

    /// The edit importing `entry` into `document`.
    ///
    /// Nothing is inserted when the class is already imported, lives in the
    /// document's own namespace, or is a global class used from a global
    /// file.
    pub fn edit_for(entry: &NamespaceEntry, document: &str) -> Outcome {
        let fqn = entry.qualified_name();
        let own_namespace = file_namespace(document);
        let entry_namespace = fqn.rsplit_once('\\').map(|(ns, _)| ns);

        if ImportStatement::collect(document)
            .iter()
            .any(|imp| imp.target == fqn)
        {
            return Outcome::Nothing;
        }
        match (entry_namespace, own_namespace.as_deref()) {
            (None, None) => return Outcome::Nothing,
            (Some(theirs), Some(ours)) if theirs == ours => return Outcome::Nothing,
            _ => {}
        }

        StatementInserter::insert_use(document, fqn).map_or(Outcome::Nothing, Outcome::Edit)
    }
}

// ─── Insert namespace statement ─────────────────────────────────────────────

pub struct InsertNamespaceStatement<'a> {
    layout: &'a ProjectLayout,
}

impl PathResolvable for InsertNamespaceStatement<'_> {
    fn layout(&self) -> &ProjectLayout {
        self.layout
    }
}

impl<'a> InsertNamespaceStatement<'a> {
    pub fn new(layout: &'a ProjectLayout) -> Self {
        Self { layout }
    }

    /// Declare the namespace derived from `path`, unless the document
    /// already declares one.
    pub fn run(&self, path: &Path, document: &str) -> Outcome {
        if file_namespace(document).is_some() {
            return Outcome::Nothing;
        }
        self.namespace_for_path(path)
            .and_then(|ns| StatementInserter::insert_namespace(document, &ns))
            .map_or(Outcome::Nothing, Outcome::Edit)
    }
}

// ─── Copy namespace and class ───────────────────────────────────────────────

pub struct CopyQualifiedName;

impl CopyQualifiedName {
    /// The name of the class under the cursor, or else the name of the
    /// class the document itself declares.
    pub fn run(
        catalogue: &NamespaceCatalogue,
        ctx: Option<&CursorContext>,
        document: &str,
    ) -> Outcome {
        if let Some(ctx) = ctx {
            match TokenResolver::new(catalogue).resolve(ctx) {
                Resolution::Single(entry) => {
                    return Outcome::Clipboard(entry.qualified_name().to_string());
                }
                Resolution::Multiple(candidates) => {
                    return Outcome::Choose {
                        candidates,
                        follow_up: FollowUp::CopyName,
                    };
                }
                Resolution::NotFound => {}
            }
        }

        LinePatternExtractor
            .extract_declaration(document)
            .map_or(Outcome::Nothing, |decl| {
                let fqn = decl.fully_qualified_name();
                Outcome::Clipboard(fqn.trim_start_matches('\\').to_string())
            })
    }
}

// ─── Find subclasses ────────────────────────────────────────────────────────

pub struct FindSubclasses;

impl Previewable for FindSubclasses {}

impl FindSubclasses {
    pub fn run(&self, catalogue: &NamespaceCatalogue, ctx: &CursorContext) -> Outcome {
        self.navigate(TokenResolver::new(catalogue).find_subclasses(ctx))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
