//! Data types shared by the catalogue, scanner, resolver and actions.
//!
//! These are plain owned values so they can cross the indexer thread and
//! the LSP handlers without borrowing from any file buffer.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// One indexed declaration: a fully-qualified class or interface name and
/// the file that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceEntry {
    /// Backslash-delimited name, e.g. `App\Models\User` or `\Standalone`
    /// for a declaration in the global namespace.
    name: String,
    /// Absolute path to the declaring file.
    path: PathBuf,
}

impl NamespaceEntry {
    /// Build an entry, trimming surrounding whitespace from `name`.
    ///
    /// Returns `None` when the trimmed name is empty.
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            path: path.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The name without the leading `\` used for global declarations.
    pub fn qualified_name(&self) -> &str {
        self.name.strip_prefix('\\').unwrap_or(&self.name)
    }

    /// The last segment of the name (`User` for `App\Models\User`).
    pub fn short_name(&self) -> &str {
        crate::util::short_name(&self.name)
    }
}

/// A declaration extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The file's namespace, `None` for the global namespace.
    pub namespace: Option<String>,
    /// The declared class or interface name.
    pub type_name: String,
}

impl Declaration {
    /// `Namespace\Type`, or `\Type` in the global namespace.
    pub fn fully_qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, self.type_name),
            None => format!("\\{}", self.type_name),
        }
    }
}

/// Outcome of resolving a cursor token against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing matched; callers do nothing.
    NotFound,
    /// Exactly one match; callers act on it without prompting.
    Single(NamespaceEntry),
    /// Several matches, in catalogue order, for the user to choose from.
    Multiple(Vec<NamespaceEntry>),
}

impl Resolution {
    pub fn entries(&self) -> &[NamespaceEntry] {
        match self {
            Resolution::NotFound => &[],
            Resolution::Single(entry) => std::slice::from_ref(entry),
            Resolution::Multiple(entries) => entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

impl From<Vec<NamespaceEntry>> for Resolution {
    fn from(mut entries: Vec<NamespaceEntry>) -> Self {
        match entries.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Single(entries.remove(0)),
            _ => Resolution::Multiple(entries),
        }
    }
}

/// A single-line replacement: line `line` (0-based) is replaced by
/// `replacement`, which may itself span several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    pub line: usize,
    pub replacement: String,
}
