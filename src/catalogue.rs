/// The namespace catalogue and its project-keyed registry.
///
/// A catalogue is an append-only list of [`NamespaceEntry`] values in
/// discovery order.  It is only ever cleared wholesale at the start of a
/// rebuild; lookups are linear scans returning owned clones so no lock is
/// held by callers after a query returns.
///
/// The [`CatalogueRegistry`] maps a [`ProjectKey`] (derived from the
/// project's root folders) to the catalogue for that project.  It is owned
/// by the server and passed explicitly to anything that needs it.
use std::collections::{BTreeSet, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::types::NamespaceEntry;

/// A catalogue shared between the indexer thread and request handlers.
pub type SharedCatalogue = Arc<RwLock<NamespaceCatalogue>>;

#[derive(Debug, Default, Clone)]
pub struct NamespaceCatalogue {
    entries: Vec<NamespaceEntry>,
}

impl NamespaceCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append an entry.  Names are trimmed; duplicates are kept.
    pub fn add(&mut self, name: &str, path: impl Into<PathBuf>) {
        if let Some(entry) = NamespaceEntry::new(name, path) {
            self.entries.push(entry);
        }
    }

    pub fn push(&mut self, entry: NamespaceEntry) {
        self.entries.push(entry);
    }

    pub fn all(&self) -> &[NamespaceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the first entry named exactly `name`, or, when no entry has
    /// that exact name, every entry whose name contains `name`.
    ///
    /// An exact hit discards substring hits collected before it, so which
    /// entries come back depends on insertion order.
    pub fn find_by_exact_or_substring(&self, name: &str) -> Vec<NamespaceEntry> {
        let mut partial = Vec::new();
        for entry in &self.entries {
            if entry.name() == name {
                return vec![entry.clone()];
            }
            if entry.name().contains(name) {
                partial.push(entry.clone());
            }
        }
        partial
    }

    /// Every entry whose last segments equal `class_name`.
    ///
    /// Both sides are compared in leading-`\` form, so `Bar` matches
    /// `Foo\Bar` and `\Bar` but not `Foo\FooBar`.
    pub fn find_by_class_name_suffix(&self, class_name: &str) -> Vec<NamespaceEntry> {
        let trimmed = class_name.trim_start_matches('\\');
        if trimmed.is_empty() {
            return Vec::new();
        }
        let suffix = format!("\\{}", trimmed);
        self.entries
            .iter()
            .filter(|entry| {
                let name = entry.name();
                name.ends_with(&suffix) || name == trimmed
            })
            .cloned()
            .collect()
    }

    /// Every entry whose name contains `fragment`.
    pub fn find_containing(&self, fragment: &str) -> Vec<NamespaceEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.name().contains(fragment))
            .cloned()
            .collect()
    }
}

// ─── Project keys ───────────────────────────────────────────────────────────

/// Identity of a project, derived from its set of root folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey(u64);

impl ProjectKey {
    /// Key used for a window with no folders open.
    pub const NO_FOLDERS: ProjectKey = ProjectKey(0);

    /// Hash the sorted, de-duplicated folder set.  Folder order does not
    /// affect the key.
    pub fn from_folders<P: AsRef<Path>>(folders: &[P]) -> Self {
        let set: BTreeSet<&Path> = folders.iter().map(|p| p.as_ref()).collect();
        if set.is_empty() {
            return Self::NO_FOLDERS;
        }
        let mut hasher = DefaultHasher::new();
        for folder in &set {
            folder.hash(&mut hasher);
        }
        // Keep the sentinel value reserved.
        ProjectKey(hasher.finish().max(1))
    }
}

impl Default for ProjectKey {
    fn default() -> Self {
        Self::NO_FOLDERS
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Session-scoped map of project key → catalogue.
///
/// Catalogues are created on first access and live as long as the
/// registry; clearing a catalogue keeps its identity.
#[derive(Debug, Default)]
pub struct CatalogueRegistry {
    catalogues: Mutex<HashMap<ProjectKey, SharedCatalogue>>,
}

impl CatalogueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalogue for `key`, created empty if this is the first access.
    pub fn catalogue_for(&self, key: ProjectKey) -> SharedCatalogue {
        let mut map = self.catalogues.lock();
        Arc::clone(map.entry(key).or_default())
    }

    /// The catalogue for `key` if one was ever created.
    pub fn get(&self, key: ProjectKey) -> Option<SharedCatalogue> {
        self.catalogues.lock().get(&key).cloned()
    }

    /// Number of projects seen this session.
    pub fn len(&self) -> usize {
        self.catalogues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogues.lock().is_empty()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
