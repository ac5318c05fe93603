/// Source file discovery and declaration extraction.
///
/// [`FileScanner`] walks project roots for PHP files and turns each file
/// into at most one [`NamespaceEntry`].  The per-file extraction is behind
/// the [`DeclarationExtractor`] trait; the default [`LinePatternExtractor`]
/// recognises declarations by line prefix rather than parsing, which is
/// enough for well-formatted code:
///
///   - `namespace Foo\Bar;` (or `<?php namespace Foo\Bar;` on one line)
///   - `class Foo`, `abstract class Foo`, `interface Foo`
///
/// Only the first type declaration in a file is indexed.  Multi-line or
/// commented-out declarations can be missed or misread.
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::config::IndexConfig;
use crate::types::{Declaration, NamespaceEntry};

/// Strategy for pulling the primary declaration out of a file's text.
pub trait DeclarationExtractor: Send + Sync {
    fn extract_declaration(&self, source: &str) -> Option<Declaration>;
}

/// What a single line contributes to a file's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Namespace(String),
    Type(String),
}

/// Line-prefix rules, first match per category wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinePatternExtractor;

impl LinePatternExtractor {
    /// Apply the namespace and type rules to one line.
    pub fn classify_line(line: &str) -> Option<LineMatch> {
        if let Some(ns) = namespace_from_line(line) {
            return Some(LineMatch::Namespace(ns));
        }
        type_from_line(line).map(LineMatch::Type)
    }
}

impl DeclarationExtractor for LinePatternExtractor {
    fn extract_declaration(&self, source: &str) -> Option<Declaration> {
        let mut namespace: Option<String> = None;
        let mut type_name: Option<String> = None;

        for line in source.lines() {
            match Self::classify_line(line) {
                Some(LineMatch::Namespace(ns)) if namespace.is_none() => namespace = Some(ns),
                Some(LineMatch::Type(ty)) if type_name.is_none() => type_name = Some(ty),
                _ => {}
            }
            if namespace.is_some() && type_name.is_some() {
                break;
            }
        }

        type_name.map(|type_name| Declaration {
            namespace,
            type_name,
        })
    }
}

/// Capture the namespace from `namespace Foo\Bar;`, or from an opening-tag
/// line such as `<?php namespace Foo\Bar;`.
pub fn namespace_from_line(line: &str) -> Option<String> {
    let rest = if let Some(rest) = line.strip_prefix("namespace ") {
        rest
    } else if line.starts_with("<?php") && line.contains("namespace") {
        let at = line.find("namespace ")?;
        &line[at + "namespace ".len()..]
    } else {
        return None;
    };

    let name = rest.split(';').next().unwrap_or(rest);
    // Brace-style `namespace Foo {`
    let name = name.split('{').next().unwrap_or(name).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Capture the declared name from `class Foo`, `abstract class Foo` or
/// `interface Foo`.
pub fn type_from_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("abstract ").unwrap_or(line);
    let rest = rest
        .strip_prefix("class ")
        .or_else(|| rest.strip_prefix("interface "))?;

    let token = rest.split_whitespace().next()?;
    let token = token.split('{').next().unwrap_or(token);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Walks roots and scans files according to an [`IndexConfig`].
pub struct FileScanner {
    config: IndexConfig,
    extractor: Box<dyn DeclarationExtractor>,
}

impl std::fmt::Debug for FileScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl FileScanner {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_extractor(config, Box::new(LinePatternExtractor))
    }

    pub fn with_extractor(config: IndexConfig, extractor: Box<dyn DeclarationExtractor>) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|e| e == ext))
    }

    /// Recursively collect source files under `root`.
    pub fn list_source_files(&self, root: &Path) -> Vec<PathBuf> {
        self.source_files(root).collect()
    }

    /// Walk `root` lazily, yielding source files in file-name order.
    ///
    /// Directories are read only as the walk reaches them.  Ones that cannot
    /// be read are skipped and the walk carries on with their siblings.
    pub fn source_files(&self, root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(self.config.respect_ignore_files)
            .follow_links(self.config.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b));

        if !self.config.exclude.is_empty() {
            let mut overrides = OverrideBuilder::new(root);
            for pattern in &self.config.exclude {
                if let Err(err) = overrides.add(&format!("!{}", pattern)) {
                    tracing::warn!(pattern = %pattern, error = %err, "ignoring invalid exclude pattern");
                }
            }
            match overrides.build() {
                Ok(ov) => {
                    builder.overrides(ov);
                }
                Err(err) => tracing::warn!(error = %err, "ignoring exclude patterns"),
            }
        }

        builder.build().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    return None;
                }
            };
            let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
            (is_file && self.has_source_extension(entry.path())).then(|| entry.into_path())
        })
    }

    /// Extract the primary declaration of `path`.
    ///
    /// Unreadable or non-UTF-8 files yield `None`.
    pub fn scan_file(&self, path: &Path) -> Option<NamespaceEntry> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::trace!(path = %path.display(), error = %err, "skipping unreadable file");
                return None;
            }
        };
        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(_) => {
                tracing::trace!(path = %path.display(), "skipping non-UTF-8 file");
                return None;
            }
        };

        let declaration = self.extractor.extract_declaration(&source)?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        NamespaceEntry::new(&declaration.fully_qualified_name(), absolute)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
