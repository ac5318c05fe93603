/// Composer PSR-4 layout.
///
/// Reads the `psr-4` maps of `composer.json` (`autoload` and
/// `autoload-dev`) and uses them in both directions:
///
///   - **namespace → file**: `Klarna\Rest\Order` with `"Klarna\\": "src/"`
///     becomes `<root>/src/Rest/Order.php` (first existing candidate wins).
///   - **file → namespace**: `<root>/src/Rest/Order.php` becomes
///     `Klarna\Rest`, which is what the insert-namespace action writes.
///
/// Without a matching mapping the namespace is guessed from the directory
/// path relative to the root.
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

/// A single PSR-4 namespace-to-directory mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psr4Mapping {
    /// Namespace prefix ending with `\`, or empty for the fallback mapping.
    pub prefix: String,
    /// Directory relative to the project root, ending with `/` (or empty).
    pub base_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    autoload: AutoloadSection,
    #[serde(default, rename = "autoload-dev")]
    autoload_dev: AutoloadSection,
}

#[derive(Debug, Default, Deserialize)]
struct AutoloadSection {
    #[serde(default, rename = "psr-4")]
    psr4: BTreeMap<String, OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Parse `<root>/composer.json` into PSR-4 mappings, longest prefix first.
///
/// A missing or malformed file yields no mappings.
pub fn parse_composer_json(root: &Path) -> Vec<Psr4Mapping> {
    let Ok(content) = std::fs::read_to_string(root.join("composer.json")) else {
        return Vec::new();
    };
    let manifest: ComposerManifest = match serde_json::from_str(&content) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unparseable composer.json");
            return Vec::new();
        }
    };

    let mut mappings = Vec::new();
    for section in [manifest.autoload, manifest.autoload_dev] {
        for (prefix, dirs) in section.psr4 {
            let prefix = normalise_prefix(&prefix);
            let dirs = match dirs {
                OneOrMany::One(dir) => vec![dir],
                OneOrMany::Many(dirs) => dirs,
            };
            mappings.extend(dirs.iter().map(|dir| Psr4Mapping {
                prefix: prefix.clone(),
                base_path: normalise_path(dir),
            }));
        }
    }

    mappings.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    mappings
}

fn normalise_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('\\') {
        prefix.to_string()
    } else {
        format!("{}\\", prefix)
    }
}

/// Forward slashes, trailing `/` unless empty.
fn normalise_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    if p.is_empty() || p.ends_with('/') {
        p
    } else {
        format!("{}/", p)
    }
}

/// Directory names between `base` and `file`, or `None` if `file` is not
/// below `base`.
fn directory_segments(base: &Path, file: &Path) -> Option<Vec<String>> {
    let rel = file.strip_prefix(base).ok()?;
    let dir = rel.parent().unwrap_or(Path::new(""));
    Some(
        dir.components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect(),
    )
}

/// A project root together with its PSR-4 mappings.
#[derive(Debug, Clone, Default)]
pub struct ProjectLayout {
    root: PathBuf,
    mappings: Vec<Psr4Mapping>,
}

impl ProjectLayout {
    pub fn new(root: PathBuf, mappings: Vec<Psr4Mapping>) -> Self {
        Self { root, mappings }
    }

    /// Read `composer.json` under `root`.
    pub fn load(root: &Path) -> Self {
        Self::new(root.to_path_buf(), parse_composer_json(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mappings(&self) -> &[Psr4Mapping] {
        &self.mappings
    }

    /// The namespace a file at `file` should declare.
    ///
    /// The mapping whose directory contains the file most specifically is
    /// used.  Without one, the directories under the root are joined with
    /// `\`, skipping a leading `src` or `lib`.  `None` means the global
    /// namespace.
    pub fn namespace_for_path(&self, file: &Path) -> Option<String> {
        let best = self
            .mappings
            .iter()
            .filter_map(|m| {
                let base = self.root.join(&m.base_path);
                directory_segments(&base, file).map(|segs| (m, base, segs))
            })
            .max_by_key(|(_, base, _)| base.components().count());

        let segments: Vec<String> = match best {
            Some((mapping, _, segs)) => {
                let prefix = mapping.prefix.trim_end_matches('\\');
                std::iter::once(prefix.to_string())
                    .filter(|p| !p.is_empty())
                    .chain(segs)
                    .collect()
            }
            None => {
                let mut segs = directory_segments(&self.root, file)?;
                if segs.first().is_some_and(|s| s == "src" || s == "lib") {
                    segs.remove(0);
                }
                segs
            }
        };

        if segments.is_empty() {
            None
        } else {
            Some(segments.join("\\"))
        }
    }

    /// Map a class name to an existing file via the PSR-4 mappings.
    ///
    /// A leading `\` is ignored.  Returns the first candidate that exists
    /// on disk.
    pub fn resolve_class_path(&self, class_name: &str) -> Option<PathBuf> {
        let name = class_name.strip_prefix('\\').unwrap_or(class_name);
        if name.is_empty() {
            return None;
        }

        self.mappings.iter().find_map(|mapping| {
            let relative = if mapping.prefix.is_empty() {
                name
            } else {
                name.strip_prefix(mapping.prefix.as_str())?
            };
            let file = self
                .root
                .join(&mapping.base_path)
                .join(format!("{}.php", relative.replace('\\', "/")));
            file.is_file().then_some(file)
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
