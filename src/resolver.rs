/// Cursor-token resolution against the namespace catalogue.
///
/// Given what the editor knows about the cursor (the current line, the
/// token under it, the file's `use` imports and its namespace) the
/// resolver works out which catalogue query to run:
///
///   1. Cursor on a `use` line → look up the imported name.
///   2. Drop any `->member` / `::member` suffix from the token.
///   3. Qualified token (`Models\User`) → expand its first segment through
///      the first import whose target ends with it (`use App\Models;` →
///      `App\Models\User`), else through an import aliased to it.
///   4. Bare token → the first import that mentions it.
///   5. Inside a namespace → `Namespace\Token`, then any class whose name
///      ends in `\Token`.
///   6. Global namespace → the token itself.
///
/// The subclass lookup uses the same context to find a base type name and
/// lists every entry that contains it.
use tower_lsp::lsp_types::Position;

use crate::catalogue::NamespaceCatalogue;
use crate::scanner::namespace_from_line;
use crate::types::{NamespaceEntry, Resolution};
use crate::util::{line_at, short_name, token_at};

// ─── Imports ────────────────────────────────────────────────────────────────

/// One imported class from a top-level `use` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// The imported name without a leading `\`, e.g. `App\Models\User`.
    pub target: String,
    /// The `as` alias, if any.
    pub alias: Option<String>,
}

impl ImportStatement {
    /// The name this import makes available in the file.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| short_name(&self.target))
    }

    /// `true` when the statement's target or alias contains `token`.
    pub fn mentions(&self, token: &str) -> bool {
        self.target.contains(token) || self.alias.as_deref().is_some_and(|a| a.contains(token))
    }

    /// Parse a top-level `use` line.
    ///
    /// Handles plain, aliased, comma-separated and grouped forms
    /// (`use A\{B, C as D};`).  Function and constant imports, closures'
    /// `use (...)` and indented (trait) `use` lines yield nothing.
    pub fn parse_line(line: &str) -> Vec<ImportStatement> {
        let Some(rest) = line.strip_prefix("use ").or_else(|| line.strip_prefix("use\t")) else {
            return Vec::new();
        };
        let rest = rest.trim_start();
        if rest.starts_with('(') || rest.starts_with("function ") || rest.starts_with("const ") {
            return Vec::new();
        }
        let body = rest.split(';').next().unwrap_or(rest).trim();

        let mut imports = Vec::new();
        if let Some(open) = body.find('{') {
            let prefix = body[..open].trim().trim_matches('\\');
            let inner = body[open + 1..].trim_end_matches('}');
            for item in inner.split(',') {
                if let Some(import) = Self::parse_item(item, Some(prefix)) {
                    imports.push(import);
                }
            }
        } else {
            for item in body.split(',') {
                if let Some(import) = Self::parse_item(item, None) {
                    imports.push(import);
                }
            }
        }
        imports
    }

    fn parse_item(item: &str, group_prefix: Option<&str>) -> Option<ImportStatement> {
        let mut words = item.split_whitespace();
        let name = words.next()?.trim_start_matches('\\');
        let alias = match (words.next(), words.next()) {
            (Some(kw), Some(alias)) if kw.eq_ignore_ascii_case("as") => Some(alias.to_string()),
            _ => None,
        };
        if name.is_empty() {
            return None;
        }
        let target = match group_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}\\{}", prefix, name),
            _ => name.to_string(),
        };
        Some(ImportStatement { target, alias })
    }

    /// All imports declared in `content`, in file order.
    pub fn collect(content: &str) -> Vec<ImportStatement> {
        content.lines().flat_map(Self::parse_line).collect()
    }
}

/// `true` when `name` ends with `segment` at a `\` boundary.
fn ends_with_segment(name: &str, segment: &str) -> bool {
    name == segment
        || name
            .strip_suffix(segment)
            .is_some_and(|head| head.ends_with('\\'))
}

/// Keep only the left operand of `->` / `::` member access.
pub fn strip_member_access(token: &str) -> &str {
    let token = token.split("->").next().unwrap_or(token);
    let token = token.split("::").next().unwrap_or(token);
    token.trim_start_matches('\\')
}

// ─── Cursor context ─────────────────────────────────────────────────────────

/// What the resolver knows about the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorContext {
    /// Full text of the cursor line.
    pub line: String,
    /// Token under the cursor, without surrounding punctuation or a
    /// leading `\`.
    pub word: String,
    /// The file's top-level imports.
    pub imports: Vec<ImportStatement>,
    /// The file's own namespace, if it declares one.
    pub namespace: Option<String>,
}

impl CursorContext {
    /// Build the context for `position` in a whole document.
    ///
    /// Returns `None` when there is no token under the cursor.
    pub fn from_document(content: &str, position: Position) -> Option<Self> {
        let line = line_at(content, position.line as usize)?;
        let word = token_at(line, position.character as usize)?;
        Some(Self {
            line: line.to_string(),
            word,
            imports: ImportStatement::collect(content),
            namespace: file_namespace(content),
        })
    }

    /// The import on the cursor line, if the cursor line is a `use`.
    fn cursor_import(&self) -> Option<ImportStatement> {
        let mut on_line = ImportStatement::parse_line(&self.line);
        if on_line.len() > 1 {
            let word = strip_member_access(&self.word);
            if let Some(i) = on_line
                .iter()
                .position(|imp| imp.binding() == word || imp.target.contains(word))
            {
                return Some(on_line.swap_remove(i));
            }
        }
        on_line.into_iter().next()
    }
}

/// The first namespace declared in `content`.
pub fn file_namespace(content: &str) -> Option<String> {
    content.lines().find_map(namespace_from_line)
}

// ─── Resolver ───────────────────────────────────────────────────────────────

pub struct TokenResolver<'a> {
    catalogue: &'a NamespaceCatalogue,
}

impl<'a> TokenResolver<'a> {
    pub fn new(catalogue: &'a NamespaceCatalogue) -> Self {
        Self { catalogue }
    }

    pub fn resolve(&self, ctx: &CursorContext) -> Resolution {
        Resolution::from(self.candidates(ctx))
    }

    /// Matching entries in catalogue order.
    pub fn candidates(&self, ctx: &CursorContext) -> Vec<NamespaceEntry> {
        if let Some(import) = ctx.cursor_import() {
            return self.catalogue.find_by_exact_or_substring(&import.target);
        }

        let token = strip_member_access(&ctx.word);
        if token.is_empty() {
            return Vec::new();
        }

        if let Some((first, rest)) = token.split_once('\\') {
            let spliced = ctx
                .imports
                .iter()
                .find(|imp| imp.target.ends_with(first))
                .or_else(|| ctx.imports.iter().find(|imp| imp.alias.as_deref() == Some(first)))
                .map(|imp| format!("{}\\{}", imp.target, rest));
            if let Some(name) = spliced {
                return self.catalogue.find_by_exact_or_substring(&name);
            }
        } else if let Some(import) = ctx.imports.iter().find(|imp| imp.mentions(token)) {
            return self.catalogue.find_by_exact_or_substring(&import.target);
        }

        match &ctx.namespace {
            Some(ns) => {
                let local = self
                    .catalogue
                    .find_by_exact_or_substring(&format!("{}\\{}", ns, token));
                if local.is_empty() {
                    self.catalogue.find_by_class_name_suffix(token)
                } else {
                    local
                }
            }
            None => self.catalogue.find_by_exact_or_substring(token),
        }
    }

    /// The fully-qualified name of the type under the cursor, as far as
    /// imports and the file namespace can tell.
    ///
    /// Longer leading runs of the token's segments are tried first against
    /// the imports, so `Models\User` with `use App\Models;` gives
    /// `App\Models\User`.
    pub fn resolve_base_type(ctx: &CursorContext) -> Option<String> {
        let token = match ctx.cursor_import() {
            Some(import) => return Some(import.target),
            None => strip_member_access(&ctx.word),
        };
        if token.is_empty() {
            return None;
        }

        let segments: Vec<&str> = token.split('\\').collect();
        let prefixes: Vec<String> = (1..=segments.len())
            .map(|n| segments[..n].join("\\"))
            .collect();

        for (n, prefix) in prefixes.iter().enumerate().rev() {
            let hit = ctx.imports.iter().find(|imp| {
                ends_with_segment(&imp.target, prefix)
                    || (n == 0 && imp.alias.as_deref() == Some(prefix.as_str()))
            });
            if let Some(import) = hit {
                let remaining = &segments[n + 1..];
                let mut base = import.target.clone();
                for seg in remaining {
                    base.push('\\');
                    base.push_str(seg);
                }
                return Some(base);
            }
        }

        Some(match &ctx.namespace {
            Some(ns) => format!("{}\\{}", ns, token),
            None => token.to_string(),
        })
    }

    /// Entries whose name contains the base type's name, excluding the base
    /// type itself.
    pub fn find_subclasses(&self, ctx: &CursorContext) -> Resolution {
        let Some(base) = Self::resolve_base_type(ctx) else {
            return Resolution::NotFound;
        };
        let found: Vec<NamespaceEntry> = self
            .catalogue
            .find_containing(&base)
            .into_iter()
            .filter(|entry| entry.qualified_name() != base)
            .collect();
        Resolution::from(found)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue(names: &[&str]) -> NamespaceCatalogue {
        let mut cat = NamespaceCatalogue::new();
        for name in names {
            cat.add(name, format!("/project/{}.php", short_name(name)));
        }
        cat
    }

    fn ctx(line: &str, word: &str, imports: &[&str], namespace: Option<&str>) -> CursorContext {
        CursorContext {
            line: line.to_string(),
            word: word.to_string(),
            imports: imports.iter().flat_map(|l| ImportStatement::parse_line(l)).collect(),
            namespace: namespace.map(str::to_string),
        }
    }

    fn names(resolution: &Resolution) -> Vec<&str> {
        resolution.entries().iter().map(|e| e.name()).collect()
    }

    #[test]
    fn parse_import_forms() {
        assert_eq!(
            ImportStatement::parse_line("use App\\Models\\User;"),
            vec![ImportStatement {
                target: "App\\Models\\User".into(),
                alias: None
            }]
        );
        assert_eq!(
            ImportStatement::parse_line("use \\Foo\\Bar as Baz;"),
            vec![ImportStatement {
                target: "Foo\\Bar".into(),
                alias: Some("Baz".into())
            }]
        );
        let group = ImportStatement::parse_line("use App\\{Models\\User, Http\\Kernel as K};");
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].target, "App\\Models\\User");
        assert_eq!(group[1].target, "App\\Http\\Kernel");
        assert_eq!(group[1].binding(), "K");
        assert_eq!(ImportStatement::parse_line("use A\\B, C\\D;").len(), 2);
    }

    #[test]
    fn parse_ignores_non_class_imports() {
        assert!(ImportStatement::parse_line("use function App\\helper;").is_empty());
        assert!(ImportStatement::parse_line("use const App\\LIMIT;").is_empty());
        assert!(ImportStatement::parse_line("    use SoftDeletes;").is_empty());
        assert!(ImportStatement::parse_line("$f = function () use ($x) {};").is_empty());
        assert!(ImportStatement::parse_line("user_function();").is_empty());
    }

    #[test]
    fn strip_member_access_keeps_left_operand() {
        assert_eq!(strip_member_access("User::find"), "User");
        assert_eq!(strip_member_access("repo->save"), "repo");
        assert_eq!(strip_member_access("\\App\\User::class"), "App\\User");
        assert_eq!(strip_member_access("Plain"), "Plain");
    }

    #[test]
    fn cursor_on_use_line_resolves_the_import() {
        let cat = catalogue(&["App\\Models\\BarBaz", "App\\Models\\Bar"]);
        let c = ctx(
            "use App\\Models\\Bar;",
            "Bar",
            &["use Other\\Bar;", "use App\\Models\\Bar;"],
            Some("App\\Http"),
        );
        let res = TokenResolver::new(&cat).resolve(&c);
        assert_eq!(res, Resolution::Single(cat.all()[1].clone()));
    }

    #[test]
    fn bare_token_through_import() {
        let cat = catalogue(&["App\\Models\\User", "Legacy\\User"]);
        let c = ctx(
            "    $u = new User();",
            "User",
            &["use App\\Models\\User;"],
            Some("App\\Http"),
        );
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["App\\Models\\User"]);
    }

    #[test]
    fn aliased_import_is_followed() {
        let cat = catalogue(&["Vendor\\Lib\\Client", "App\\Client"]);
        let c = ctx(
            "$c = new HttpClient();",
            "HttpClient",
            &["use Vendor\\Lib\\Client as HttpClient;"],
            Some("App"),
        );
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["Vendor\\Lib\\Client"]);
    }

    #[test]
    fn first_import_mentioning_the_token_wins() {
        let cat = catalogue(&["App\\UserRepository", "App\\Models\\User"]);
        let c = ctx(
            "User::find(1);",
            "User::find",
            &["use App\\UserRepository;", "use App\\Models\\User;"],
            Some("App\\Http"),
        );
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["App\\UserRepository"]);
    }

    #[test]
    fn substring_import_match_as_last_resort() {
        let cat = catalogue(&["App\\Services\\Mailer"]);
        let c = ctx("Mail::send();", "Mail::send", &["use App\\Services\\Mailer;"], Some("App"));
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["App\\Services\\Mailer"]);
    }

    #[test]
    fn qualified_token_splices_first_segment() {
        let cat = catalogue(&["App\\Models\\User", "Models\\User"]);
        let c = ctx(
            "new Models\\User();",
            "Models\\User",
            &["use App\\Models;"],
            Some("App\\Http"),
        );
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["App\\Models\\User"]);
    }

    #[test]
    fn qualified_token_uses_first_import_ending_with_segment() {
        let cat = catalogue(&["App\\AdminModels\\User", "App\\Models\\User"]);
        let c = ctx(
            "new Models\\User();",
            "Models\\User",
            &["use App\\AdminModels;", "use App\\Models;"],
            Some("App\\Http"),
        );
        assert_eq!(
            names(&TokenResolver::new(&cat).resolve(&c)),
            vec!["App\\AdminModels\\User"]
        );
    }

    #[test]
    fn alias_splices_only_when_no_target_ends_with_segment() {
        let cat = catalogue(&["Swagger\\OpenAPI\\Endpoint", "Legacy\\OA\\Endpoint"]);
        let c = ctx(
            "#[OA\\Endpoint]",
            "OA\\Endpoint",
            &["use Swagger\\OpenAPI as OA;", "use Legacy\\OA;"],
            None,
        );
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["Legacy\\OA\\Endpoint"]);
    }

    #[test]
    fn qualified_token_splices_through_alias() {
        let cat = catalogue(&["Swagger\\OpenAPI\\Endpoint"]);
        let c = ctx("#[OA\\Endpoint]", "OA\\Endpoint", &["use Swagger\\OpenAPI as OA;"], None);
        assert_eq!(
            names(&TokenResolver::new(&cat).resolve(&c)),
            vec!["Swagger\\OpenAPI\\Endpoint"]
        );
    }

    #[test]
    fn same_namespace_class_without_import() {
        let cat = catalogue(&["App\\Http\\Kernel", "Other\\Kernel"]);
        let c = ctx("new Kernel();", "Kernel", &[], Some("App\\Http"));
        assert_eq!(names(&TokenResolver::new(&cat).resolve(&c)), vec!["App\\Http\\Kernel"]);
    }

    #[test]
    fn namespace_miss_falls_back_to_suffix() {
        let cat = catalogue(&["A\\Kernel", "B\\Sub\\Kernel", "C\\MyKernel"]);
        let c = ctx("new Kernel();", "Kernel", &[], Some("App\\Http"));
        let res = TokenResolver::new(&cat).resolve(&c);
        assert!(matches!(res, Resolution::Multiple(_)));
        assert_eq!(names(&res), vec!["A\\Kernel", "B\\Sub\\Kernel"]);
    }

    #[test]
    fn global_file_queries_token_directly() {
        let cat = catalogue(&["\\Standalone", "App\\Standalone"]);
        let c = ctx("new Standalone;", "Standalone", &[], None);
        assert_eq!(
            names(&TokenResolver::new(&cat).resolve(&c)),
            vec!["\\Standalone", "App\\Standalone"]
        );
    }

    #[test]
    fn nothing_found_is_not_found() {
        let cat = catalogue(&["App\\User"]);
        let c = ctx("new Ghost;", "Ghost", &["use App\\User;"], Some("App"));
        assert_eq!(TokenResolver::new(&cat).resolve(&c), Resolution::NotFound);
    }

    #[test]
    fn context_from_document() {
        let doc = "<?php\nnamespace App\\Http;\n\nuse App\\Models\\User;\n\nclass Home\n{\n    public function show() { return User::find(1); }\n}\n";
        let c = CursorContext::from_document(
            doc,
            Position {
                line: 7,
                character: 38,
            },
        )
        .unwrap();
        assert_eq!(c.word, "User::find");
        assert_eq!(c.namespace.as_deref(), Some("App\\Http"));
        assert_eq!(c.imports.len(), 1);
        assert_eq!(c.imports[0].target, "App\\Models\\User");
    }

    #[test]
    fn context_column_counts_utf16_units() {
        let doc = "<?php\n$s = '😀😀😀'; new A; B\n";
        let c = CursorContext::from_document(
            doc,
            Position {
                line: 1,
                character: 19,
            },
        )
        .unwrap();
        assert_eq!(c.word, "A");
    }

    #[test]
    fn base_type_through_partial_import() {
        let c = ctx("extends Models\\User", "Models\\User", &["use App\\Models;"], Some("App\\Http"));
        assert_eq!(
            TokenResolver::resolve_base_type(&c).as_deref(),
            Some("App\\Models\\User")
        );
    }

    #[test]
    fn base_type_without_import_uses_namespace() {
        let c = ctx("class X extends Base", "Base", &[], Some("App"));
        assert_eq!(TokenResolver::resolve_base_type(&c).as_deref(), Some("App\\Base"));
        let c = ctx("class X extends Base", "Base", &[], None);
        assert_eq!(TokenResolver::resolve_base_type(&c).as_deref(), Some("Base"));
    }

    #[test]
    fn subclasses_exclude_the_base() {
        let cat = catalogue(&[
            "App\\Models\\User",
            "App\\Models\\User\\Admin",
            "App\\Models\\UserProfile",
            "App\\Other",
        ]);
        let c = ctx("new User;", "User", &["use App\\Models\\User;"], Some("App\\Http"));
        let res = TokenResolver::new(&cat).find_subclasses(&c);
        assert_eq!(
            names(&res),
            vec!["App\\Models\\User\\Admin", "App\\Models\\UserProfile"]
        );
    }
}
