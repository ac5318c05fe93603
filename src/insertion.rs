/// Statement insertion: where a new `use` or `namespace` line goes.
///
/// Each statement kind has an ordered list of anchors.  The first anchor
/// that matches any line of the file wins; that one line is then replaced
/// by the anchor's text combined with the new statement.  Nothing else in
/// the file changes, so the edit is a single-line [`TextEdit`].
///
/// Import anchors, in priority order:
///
///   1. the **last** top-level `use` line: statement goes right after it
///   2. the `namespace` line: after it, separated by a blank line
///   3. the first `class`/`interface` line: before it, blank line between
///   4. the `<?php` line: right after it
///
/// Namespace anchors: the first `use` line (before it), the first `class`
/// line (before it), then `<?php` (after it, followed by a blank line).
///
/// A file matching no anchor gets no edit.
use tower_lsp::lsp_types::{Position, Range, TextEdit};

use crate::scanner::namespace_from_line;
use crate::types::LineEdit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
    First,
    Last,
}

/// How the anchor line and the statement are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    /// `anchor\nstatement`
    After,
    /// `anchor\n\nstatement`
    AfterBlank,
    /// `statement\n\nanchor`
    BeforeBlank,
    /// `anchor\n\nstatement\n`
    AfterBlankTrailing,
}

impl Template {
    fn render(self, anchor: &str, statement: &str) -> String {
        match self {
            Template::After => format!("{}\n{}", anchor, statement),
            Template::AfterBlank => format!("{}\n\n{}", anchor, statement),
            Template::BeforeBlank => format!("{}\n\n{}", statement, anchor),
            Template::AfterBlankTrailing => format!("{}\n\n{}\n", anchor, statement),
        }
    }
}

struct Anchor {
    matches: fn(&str) -> bool,
    occurrence: Occurrence,
    template: Template,
}

const USE_ANCHORS: &[Anchor] = &[
    Anchor {
        matches: is_use_line,
        occurrence: Occurrence::Last,
        template: Template::After,
    },
    Anchor {
        matches: is_namespace_line,
        occurrence: Occurrence::First,
        template: Template::AfterBlank,
    },
    Anchor {
        matches: is_type_line,
        occurrence: Occurrence::First,
        template: Template::BeforeBlank,
    },
    Anchor {
        matches: is_open_tag,
        occurrence: Occurrence::First,
        template: Template::After,
    },
];

const NAMESPACE_ANCHORS: &[Anchor] = &[
    Anchor {
        matches: is_use_line,
        occurrence: Occurrence::First,
        template: Template::BeforeBlank,
    },
    Anchor {
        matches: is_type_line,
        occurrence: Occurrence::First,
        template: Template::BeforeBlank,
    },
    Anchor {
        matches: is_open_tag,
        occurrence: Occurrence::First,
        template: Template::AfterBlankTrailing,
    },
];

/// A top-level `use` import.  Indented lines are trait `use`s inside a
/// class body; `use (` belongs to a closure.
fn is_use_line(line: &str) -> bool {
    (line.starts_with("use ") || line.starts_with("use\t")) && !line.starts_with("use (")
}

fn is_namespace_line(line: &str) -> bool {
    namespace_from_line(line).is_some()
}

fn is_type_line(line: &str) -> bool {
    let rest = ["abstract ", "final ", "readonly "]
        .iter()
        .fold(line, |rest, modifier| rest.strip_prefix(modifier).unwrap_or(rest));
    rest.starts_with("class ") || rest.starts_with("interface ")
}

fn is_open_tag(line: &str) -> bool {
    line.starts_with("<?php")
}

/// `use Foo\Bar;`
pub fn use_statement(fqn: &str) -> String {
    format!("use {};", fqn.trim().trim_start_matches('\\'))
}

/// `namespace Foo\Bar;`
pub fn namespace_statement(namespace: &str) -> String {
    format!("namespace {};", namespace.trim().trim_matches('\\'))
}

pub struct StatementInserter;

impl StatementInserter {
    /// The edit that imports `fqn`, or `None` if no anchor matched.
    pub fn insert_use(content: &str, fqn: &str) -> Option<LineEdit> {
        Self::splice(content, &use_statement(fqn), USE_ANCHORS)
    }

    /// The edit that declares `namespace`, or `None` if no anchor matched.
    pub fn insert_namespace(content: &str, namespace: &str) -> Option<LineEdit> {
        Self::splice(content, &namespace_statement(namespace), NAMESPACE_ANCHORS)
    }

    fn splice(content: &str, statement: &str, anchors: &[Anchor]) -> Option<LineEdit> {
        let lines: Vec<&str> = content.lines().collect();
        anchors.iter().find_map(|anchor| {
            let found = match anchor.occurrence {
                Occurrence::First => lines.iter().position(|l| (anchor.matches)(l)),
                Occurrence::Last => lines.iter().rposition(|l| (anchor.matches)(l)),
            }?;
            Some(LineEdit {
                line: found,
                replacement: anchor.template.render(lines[found], statement),
            })
        })
    }
}

impl LineEdit {
    /// Apply the edit to `content`, keeping the replaced line's terminator
    /// style and every other line untouched.
    pub fn apply(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len() + self.replacement.len() + 2);
        for (i, raw) in content.split_inclusive('\n').enumerate() {
            if i != self.line {
                out.push_str(raw);
                continue;
            }
            let (eol, terminator) = if raw.ends_with("\r\n") {
                ("\r\n", "\r\n")
            } else if raw.ends_with('\n') {
                ("\n", "\n")
            } else {
                ("\n", "")
            };
            out.push_str(&self.replacement.replace('\n', eol));
            out.push_str(terminator);
        }
        out
    }

    /// The equivalent LSP edit: replace the whole of line `line`.
    pub fn to_text_edit(&self, content: &str) -> TextEdit {
        let line_text = content.lines().nth(self.line).unwrap_or("");
        let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
        TextEdit {
            range: Range {
                start: Position {
                    line: self.line as u32,
                    character: 0,
                },
                end: Position {
                    line: self.line as u32,
                    character: line_text.encode_utf16().count() as u32,
                },
            },
            new_text: self.replacement.replace('\n', eol),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
