/// Small text helpers shared by the resolver, inserter and server.
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;

/// The last `\`-separated segment of a name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

/// Characters that belong to the token under the cursor.  Member access
/// operators are included so the resolver can strip them itself.
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '\\' | ':' | '-' | '>')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Char index of the UTF-16 column `utf16_col` on `line`.
///
/// LSP positions count UTF-16 code units.  A column inside a surrogate pair
/// maps to that char; a column past the end maps to the char count.
pub fn utf16_to_char_index(line: &str, utf16_col: usize) -> usize {
    let mut units = 0;
    for (index, c) in line.chars().enumerate() {
        if units >= utf16_col {
            return index;
        }
        units += c.len_utf16();
        if units > utf16_col {
            return index;
        }
    }
    line.chars().count()
}

/// Extract the token under (or immediately left of) the UTF-16 column
/// `character` on `line`.
///
/// The result is trimmed of non-word characters at both ends and of a
/// leading `\`, e.g. `\App\User::find` or `User::` become `App\User::find`
/// and `User`.
pub fn token_at(line: &str, character: usize) -> Option<String> {
    let chars: Vec<char> = line.chars().collect();
    let col = utf16_to_char_index(line, character);

    let mut start = col;
    if start < chars.len() && is_token_char(chars[start]) {
        // on a token char
    } else if start > 0 && is_token_char(chars[start - 1]) {
        start -= 1;
    } else {
        return None;
    }
    while start > 0 && is_token_char(chars[start - 1]) {
        start -= 1;
    }

    let mut end = start;
    while end < chars.len() && is_token_char(chars[end]) {
        end += 1;
    }

    let raw: String = chars[start..end].iter().collect();
    let word = raw
        .trim_matches(|c: char| !is_word_char(c) && c != '\\')
        .trim_start_matches('\\')
        .trim_end_matches('\\');
    if word.is_empty() || !word.chars().any(is_word_char) {
        None
    } else {
        Some(word.to_string())
    }
}

/// The text of line `index` (0-based), without its terminator.
pub fn line_at(content: &str, index: usize) -> Option<&str> {
    content.lines().nth(index)
}

/// Convert a `file://` URI string to a path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}

/// Convert a path to a `file://` URI.
pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
