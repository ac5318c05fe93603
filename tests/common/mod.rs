#![allow(dead_code)]

use phpnaha::Backend;
use std::fs;
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::{Position, TextDocumentIdentifier, TextDocumentPositionParams, Url};

pub fn create_test_backend() -> Backend {
    Backend::new_test()
}

/// Write `files` (relative path, content) under `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel_path, content) in files {
        let full = root.join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("failed to create dirs");
        }
        fs::write(&full, content).expect("failed to write PHP file");
    }
}

/// Helper: create a temp workspace with PHP files (and optionally a
/// composer.json), then return a Backend rooted there with its catalogue
/// already built.
pub fn create_indexed_workspace(
    composer_json: Option<&str>,
    files: &[(&str, &str)],
) -> (Backend, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    if let Some(json) = composer_json {
        fs::write(dir.path().join("composer.json"), json).expect("failed to write composer.json");
    }
    write_files(dir.path(), files);

    let backend = Backend::new_test_with_workspace(vec![dir.path().to_path_buf()]);
    let summary = backend.start_rebuild().join();
    assert!(!summary.cancelled, "initial rebuild should complete");
    (backend, dir)
}

pub fn file_uri(root: &Path, rel_path: &str) -> Url {
    Url::from_file_path(root.join(rel_path)).expect("absolute path")
}

pub fn absolute(root: &Path, rel_path: &str) -> PathBuf {
    std::path::absolute(root.join(rel_path)).expect("absolute path")
}

pub fn position_params(uri: Url, line: u32, character: u32) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri },
        position: Position { line, character },
    }
}
