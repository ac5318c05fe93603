mod common;

use common::{absolute, create_indexed_workspace, file_uri, position_params};
use tower_lsp::LanguageServer;
use tower_lsp::lsp_types::*;

const USER: &str = "<?php\nnamespace App\\Models;\n\nclass User\n{\n}\n";
const ADMIN_USER: &str = "<?php\nnamespace Admin\\Models;\n\nclass User\n{\n}\n";
const CONTROLLER: &str = "<?php
namespace App\\Http\\Controllers;

use App\\Models\\User;

class UserController
{
    public function show(): User
    {
        return User::find(1);
    }
}
";

fn definition_params(uri: Url, line: u32, character: u32) -> GotoDefinitionParams {
    GotoDefinitionParams {
        text_document_position_params: position_params(uri, line, character),
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    }
}

fn location_path(location: &Location) -> std::path::PathBuf {
    location.uri.to_file_path().expect("file URI")
}

#[tokio::test]
async fn test_goto_imported_class() {
    let (backend, dir) = create_indexed_workspace(
        None,
        &[
            ("src/Models/User.php", USER),
            ("src/Http/Controllers/UserController.php", CONTROLLER),
        ],
    );
    let uri = file_uri(dir.path(), "src/Http/Controllers/UserController.php");

    // `User::find(1)` on line 9
    let result = backend
        .goto_definition(definition_params(uri, 9, 16))
        .await
        .unwrap();
    let Some(GotoDefinitionResponse::Scalar(location)) = result else {
        panic!("expected a single location, got {:?}", result);
    };
    assert_eq!(location_path(&location), absolute(dir.path(), "src/Models/User.php"));
    assert_eq!(location.range, Range::default());
}

#[tokio::test]
async fn test_goto_from_use_line() {
    let (backend, dir) = create_indexed_workspace(
        None,
        &[
            ("src/Models/User.php", USER),
            ("src/Http/Controllers/UserController.php", CONTROLLER),
        ],
    );
    let uri = file_uri(dir.path(), "src/Http/Controllers/UserController.php");

    let result = backend
        .goto_definition(definition_params(uri, 3, 10))
        .await
        .unwrap();
    assert!(
        matches!(result, Some(GotoDefinitionResponse::Scalar(ref loc)) if location_path(loc) == absolute(dir.path(), "src/Models/User.php")),
        "got {:?}",
        result
    );
}

#[tokio::test]
async fn test_goto_ambiguous_name_returns_all_candidates() {
    let script = "<?php\nnamespace Scripts;\n\n$user = new User();\n";
    let (backend, dir) = create_indexed_workspace(
        None,
        &[
            ("src/Models/User.php", USER),
            ("admin/Models/User.php", ADMIN_USER),
            ("bin/script.php", script),
        ],
    );
    let uri = file_uri(dir.path(), "bin/script.php");
    backend
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "php".to_string(),
                version: 1,
                text: script.to_string(),
            },
        })
        .await;

    let result = backend
        .goto_definition(definition_params(uri, 3, 13))
        .await
        .unwrap();
    let Some(GotoDefinitionResponse::Array(locations)) = result else {
        panic!("expected several locations, got {:?}", result);
    };
    let mut paths: Vec<_> = locations.iter().map(location_path).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            absolute(dir.path(), "admin/Models/User.php"),
            absolute(dir.path(), "src/Models/User.php"),
        ]
    );
}

#[tokio::test]
async fn test_goto_unknown_class_is_none() {
    let script = "<?php\nnamespace App;\n\n$x = new Missing();\n";
    let (backend, dir) = create_indexed_workspace(None, &[("src/script.php", script)]);
    let uri = file_uri(dir.path(), "src/script.php");

    let result = backend
        .goto_definition(definition_params(uri, 3, 11))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_goto_on_whitespace_is_none() {
    let (backend, dir) = create_indexed_workspace(None, &[("src/Models/User.php", USER)]);
    let uri = file_uri(dir.path(), "src/Models/User.php");

    let result = backend
        .goto_definition(definition_params(uri, 2, 0))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_goto_uses_psr4_before_first_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("composer.json"),
        r#"{ "autoload": { "psr-4": { "App\\": "src/" } } }"#,
    )
    .unwrap();
    common::write_files(
        dir.path(),
        &[
            ("src/Models/User.php", USER),
            ("src/Http/Controllers/UserController.php", CONTROLLER),
        ],
    );
    // No rebuild: the catalogue is still empty.
    let backend = phpnaha::Backend::new_test_with_workspace(vec![dir.path().to_path_buf()]);
    let uri = file_uri(dir.path(), "src/Http/Controllers/UserController.php");

    let result = backend
        .goto_definition(definition_params(uri, 7, 30))
        .await
        .unwrap();
    let Some(GotoDefinitionResponse::Scalar(location)) = result else {
        panic!("expected the PSR-4 file, got {:?}", result);
    };
    assert_eq!(location_path(&location), dir.path().join("src/Models/User.php"));
}
