mod common;

use common::{absolute, create_indexed_workspace, file_uri};
use phpnaha::Command;
use phpnaha::actions::{FollowUp, Outcome};
use serde_json::{Value, json};
use tower_lsp::LanguageServer;
use tower_lsp::lsp_types::*;

const COMPOSER: &str = r#"{ "autoload": { "psr-4": { "App\\": "src/" } } }"#;
const USER: &str = "<?php\nnamespace App\\Models;\n\nclass User\n{\n}\n";
const ADMIN: &str = "<?php\nnamespace App\\Models;\n\nclass UserAdmin\n{\n}\n";
const KERNEL: &str = "<?php
namespace App\\Http;

class Kernel
{
    public function boot(): void
    {
        $user = new User();
    }
}
";

fn cursor_argument(uri: &Url, line: u32, character: u32) -> Vec<Value> {
    vec![json!({
        "textDocument": { "uri": uri.as_str() },
        "position": { "line": line, "character": character },
    })]
}

fn run(command: Command, arguments: Vec<Value>) -> ExecuteCommandParams {
    ExecuteCommandParams {
        command: command.name().to_string(),
        arguments,
        work_done_progress_params: WorkDoneProgressParams::default(),
    }
}

#[tokio::test]
async fn test_index_status_reports_entries() {
    let (backend, _dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[("src/Models/User.php", USER), ("src/Models/UserAdmin.php", ADMIN)],
    );
    let status = backend
        .execute_command(run(Command::IndexStatus, vec![]))
        .await
        .unwrap()
        .expect("status payload");
    assert_eq!(status["entries"], 2);
    assert_eq!(status["roots"], 1);
}

#[tokio::test]
async fn test_index_command_rebuilds() {
    let (backend, dir) = create_indexed_workspace(None, &[("src/Models/User.php", USER)]);
    common::write_files(dir.path(), &[("src/Models/UserAdmin.php", ADMIN)]);

    let result = backend
        .execute_command(run(Command::IndexProjectNamespaces, vec![]))
        .await
        .unwrap();
    assert!(result.is_none());

    // Supersede the command's rebuild with one we can wait on.
    backend.start_rebuild().join();
    assert_eq!(backend.catalogue().read().len(), 2);
}

#[tokio::test]
async fn test_copy_namespace_and_class_returns_the_name() {
    let (backend, dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[("src/Models/User.php", USER), ("src/Http/Kernel.php", KERNEL)],
    );
    let uri = file_uri(dir.path(), "src/Http/Kernel.php");

    // `new User()` on line 7
    let copied = backend
        .execute_command(run(Command::CopyNamespaceAndClass, cursor_argument(&uri, 7, 22)))
        .await
        .unwrap();
    assert_eq!(copied, Some(Value::String("App\\Models\\User".to_string())));

    // Without a position the file's own class is copied.
    let own = backend
        .execute_command(run(
            Command::CopyNamespaceAndClass,
            vec![json!({ "textDocument": { "uri": uri.as_str() } })],
        ))
        .await
        .unwrap();
    assert_eq!(own, Some(Value::String("App\\Http\\Kernel".to_string())));
}

#[tokio::test]
async fn test_insert_use_statement_edit() {
    let (backend, dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[("src/Models/User.php", USER), ("src/Http/Kernel.php", KERNEL)],
    );
    let uri = file_uri(dir.path(), "src/Http/Kernel.php");

    let (outcome, document) = backend
        .command_outcome(Command::InsertUseStatement, &cursor_argument(&uri, 7, 22))
        .unwrap();
    let Outcome::Edit(edit) = outcome else {
        panic!("expected an edit, got {:?}", outcome);
    };
    let document = document.expect("document");
    assert_eq!(edit.line, 1);
    assert!(
        edit.apply(&document.text)
            .starts_with("<?php\nnamespace App\\Http;\n\nuse App\\Models\\User;\n\nclass Kernel\n")
    );

    let text_edit = edit.to_text_edit(&document.text);
    assert_eq!(text_edit.range.start, Position { line: 1, character: 0 });
}

#[tokio::test]
async fn test_insert_use_uses_open_buffer() {
    let (backend, dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[("src/Models/User.php", USER), ("src/Http/Kernel.php", KERNEL)],
    );
    let uri = file_uri(dir.path(), "src/Http/Kernel.php");
    let edited = KERNEL.replace("namespace App\\Http;\n", "namespace App\\Http;\n\nuse App\\Models\\User;\n");
    backend
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "php".to_string(),
                version: 1,
                text: edited,
            },
        })
        .await;

    let (outcome, _) = backend
        .command_outcome(Command::InsertUseStatement, &cursor_argument(&uri, 9, 22))
        .unwrap();
    assert_eq!(outcome, Outcome::Nothing, "already imported");
}

#[tokio::test]
async fn test_insert_namespace_statement_from_psr4() {
    let loose = "<?php\n\nclass Invoice\n{\n}\n";
    let (backend, dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[("src/Billing/Invoice.php", loose)],
    );
    let uri = file_uri(dir.path(), "src/Billing/Invoice.php");

    let (outcome, document) = backend
        .command_outcome(
            Command::InsertNamespaceStatement,
            &[json!({ "textDocument": { "uri": uri.as_str() } })],
        )
        .unwrap();
    let Outcome::Edit(edit) = outcome else {
        panic!("expected an edit, got {:?}", outcome);
    };
    assert_eq!(
        edit.apply(&document.unwrap().text),
        "<?php\n\nnamespace App\\Billing;\n\nclass Invoice\n{\n}\n"
    );
}

#[tokio::test]
async fn test_find_subclasses_and_open_class_file() {
    let (backend, dir) = create_indexed_workspace(
        Some(COMPOSER),
        &[
            ("src/Models/User.php", USER),
            ("src/Models/UserAdmin.php", ADMIN),
            ("src/Http/Kernel.php", KERNEL),
        ],
    );
    // Without an import `User` would mean `App\Http\User`, so look from a
    // file that imports it.
    let importing = "<?php\nnamespace App\\Http;\n\nuse App\\Models\\User;\n\n$u = new User();\n";
    common::write_files(dir.path(), &[("src/Http/uses.php", importing)]);
    let importing_uri = file_uri(dir.path(), "src/Http/uses.php");

    let (outcome, _) = backend
        .command_outcome(Command::FindSubclasses, &cursor_argument(&importing_uri, 5, 11))
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Open {
            path: absolute(dir.path(), "src/Models/UserAdmin.php"),
            preview: false
        }
    );

    let (listed, _) = backend.command_outcome(Command::OpenClassFile, &[]).unwrap();
    let Outcome::Choose {
        candidates,
        follow_up,
    } = listed
    else {
        panic!("expected a list");
    };
    assert_eq!(follow_up, FollowUp::Open);
    assert_eq!(candidates.len(), 3);

    let (filtered, _) = backend
        .command_outcome(Command::OpenClassFile, &[json!("Kernel")])
        .unwrap();
    assert!(matches!(filtered, Outcome::Choose { ref candidates, .. } if candidates.len() == 1));
}

#[tokio::test]
async fn test_bad_arguments_are_invalid_params() {
    let (backend, _dir) = create_indexed_workspace(None, &[]);
    let err = backend
        .execute_command(run(Command::GotoDefinition, vec![json!(42)]))
        .await
        .unwrap_err();
    assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InvalidParams);

    let missing = Url::from_file_path(std::env::temp_dir().join("phpnaha-missing/A.php")).unwrap();
    let err = backend
        .execute_command(run(Command::GotoDefinition, cursor_argument(&missing, 0, 0)))
        .await
        .unwrap_err();
    assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InvalidParams);
}
