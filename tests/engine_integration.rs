//! Engine tests against a real workspace on disk.

use anchor_patcher::{
    ApplyResult, CommandValidator, EditBatch, EditDirective, Engine, EngineSettings, NullSink,
    Position,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DEMO: &str = r#"package main

import "fmt"

func Demo() {
    fmt.Println("start")
    fmt.Println("middle")
    fmt.Println("end")
}
"#;

fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.go"), DEMO).unwrap();
    dir
}

fn engine(workspace: &Path) -> Engine {
    Engine::new(workspace, EngineSettings::default())
        .unwrap()
        .with_sink(Arc::new(NullSink))
}

fn read(workspace: &Path, file: &str) -> String {
    fs::read_to_string(workspace.join(file)).unwrap()
}

fn leftover_backups(workspace: &Path) -> Vec<String> {
    walkdir::WalkDir::new(workspace)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .map(|e| e.path().display().to_string())
        .collect()
}

#[test]
fn test_replace_with_context_end_to_end() {
    let dir = setup_workspace();
    let batch = EditBatch::new(vec![EditDirective::replace(
        "main.go",
        "fmt.Println(\"middle\")",
        "fmt.Println(\"X\")",
    )
    .with_context_before("func Demo(")]);

    let result = engine(dir.path()).apply_edits(&batch);

    assert_eq!(result, ApplyResult::ok(1));
    assert_eq!(
        read(dir.path(), "main.go"),
        DEMO.replace("    fmt.Println(\"middle\")", "fmt.Println(\"X\")")
    );
    assert!(leftover_backups(dir.path()).is_empty());
}

#[test]
fn test_context_disambiguates_duplicate_lines() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("dup.go"),
        "func A() {\n\treturn nil\n}\n\nfunc B() {\n\treturn nil\n}\n",
    )
    .unwrap();

    let batch = EditBatch::new(vec![EditDirective::replace("dup.go", "return nil", "\treturn errB")
        .with_context_before("func B()")]);
    assert!(engine(dir.path()).apply_edits(&batch).success);

    assert_eq!(
        read(dir.path(), "dup.go"),
        "func A() {\n\treturn nil\n}\n\nfunc B() {\n\treturn errB\n}\n"
    );
}

#[test]
fn test_block_replace_and_insert_in_one_file() {
    let dir = setup_workspace();
    let batch = EditBatch::new(vec![
        EditDirective::replace_block(
            "main.go",
            "fmt.Println(\"start\")",
            "fmt.Println(\"end\")",
            "    run()",
        ),
        EditDirective::insert("main.go", "run()", "    // done").with_position(Position::After),
        EditDirective::insert("main.go", "import \"fmt\"", "import \"os\"")
            .with_position(Position::Before),
    ]);

    assert_eq!(engine(dir.path()).apply_edits(&batch), ApplyResult::ok(3));
    assert_eq!(
        read(dir.path(), "main.go"),
        "package main\n\nimport \"os\"\nimport \"fmt\"\n\nfunc Demo() {\n    run()\n    // done\n}\n"
    );
}

#[test]
fn test_eof_inserts_accumulate() {
    let dir = setup_workspace();
    let append = EditBatch::new(vec![EditDirective::insert("main.go", "__EOF__", "// tail")]);

    let engine = engine(dir.path());
    assert!(engine.apply_edits(&append).success);
    assert!(engine.apply_edits(&append).success);

    assert_eq!(read(dir.path(), "main.go"), format!("{DEMO}// tail\n// tail\n"));
}

#[test]
fn test_declaration_replace_is_downgraded() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("user.go"), "type User struct {\n\tName string\n}\n").unwrap();

    let batch = EditBatch::new(vec![EditDirective::replace(
        "user.go",
        "type User struct {",
        "\tID int",
    )]);
    assert!(engine(dir.path()).apply_edits(&batch).success);

    assert_eq!(
        read(dir.path(), "user.go"),
        "type User struct {\n\tID int\n\tName string\n}\n"
    );
}

#[test]
fn test_missing_anchor_leaves_file_identical() {
    let dir = setup_workspace();
    let batch = EditBatch::new(vec![EditDirective::replace(
        "main.go",
        "fmt.Println(\"nowhere\")",
        "x",
    )]);

    let result = engine(dir.path()).apply_edits(&batch);

    assert!(result.success);
    assert_eq!(read(dir.path(), "main.go"), DEMO);
}

#[test]
fn test_create_and_delete_files() {
    let dir = setup_workspace();
    fs::write(dir.path().join("old.go"), "package old\n").unwrap();

    let batch = EditBatch::new(vec![
        EditDirective::create_file("pkg/util/util.go", "package util\n"),
        EditDirective::delete_file("old.go"),
        EditDirective::delete_file("never-existed.go"),
    ]);
    assert_eq!(engine(dir.path()).apply_edits(&batch), ApplyResult::ok(3));

    assert_eq!(read(dir.path(), "pkg/util/util.go"), "package util\n");
    assert!(!dir.path().join("old.go").exists());
    assert!(leftover_backups(dir.path()).is_empty());
}

#[test]
#[cfg(unix)]
fn test_failing_validator_restores_workspace() {
    let dir = setup_workspace();
    fs::write(dir.path().join("other.go"), "package main\n").unwrap();

    let validator = CommandValidator::new(
        "sh",
        vec!["-c".into(), "echo 'main.go:7: syntax error' >&2; exit 2".into()],
        dir.path(),
    );
    let engine = engine(dir.path()).with_validator(validator);
    let batch = EditBatch::new(vec![
        EditDirective::replace_file("main.go", "garbage\n"),
        EditDirective::delete_file("other.go"),
        EditDirective::create_file("new.go", "package main\n"),
    ]);

    let result = engine.apply_edits(&batch);

    assert!(!result.success);
    assert_eq!(result.edits_applied, 0);
    assert!(result.error.unwrap().contains("main.go:7: syntax error"));
    assert_eq!(read(dir.path(), "main.go"), DEMO);
    assert_eq!(read(dir.path(), "other.go"), "package main\n");
    assert!(!dir.path().join("new.go").exists());
    assert!(leftover_backups(dir.path()).is_empty());
    assert!(!dir.path().join(anchor_patcher::JOURNAL_FILE).exists());
}

#[test]
#[cfg(unix)]
fn test_validator_from_settings_file() {
    let dir = setup_workspace();
    fs::write(
        dir.path().join(".anchor-patcher.toml"),
        "[validator]\ncommand = [\"false\"]\n",
    )
    .unwrap();

    let settings = EngineSettings::discover(dir.path()).unwrap();
    let engine = Engine::new(dir.path(), settings)
        .unwrap()
        .with_sink(Arc::new(NullSink));
    let batch = EditBatch::new(vec![EditDirective::insert("main.go", "__BOF__", "// header")]);

    let result = engine.apply_edits(&batch);

    assert!(!result.success);
    assert_eq!(read(dir.path(), "main.go"), DEMO);
}

#[test]
fn test_forbidden_directory_is_rejected_before_any_write() {
    let dir = setup_workspace();
    fs::create_dir_all(dir.path().join(".git")).unwrap();

    let batch = EditBatch::new(vec![
        EditDirective::insert("main.go", "__EOF__", "// x"),
        EditDirective::create_file(".git/hooks/pre-commit", "#!/bin/sh\n"),
    ]);
    let result = engine(dir.path()).apply_edits(&batch);

    assert!(!result.success);
    assert!(result.error.unwrap().contains("forbidden"));
    assert_eq!(read(dir.path(), "main.go"), DEMO);
}
