// crates/flowruntime/tests/loader_test.rs

use flowruntime::{DefinitionStore, LoaderError, NodeDefinition};
use serde_json::json;
use std::fs;

#[test]
fn test_load_single_file_with_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("defs.json");
    fs::write(
        &path,
        json!([
            { "name": "greet", "kind": "core:set", "config": { "values": { "greeting": "hi" } } },
            { "kind": "core:debug", "max_retries": 3, "wait_ms": 50 }
        ])
        .to_string(),
    )
    .unwrap();

    let store = DefinitionStore::load_path(&path).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.names().collect::<Vec<_>>(), vec!["core:debug", "greet"]);

    let debug = store.get("core:debug").unwrap();
    let settings = debug.settings();
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.retry.wait_ms, 50);
    assert!(settings.config.is_none());
}

#[test]
fn test_load_directory_of_json_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.json"),
        json!({ "name": "one", "kind": "core:debug" }).to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("b.json"),
        json!([{ "name": "two", "kind": "core:delay", "config": { "ms": 1 } }]).to_string(),
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not json").unwrap();

    let store = DefinitionStore::load_path(dir.path()).unwrap();
    assert_eq!(store.names().collect::<Vec<_>>(), vec!["one", "two"]);
    assert_eq!(store.require("two").unwrap().kind, "core:delay");
}

#[test]
fn test_duplicate_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("defs.json");
    fs::write(
        &path,
        json!([
            { "name": "same", "kind": "core:debug" },
            { "name": "same", "kind": "core:delay" }
        ])
        .to_string(),
    )
    .unwrap();

    let err = DefinitionStore::load_path(&path).unwrap_err();
    assert!(matches!(err, LoaderError::DuplicateName(ref n) if n == "same"));
}

#[test]
fn test_parse_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = DefinitionStore::load_path(&path).unwrap_err();
    assert!(matches!(err, LoaderError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DefinitionStore::load_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LoaderError::Io { .. }));
}

#[test]
fn test_require_unknown_definition() {
    let store = DefinitionStore::new();
    assert!(matches!(store.require("nope"), Err(LoaderError::NotFound(_))));
}

#[test]
fn test_definition_defaults_to_single_attempt() {
    let definition = NodeDefinition::new("core:debug").with_name("dbg");
    let settings = definition.settings();
    assert_eq!(settings.retry.max_retries, 1);
    assert_eq!(settings.retry.wait_ms, 0);
    assert_eq!(definition.key(), "dbg");
}
