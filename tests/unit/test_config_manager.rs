//! Unit tests for the configuration manager
//!
//! Exercises load/save reconciliation against real files: value round trips,
//! comment and unknown-line preservation, key discovery, rollback on
//! malformed values and missing-file handling.

use conflate::{
    ConfigManager, ConfigMap, ConflateError, InitialConfig, LoadOptions, Value,
};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

/// Sample file exercising comments, a nested mapping and an unmanaged key
fn create_sample_config() -> String {
    [
        "# Testfile for conflate configuration manager.",
        "# Running the tests modifies this file.",
        "test1 = False # this is a comment",
        "# Comment on its own line",
        "test2 = {'hat': 2, 'baz': ['hi', 'hi', 'hi'], 'flibber': 8}",
        "test3 = 'string'",
        "test4 = False",
    ]
    .join("\n")
}

fn write_config(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), content).unwrap();
    file
}

fn manager_for(path: &Path, keys: &[&str]) -> ConfigManager {
    ConfigManager::builder(path)
        .silent(true)
        .keys(keys.iter().copied())
        .build()
        .unwrap()
}

fn map(entries: &[(&str, Value)]) -> ConfigMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_load_known_keys() {
    let file = write_config(&create_sample_config());
    let mut manager = manager_for(file.path(), &["test1", "test2", "test3"]);

    let report = manager.load(LoadOptions::default()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.applied, 3);

    assert_eq!(manager.get("test1"), Some(&Value::Bool(false)));
    assert_eq!(manager.get("test3"), Some(&Value::from("string")));
    let test2 = manager.get("test2").and_then(Value::as_map).unwrap();
    assert_eq!(test2["flibber"], Value::Int(8));
    assert!(!manager.contains_key("test4"));
}

#[test]
fn test_round_trip_all_value_types() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.conf");

    let mut nested = IndexMap::new();
    nested.insert("baz".to_string(), Value::List(vec!["bye".into(), "it's".into()]));
    nested.insert("hat".to_string(), Value::Int(1));
    nested.insert("empty".to_string(), Value::Map(IndexMap::new()));

    let values = map(&[
        ("none", Value::None),
        ("flag", Value::Bool(true)),
        ("count", Value::Int(-42)),
        ("ratio", Value::Float(0.1)),
        ("whole", Value::Float(3.0)),
        ("huge", Value::Float(1e300)),
        ("text", Value::from("tab\there \"quoted\" \\ back")),
        ("unicode", Value::from("naïve ☃")),
        ("list", Value::List(vec![Value::Int(1), Value::Float(2.5), Value::None])),
        ("nested", Value::Map(nested)),
    ]);

    let writer = ConfigManager::builder(&path)
        .silent(true)
        .values(values.clone())
        .build()
        .unwrap();
    writer.save().unwrap();

    let mut reader = ConfigManager::builder(&path)
        .silent(true)
        .keys(Vec::<String>::new())
        .build()
        .unwrap();
    let report = reader.load(LoadOptions::discover()).unwrap();
    assert!(report.is_clean());
    assert_eq!(reader.config(), &values);
}

#[test]
fn test_save_is_idempotent() {
    let file = write_config(&create_sample_config());
    let mut manager = manager_for(file.path(), &["test1", "test2", "test3"]);
    manager.load(LoadOptions::default()).unwrap();
    manager.set("added", vec![Value::Int(1)]).unwrap();

    manager.save().unwrap();
    let first = fs::read_to_string(file.path()).unwrap();
    manager.save().unwrap();
    let second = fs::read_to_string(file.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.matches("added = ").count(), 1);
}

#[test]
fn test_comment_preserved_on_update() {
    let file = write_config("k = 1 # keep me\n");
    let mut manager = manager_for(file.path(), &["k"]);
    manager.set("k", 2).unwrap();

    let report = manager.save().unwrap();
    assert_eq!(report.updated, vec!["k"]);
    assert!(report.appended.is_empty());
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "k = 2 # keep me\n");
}

#[test]
fn test_unknown_lines_preserved() {
    let file = write_config(&create_sample_config());
    let mut manager = ConfigManager::builder(file.path())
        .silent(true)
        .values(map(&[
            ("test1", Value::Bool(false)),
            ("test3", Value::from("changed")),
        ]))
        .build()
        .unwrap();
    manager.set("fresh", 960).unwrap();
    manager.save().unwrap();

    let before = create_sample_config();
    let after = fs::read_to_string(file.path()).unwrap();
    let after_lines: Vec<&str> = after.lines().collect();

    // line count grows by the appended key only
    assert_eq!(after_lines.len(), before.lines().count() + 1);
    for (old, new) in before.lines().zip(&after_lines) {
        if old.starts_with("test1") || old.starts_with("test3") {
            continue;
        }
        assert_eq!(old, *new);
    }
    assert_eq!(after_lines[2], "test1 = False # this is a comment");
    assert_eq!(after_lines[5], "test3 = 'changed'");
    assert_eq!(after_lines[7], "fresh = 960");
    // the original had no trailing newline
    assert!(!after.ends_with('\n'));
}

#[test]
fn test_malformed_value_rolls_back() {
    let file = write_config("a = 10\nb = [1, 2\n");
    let mut manager = ConfigManager::builder(file.path())
        .silent(true)
        .values(map(&[("a", Value::Int(1)), ("b", Value::Int(2))]))
        .build()
        .unwrap();

    let report = manager.load(LoadOptions::default()).unwrap();
    assert!(report.rolled_back);
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.malformed[0].key, "b");
    assert_eq!(
        manager.config(),
        &map(&[("a", Value::Int(1)), ("b", Value::Int(2))])
    );
}

#[test]
fn test_rollback_discards_discovered_keys() {
    let file = write_config("a = 1\nnew = 2\nbad = nope\n");
    let mut manager = manager_for(file.path(), &["a"]);

    let report = manager.load(LoadOptions::discover()).unwrap();
    assert!(report.rolled_back);
    assert_eq!(report.discovered, vec!["new", "bad"]);
    assert_eq!(manager.config(), &map(&[("a", Value::None)]));
}

#[test]
fn test_key_discovery() {
    let file = write_config("x = 5\ny = 6");

    let mut discovering = manager_for(file.path(), &["x"]);
    discovering.load(LoadOptions::discover()).unwrap();
    assert_eq!(
        discovering.config(),
        &map(&[("x", Value::Int(5)), ("y", Value::Int(6))])
    );

    let mut fixed = manager_for(file.path(), &["x"]);
    fixed.load(LoadOptions::default()).unwrap();
    assert_eq!(fixed.config(), &map(&[("x", Value::Int(5))]));
}

#[test]
fn test_missing_keys_keep_memory_value() {
    let file = write_config("a = 1\n");
    let mut manager = ConfigManager::builder(file.path())
        .silent(true)
        .values(map(&[("a", Value::Int(0)), ("b", Value::from("kept"))]))
        .build()
        .unwrap();

    manager.load(LoadOptions::default()).unwrap();
    assert_eq!(manager.get("a"), Some(&Value::Int(1)));
    assert_eq!(manager.get("b"), Some(&Value::from("kept")));
}

#[test]
fn test_duplicate_keys_last_read_first_written() {
    let file = write_config("dup = 1\ndup = 2\n");
    let mut manager = manager_for(file.path(), &["dup"]);

    manager.load(LoadOptions::default()).unwrap();
    assert_eq!(manager.get("dup"), Some(&Value::Int(2)));

    manager.set("dup", 3).unwrap();
    manager.save().unwrap();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "dup = 3\ndup = 2\n");
}

#[test]
fn test_commented_assignment_is_inert() {
    let file = write_config("# a = 99\na = 1 # a = 50\nb\n");
    let mut manager = manager_for(file.path(), &["a"]);

    let report = manager.load(LoadOptions::discover()).unwrap();
    assert!(report.discovered.is_empty());
    assert_eq!(manager.get("a"), Some(&Value::Int(1)));

    manager.save().unwrap();
    assert_eq!(
        fs::read_to_string(file.path()).unwrap(),
        "# a = 99\na = 1 # a = 50\nb\n"
    );
}

#[test]
fn test_custom_operators() {
    let file = write_config("; crew list\nnames : ['Ray', 'Sally'] ; on shift\n");
    let mut manager = ConfigManager::builder(file.path())
        .assign_op(":")
        .comment_op(";")
        .silent(true)
        .keys(["names"])
        .build()
        .unwrap();

    manager.load(LoadOptions::default()).unwrap();
    assert_eq!(
        manager.get("names"),
        Some(&Value::List(vec!["Ray".into(), "Sally".into()]))
    );

    manager
        .set("names", Value::List(vec!["Augusta".into()]))
        .unwrap();
    manager.save().unwrap();
    assert_eq!(
        fs::read_to_string(file.path()).unwrap(),
        "; crew list\nnames : ['Augusta'] ; on shift\n"
    );
}

#[test]
fn test_silent_mode_creates_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.conf");
    let mut manager = manager_for(&path, &["a"]);

    let report = manager.load(LoadOptions::default()).unwrap();
    assert!(report.created);
    assert!(path.exists());
    assert_eq!(manager.get("a"), Some(&Value::None));
}

#[test]
fn test_save_creates_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("new.conf");
    let mut manager = manager_for(&path, &[]);
    manager.set("width", 960).unwrap();
    manager.set("title", "main").unwrap();

    let report = manager.save().unwrap();
    assert!(report.created);
    assert_eq!(report.appended, vec!["width", "title"]);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "width = 960\ntitle = 'main'\n"
    );
}

#[test]
fn test_new_file_keeps_key_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ordered.conf");
    let manager = manager_for(&path, &["width", "height", "depth"]);

    manager.save().unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "width = None\nheight = None\ndepth = None\n"
    );
}

#[test]
fn test_discovered_keys_follow_file_order() {
    let file = write_config("zoom = 1\nmode = 'dark'\nalpha = 0.5\n");
    let mut manager = manager_for(file.path(), &[]);

    manager.load(LoadOptions::discover()).unwrap();
    let keys: Vec<&str> = manager.config().keys().map(String::as_str).collect();
    assert_eq!(keys, ["zoom", "mode", "alpha"]);
    assert_eq!(manager.report(), "{'zoom': 1, 'mode': 'dark', 'alpha': 0.5}");
}

#[test]
fn test_comment_token_in_value_is_reported() {
    let file = write_config("color = 'white'\n");
    let mut manager = manager_for(file.path(), &["color", "size"]);
    manager.set("color", "#ff0000").unwrap();
    manager.set("size", 3).unwrap();

    let report = manager.save().unwrap();
    assert_eq!(report.comment_clashes, vec!["color"]);

    // the saved line is cut at the comment token when read back
    let mut reader = manager_for(file.path(), &["color"]);
    let loaded = reader.load(LoadOptions::default()).unwrap();
    assert!(loaded.rolled_back);
    assert_eq!(loaded.malformed[0].key, "color");
}

#[test]
fn test_save_into_missing_directory_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("app.conf");
    let mut manager = manager_for(&path, &[]);
    manager.set("a", 1).unwrap();

    assert!(matches!(manager.save(), Err(ConflateError::Io { .. })));
    assert!(!path.exists());
}

#[test]
fn test_unreadable_path_is_io_error() {
    let dir = TempDir::new().unwrap();
    // a directory exists at the path, so reading fails with something other than NotFound
    let mut manager = manager_for(dir.path(), &["a"]);
    assert!(matches!(
        manager.load(LoadOptions::default()),
        Err(ConflateError::Io { .. })
    ));
}

#[test]
fn test_invalid_initial_config() {
    let err = InitialConfig::try_from(Value::from("just a string")).unwrap_err();
    assert!(err.to_string().contains("not in an acceptable format"));

    let mut manager = manager_for(Path::new("unused.conf"), &["a"]);
    assert!(manager
        .set_config(InitialConfig::Keys(vec!["has # hash".into()]))
        .is_err());
    // a rejected replacement leaves the mapping alone
    assert!(manager.contains_key("a"));
}

#[test]
fn test_removed_key_line_stays() {
    let file = write_config("a = 1\nb = 2\n");
    let mut manager = manager_for(file.path(), &["a", "b"]);
    manager.load(LoadOptions::default()).unwrap();
    manager.remove("b");
    manager.set("a", 5).unwrap();
    manager.save().unwrap();

    assert_eq!(fs::read_to_string(file.path()).unwrap(), "a = 5\nb = 2\n");
}
