// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sky_storage::{Database, SecretBox};
use std::sync::Arc;

fn fixture() -> (ConnectionStore, Importer) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = ConnectionStore::new(db, Arc::new(SecretBox::new("import-test")));
    (store.clone(), Importer::new(store))
}

const BLOB: &str = "
# exported remotes
[backup]
type = local
root = /srv/backup

[media]
type = s3
region = eu-west-1
access_key_id = AKIA
";

#[test]
fn preview_parses_sections_in_order() {
    let (_store, importer) = fixture();
    let items = importer.preview(BLOB).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "backup");
    assert_eq!(items[0].kind, "local");
    assert_eq!(items[0].config.get("root"), Some("/srv/backup"));
    assert!(!items[0].will_overwrite);
    assert_eq!(items[1].name, "media");
    assert_eq!(items[1].kind, "s3");
}

#[test]
fn preview_marks_existing_names_as_overwrites() {
    let (store, importer) = fixture();
    store
        .create("media", "s3", ConnectionConfig::from([("type", "s3")]))
        .unwrap();
    let items = importer.preview(BLOB).unwrap();
    assert!(!items[0].will_overwrite);
    assert!(items[1].will_overwrite);
}

#[test]
fn duplicate_sections_fail_preview_without_writes() {
    let (store, importer) = fixture();
    let blob = "[A]\ntype=local\n[A]\ntype=s3\n";
    let err = importer.preview(blob).unwrap_err();
    assert!(matches!(err, ImportError::Duplicate(ref names) if names == &vec!["A".to_string()]));
    assert!(store.names().unwrap().is_empty());
}

#[test]
fn default_and_empty_sections_are_skipped() {
    let (_store, importer) = fixture();
    let blob = "[DEFAULT]\nkey=1\n[]\nkey=2\n[real]\ntype=local\n";
    let items = importer.preview(blob).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "real");
}

#[test]
fn comments_and_loose_lines_are_ignored() {
    let (_store, importer) = fixture();
    let blob = "stray line\n; comment\n[a]\n# another\ntype = local\nnot-a-pair\n";
    let items = importer.preview(blob).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].config.len(), 1);
}

#[test]
fn execute_creates_selected_items_only() {
    let (store, importer) = fixture();
    let results = importer.execute(BLOB, &["backup".to_string()], false).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, ImportOutcome::Created);
    assert!(store.exists("backup").unwrap());
    assert!(!store.exists("media").unwrap());
}

#[test]
fn execute_skips_existing_without_overwrite() {
    let (store, importer) = fixture();
    store
        .create("backup", "local", ConnectionConfig::from([("type", "local"), ("root", "/old")]))
        .unwrap();

    let results = importer.execute(BLOB, &["backup".to_string()], false).unwrap();
    assert_eq!(results[0].outcome, ImportOutcome::Skipped);
    assert_eq!(store.get_by_name("backup").unwrap().config.get("root"), Some("/old"));
}

#[test]
fn execute_overwrites_when_requested() {
    let (store, importer) = fixture();
    store
        .create("backup", "local", ConnectionConfig::from([("type", "local"), ("root", "/old")]))
        .unwrap();

    let results = importer.execute(BLOB, &["backup".to_string()], true).unwrap();
    assert_eq!(results[0].outcome, ImportOutcome::Overwritten);
    assert_eq!(store.get_by_name("backup").unwrap().config.get("root"), Some("/srv/backup"));
}

#[test]
fn execute_aggregates_mixed_outcomes() {
    let (store, importer) = fixture();
    store
        .create("backup", "local", ConnectionConfig::from([("type", "local")]))
        .unwrap();

    let selection = vec!["backup".to_string(), "media".to_string()];
    let results = importer.execute(BLOB, &selection, false).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, ImportOutcome::Skipped);
    assert_eq!(results[1].outcome, ImportOutcome::Created);
}

#[test]
fn round_trip_preserves_names_and_values() {
    let (_store, importer) = fixture();
    let items = importer.preview(BLOB).unwrap();
    // Re-serialize in INI form and parse again.
    let mut blob = String::new();
    for item in &items {
        blob.push_str(&format!("[{}]\n", item.name));
        for (k, v) in item.config.iter() {
            blob.push_str(&format!("{k} = {v}\n"));
        }
    }
    let reparsed = importer.preview(&blob).unwrap();
    assert_eq!(reparsed, items);
}
