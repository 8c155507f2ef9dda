// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{JobStore, LogStore, NewTask, SecretBox, TaskStore};
use sky_core::{LogAction, LogEvent, SyncDirection, TaskOptions, Trigger};

fn fixture() -> (Arc<Database>, ConnectionStore) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let secrets = Arc::new(SecretBox::new("unit-test-key"));
    let store = ConnectionStore::new(Arc::clone(&db), secrets);
    (db, store)
}

fn local_config() -> ConnectionConfig {
    ConnectionConfig::from([("type", "local"), ("root", "/tmp/remote")])
}

#[test]
fn create_and_get_round_trip() {
    let (_db, store) = fixture();
    let created = store.create("backup", "local", local_config()).unwrap();
    let fetched = store.get(&created.id).unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.config.get("root"), Some("/tmp/remote"));
}

#[test]
fn get_by_name_and_list() {
    let (_db, store) = fixture();
    store.create("b-conn", "local", local_config()).unwrap();
    store.create("a-conn", "local", local_config()).unwrap();
    let by_name = store.get_by_name("a-conn").unwrap();
    assert_eq!(by_name.name, "a-conn");
    let listed = store.list().unwrap();
    assert_eq!(
        listed.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["a-conn", "b-conn"]
    );
}

#[test]
fn missing_connection_is_not_found() {
    let (_db, store) = fixture();
    let err = store.get(&ConnectionId::generate()).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(store.try_get_by_name("nope").unwrap().is_none());
}

#[test]
fn duplicate_name_conflicts() {
    let (_db, store) = fixture();
    store.create("dup", "local", local_config()).unwrap();
    let err = store.create("dup", "local", local_config()).unwrap_err();
    assert!(matches!(err, StorageError::NameConflict(name) if name == "dup"));
}

#[test]
fn empty_name_rejected() {
    let (_db, store) = fixture();
    let err = store.create("   ", "local", local_config()).unwrap_err();
    assert!(matches!(err, StorageError::EmptyName));
}

#[test]
fn type_tag_is_filled_in_when_missing() {
    let (_db, store) = fixture();
    let created = store.create("a", "s3", ConnectionConfig::from([("region", "x")])).unwrap();
    assert_eq!(created.config.kind(), Some("s3"));
    assert!(created.kind_matches_config());
}

#[test]
fn mismatched_type_tag_rejected() {
    let (_db, store) = fixture();
    let err = store
        .create("a", "s3", ConnectionConfig::from([("type", "local")]))
        .unwrap_err();
    assert!(matches!(err, StorageError::KindMismatch { .. }));
}

#[test]
fn update_replaces_config_atomically() {
    let (_db, store) = fixture();
    let created = store.create("a", "local", local_config()).unwrap();
    let next = ConnectionConfig::from([("type", "local"), ("root", "/elsewhere")]);
    let updated = store
        .update(&created.id, ConnectionChanges { name: None, config: Some(next.clone()) })
        .unwrap();
    assert_eq!(updated.config, next);
    assert_eq!(store.get(&created.id).unwrap().config, next);
}

#[test]
fn rename_checks_uniqueness_but_allows_self() {
    let (_db, store) = fixture();
    let a = store.create("a", "local", local_config()).unwrap();
    store.create("b", "local", local_config()).unwrap();

    let err = store
        .update(&a.id, ConnectionChanges { name: Some("b".into()), config: None })
        .unwrap_err();
    assert!(matches!(err, StorageError::NameConflict(_)));

    // Re-writing the current name is not a conflict.
    let same = store
        .update(&a.id, ConnectionChanges { name: Some("a".into()), config: None })
        .unwrap();
    assert_eq!(same.name, "a");
}

#[test]
fn kind_change_blocked_while_jobs_active() {
    let (db, store) = fixture();
    let conn = store.create("a", "local", local_config()).unwrap();
    let tasks = TaskStore::new(Arc::clone(&db));
    let jobs = JobStore::new(Arc::clone(&db));
    let task = tasks
        .create(NewTask {
            connection_id: conn.id,
            name: "t".into(),
            source_path: "/tmp/src".into(),
            remote_path: "dst".into(),
            direction: SyncDirection::Upload,
            schedule: None,
            realtime: false,
            options: TaskOptions::default(),
        })
        .unwrap();
    let job = jobs.create(&task.id, Trigger::Manual).unwrap();
    jobs.mark_running(&job.id).unwrap();

    let err = store
        .update(
            &conn.id,
            ConnectionChanges {
                name: None,
                config: Some(ConnectionConfig::from([("type", "s3")])),
            },
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::ConnectionBusy(_)));

    // Same-kind config writes stay allowed mid-job (token refresh path).
    store
        .update(
            &conn.id,
            ConnectionChanges {
                name: None,
                config: Some(ConnectionConfig::from([("type", "local"), ("token", "v2")])),
            },
        )
        .unwrap();
}

#[test]
fn delete_cascades_tasks_jobs_and_logs() {
    let (db, store) = fixture();
    let conn = store.create("a", "local", local_config()).unwrap();
    let tasks = TaskStore::new(Arc::clone(&db));
    let jobs = JobStore::new(Arc::clone(&db));
    let logs = LogStore::new(Arc::clone(&db));
    let task = tasks
        .create(NewTask {
            connection_id: conn.id,
            name: "t".into(),
            source_path: "/tmp/src".into(),
            remote_path: "dst".into(),
            direction: SyncDirection::Upload,
            schedule: None,
            realtime: false,
            options: TaskOptions::default(),
        })
        .unwrap();
    let job = jobs.create(&task.id, Trigger::Manual).unwrap();
    logs.append_batch(&job.id, &[LogEvent::info(LogAction::Copy).with_path("a.txt")]).unwrap();

    store.delete(&conn.id).unwrap();

    assert!(matches!(tasks.get(&task.id), Err(StorageError::NotFound(_))));
    assert!(matches!(jobs.get(&job.id), Err(StorageError::NotFound(_))));
    assert_eq!(logs.count(&job.id, None).unwrap(), 0);
}

#[test]
fn set_value_creates_section_and_merges() {
    let (_db, store) = fixture();
    store.set_value("fresh", "type", "local").unwrap();
    let conn = store.get_by_name("fresh").unwrap();
    assert_eq!(conn.kind, "local");

    store.set_value("fresh", "token", "v1").unwrap();
    store.set_value("fresh", "token", "v2").unwrap();
    let conn = store.get_by_name("fresh").unwrap();
    assert_eq!(conn.config.get("token"), Some("v2"));
    assert_eq!(conn.config.kind(), Some("local"));
}

#[test]
fn set_value_type_updates_kind_column() {
    let (_db, store) = fixture();
    store.set_value("c", "region", "eu").unwrap();
    assert_eq!(store.get_by_name("c").unwrap().kind, "");
    store.set_value("c", "type", "s3").unwrap();
    assert_eq!(store.get_by_name("c").unwrap().kind, "s3");
}

#[test]
fn delete_key_reports_presence() {
    let (_db, store) = fixture();
    store.create("a", "local", local_config()).unwrap();
    assert!(store.delete_key("a", "root").unwrap());
    assert!(!store.delete_key("a", "root").unwrap());
    assert!(!store.delete_key("ghost", "root").unwrap());
}

#[test]
fn delete_by_name_is_best_effort() {
    let (_db, store) = fixture();
    store.create("a", "local", local_config()).unwrap();
    assert!(store.delete_by_name("a").unwrap());
    assert!(!store.delete_by_name("a").unwrap());
}

#[test]
fn returned_config_is_a_value_copy() {
    let (_db, store) = fixture();
    let conn = store.create("a", "local", local_config()).unwrap();
    let mut fetched = store.get(&conn.id).unwrap();
    fetched.config.set("root", "/mutated");
    assert_eq!(store.get(&conn.id).unwrap().config.get("root"), Some("/tmp/remote"));
}

#[test]
fn names_and_exists() {
    let (_db, store) = fixture();
    store.create("one", "local", local_config()).unwrap();
    assert_eq!(store.names().unwrap(), vec!["one".to_string()]);
    assert!(store.exists("one").unwrap());
    assert!(!store.exists("two").unwrap());
}
