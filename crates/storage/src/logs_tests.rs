// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{ConnectionStore, JobStore, NewTask, SecretBox, TaskStore};
use sky_core::{ConnectionConfig, SyncDirection, TaskOptions, Trigger};

fn fixture() -> (LogStore, JobId) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let connections = ConnectionStore::new(Arc::clone(&db), Arc::new(SecretBox::new("")));
    let conn = connections
        .create("conn", "local", ConnectionConfig::from([("type", "local")]))
        .unwrap();
    let tasks = TaskStore::new(Arc::clone(&db));
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
    let job = JobStore::new(Arc::clone(&db)).create(&task.id, Trigger::Manual).unwrap();
    (LogStore::new(db), job.id)
}

fn copy_event(path: &str, time_ms: u64) -> LogEvent {
    LogEvent::info(LogAction::Copy).with_path(path).with_size(10).at(time_ms)
}

#[test]
fn batches_get_contiguous_sequences() {
    let (logs, job_id) = fixture();
    let last = logs
        .append_batch(&job_id, &[copy_event("a", 1), copy_event("b", 2)])
        .unwrap();
    assert_eq!(last, 2);
    let last = logs.append_batch(&job_id, &[copy_event("c", 3)]).unwrap();
    assert_eq!(last, 3);

    let entries = logs.query(&job_id, None, 0, 10).unwrap();
    let seqs: Vec<_> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![3, 2, 1]);
}

#[test]
fn empty_batch_is_a_no_op() {
    let (logs, job_id) = fixture();
    assert_eq!(logs.append_batch(&job_id, &[]).unwrap(), 0);
    assert_eq!(logs.count(&job_id, None).unwrap(), 0);
}

#[test]
fn query_orders_by_time_then_seq_desc() {
    let (logs, job_id) = fixture();
    // Same timestamp: seq breaks the tie.
    logs.append_batch(&job_id, &[copy_event("a", 100), copy_event("b", 100)]).unwrap();
    logs.append_batch(&job_id, &[copy_event("c", 50)]).unwrap();

    let entries = logs.query(&job_id, None, 0, 10).unwrap();
    let paths: Vec<_> = entries.iter().map(|e| e.path.as_deref().unwrap()).collect();
    assert_eq!(paths, vec!["b", "a", "c"]);
}

#[test]
fn level_filter_and_counts() {
    let (logs, job_id) = fixture();
    logs.append_batch(
        &job_id,
        &[
            copy_event("a", 1),
            LogEvent::error(LogAction::Copy).with_path("b").with_message("io error").at(2),
        ],
    )
    .unwrap();

    assert_eq!(logs.count(&job_id, None).unwrap(), 2);
    assert_eq!(logs.count(&job_id, Some(LogLevel::Error)).unwrap(), 1);

    let errors = logs.query(&job_id, Some(LogLevel::Error), 0, 10).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message.as_deref(), Some("io error"));
}

#[test]
fn pagination_windows() {
    let (logs, job_id) = fixture();
    let events: Vec<_> = (0..5).map(|i| copy_event(&format!("f{i}"), 10 + i)).collect();
    logs.append_batch(&job_id, &events).unwrap();

    let page0 = logs.query(&job_id, None, 0, 2).unwrap();
    let page2 = logs.query(&job_id, None, 2, 2).unwrap();
    assert_eq!(page0.len(), 2);
    assert_eq!(page2.len(), 1);
    assert_eq!(page0[0].path.as_deref(), Some("f4"));
    assert_eq!(page2[0].path.as_deref(), Some("f0"));
}

#[test]
fn zero_time_falls_back_to_append_time() {
    let (logs, job_id) = fixture();
    logs.append_batch(&job_id, &[LogEvent::info(LogAction::Check)]).unwrap();
    let entries = logs.query(&job_id, None, 0, 1).unwrap();
    assert!(entries[0].time_ms > 0);
}
