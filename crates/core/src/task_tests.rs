// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn default_task_is_valid() {
    let task = TaskBuilder::default().build();
    assert_eq!(task.validate(), Ok(()));
}

#[test]
fn empty_name_is_rejected() {
    let task = TaskBuilder::default().name("  ").build();
    assert_eq!(task.validate(), Err(InvalidTask::EmptyName));
}

#[test]
fn empty_source_path_is_rejected() {
    let task = TaskBuilder::default().source_path("").build();
    assert_eq!(task.validate(), Err(InvalidTask::EmptySourcePath));
}

#[test]
fn realtime_download_is_rejected() {
    let task = TaskBuilder::default()
        .direction(SyncDirection::Download)
        .realtime(true)
        .build();
    assert_eq!(task.validate(), Err(InvalidTask::RealtimeDownload));
}

#[test]
fn realtime_bidirectional_is_allowed() {
    let task = TaskBuilder::default()
        .direction(SyncDirection::Bidirectional)
        .realtime(true)
        .build();
    assert_eq!(task.validate(), Ok(()));
}

#[parameterized(
    zero = { 0 },
    above_cap = { 65 },
)]
fn transfers_out_of_range(transfers: u32) {
    let task = TaskBuilder::default()
        .options(TaskOptions { transfers, ..TaskOptions::default() })
        .build();
    assert_eq!(task.validate(), Err(InvalidTask::TransfersOutOfRange(transfers)));
}

#[test]
fn transfers_cap_is_inclusive() {
    let task = TaskBuilder::default()
        .options(TaskOptions { transfers: MAX_TRANSFERS, ..TaskOptions::default() })
        .build();
    assert_eq!(task.validate(), Ok(()));
}

#[test]
fn bad_schedule_is_rejected() {
    let task = TaskBuilder::default().schedule("every day at noon").build();
    assert!(matches!(task.validate(), Err(InvalidTask::BadSchedule { .. })));
}

#[test]
fn valid_schedule_passes() {
    let task = TaskBuilder::default().schedule("*/5 * * * *").build();
    assert_eq!(task.validate(), Ok(()));
}

#[parameterized(
    upload_realtime = { SyncDirection::Upload, true, true },
    bidi_realtime = { SyncDirection::Bidirectional, true, true },
    upload_plain = { SyncDirection::Upload, false, false },
    download_never = { SyncDirection::Download, false, false },
)]
fn wants_watch(direction: SyncDirection, realtime: bool, expected: bool) {
    let task = TaskBuilder::default().direction(direction).realtime(realtime).build();
    assert_eq!(task.wants_watch(), expected);
}

#[test]
fn options_default_round_trips_through_json() {
    let options = TaskOptions::default();
    let json = serde_json::to_string(&options).unwrap();
    let back: TaskOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);
    assert_eq!(back.transfers, 4);
}

#[test]
fn direction_capability_helpers() {
    assert!(SyncDirection::Upload.includes_upload());
    assert!(!SyncDirection::Upload.includes_download());
    assert!(SyncDirection::Download.includes_download());
    assert!(SyncDirection::Bidirectional.includes_upload());
    assert!(SyncDirection::Bidirectional.includes_download());
}
