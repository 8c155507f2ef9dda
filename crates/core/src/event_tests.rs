// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::{JobCounters, JobStatus};

fn progress(conn: &str, task: &str, job: &str) -> Event {
    Event::Progress(TransferProgress {
        connection_id: ConnectionId::from_string(conn),
        task_id: TaskId::from_string(task),
        job_id: JobId::from_string(job),
        status: JobStatus::Running,
        started_at_ms: 0,
        counters: JobCounters::default(),
    })
}

#[test]
fn any_filter_matches_all_events() {
    let filter = EventFilter::any();
    assert!(filter.matches(&progress("c1", "t1", "j1")));
    assert!(filter.matches(&Event::TaskPlanChanged { task_id: TaskId::from_string("t1") }));
}

#[test]
fn job_filter_matches_only_that_job() {
    let filter = EventFilter::for_job(JobId::from_string("j1"));
    assert!(filter.matches(&progress("c1", "t1", "j1")));
    assert!(!filter.matches(&progress("c1", "t1", "j2")));
}

#[test]
fn job_filter_rejects_events_without_a_job() {
    let filter = EventFilter::for_job(JobId::from_string("j1"));
    assert!(!filter.matches(&Event::TaskPlanChanged { task_id: TaskId::from_string("t1") }));
}

#[test]
fn task_filter_matches_plan_changes() {
    let filter = EventFilter::for_task(TaskId::from_string("t1"));
    assert!(filter.matches(&Event::TaskPlanChanged { task_id: TaskId::from_string("t1") }));
    assert!(!filter.matches(&Event::TaskPlanChanged { task_id: TaskId::from_string("t2") }));
}

#[test]
fn combined_filter_requires_all_fields() {
    let filter = EventFilter {
        connection_id: Some(ConnectionId::from_string("c1")),
        task_id: Some(TaskId::from_string("t1")),
        job_id: None,
    };
    assert!(filter.matches(&progress("c1", "t1", "j9")));
    assert!(!filter.matches(&progress("c2", "t1", "j9")));
    assert!(!filter.matches(&progress("c1", "t2", "j9")));
}

#[test]
fn events_serialize_with_type_tags() {
    let event = Event::TaskPlanChanged { task_id: TaskId::from_string("t1") };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task:plan_changed");

    let json = serde_json::to_value(progress("c1", "t1", "j1")).unwrap();
    assert_eq!(json["type"], "job:progress");
    assert_eq!(json["status"], "running");
    assert_eq!(json["files_transferred"], 0);
}
