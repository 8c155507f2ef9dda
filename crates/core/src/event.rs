// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed events carried by the event bus.

use crate::connection::ConnectionId;
use crate::job::JobId;
use crate::progress::TransferProgress;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Events fanned out to bus subscribers.
///
/// Serializes with `{"type": "scope:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Live counters for a running or just-terminated job.
    #[serde(rename = "job:progress")]
    Progress(TransferProgress),

    /// A task's schedule or realtime flag changed (or the task was
    /// created/deleted). Scheduler and Watcher re-read the task on receipt.
    #[serde(rename = "task:plan_changed")]
    TaskPlanChanged { task_id: TaskId },
}

impl Event {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Event::Progress(p) => Some(p.job_id),
            Event::TaskPlanChanged { .. } => None,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Event::Progress(p) => Some(p.task_id),
            Event::TaskPlanChanged { task_id } => Some(*task_id),
        }
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Event::Progress(p) => Some(p.connection_id),
            Event::TaskPlanChanged { .. } => None,
        }
    }
}

/// Subscriber-side predicate. `None` fields match any event; a `Some`
/// field only matches events that carry that id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

impl EventFilter {
    /// Matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_job(job_id: JobId) -> Self {
        Self { job_id: Some(job_id), ..Self::default() }
    }

    pub fn for_task(task_id: TaskId) -> Self {
        Self { task_id: Some(task_id), ..Self::default() }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(want) = self.connection_id {
            if event.connection_id() != Some(want) {
                return false;
            }
        }
        if let Some(want) = self.task_id {
            if event.task_id() != Some(want) {
                return false;
            }
        }
        if let Some(want) = self.job_id {
            if event.job_id() != Some(want) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
