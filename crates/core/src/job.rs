// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and state machine.
//!
//! ```text
//! PENDING ──run──▶ RUNNING ──ok────▶ SUCCESS
//!                          ──err───▶ FAILED
//!                          ──cancel▶ CANCELLED
//!                          ──crash─▶ FAILED("interrupted")   [resolved at startup]
//! ```

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a job (one execution of a task).
    pub struct JobId;
}

/// Terminal error message applied to jobs found RUNNING at startup.
pub const INTERRUPTED: &str = "interrupted";

/// What caused a job to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Scheduled,
    Realtime,
    Recovered,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduled => "scheduled",
            Trigger::Realtime => "realtime",
            Trigger::Recovered => "recovered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Trigger::Manual),
            "scheduled" => Some(Trigger::Scheduled),
            "realtime" => Some(Trigger::Realtime),
            "recovered" => Some(Trigger::Recovered),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status. Transitions once to RUNNING, then exactly once
/// to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Success),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live transfer counters for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub files_transferred: u64,
    pub files_total: u64,
    pub bytes_transferred: u64,
    pub bytes_total: u64,
    pub errors: u64,
}

impl JobCounters {
    pub fn record_file(&mut self, bytes: u64) {
        self.files_transferred += 1;
        self.bytes_transferred += bytes;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// A single execution of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: TaskId,
    pub trigger: Trigger,
    pub status: JobStatus,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub counters: JobCounters,
    /// Terminal error message (FAILED and CANCELLED only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a fresh PENDING job.
    pub fn new(task_id: TaskId, trigger: Trigger, epoch_ms: u64) -> Self {
        Self {
            id: JobId::generate(),
            task_id,
            trigger,
            status: JobStatus::Pending,
            started_at_ms: epoch_ms,
            ended_at_ms: None,
            counters: JobCounters::default(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Test builder.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct JobBuilder {
    status: Option<JobStatus>,
    ended_at_ms: Option<u64>,
    error: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn ended_at_ms(mut self, ended_at_ms: u64) -> Self {
        self.ended_at_ms = Some(ended_at_ms);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: JobId::generate(),
            task_id: TaskId::from_string("task-1"),
            trigger: Trigger::Manual,
            status: self.status.unwrap_or(JobStatus::Pending),
            started_at_ms: 0,
            ended_at_ms: self.ended_at_ms,
            counters: JobCounters::default(),
            error: self.error,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
