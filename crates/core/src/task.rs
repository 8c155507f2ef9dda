// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity: a user-defined sync plan between a local path and a
//! path on a Connection.

use crate::connection::ConnectionId;
use crate::schedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a Task.
    pub struct TaskId;
}

/// Upper bound on per-job file-transfer parallelism.
pub const MAX_TRANSFERS: u32 = 64;

/// Which way file changes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Upload,
    Download,
    Bidirectional,
}

impl SyncDirection {
    /// True when local changes propagate outward (upload-capable).
    pub fn includes_upload(&self) -> bool {
        matches!(self, SyncDirection::Upload | SyncDirection::Bidirectional)
    }

    pub fn includes_download(&self) -> bool {
        matches!(self, SyncDirection::Download | SyncDirection::Bidirectional)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Upload => "upload",
            SyncDirection::Download => "download",
            SyncDirection::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(SyncDirection::Upload),
            "download" => Some(SyncDirection::Download),
            "bidirectional" => Some(SyncDirection::Bidirectional),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a both-sides-changed pair is resolved in bidirectional mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Most recent mtime wins; ties prefer the local side.
    #[default]
    Newer,
    Local,
    Remote,
    /// Keep both: the losing side gets a uniquely-suffixed sibling.
    Both,
}

fn default_transfers() -> u32 {
    4
}

/// Per-task sync tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Ordered `+ prefix` / `- prefix` filter rules; first match wins.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Suppress delete-on-destination (unidirectional modes only).
    #[serde(default)]
    pub no_delete: bool,
    /// In-flight per-file transfer cap within one job (1..=64).
    #[serde(default = "default_transfers")]
    pub transfers: u32,
    /// Conflict resolution (bidirectional mode only).
    #[serde(default)]
    pub conflict: ConflictPolicy,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            no_delete: false,
            transfers: default_transfers(),
            conflict: ConflictPolicy::default(),
        }
    }
}

/// Why a task failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTask {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("source path must not be empty")]
    EmptySourcePath,
    #[error("realtime sync requires an upload-capable direction")]
    RealtimeDownload,
    #[error("transfers must be between 1 and {MAX_TRANSFERS}, got {0}")]
    TransfersOutOfRange(u32),
    #[error("invalid cron schedule {expr:?}: {reason}")]
    BadSchedule { expr: String, reason: String },
}

/// A user-defined sync plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub connection_id: ConnectionId,
    pub name: String,
    /// Local directory to sync.
    pub source_path: PathBuf,
    /// Path relative to the connection root.
    pub remote_path: String,
    pub direction: SyncDirection,
    /// 5-field cron expression (UTC); `None` disables scheduling.
    pub schedule: Option<String>,
    /// Activate on local filesystem change events.
    pub realtime: bool,
    pub options: TaskOptions,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Task {
    /// Enforce the task invariants. Called at every store write boundary.
    pub fn validate(&self) -> Result<(), InvalidTask> {
        if self.name.trim().is_empty() {
            return Err(InvalidTask::EmptyName);
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(InvalidTask::EmptySourcePath);
        }
        if self.realtime && !self.direction.includes_upload() {
            return Err(InvalidTask::RealtimeDownload);
        }
        if self.options.transfers == 0 || self.options.transfers > MAX_TRANSFERS {
            return Err(InvalidTask::TransfersOutOfRange(self.options.transfers));
        }
        if let Some(expr) = &self.schedule {
            schedule::parse_schedule(expr).map_err(|e| InvalidTask::BadSchedule {
                expr: expr.clone(),
                reason: e.reason,
            })?;
        }
        Ok(())
    }

    /// True when this task should hold a filesystem watch.
    pub fn wants_watch(&self) -> bool {
        self.realtime && self.direction.includes_upload()
    }
}

/// Test builder.
#[cfg(any(test, feature = "test-support"))]
pub struct TaskBuilder {
    name: String,
    source_path: PathBuf,
    direction: SyncDirection,
    schedule: Option<String>,
    realtime: bool,
    options: TaskOptions,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            name: "test-task".into(),
            source_path: "/tmp/src".into(),
            direction: SyncDirection::Upload,
            schedule: None,
            realtime: false,
            options: TaskOptions::default(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TaskBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    pub fn direction(mut self, direction: SyncDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn schedule(mut self, expr: impl Into<String>) -> Self {
        self.schedule = Some(expr.into());
        self
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: TaskId::generate(),
            connection_id: ConnectionId::from_string("conn-1"),
            name: self.name,
            source_path: self.source_path,
            remote_path: "dst".into(),
            direction: self.direction,
            schedule: self.schedule,
            realtime: self.realtime,
            options: self.options,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
