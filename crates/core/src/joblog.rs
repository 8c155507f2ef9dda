// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-job operation records.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Action tag describing what a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Copy,
    Delete,
    Check,
    Conflict,
    /// Filesystem-watch diagnostics surfaced into the next job.
    Watch,
    /// Job-level lifecycle messages.
    Sync,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Copy => "copy",
            LogAction::Delete => "delete",
            LogAction::Check => "check",
            LogAction::Conflict => "conflict",
            LogAction::Watch => "watch",
            LogAction::Sync => "sync",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "copy" => Some(LogAction::Copy),
            "delete" => Some(LogAction::Delete),
            "check" => Some(LogAction::Check),
            "conflict" => Some(LogAction::Conflict),
            "watch" => Some(LogAction::Watch),
            "sync" => Some(LogAction::Sync),
            _ => None,
        }
    }
}

/// A log record before it is written: the per-job sequence number is
/// assigned by the store at append time. `time_ms` is stamped by the
/// producer so batching delay never skews entry times; a zero value is
/// replaced with the append time by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default)]
    pub time_ms: u64,
    pub level: LogLevel,
    pub what: LogAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogEvent {
    pub fn new(level: LogLevel, what: LogAction) -> Self {
        Self { time_ms: 0, level, what, path: None, size: None, message: None }
    }

    pub fn at(mut self, time_ms: u64) -> Self {
        self.time_ms = time_ms;
        self
    }

    pub fn info(what: LogAction) -> Self {
        Self::new(LogLevel::Info, what)
    }

    pub fn error(what: LogAction) -> Self {
        Self::new(LogLevel::Error, what)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A persisted log entry. `seq` is monotonically increasing per job;
/// entries are never mutated after the append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: JobId,
    pub seq: u64,
    pub time_ms: u64,
    pub level: LogLevel,
    pub what: LogAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
