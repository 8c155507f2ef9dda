// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task CRUD with invariant validation at the write boundary.

use crate::db::{now_ms, Database};
use crate::error::StorageError;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use sky_core::{
    ConnectionId, JobCounters, JobId, JobStatus, SyncDirection, Task, TaskId, TaskOptions, Trigger,
};

/// Input for [`TaskStore::create`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub connection_id: ConnectionId,
    pub name: String,
    pub source_path: PathBuf,
    pub remote_path: String,
    pub direction: SyncDirection,
    pub schedule: Option<String>,
    pub realtime: bool,
    pub options: TaskOptions,
}

/// Partial update for [`TaskStore::update`]; `None` keeps the stored value.
/// `schedule` is doubly optional so a patch can clear it.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub source_path: Option<PathBuf>,
    pub remote_path: Option<String>,
    pub direction: Option<SyncDirection>,
    pub schedule: Option<Option<String>>,
    pub realtime: Option<bool>,
    pub options: Option<TaskOptions>,
}

/// Latest-job summary attached to task listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub trigger: Trigger,
    pub status: JobStatus,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub counters: JobCounters,
}

/// A task plus its most recent job, fetched in a single read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWithLatestJob {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_job: Option<JobSummary>,
}

#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Database>,
}

const TASK_COLS: &str = "t.id, t.connection_id, t.name, t.source_path, t.remote_path,
    t.direction, t.schedule, t.realtime, t.options, t.created_at, t.updated_at";

const LATEST_JOB_JOIN: &str = "LEFT JOIN jobs j ON j.id = (
    SELECT id FROM jobs WHERE task_id = t.id
    ORDER BY start_time DESC, rowid DESC LIMIT 1)";

impl TaskStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewTask) -> Result<Task, StorageError> {
        let now = now_ms();
        let task = Task {
            id: TaskId::generate(),
            connection_id: new.connection_id,
            name: new.name,
            source_path: new.source_path,
            remote_path: new.remote_path,
            direction: new.direction,
            schedule: new.schedule,
            realtime: new.realtime,
            options: new.options,
            created_at_ms: now,
            updated_at_ms: now,
        };
        task.validate()?;

        let options = serde_json::to_string(&task.options)
            .map_err(|e| StorageError::Db(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))?;
        self.db.with_tx(|tx| {
            let conn_exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM connections WHERE id = ?1",
                    params![task.connection_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if conn_exists.is_none() {
                return Err(StorageError::NotFound(format!(
                    "connection {}",
                    task.connection_id
                )));
            }
            tx.execute(
                "INSERT INTO tasks (id, connection_id, name, source_path, remote_path, direction,
                                    schedule, realtime, options, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    task.id.as_str(),
                    task.connection_id.as_str(),
                    task.name,
                    path_str(&task.source_path),
                    task.remote_path,
                    task.direction.to_string(),
                    task.schedule,
                    task.realtime as i64,
                    options,
                    now as i64,
                    now as i64,
                ],
            )?;
            Ok(())
        })?;
        Ok(task)
    }

    pub fn get(&self, id: &TaskId) -> Result<Task, StorageError> {
        let sql = format!("SELECT {TASK_COLS} FROM tasks t WHERE t.id = ?1");
        self.db.with(|c| {
            c.query_row(&sql, params![id.as_str()], task_row)
                .optional()?
                .ok_or_else(|| StorageError::NotFound(format!("task {id}")))
        })
    }

    /// All tasks (optionally for one connection), each with its latest job.
    pub fn list(
        &self,
        connection_id: Option<&ConnectionId>,
    ) -> Result<Vec<TaskWithLatestJob>, StorageError> {
        let sql = format!(
            "SELECT {TASK_COLS}, j.id, j.trigger, j.status, j.start_time, j.end_time, j.counters
             FROM tasks t {LATEST_JOB_JOIN}
             {} ORDER BY t.name",
            if connection_id.is_some() { "WHERE t.connection_id = ?1" } else { "" },
        );
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = match connection_id {
                Some(id) => stmt.query_map(params![id.as_str()], task_with_job_row)?,
                None => stmt.query_map([], task_with_job_row)?,
            };
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Tasks that currently want a cron or filesystem trigger.
    pub fn list_plannable(&self) -> Result<Vec<Task>, StorageError> {
        let sql = format!(
            "SELECT {TASK_COLS} FROM tasks t
             WHERE t.schedule IS NOT NULL OR t.realtime = 1 ORDER BY t.name"
        );
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = stmt.query_map([], task_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StorageError> {
        let mut task = self.get(id)?;
        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(source_path) = patch.source_path {
            task.source_path = source_path;
        }
        if let Some(remote_path) = patch.remote_path {
            task.remote_path = remote_path;
        }
        if let Some(direction) = patch.direction {
            task.direction = direction;
        }
        if let Some(schedule) = patch.schedule {
            task.schedule = schedule;
        }
        if let Some(realtime) = patch.realtime {
            task.realtime = realtime;
        }
        if let Some(options) = patch.options {
            task.options = options;
        }
        task.updated_at_ms = now_ms();
        task.validate()?;

        let options = serde_json::to_string(&task.options)
            .map_err(|e| StorageError::Db(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))?;
        self.db.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE tasks SET name = ?2, source_path = ?3, remote_path = ?4, direction = ?5,
                                  schedule = ?6, realtime = ?7, options = ?8, updated_at = ?9
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    task.name,
                    path_str(&task.source_path),
                    task.remote_path,
                    task.direction.to_string(),
                    task.schedule,
                    task.realtime as i64,
                    options,
                    task.updated_at_ms as i64,
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("task {id}")));
            }
            Ok(())
        })?;
        Ok(task)
    }

    /// Delete the task and, through cascades, its jobs and logs.
    pub fn delete(&self, id: &TaskId) -> Result<(), StorageError> {
        self.db.with_tx(|tx| {
            let changed = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }
}

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn parse_options(json: &str) -> Result<TaskOptions, rusqlite::Error> {
    serde_json::from_str(json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn parse_counters(json: &str) -> Result<JobCounters, rusqlite::Error> {
    serde_json::from_str(json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))
}

fn bad_enum(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown enum value {value:?}").into(),
    )
}

fn task_row(row: &rusqlite::Row<'_>) -> Result<Task, rusqlite::Error> {
    let direction: String = row.get(5)?;
    let options: String = row.get(8)?;
    Ok(Task {
        id: TaskId::from_string(row.get::<_, String>(0)?),
        connection_id: ConnectionId::from_string(row.get::<_, String>(1)?),
        name: row.get(2)?,
        source_path: PathBuf::from(row.get::<_, String>(3)?),
        remote_path: row.get(4)?,
        direction: SyncDirection::parse(&direction).ok_or_else(|| bad_enum(5, &direction))?,
        schedule: row.get(6)?,
        realtime: row.get::<_, i64>(7)? != 0,
        options: parse_options(&options)?,
        created_at_ms: row.get::<_, i64>(9)? as u64,
        updated_at_ms: row.get::<_, i64>(10)? as u64,
    })
}

fn task_with_job_row(row: &rusqlite::Row<'_>) -> Result<TaskWithLatestJob, rusqlite::Error> {
    let task = task_row(row)?;
    let job_id: Option<String> = row.get(11)?;
    let latest_job = match job_id {
        None => None,
        Some(id) => {
            let trigger: String = row.get(12)?;
            let status: String = row.get(13)?;
            let counters: String = row.get(16)?;
            Some(JobSummary {
                id: JobId::from_string(id),
                trigger: Trigger::parse(&trigger).ok_or_else(|| bad_enum(12, &trigger))?,
                status: JobStatus::parse(&status).ok_or_else(|| bad_enum(13, &status))?,
                started_at_ms: row.get::<_, i64>(14)? as u64,
                ended_at_ms: row.get::<_, Option<i64>>(15)?.map(|v| v as u64),
                counters: parse_counters(&counters)?,
            })
        }
    };
    Ok(TaskWithLatestJob { task, latest_job })
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
