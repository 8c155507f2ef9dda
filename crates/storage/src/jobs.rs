// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-mostly job records.
//!
//! Status writes are guarded so a job transitions to RUNNING at most once
//! and to a terminal state exactly once; counter updates after the terminal
//! write are silently ignored.

use crate::db::{now_ms, Database};
use crate::error::StorageError;
use crate::tasks::parse_counters;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use sky_core::{Job, JobCounters, JobId, JobStatus, TaskId, Trigger};

#[derive(Clone)]
pub struct JobStore {
    db: Arc<Database>,
}

const JOB_COLS: &str =
    "id, task_id, trigger, status, start_time, end_time, counters, error_message";

impl JobStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a PENDING job for a task.
    pub fn create(&self, task_id: &TaskId, trigger: Trigger) -> Result<Job, StorageError> {
        let job = Job::new(*task_id, trigger, now_ms());
        let counters = encode_counters(&job.counters)?;
        self.db.with_tx(|tx| {
            let task_exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM tasks WHERE id = ?1",
                    params![task_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if task_exists.is_none() {
                return Err(StorageError::NotFound(format!("task {task_id}")));
            }
            tx.execute(
                "INSERT INTO jobs (id, task_id, trigger, status, start_time, counters)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.id.as_str(),
                    task_id.as_str(),
                    job.trigger.to_string(),
                    job.status.to_string(),
                    job.started_at_ms as i64,
                    counters,
                ],
            )?;
            Ok(())
        })?;
        Ok(job)
    }

    pub fn get(&self, id: &JobId) -> Result<Job, StorageError> {
        let sql = format!("SELECT {JOB_COLS} FROM jobs WHERE id = ?1");
        self.db.with(|c| {
            c.query_row(&sql, params![id.as_str()], job_row)
                .optional()?
                .ok_or_else(|| StorageError::NotFound(format!("job {id}")))
        })
    }

    /// PENDING → RUNNING. Fails with `JobNotActive` if the job is missing
    /// or has already left PENDING (e.g. cancelled before dispatch).
    pub fn mark_running(&self, id: &JobId) -> Result<(), StorageError> {
        self.db.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE jobs SET status = 'running' WHERE id = ?1 AND status = 'pending'",
                params![id.as_str()],
            )?;
            if changed == 0 {
                return Err(StorageError::JobNotActive(id.to_string()));
            }
            Ok(())
        })
    }

    /// Write the terminal status, final counters, end time, and optional
    /// error message in one atomic update. Rejects a second terminal write.
    pub fn mark_terminal(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
        counters: &JobCounters,
    ) -> Result<Job, StorageError> {
        debug_assert!(status.is_terminal(), "mark_terminal called with {status}");
        let encoded = encode_counters(counters)?;
        let end = now_ms();
        self.db.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE jobs SET status = ?2, end_time = ?3, counters = ?4, error_message = ?5
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![id.as_str(), status.to_string(), end as i64, encoded, error],
            )?;
            if changed == 0 {
                return Err(StorageError::JobNotActive(id.to_string()));
            }
            Ok(())
        })?;
        self.get(id)
    }

    /// Coalesced live counter update; a no-op once the job is terminal.
    pub fn update_counters(
        &self,
        id: &JobId,
        counters: &JobCounters,
    ) -> Result<(), StorageError> {
        let encoded = encode_counters(counters)?;
        self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE jobs SET counters = ?2
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![id.as_str(), encoded],
            )?;
            Ok(())
        })
    }

    pub fn list_for_task(
        &self,
        task_id: &TaskId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Job>, StorageError> {
        let sql = format!(
            "SELECT {JOB_COLS} FROM jobs WHERE task_id = ?1
             ORDER BY start_time DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        );
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = stmt.query_map(
                params![task_id.as_str(), page_size as i64, (page as i64) * (page_size as i64)],
                job_row,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn count_for_task(&self, task_id: &TaskId) -> Result<u64, StorageError> {
        self.db.with(|c| {
            let n: i64 = c.query_row(
                "SELECT COUNT(*) FROM jobs WHERE task_id = ?1",
                params![task_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Jobs that are PENDING or RUNNING for a task.
    pub fn active_for_task(&self, task_id: &TaskId) -> Result<Vec<Job>, StorageError> {
        let sql = format!(
            "SELECT {JOB_COLS} FROM jobs
             WHERE task_id = ?1 AND status IN ('pending', 'running')
             ORDER BY start_time DESC"
        );
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = stmt.query_map(params![task_id.as_str()], job_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn count_active(&self, task_id: &TaskId) -> Result<u64, StorageError> {
        self.db.with(|c| {
            let n: i64 = c.query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE task_id = ?1 AND status IN ('pending', 'running')",
                params![task_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Jobs left active by a previous process (crash recovery input).
    /// PENDING rows are included: a crash between create and dispatch would
    /// otherwise hold the task busy forever.
    pub fn stale_running(&self) -> Result<Vec<Job>, StorageError> {
        let sql = format!(
            "SELECT {JOB_COLS} FROM jobs WHERE status IN ('pending', 'running')
             ORDER BY start_time"
        );
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = stmt.query_map([], job_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

fn encode_counters(counters: &JobCounters) -> Result<String, StorageError> {
    serde_json::to_string(counters)
        .map_err(|e| StorageError::Db(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
}

fn job_row(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    let trigger: String = row.get(2)?;
    let status: String = row.get(3)?;
    let counters: String = row.get(6)?;
    let bad = |idx: usize, value: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown enum value {value:?}").into(),
        )
    };
    Ok(Job {
        id: JobId::from_string(row.get::<_, String>(0)?),
        task_id: TaskId::from_string(row.get::<_, String>(1)?),
        trigger: Trigger::parse(&trigger).ok_or_else(|| bad(2, &trigger))?,
        status: JobStatus::parse(&status).ok_or_else(|| bad(3, &status))?,
        started_at_ms: row.get::<_, i64>(4)? as u64,
        ended_at_ms: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        counters: parse_counters(&counters)?,
        error: row.get(7)?,
    })
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
