// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched, append-only per-job logs.

use crate::db::{now_ms, Database};
use crate::error::StorageError;
use rusqlite::params;
use std::sync::Arc;
use sky_core::{JobId, JobLogEntry, LogAction, LogEvent, LogLevel};

#[derive(Clone)]
pub struct LogStore {
    db: Arc<Database>,
}

impl LogStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a batch in one transaction, assigning contiguous sequence
    /// numbers after the job's current maximum. Returns the last assigned
    /// sequence (0 when the batch is empty).
    pub fn append_batch(
        &self,
        job_id: &JobId,
        events: &[LogEvent],
    ) -> Result<u64, StorageError> {
        if events.is_empty() {
            return Ok(0);
        }
        let fallback_time = now_ms();
        self.db.with_tx(|tx| {
            let mut seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM job_logs WHERE job_id = ?1",
                params![job_id.as_str()],
                |row| row.get(0),
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO job_logs (job_id, seq, time, level, what, path, size, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for event in events {
                seq += 1;
                let time = if event.time_ms == 0 { fallback_time } else { event.time_ms };
                stmt.execute(params![
                    job_id.as_str(),
                    seq,
                    time as i64,
                    event.level.as_str(),
                    event.what.as_str(),
                    event.path,
                    event.size.map(|s| s as i64),
                    event.message,
                ])?;
            }
            Ok(seq as u64)
        })
    }

    /// Page through a job's log, newest first `(time DESC, seq DESC)`,
    /// optionally restricted to one level.
    pub fn query(
        &self,
        job_id: &JobId,
        level: Option<LogLevel>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<JobLogEntry>, StorageError> {
        let sql = format!(
            "SELECT job_id, seq, time, level, what, path, size, message FROM job_logs
             WHERE job_id = ?1 {} ORDER BY time DESC, seq DESC LIMIT ?2 OFFSET ?3",
            if level.is_some() { "AND level = ?4" } else { "" },
        );
        let limit = page_size as i64;
        let offset = (page as i64) * limit;
        self.db.with(|c| {
            let mut stmt = c.prepare(&sql)?;
            let rows = match level {
                Some(level) => stmt.query_map(
                    params![job_id.as_str(), limit, offset, level.as_str()],
                    log_row,
                )?,
                None => stmt.query_map(params![job_id.as_str(), limit, offset], log_row)?,
            };
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn count(&self, job_id: &JobId, level: Option<LogLevel>) -> Result<u64, StorageError> {
        self.db.with(|c| {
            let n: i64 = match level {
                Some(level) => c.query_row(
                    "SELECT COUNT(*) FROM job_logs WHERE job_id = ?1 AND level = ?2",
                    params![job_id.as_str(), level.as_str()],
                    |row| row.get(0),
                )?,
                None => c.query_row(
                    "SELECT COUNT(*) FROM job_logs WHERE job_id = ?1",
                    params![job_id.as_str()],
                    |row| row.get(0),
                )?,
            };
            Ok(n as u64)
        })
    }
}

fn log_row(row: &rusqlite::Row<'_>) -> Result<JobLogEntry, rusqlite::Error> {
    let level: String = row.get(3)?;
    let what: String = row.get(4)?;
    let bad = |idx: usize, value: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown enum value {value:?}").into(),
        )
    };
    Ok(JobLogEntry {
        job_id: JobId::from_string(row.get::<_, String>(0)?),
        seq: row.get::<_, i64>(1)? as u64,
        time_ms: row.get::<_, i64>(2)? as u64,
        level: LogLevel::parse(&level).ok_or_else(|| bad(3, &level))?,
        what: LogAction::parse(&what).ok_or_else(|| bad(4, &what))?,
        path: row.get(5)?,
        size: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        message: row.get(7)?,
    })
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
