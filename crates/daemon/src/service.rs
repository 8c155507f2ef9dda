// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The facade the API transport drives.
//!
//! Pure pass-through to the stores and engine, plus the glue the spec
//! puts at this seam: `load_status` derivation, config masking, and
//! `TaskPlanChanged` publication on task mutations.

use serde::Serialize;
use sky_core::{
    Connection, ConnectionConfig, ConnectionId, Event, EventFilter, Job, JobId, JobLogEntry,
    LoadStatus, LogLevel, TaskId, Trigger,
};
use sky_engine::{
    EngineError, EventBus, FsCache, ImportError, ImportItem, ImportResult, Importer, Quota,
    Runner, Subscription, SyncError,
};
use sky_storage::{
    ConnectionChanges, ConnectionStore, JobStore, LogStore, NewTask, TaskPatch, TaskStore,
    TaskWithLatestJob,
};
use std::sync::Arc;

/// A connection as the API sees it: decrypted config included on demand,
/// secret-looking values masked unless explicitly revealed.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub name: String,
    pub kind: String,
    pub load_status: LoadStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConnectionConfig>,
}

const MASK: &str = "***";

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["token", "secret", "pass", "key"].iter().any(|needle| key.contains(needle))
}

fn masked(config: &ConnectionConfig) -> ConnectionConfig {
    config
        .iter()
        .map(|(k, v)| {
            let value = if is_secret_key(k) { MASK } else { v };
            (k.to_string(), value.to_string())
        })
        .collect()
}

pub struct SyncService {
    connections: ConnectionStore,
    tasks: TaskStore,
    jobs: JobStore,
    logs: LogStore,
    cache: Arc<FsCache>,
    bus: Arc<EventBus>,
    runner: Arc<Runner>,
    importer: Importer,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connections: ConnectionStore,
        tasks: TaskStore,
        jobs: JobStore,
        logs: LogStore,
        cache: Arc<FsCache>,
        bus: Arc<EventBus>,
        runner: Arc<Runner>,
    ) -> Self {
        let importer = Importer::new(connections.clone());
        Self { connections, tasks, jobs, logs, cache, bus, runner, importer }
    }

    // -- connections --

    pub fn list_connections(&self) -> Result<Vec<ConnectionView>, EngineError> {
        let listed = self.connections.list()?;
        Ok(listed.into_iter().map(|conn| self.view(conn, false)).collect())
    }

    /// `reveal` returns secret values verbatim; otherwise they are masked.
    pub fn get_connection(
        &self,
        id: &ConnectionId,
        reveal: bool,
    ) -> Result<ConnectionView, EngineError> {
        let conn = self.connections.get(id)?;
        Ok(self.view(conn, reveal))
    }

    pub fn create_connection(
        &self,
        name: &str,
        kind: &str,
        config: ConnectionConfig,
    ) -> Result<ConnectionView, EngineError> {
        let conn = self.connections.create(name, kind, config)?;
        Ok(self.view(conn, false))
    }

    pub fn update_connection(
        &self,
        id: &ConnectionId,
        changes: ConnectionChanges,
    ) -> Result<ConnectionView, EngineError> {
        let before = self.connections.get(id)?;
        let updated = self.connections.update(id, changes)?;
        self.cache.invalidate(&before.name);
        if updated.name != before.name {
            self.cache.invalidate(&updated.name);
        }
        Ok(self.view(updated, false))
    }

    /// Cascade delete: tasks, jobs, and logs go with the connection, the
    /// cached handle is evicted, and planners hear about each lost task.
    pub fn delete_connection(&self, id: &ConnectionId) -> Result<(), EngineError> {
        let owned: Vec<TaskId> =
            self.tasks.list(Some(id))?.into_iter().map(|t| t.task.id).collect();
        let deleted = self.connections.delete(id)?;
        self.cache.invalidate(&deleted.name);
        for task_id in owned {
            self.bus.publish(&Event::TaskPlanChanged { task_id });
        }
        Ok(())
    }

    /// Quota probe through the provider's `about` call.
    pub async fn connection_about(&self, id: &ConnectionId) -> Result<Quota, EngineError> {
        let conn = self.connections.get(id)?;
        let fs = self.cache.open(&conn.name).await?;
        let quota = tokio::task::spawn_blocking(move || fs.about())
            .await
            .map_err(|e| EngineError::Connection(SyncError::Fatal(e.to_string())))??;
        Ok(quota)
    }

    fn view(&self, conn: Connection, reveal: bool) -> ConnectionView {
        let config = if reveal { conn.config } else { masked(&conn.config) };
        ConnectionView {
            id: conn.id,
            name: conn.name.clone(),
            kind: conn.kind,
            load_status: self.cache.load_status(&conn.name),
            created_at_ms: conn.created_at_ms,
            updated_at_ms: conn.updated_at_ms,
            config: Some(config),
        }
    }

    // -- tasks --

    pub fn list_tasks(
        &self,
        connection_id: Option<&ConnectionId>,
    ) -> Result<Vec<TaskWithLatestJob>, EngineError> {
        Ok(self.tasks.list(connection_id)?)
    }

    pub fn get_task(&self, id: &TaskId) -> Result<sky_core::Task, EngineError> {
        Ok(self.tasks.get(id)?)
    }

    pub fn create_task(&self, new: NewTask) -> Result<sky_core::Task, EngineError> {
        let task = self.tasks.create(new)?;
        self.bus.publish(&Event::TaskPlanChanged { task_id: task.id });
        Ok(task)
    }

    pub fn update_task(
        &self,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<sky_core::Task, EngineError> {
        let task = self.tasks.update(id, patch)?;
        self.bus.publish(&Event::TaskPlanChanged { task_id: task.id });
        Ok(task)
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<(), EngineError> {
        self.tasks.delete(id)?;
        self.bus.publish(&Event::TaskPlanChanged { task_id: *id });
        Ok(())
    }

    /// Manual trigger.
    pub async fn run_task(&self, id: &TaskId) -> Result<Job, EngineError> {
        self.runner.activate(id, Trigger::Manual).await
    }

    // -- jobs --

    pub fn get_job(&self, id: &JobId) -> Result<Job, EngineError> {
        Ok(self.jobs.get(id)?)
    }

    pub fn list_jobs(
        &self,
        task_id: &TaskId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Job>, EngineError> {
        Ok(self.jobs.list_for_task(task_id, page, page_size)?)
    }

    pub fn cancel_job(&self, id: &JobId) -> Result<(), EngineError> {
        self.runner.cancel(id)
    }

    pub fn job_logs(
        &self,
        job_id: &JobId,
        level: Option<LogLevel>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<JobLogEntry>, EngineError> {
        Ok(self.logs.query(job_id, level, page, page_size)?)
    }

    // -- events --

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    // -- import --

    pub fn import_preview(&self, blob: &str) -> Result<Vec<ImportItem>, ImportError> {
        self.importer.preview(blob)
    }

    pub fn import_execute(
        &self,
        blob: &str,
        selection: &[String],
        overwrite: bool,
    ) -> Result<Vec<ImportResult>, ImportError> {
        self.importer.execute(blob, selection, overwrite)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
