// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution: one live job per task activation.
//!
//! Invariants upheld here:
//! - at most one active (PENDING or RUNNING) job per task, enforced by a
//!   task-keyed activation set plus the store-side active count;
//! - at most `workers` jobs executing concurrently (semaphore pool);
//! - a terminal progress event is always published after the terminal
//!   store write, and nothing for that job after it;
//! - a worker panic fails the job, never the process.

use crate::error::EngineError;
use crate::event_bus::EventBus;
use crate::fs_cache::FsCache;
use crate::progress::{ProgressPolicy, ProgressSink};
use crate::remotefs::{RemoteFs, SyncContext, SyncError, SyncObserver, SyncPlan};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sky_core::{
    Clock, Event, FilterSet, Job, JobId, JobStatus, LogAction, LogEvent, SystemClock, Task,
    TaskId, TransferProgress, Trigger, INTERRUPTED,
};
use sky_storage::{ConnectionStore, JobStore, LogStore, TaskStore};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Worker pool size (`P`). Defaults to the CPU count.
    pub workers: usize,
    pub policy: ProgressPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            policy: ProgressPolicy::default(),
        }
    }
}

/// Activation seam used by the Scheduler and Watcher.
#[async_trait]
pub trait Activate: Send + Sync {
    async fn activate_task(&self, task_id: &TaskId, trigger: Trigger)
        -> Result<Job, EngineError>;

    /// Record a diagnostic to surface as an ERROR log on the task's next
    /// job. Default: discard.
    fn note_watch_error(&self, _task_id: &TaskId, _message: String) {}
}

pub struct Runner<C: Clock = SystemClock> {
    tasks: TaskStore,
    jobs: JobStore,
    logs: LogStore,
    connections: ConnectionStore,
    cache: Arc<FsCache>,
    bus: Arc<EventBus>,
    clock: C,
    pool: Arc<Semaphore>,
    policy: ProgressPolicy,
    cancels: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    activating: Mutex<HashSet<TaskId>>,
    /// Watch failures surfaced as an ERROR log on the task's next job.
    watch_notes: Mutex<HashMap<TaskId, String>>,
}

impl<C: Clock + 'static> Runner<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: TaskStore,
        jobs: JobStore,
        logs: LogStore,
        connections: ConnectionStore,
        cache: Arc<FsCache>,
        bus: Arc<EventBus>,
        clock: C,
        config: RunnerConfig,
    ) -> Self {
        Self {
            tasks,
            jobs,
            logs,
            connections,
            cache,
            bus,
            clock,
            pool: Arc::new(Semaphore::new(config.workers.max(1))),
            policy: config.policy,
            cancels: Arc::new(Mutex::new(HashMap::new())),
            activating: Mutex::new(HashSet::new()),
            watch_notes: Mutex::new(HashMap::new()),
        }
    }

    /// Turn a task into a live job. Prechecked in order: task exists, task
    /// not busy, connection loadable. Returns the PENDING job immediately;
    /// execution is asynchronous.
    pub async fn activate(
        &self,
        task_id: &TaskId,
        trigger: Trigger,
    ) -> Result<Job, EngineError> {
        let task = self.tasks.get(task_id)?;
        if !self.activating.lock().insert(*task_id) {
            return Err(EngineError::TaskBusy);
        }
        let result = self.activate_locked(task, trigger).await;
        self.activating.lock().remove(task_id);
        result
    }

    async fn activate_locked(&self, task: Task, trigger: Trigger) -> Result<Job, EngineError> {
        if self.jobs.count_active(&task.id)? >= 1 {
            return Err(EngineError::TaskBusy);
        }
        let connection = self.connections.get(&task.connection_id)?;
        let fs = self.cache.open(&connection.name).await?;

        let job = self.jobs.create(&task.id, trigger)?;
        let cancel = CancellationToken::new();
        self.cancels.lock().insert(job.id, cancel.clone());
        tracing::info!(job_id = %job.id, task = %task.name, %trigger, "job activated");

        let watch_note = self.watch_notes.lock().remove(&task.id);
        let run = JobRun {
            jobs: self.jobs.clone(),
            logs: self.logs.clone(),
            bus: Arc::clone(&self.bus),
            clock: self.clock.clone(),
            pool: Arc::clone(&self.pool),
            cancels: Arc::clone(&self.cancels),
            policy: self.policy,
        };
        let job_out = job.clone();
        tokio::spawn(async move {
            run.execute(task, connection.id, fs, job, cancel, watch_note).await;
        });
        Ok(job_out)
    }

    /// Cancel a live job. Jobs that are not currently active fail with
    /// `JobNotActive`; a second cancel after termination does too.
    pub fn cancel(&self, job_id: &JobId) -> Result<(), EngineError> {
        match self.cancels.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id = %job_id, "cancellation requested");
                Ok(())
            }
            None => Err(EngineError::JobNotActive(job_id.to_string())),
        }
    }

    /// Startup pass: every job left active by a previous process becomes
    /// FAILED("interrupted") with a synthetic terminal event. No recovery
    /// job is created; the next trigger is authoritative.
    pub fn recover(&self) -> Result<usize, EngineError> {
        let stale = self.jobs.stale_running()?;
        let mut recovered = 0;
        for job in stale {
            let failed = self.jobs.mark_terminal(
                &job.id,
                JobStatus::Failed,
                Some(INTERRUPTED),
                &job.counters,
            )?;
            recovered += 1;
            tracing::warn!(job_id = %job.id, "failed interrupted job from previous run");
            if let Ok(task) = self.tasks.get(&job.task_id) {
                self.bus.publish(&Event::Progress(TransferProgress {
                    connection_id: task.connection_id,
                    task_id: task.id,
                    job_id: failed.id,
                    status: JobStatus::Failed,
                    started_at_ms: failed.started_at_ms,
                    counters: failed.counters,
                }));
            }
        }
        Ok(recovered)
    }

    /// Record a watch failure to surface on the task's next job.
    pub fn note_watch_error(&self, task_id: &TaskId, message: impl Into<String>) {
        self.watch_notes.lock().insert(*task_id, message.into());
    }

    /// Request cancellation of every live job (graceful shutdown).
    pub fn cancel_all(&self) {
        for token in self.cancels.lock().values() {
            token.cancel();
        }
    }

    /// True while any job still holds a cancellation handle.
    pub fn has_active_jobs(&self) -> bool {
        !self.cancels.lock().is_empty()
    }
}

#[async_trait]
impl<C: Clock + 'static> Activate for Runner<C> {
    async fn activate_task(
        &self,
        task_id: &TaskId,
        trigger: Trigger,
    ) -> Result<Job, EngineError> {
        self.activate(task_id, trigger).await
    }

    fn note_watch_error(&self, task_id: &TaskId, message: String) {
        Runner::note_watch_error(self, task_id, message);
    }
}

/// Everything a spawned job needs, detached from the runner's lifetime.
struct JobRun<C: Clock> {
    jobs: JobStore,
    logs: LogStore,
    bus: Arc<EventBus>,
    clock: C,
    pool: Arc<Semaphore>,
    cancels: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    policy: ProgressPolicy,
}

impl<C: Clock + 'static> JobRun<C> {
    async fn execute(
        self,
        task: Task,
        connection_id: sky_core::ConnectionId,
        fs: Arc<dyn RemoteFs>,
        job: Job,
        cancel: CancellationToken,
        watch_note: Option<String>,
    ) {
        let sink = Arc::new(ProgressSink::new(
            connection_id,
            task.id,
            job.id,
            job.started_at_ms,
            self.jobs.clone(),
            self.logs.clone(),
            Arc::clone(&self.bus),
            self.clock.clone(),
            self.policy,
        ));

        // The job stays PENDING until a pool permit frees up, so RUNNING
        // always means "actually executing".
        let permit = tokio::select! {
            permit = Arc::clone(&self.pool).acquire_owned() => permit.ok(),
            () = cancel.cancelled() => None,
        };
        let Some(_permit) = permit else {
            self.finish(&job, &sink, JobStatus::Cancelled, Some("cancelled".into()), sink.counters());
            return;
        };

        if let Err(e) = self.jobs.mark_running(&job.id) {
            tracing::warn!(job_id = %job.id, error = %e, "job vanished before start");
            self.cancels.lock().remove(&job.id);
            return;
        }
        sink.running();
        if let Some(note) = watch_note {
            sink.on_log(LogEvent::error(LogAction::Watch).with_message(note));
        }

        // Periodic pump so due counters/logs flush even while the library
        // is between callbacks.
        let ticker = {
            let sink = Arc::clone(&sink);
            let interval = self.policy.publish_interval;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    sink.tick();
                }
            })
        };

        let plan = SyncPlan {
            local_root: task.source_path.clone(),
            remote_path: task.remote_path.clone(),
            direction: task.direction,
            filters: FilterSet::parse(&task.options.filters),
            no_delete: task.options.no_delete,
            transfers: task.options.transfers,
            conflict: task.options.conflict,
        };
        let result = {
            let sink = Arc::clone(&sink);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let ctx = SyncContext { cancel: &cancel, observer: sink.as_ref() };
                fs.sync(&plan, &ctx)
            })
            .await
        };
        // Join the ticker so no stale snapshot can publish after the
        // terminal event.
        ticker.abort();
        let _ = ticker.await;

        let (status, error, counters) = match result {
            Ok(Ok(counters)) if cancel.is_cancelled() => {
                (JobStatus::Cancelled, Some("cancelled".to_string()), counters)
            }
            Ok(Ok(counters)) => (JobStatus::Success, None, counters),
            Ok(Err(SyncError::Cancelled)) => {
                (JobStatus::Cancelled, Some("cancelled".to_string()), sink.counters())
            }
            Ok(Err(e)) => (JobStatus::Failed, Some(e.to_string()), sink.counters()),
            Err(join_error) => {
                (JobStatus::Failed, Some(panic_message(join_error)), sink.counters())
            }
        };
        self.finish(&job, &sink, status, error, counters);
    }

    fn finish(
        &self,
        job: &Job,
        sink: &ProgressSink<C>,
        status: JobStatus,
        error: Option<String>,
        counters: sky_core::JobCounters,
    ) {
        sink.flush_logs();
        // Terminal write carries the final counters; no counter updates
        // can land after it.
        if let Err(e) = self.jobs.mark_terminal(&job.id, status, error.as_deref(), &counters) {
            tracing::error!(job_id = %job.id, error = %e, "terminal write failed");
        }
        self.cancels.lock().remove(&job.id);
        sink.finalize(status, counters);
        tracing::info!(job_id = %job.id, %status, "job finished");
    }
}

fn panic_message(error: tokio::task::JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque payload".to_string());
            format!("panic: {message}")
        }
        Err(e) => format!("panic: {e}"),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
