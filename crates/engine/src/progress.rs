// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job progress aggregation with throttled persistence.
//!
//! The library fires fine-grained callbacks; this sink bounds the storage
//! and wire rate: counters hit the job row at most once per
//! `persist_interval` (or on status change), snapshots hit the bus at most
//! once per `publish_interval`, and log entries flush in batches of
//! `log_batch_size` or after `log_flush_interval`, whichever comes first.

use crate::event_bus::EventBus;
use crate::remotefs::SyncObserver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sky_core::{
    Clock, ConnectionId, Event, JobCounters, JobId, JobStatus, LogEvent, TaskId, TransferProgress,
};
use sky_storage::{JobStore, LogStore};

#[derive(Debug, Clone, Copy)]
pub struct ProgressPolicy {
    pub persist_interval: Duration,
    pub publish_interval: Duration,
    pub log_batch_size: usize,
    pub log_flush_interval: Duration,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            persist_interval: Duration::from_secs(1),
            publish_interval: Duration::from_millis(250),
            log_batch_size: 128,
            log_flush_interval: Duration::from_millis(500),
        }
    }
}

struct SinkState {
    counters: JobCounters,
    status: JobStatus,
    last_persist: Option<Instant>,
    last_publish: Option<Instant>,
    persist_dirty: bool,
    publish_dirty: bool,
    pending_logs: Vec<LogEvent>,
    last_log_flush: Instant,
}

/// One job's progress funnel. Implements [`SyncObserver`] so the library's
/// worker threads can feed it directly.
pub struct ProgressSink<C: Clock> {
    connection_id: ConnectionId,
    task_id: TaskId,
    job_id: JobId,
    started_at_ms: u64,
    jobs: JobStore,
    logs: LogStore,
    bus: Arc<EventBus>,
    clock: C,
    policy: ProgressPolicy,
    state: Mutex<SinkState>,
}

impl<C: Clock> ProgressSink<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection_id: ConnectionId,
        task_id: TaskId,
        job_id: JobId,
        started_at_ms: u64,
        jobs: JobStore,
        logs: LogStore,
        bus: Arc<EventBus>,
        clock: C,
        policy: ProgressPolicy,
    ) -> Self {
        let now = clock.now();
        Self {
            connection_id,
            task_id,
            job_id,
            started_at_ms,
            jobs,
            logs,
            bus,
            clock,
            policy,
            state: Mutex::new(SinkState {
                counters: JobCounters::default(),
                status: JobStatus::Pending,
                last_persist: None,
                last_publish: None,
                persist_dirty: false,
                publish_dirty: false,
                pending_logs: Vec::new(),
                last_log_flush: now,
            }),
        }
    }

    /// Status change to RUNNING: publish and persist immediately.
    pub fn running(&self) {
        {
            let mut state = self.state.lock();
            state.status = JobStatus::Running;
            state.persist_dirty = true;
            state.publish_dirty = true;
        }
        self.persist(true);
        self.publish(true);
    }

    /// Periodic pump from the runner's ticker: flushes whatever is due.
    pub fn tick(&self) {
        self.persist(false);
        self.publish(false);
        let due = {
            let state = self.state.lock();
            !state.pending_logs.is_empty()
                && self.clock.now().duration_since(state.last_log_flush)
                    >= self.policy.log_flush_interval
        };
        if due {
            self.flush_logs();
        }
    }

    pub fn counters(&self) -> JobCounters {
        self.state.lock().counters
    }

    /// Write any buffered log entries now.
    pub fn flush_logs(&self) {
        let batch = {
            let mut state = self.state.lock();
            state.last_log_flush = self.clock.now();
            if state.pending_logs.is_empty() {
                return;
            }
            std::mem::take(&mut state.pending_logs)
        };
        if let Err(e) = self.logs.append_batch(&self.job_id, &batch) {
            tracing::error!(job_id = %self.job_id, error = %e, "appending job logs failed");
        }
    }

    /// Publish the terminal snapshot. Called after the store's terminal
    /// write so this event is the last one subscribers see for the job.
    pub fn finalize(&self, status: JobStatus, counters: JobCounters) {
        debug_assert!(status.is_terminal());
        {
            let mut state = self.state.lock();
            state.status = status;
            state.counters = counters;
        }
        self.publish(true);
    }

    fn snapshot(&self, state: &SinkState) -> TransferProgress {
        TransferProgress {
            connection_id: self.connection_id,
            task_id: self.task_id,
            job_id: self.job_id,
            status: state.status,
            started_at_ms: self.started_at_ms,
            counters: state.counters,
        }
    }

    fn persist(&self, force: bool) {
        let counters = {
            let mut state = self.state.lock();
            if !state.persist_dirty && !force {
                return;
            }
            let now = self.clock.now();
            let due = match state.last_persist {
                Some(last) => now.duration_since(last) >= self.policy.persist_interval,
                None => true,
            };
            if !due && !force {
                return;
            }
            state.last_persist = Some(now);
            state.persist_dirty = false;
            state.counters
        };
        if let Err(e) = self.jobs.update_counters(&self.job_id, &counters) {
            tracing::warn!(job_id = %self.job_id, error = %e, "persisting counters failed");
        }
    }

    fn publish(&self, force: bool) {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.publish_dirty && !force {
                return;
            }
            let now = self.clock.now();
            let due = match state.last_publish {
                Some(last) => now.duration_since(last) >= self.policy.publish_interval,
                None => true,
            };
            if !due && !force {
                return;
            }
            state.last_publish = Some(now);
            state.publish_dirty = false;
            self.snapshot(&state)
        };
        self.bus.publish(&Event::Progress(snapshot));
    }
}

impl<C: Clock> SyncObserver for ProgressSink<C> {
    fn on_progress(&self, counters: JobCounters) {
        {
            let mut state = self.state.lock();
            state.counters = counters;
            state.persist_dirty = true;
            state.publish_dirty = true;
        }
        self.persist(false);
        self.publish(false);
    }

    fn on_log(&self, mut event: LogEvent) {
        if event.time_ms == 0 {
            event.time_ms = self.clock.epoch_ms();
        }
        let flush_now = {
            let mut state = self.state.lock();
            state.pending_logs.push(event);
            state.pending_logs.len() >= self.policy.log_batch_size
        };
        if flush_now {
            self.flush_logs();
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
