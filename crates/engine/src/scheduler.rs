// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-driven task activation.
//!
//! Keeps `task id → next fire time` in memory, derived from each task's
//! 5-field cron expression (UTC). A rejected activation (busy task) is
//! logged and dropped; the next cron fire is authoritative. Plan changes
//! re-derive the affected entry.

use crate::error::EngineError;
use crate::event_bus::EventBus;
use crate::runner::Activate;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sky_core::{parse_schedule, Clock, Event, EventFilter, SystemClock, TaskId, Trigger};
use sky_storage::TaskStore;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

struct Entry {
    schedule: cron::Schedule,
    next: DateTime<Utc>,
}

pub struct Scheduler<C: Clock = SystemClock> {
    tasks: TaskStore,
    runner: Arc<dyn Activate>,
    bus: Arc<EventBus>,
    clock: C,
    entries: Mutex<HashMap<TaskId, Entry>>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(tasks: TaskStore, runner: Arc<dyn Activate>, bus: Arc<EventBus>, clock: C) -> Self {
        Self { tasks, runner, bus, clock, entries: Mutex::new(HashMap::new()) }
    }

    /// Derive the initial plan from the store.
    pub fn load(&self) -> Result<usize, EngineError> {
        let now = self.clock.now_utc();
        let mut entries = self.entries.lock();
        entries.clear();
        for task in self.tasks.list_plannable()? {
            let Some(expr) = &task.schedule else { continue };
            match plan_entry(expr, now) {
                Some(entry) => {
                    entries.insert(task.id, entry);
                }
                None => {
                    tracing::warn!(task = %task.name, expr, "unschedulable cron expression")
                }
            }
        }
        Ok(entries.len())
    }

    /// Re-derive one task's entry after a plan change (or remove it).
    pub fn replan(&self, task_id: &TaskId) {
        let entry = self
            .tasks
            .get(task_id)
            .ok()
            .and_then(|task| task.schedule)
            .and_then(|expr| plan_entry(&expr, self.clock.now_utc()));
        let mut entries = self.entries.lock();
        match entry {
            Some(entry) => {
                tracing::debug!(task_id = %task_id, next = %entry.next, "schedule replanned");
                entries.insert(*task_id, entry);
            }
            None => {
                entries.remove(task_id);
            }
        }
    }

    /// Next fire time, if the task is scheduled.
    pub fn next_fire(&self, task_id: &TaskId) -> Option<DateTime<Utc>> {
        self.entries.lock().get(task_id).map(|e| e.next)
    }

    /// Fire every due task once and recompute its next fire time relative
    /// to the just-fired tick.
    pub async fn tick(&self) {
        let now = self.clock.now_utc();
        let due: Vec<TaskId> = {
            let mut entries = self.entries.lock();
            let due: Vec<TaskId> = entries
                .iter()
                .filter(|(_, e)| e.next <= now)
                .map(|(id, _)| *id)
                .collect();
            // Advance (or retire) entries before activating, so a slow
            // activation cannot double-fire within one tick.
            for id in &due {
                let next = entries.get(id).and_then(|e| e.schedule.after(&now).next());
                match next {
                    Some(next) => {
                        if let Some(entry) = entries.get_mut(id) {
                            entry.next = next;
                        }
                    }
                    None => {
                        entries.remove(id);
                    }
                }
            }
            due
        };

        for task_id in due {
            match self.runner.activate_task(&task_id, Trigger::Scheduled).await {
                Ok(job) => {
                    tracing::info!(task_id = %task_id, job_id = %job.id, "cron fired");
                }
                Err(EngineError::TaskBusy) => {
                    tracing::debug!(task_id = %task_id, "cron skipped: task busy");
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, error = %e, "cron activation failed");
                }
            }
        }
    }

    /// Main loop: coarse 1 s ticks plus plan-change notifications.
    pub async fn run(&self, shutdown: CancellationToken) {
        if let Err(e) = self.load() {
            tracing::error!(error = %e, "loading schedules failed");
        }
        let sub = self.bus.subscribe(EventFilter::any());
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => self.tick().await,
                event = sub.recv() => {
                    if let Event::TaskPlanChanged { task_id } = event {
                        self.replan(&task_id);
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }
}

fn plan_entry(expr: &str, now: DateTime<Utc>) -> Option<Entry> {
    let schedule = parse_schedule(expr).ok()?;
    let next = schedule.after(&now).next()?;
    Some(Entry { schedule, next })
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
