// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime activation from local filesystem changes.
//!
//! Every realtime task with an upload-capable direction holds a recursive
//! watch on its source path. Change bursts are debounced: activation fires
//! only after a quiet period. A busy task sets a single pending re-fire
//! flag that coalesces any number of further changes into exactly one
//! activation once the current job finishes.

use crate::error::EngineError;
use crate::event_bus::EventBus;
use crate::runner::Activate;
use notify::{RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sky_core::{Clock, Event, EventFilter, SystemClock, TaskId, Trigger};
use sky_storage::TaskStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How often quiet periods are checked.
const POLL: Duration = Duration::from_millis(100);

enum WatchSignal {
    Changed(TaskId),
    Failed(TaskId, String),
}

struct WatchEntry {
    /// Held to keep the OS subscription alive.
    _watcher: notify::RecommendedWatcher,
    last_change: Option<Instant>,
    pending_refire: bool,
}

pub struct Watcher<C: Clock = SystemClock> {
    tasks: TaskStore,
    runner: Arc<dyn Activate>,
    bus: Arc<EventBus>,
    clock: C,
    debounce: Duration,
    entries: Mutex<HashMap<TaskId, WatchEntry>>,
    tx: mpsc::UnboundedSender<WatchSignal>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<WatchSignal>>,
}

impl<C: Clock> Watcher<C> {
    pub fn new(
        tasks: TaskStore,
        runner: Arc<dyn Activate>,
        bus: Arc<EventBus>,
        clock: C,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tasks,
            runner,
            bus,
            clock,
            debounce,
            entries: Mutex::new(HashMap::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// (Re)build the full subscription set from the store.
    pub fn rebuild(&self) -> Result<usize, EngineError> {
        let wanted: Vec<_> = self
            .tasks
            .list_plannable()?
            .into_iter()
            .filter(|task| task.wants_watch())
            .collect();
        let mut entries = self.entries.lock();
        let keep: std::collections::HashSet<TaskId> = wanted.iter().map(|t| t.id).collect();
        entries.retain(|id, _| keep.contains(id));
        for task in wanted {
            if entries.contains_key(&task.id) {
                continue;
            }
            match self.subscribe_path(task.id, &task.source_path) {
                Ok(watcher) => {
                    entries.insert(
                        task.id,
                        WatchEntry { _watcher: watcher, last_change: None, pending_refire: false },
                    );
                    tracing::info!(task = %task.name, path = %task.source_path.display(), "watching");
                }
                Err(e) => {
                    tracing::warn!(task = %task.name, error = %e, "watch subscription failed");
                    self.runner.note_watch_error(
                        &task.id,
                        format!("watch on {} failed: {e}", task.source_path.display()),
                    );
                }
            }
        }
        Ok(entries.len())
    }

    /// Re-derive the watch for one task after a plan change.
    pub fn replan(&self, task_id: &TaskId) {
        let wanted = self.tasks.get(task_id).map(|t| t.wants_watch()).unwrap_or(false);
        if !wanted {
            self.entries.lock().remove(task_id);
            return;
        }
        // Drop and re-add so a moved source path re-subscribes.
        self.entries.lock().remove(task_id);
        if let Ok(task) = self.tasks.get(task_id) {
            match self.subscribe_path(task.id, &task.source_path) {
                Ok(watcher) => {
                    self.entries.lock().insert(
                        task.id,
                        WatchEntry { _watcher: watcher, last_change: None, pending_refire: false },
                    );
                }
                Err(e) => {
                    self.runner.note_watch_error(
                        &task.id,
                        format!("watch on {} failed: {e}", task.source_path.display()),
                    );
                }
            }
        }
    }

    fn subscribe_path(
        &self,
        task_id: TaskId,
        path: &std::path::Path,
    ) -> Result<notify::RecommendedWatcher, notify::Error> {
        let tx = self.tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) if is_change(&event.kind) => {
                    let _ = tx.send(WatchSignal::Changed(task_id));
                }
                Err(e) => {
                    let _ = tx.send(WatchSignal::Failed(task_id, e.to_string()));
                }
                Ok(_) => {}
            },
        )?;
        watcher.watch(path, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    fn mark_changed(&self, task_id: TaskId) {
        if let Some(entry) = self.entries.lock().get_mut(&task_id) {
            entry.last_change = Some(self.clock.now());
        }
    }

    fn mark_failed(&self, task_id: TaskId, message: String) {
        tracing::warn!(task_id = %task_id, message, "watch error");
        self.runner.note_watch_error(&task_id, message);
    }

    /// Activate every task whose change burst has gone quiet.
    pub async fn fire_due(&self) {
        let now = self.clock.now();
        let due: Vec<TaskId> = {
            let mut entries = self.entries.lock();
            let due: Vec<TaskId> = entries
                .iter()
                .filter(|(_, e)| {
                    e.last_change
                        .map(|at| now.duration_since(at) >= self.debounce)
                        .unwrap_or(false)
                })
                .map(|(id, _)| *id)
                .collect();
            for id in &due {
                if let Some(entry) = entries.get_mut(id) {
                    entry.last_change = None;
                }
            }
            due
        };
        for task_id in due {
            self.activate(task_id).await;
        }
    }

    async fn activate(&self, task_id: TaskId) {
        match self.runner.activate_task(&task_id, Trigger::Realtime).await {
            Ok(job) => {
                tracing::info!(task_id = %task_id, job_id = %job.id, "realtime activation");
            }
            Err(EngineError::TaskBusy) => {
                // Coalesce: exactly one more activation once the job ends.
                if let Some(entry) = self.entries.lock().get_mut(&task_id) {
                    entry.pending_refire = true;
                }
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "realtime activation failed");
            }
        }
    }

    async fn handle_event(&self, event: Event) {
        match event {
            Event::TaskPlanChanged { task_id } => self.replan(&task_id),
            Event::Progress(progress) if progress.is_terminal() => {
                let refire = {
                    let mut entries = self.entries.lock();
                    match entries.get_mut(&progress.task_id) {
                        Some(entry) if entry.pending_refire => {
                            entry.pending_refire = false;
                            true
                        }
                        _ => false,
                    }
                };
                if refire {
                    self.activate(progress.task_id).await;
                }
            }
            Event::Progress(_) => {}
        }
    }

    /// Main loop: change signals, debounce polling, and bus events.
    pub async fn run(&self, shutdown: CancellationToken) {
        if let Err(e) = self.rebuild() {
            tracing::error!(error = %e, "building watch set failed");
        }
        let sub = self.bus.subscribe(EventFilter::any());
        let mut rx = self.rx.lock().await;
        let mut poll = tokio::time::interval(POLL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(WatchSignal::Changed(id)) => self.mark_changed(id),
                    Some(WatchSignal::Failed(id, message)) => self.mark_failed(id, message),
                    None => break,
                },
                event = sub.recv() => self.handle_event(event).await,
                _ = poll.tick() => self.fire_due().await,
            }
        }
        self.entries.lock().clear();
        tracing::info!("watcher stopped");
    }
}

fn is_change(kind: &notify::EventKind) -> bool {
    use notify::EventKind;
    matches!(
        kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
