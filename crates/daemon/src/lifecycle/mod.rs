// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, signal handling, graceful shutdown.

mod startup;

pub use startup::startup;

use crate::config::{Config, ConfigError};
use crate::service::SyncService;
use sky_engine::{EngineError, EventBus, Runner};
use sky_storage::StorageError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("another instance holds the lock {0}")]
    LockFailed(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How long shutdown waits for cancelled jobs to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully-wired, running daemon.
pub struct Daemon {
    pub config: Config,
    pub service: Arc<SyncService>,
    pub bus: Arc<EventBus>,
    pub(crate) runner: Arc<Runner>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) planner_tasks: Vec<tokio::task::JoinHandle<()>>,
    /// Held for the process lifetime; releasing it frees the instance lock.
    pub(crate) _lock_file: std::fs::File,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").finish_non_exhaustive()
    }
}

impl Daemon {
    /// Block until SIGINT/SIGTERM, then shut down gracefully.
    pub async fn run_until_signalled(self) -> Result<(), LifecycleError> {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        self.shutdown().await;
        Ok(())
    }

    /// Stop planners, cancel live jobs, and wait for the pool to drain.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        self.runner.cancel_all();

        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while self.runner.has_active_jobs() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.runner.has_active_jobs() {
            tracing::warn!("jobs still draining at shutdown deadline");
        }
        for handle in self.planner_tasks.drain(..) {
            let _ = handle.await;
        }
        tracing::info!("daemon stopped");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::error!(error = %e, "installing SIGTERM handler failed");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
