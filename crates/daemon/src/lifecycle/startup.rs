// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use super::{Daemon, LifecycleError};
use crate::config::{Config, Environment};
use crate::service::SyncService;
use fs2::FileExt;
use sky_core::SystemClock;
use sky_engine::{ConfigAdapter, ConfigProvider, EventBus, FsCache, Runner, Scheduler, Watcher};
use sky_storage::{ConnectionStore, Database, JobStore, LogStore, SecretBox, TaskStore};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start the daemon: lock, open storage, recover, and launch planners.
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    config.validate()?;

    let secrets = SecretBox::new(&config.security.encryption_key);
    if secrets.is_plaintext() {
        match config.app.environment {
            Environment::Development => {
                warn!("PLAINTEXT CONFIG MODE: connection configs are stored unencrypted")
            }
            Environment::Production => warn!(
                "PLAINTEXT CONFIG MODE in production: set security.encryption_key; \
                 connection configs are stored unencrypted"
            ),
        }
    }

    // Acquire the instance lock before touching the database. Opened
    // without truncation so a failed attempt cannot wipe the owner's PID.
    let lock_path = config.lock_path();
    if let Some(parent) = lock_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(lock_path.clone()))?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // Storage and stores.
    let db = Arc::new(Database::open(&config.database.path)?);
    let secrets = Arc::new(secrets);
    let connections = ConnectionStore::new(Arc::clone(&db), Arc::clone(&secrets));
    let tasks = TaskStore::new(Arc::clone(&db));
    let jobs = JobStore::new(Arc::clone(&db));
    let logs = LogStore::new(Arc::clone(&db));

    // Engine plumbing: adapter ↔ cache, bus, runner.
    let bus = Arc::new(EventBus::new());
    let adapter = Arc::new(ConfigAdapter::new(connections.clone()));
    let cache = Arc::new(FsCache::new(Arc::clone(&adapter) as Arc<dyn ConfigProvider>));
    adapter.bind_cache(&cache);
    let runner = Arc::new(Runner::new(
        tasks.clone(),
        jobs.clone(),
        logs.clone(),
        connections.clone(),
        Arc::clone(&cache),
        Arc::clone(&bus),
        SystemClock,
        config.runner_config(),
    ));

    // Crash recovery: nothing may stay RUNNING from a previous process.
    let recovered = runner.recover()?;
    if recovered > 0 {
        warn!(count = recovered, "failed interrupted jobs from previous run");
    }

    // Planners.
    let shutdown = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::new(
        tasks.clone(),
        Arc::clone(&runner) as Arc<dyn sky_engine::Activate>,
        Arc::clone(&bus),
        SystemClock,
    ));
    let watcher = Arc::new(Watcher::new(
        tasks.clone(),
        Arc::clone(&runner) as Arc<dyn sky_engine::Activate>,
        Arc::clone(&bus),
        SystemClock,
        config.debounce(),
    ));
    let planner_tasks = vec![
        {
            let scheduler = Arc::clone(&scheduler);
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        },
        {
            let watcher = Arc::clone(&watcher);
            let token = shutdown.clone();
            tokio::spawn(async move { watcher.run(token).await })
        },
    ];

    let service = Arc::new(SyncService::new(
        connections,
        tasks,
        jobs,
        logs,
        Arc::clone(&cache),
        Arc::clone(&bus),
        Arc::clone(&runner),
    ));

    info!(
        db = %config.database.path.display(),
        workers = config.runner_config().workers,
        "daemon started"
    );

    Ok(Daemon {
        config,
        service,
        bus,
        runner,
        shutdown,
        planner_tasks,
        _lock_file: lock_file,
    })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
