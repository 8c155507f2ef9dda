// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only providers with controllable behavior.

use super::{ConfigProvider, Quota, RemoteFs, SyncContext, SyncError, SyncPlan};
use sky_core::JobCounters;
use std::path::PathBuf;
use std::time::Duration;

/// Blocks inside `sync` until its gate file appears (or cancellation).
/// Lets tests hold a job in RUNNING for as long as they need.
#[derive(Debug)]
pub struct SlowFs {
    gate: PathBuf,
}

impl SlowFs {
    pub fn from_section(name: &str, provider: &dyn ConfigProvider) -> Result<Self, SyncError> {
        let gate = provider
            .get_value(name, "gate")
            .ok_or_else(|| SyncError::ConnectionFailed(format!("section {name:?} has no gate")))?;
        Ok(Self { gate: PathBuf::from(gate) })
    }
}

impl RemoteFs for SlowFs {
    fn kind(&self) -> &str {
        "slow"
    }

    fn about(&self) -> Result<Quota, SyncError> {
        Ok(Quota::default())
    }

    fn sync(&self, _plan: &SyncPlan, ctx: &SyncContext<'_>) -> Result<JobCounters, SyncError> {
        let mut counters = JobCounters { files_total: 1, bytes_total: 1, ..Default::default() };
        ctx.observer.on_progress(counters);
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if self.gate.exists() {
                counters.record_file(1);
                ctx.observer.on_progress(counters);
                return Ok(counters);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Panics inside `sync`, for panic-containment coverage.
#[derive(Debug)]
pub struct PanicFs;

impl RemoteFs for PanicFs {
    fn kind(&self) -> &str {
        "panic"
    }

    fn about(&self) -> Result<Quota, SyncError> {
        Ok(Quota::default())
    }

    fn sync(&self, _plan: &SyncPlan, _ctx: &SyncContext<'_>) -> Result<JobCounters, SyncError> {
        panic!("synthetic provider failure");
    }
}
