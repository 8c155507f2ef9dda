// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral transfer progress snapshots.

use crate::connection::ConnectionId;
use crate::job::{JobCounters, JobId, JobStatus};
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// A full snapshot of one job's counters and status.
///
/// Never persisted; published on the event bus. Because every event is a
/// complete snapshot, a subscriber that loses events under backpressure
/// recovers as soon as the next one arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub connection_id: ConnectionId,
    pub task_id: TaskId,
    pub job_id: JobId,
    pub status: JobStatus,
    pub started_at_ms: u64,
    #[serde(flatten)]
    pub counters: JobCounters,
}

impl TransferProgress {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
