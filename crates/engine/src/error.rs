// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use crate::remotefs::SyncError;
use sky_core::{Coded, ErrorCode};
use sky_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The task already has an active job.
    #[error("task has an active job")]
    TaskBusy,
    #[error("job {0} is not active")]
    JobNotActive(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("connection failed: {0}")]
    Connection(#[from] SyncError),
}

impl Coded for EngineError {
    fn code(&self) -> ErrorCode {
        match self {
            EngineError::TaskBusy => ErrorCode::TaskBusy,
            EngineError::JobNotActive(_) => ErrorCode::JobNotActive,
            EngineError::Storage(e) => e.code(),
            EngineError::Connection(_) => ErrorCode::ConnectionFailed,
        }
    }
}
