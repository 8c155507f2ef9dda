// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error taxonomy.

use sky_core::{Coded, ErrorCode, InvalidTask};

use crate::crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("name already in use: {0}")]
    NameConflict(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error(transparent)]
    InvalidTask(#[from] InvalidTask),
    #[error("connection kind {kind:?} does not match config type {tag:?}")]
    KindMismatch { kind: String, tag: String },
    #[error("connection {0} has active jobs")]
    ConnectionBusy(String),
    #[error("job {0} is not active")]
    JobNotActive(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl Coded for StorageError {
    fn code(&self) -> ErrorCode {
        match self {
            StorageError::NotFound(_) => ErrorCode::NotFound,
            StorageError::NameConflict(_) => ErrorCode::NameConflict,
            StorageError::InvalidTask(_)
            | StorageError::KindMismatch { .. }
            | StorageError::EmptyName => ErrorCode::ValidationFailed,
            StorageError::ConnectionBusy(_) => ErrorCode::TaskBusy,
            StorageError::JobNotActive(_) => ErrorCode::JobNotActive,
            StorageError::Crypto(CryptoError::Decryption) => ErrorCode::DecryptionFailed,
            StorageError::Crypto(_) | StorageError::Db(_) => ErrorCode::Internal,
        }
    }
}
