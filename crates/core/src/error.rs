// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the workspace.
//!
//! Every error surfaced to the API maps onto exactly one [`ErrorCode`];
//! crate-level error enums implement [`Coded`] to declare the mapping.

use serde::{Deserialize, Serialize};

/// Stable machine-readable codes surfaced to API clients. The serde
/// representation (`NOT_FOUND`, `TASK_BUSY`, ...) is the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    NameConflict,
    ValidationFailed,
    TaskBusy,
    JobNotActive,
    ConnectionFailed,
    DecryptionFailed,
    ImportDuplicate,
    Internal,
}

/// Implemented by error enums that map onto the API taxonomy.
pub trait Coded {
    fn code(&self) -> ErrorCode;
}
