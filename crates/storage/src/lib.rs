// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sky-storage: SQLite persistence and config-map encryption for SkySync.
//!
//! One [`Database`] handle is shared by all stores; writes are short
//! transactions under a single connection mutex, and foreign keys cascade
//! connection → task → job → job_log deletes.

mod connections;
mod crypto;
mod db;
mod error;
mod jobs;
mod logs;
mod tasks;

pub use connections::{ConnectionChanges, ConnectionStore};
pub use crypto::{CryptoError, SecretBox};
pub use db::Database;
pub use error::StorageError;
pub use jobs::JobStore;
pub use logs::LogStore;
pub use tasks::{JobSummary, NewTask, TaskPatch, TaskStore, TaskWithLatestJob};
