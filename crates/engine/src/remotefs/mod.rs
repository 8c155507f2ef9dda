// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote-FS library boundary.
//!
//! The sync engine proper is a black box behind [`RemoteFs`]; it reads and
//! persists provider configuration exclusively through [`ConfigProvider`]
//! (no other back-channel) and reports per-file activity through
//! [`SyncObserver`] callbacks. [`FsFactory`] maps a section's `type` key to
//! a provider implementation.

mod local;
#[cfg(test)]
pub(crate) mod testfs;

pub use local::LocalFs;

use sky_core::{
    ConflictPolicy, FilterSet, JobCounters, LogEvent, SyncDirection, CONFIG_TYPE_KEY,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Synchronous key/value view over connection configuration.
///
/// Implementations must be safe to call from the library's own worker
/// threads: token refreshes arrive concurrently with reads from the
/// runner's control flow. Storage is write-through, so `load`/`save` are
/// no-ops.
pub trait ConfigProvider: Send + Sync {
    /// Names of all sections (connections).
    fn sections(&self) -> Vec<String>;
    fn has_section(&self, name: &str) -> bool;
    /// Best-effort delete; also evicts any cached FS handle.
    fn delete_section(&self, name: &str);
    fn keys(&self, section: &str) -> Vec<String>;
    fn get_value(&self, section: &str, key: &str) -> Option<String>;
    /// Create the section if absent, else merge `key → value`. Persists
    /// encrypted and evicts any cached FS handle for the section.
    fn set_value(&self, section: &str, key: &str, value: &str) -> Result<(), SyncError>;
    /// Remove a single key; returns whether it was removed.
    fn delete_key(&self, section: &str, key: &str) -> bool;
    fn load(&self) {}
    fn save(&self) {}
    /// Deterministic `{name: {key: value}}` snapshot for diagnostics.
    fn serialize(&self) -> serde_json::Value;
}

/// Remote quota as reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Quota {
    pub total: Option<u64>,
    pub used: Option<u64>,
    pub trashed: Option<u64>,
    pub other: Option<u64>,
    pub objects: Option<u64>,
}

/// One job's sync request, derived from its task.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub local_root: PathBuf,
    /// Path relative to the connection root.
    pub remote_path: String,
    pub direction: SyncDirection,
    pub filters: FilterSet,
    pub no_delete: bool,
    /// In-flight per-file transfer cap (file-level parallelism only).
    pub transfers: u32,
    pub conflict: ConflictPolicy,
}

/// Callbacks the library invokes from inside a sync.
pub trait SyncObserver: Send + Sync {
    /// Full counter snapshot after every observable change.
    fn on_progress(&self, counters: JobCounters);
    /// Per-operation log record (copy/delete/check/conflict/...).
    fn on_log(&self, event: LogEvent);
}

/// Per-call context: cooperative cancellation plus observer callbacks.
pub struct SyncContext<'a> {
    pub cancel: &'a CancellationToken,
    pub observer: &'a dyn SyncObserver,
}

/// Errors surfaced by providers.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Cancellation observed at a cooperative checkpoint.
    #[error("cancelled")]
    Cancelled,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Fatal(String),
}

/// A constructed filesystem handle for one connection.
pub trait RemoteFs: Send + Sync + std::fmt::Debug {
    /// Provider type tag this handle was built from.
    fn kind(&self) -> &str;
    fn about(&self) -> Result<Quota, SyncError>;
    /// Run one sync to completion (blocking). Returns the final counters;
    /// partial progress is delivered through the observer either way.
    fn sync(&self, plan: &SyncPlan, ctx: &SyncContext<'_>) -> Result<JobCounters, SyncError>;
}

/// Maps a section's `type` key to a provider implementation.
pub struct FsFactory;

impl FsFactory {
    /// Build an FS handle for a named section, reading its configuration
    /// through the provider contract.
    pub fn new_fs(
        name: &str,
        provider: &dyn ConfigProvider,
    ) -> Result<Arc<dyn RemoteFs>, SyncError> {
        let kind = provider.get_value(name, CONFIG_TYPE_KEY).ok_or_else(|| {
            SyncError::ConnectionFailed(format!("section {name:?} has no type"))
        })?;
        match kind.as_str() {
            "local" => Ok(Arc::new(LocalFs::from_section(name, provider)?)),
            #[cfg(test)]
            "slow" => Ok(Arc::new(testfs::SlowFs::from_section(name, provider)?)),
            #[cfg(test)]
            "panic" => Ok(Arc::new(testfs::PanicFs)),
            other => Err(SyncError::ConnectionFailed(format!(
                "unknown provider type {other:?} for section {name:?}"
            ))),
        }
    }
}
