// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide memoized FS handles, keyed by connection name.
//!
//! Construction is single-flight: concurrent `open` calls for one name
//! coalesce onto one factory run. A failed construction leaves the slot
//! empty, so the next open retries. `is_loaded` never constructs.

use crate::remotefs::{ConfigProvider, FsFactory, RemoteFs, SyncError};
use parking_lot::Mutex;
use sky_core::LoadStatus;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<dyn RemoteFs>>>;

pub struct FsCache {
    provider: Arc<dyn ConfigProvider>,
    slots: Mutex<HashMap<String, Slot>>,
    /// Names whose most recent construction attempt failed.
    failed: Mutex<HashSet<String>>,
}

impl FsCache {
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self {
            provider,
            slots: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// Get or build the FS handle for a connection name.
    pub async fn open(&self, name: &str) -> Result<Arc<dyn RemoteFs>, SyncError> {
        let slot = Arc::clone(
            self.slots
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        let provider = Arc::clone(&self.provider);
        let owned = name.to_string();
        let result = slot
            .get_or_try_init(|| async move {
                // Construction may touch the network for real providers.
                tokio::task::spawn_blocking(move || FsFactory::new_fs(&owned, provider.as_ref()))
                    .await
                    .map_err(|e| SyncError::Fatal(format!("fs construction aborted: {e}")))?
            })
            .await
            .cloned();
        match &result {
            Ok(_) => {
                self.failed.lock().remove(name);
            }
            Err(_) => {
                self.failed.lock().insert(name.to_string());
            }
        }
        result
    }

    /// Derived load state for API reads; never triggers construction.
    pub fn load_status(&self, name: &str) -> LoadStatus {
        if self.is_loaded(name) {
            LoadStatus::Loaded
        } else if self.failed.lock().contains(name) {
            LoadStatus::Error
        } else {
            LoadStatus::Loading
        }
    }

    /// Non-blocking introspection; never triggers construction.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.slots.lock().get(name).map(|slot| slot.initialized()).unwrap_or(false)
    }

    /// Drop the cached handle for a name (config changed or deleted).
    pub fn invalidate(&self, name: &str) {
        if self.slots.lock().remove(name).is_some() {
            tracing::debug!(connection = name, "evicted cached fs handle");
        }
        self.failed.lock().remove(name);
    }

    pub fn invalidate_all(&self) {
        self.slots.lock().clear();
        self.failed.lock().clear();
    }

    /// Names with a fully-constructed handle.
    pub fn loaded_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "fs_cache_tests.rs"]
mod tests;
