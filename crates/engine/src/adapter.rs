// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous key/value view over the connection store, exposed to the
//! remote-FS library.
//!
//! Writes arrive from two directions: the runner's own control flow and
//! the library's worker threads (OAuth token refresh mid-job). Writes are
//! serialized per section name; reads run concurrently. Every mutation
//! evicts the section's cached FS handle.

use crate::fs_cache::FsCache;
use crate::remotefs::{ConfigProvider, SyncError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use sky_storage::ConnectionStore;

pub struct ConfigAdapter {
    store: ConnectionStore,
    section_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    cache: Mutex<Weak<FsCache>>,
}

impl ConfigAdapter {
    pub fn new(store: ConnectionStore) -> Self {
        Self {
            store,
            section_locks: Mutex::new(HashMap::new()),
            cache: Mutex::new(Weak::new()),
        }
    }

    /// Late-bind the cache this adapter invalidates. The cache holds the
    /// adapter strongly; this back-reference stays weak.
    pub fn bind_cache(&self, cache: &Arc<FsCache>) {
        *self.cache.lock() = Arc::downgrade(cache);
    }

    fn section_lock(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.section_locks
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn invalidate(&self, name: &str) {
        if let Some(cache) = self.cache.lock().upgrade() {
            cache.invalidate(name);
        }
    }
}

impl ConfigProvider for ConfigAdapter {
    fn sections(&self) -> Vec<String> {
        self.store.names().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "listing config sections failed");
            Vec::new()
        })
    }

    fn has_section(&self, name: &str) -> bool {
        self.store.exists(name).unwrap_or(false)
    }

    fn delete_section(&self, name: &str) {
        let lock = self.section_lock(name);
        let _guard = lock.lock();
        if let Err(e) = self.store.delete_by_name(name) {
            tracing::warn!(section = name, error = %e, "deleting config section failed");
        }
        self.invalidate(name);
    }

    fn keys(&self, section: &str) -> Vec<String> {
        match self.store.try_get_by_name(section) {
            Ok(Some(conn)) => conn.config.keys().map(str::to_string).collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(section, error = %e, "reading config keys failed");
                Vec::new()
            }
        }
    }

    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        match self.store.try_get_by_name(section) {
            Ok(conn) => conn.and_then(|c| c.config.get(key).map(str::to_string)),
            Err(e) => {
                tracing::warn!(section, key, error = %e, "reading config value failed");
                None
            }
        }
    }

    fn set_value(&self, section: &str, key: &str, value: &str) -> Result<(), SyncError> {
        let lock = self.section_lock(section);
        let _guard = lock.lock();
        self.store
            .set_value(section, key, value)
            .map_err(|e| SyncError::Fatal(format!("persisting {section}/{key} failed: {e}")))?;
        self.invalidate(section);
        Ok(())
    }

    fn delete_key(&self, section: &str, key: &str) -> bool {
        let lock = self.section_lock(section);
        let _guard = lock.lock();
        let removed = match self.store.delete_key(section, key) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(section, key, error = %e, "deleting config key failed");
                false
            }
        };
        self.invalidate(section);
        removed
    }

    fn serialize(&self) -> serde_json::Value {
        let mut sections = serde_json::Map::new();
        match self.store.list() {
            Ok(connections) => {
                for conn in connections {
                    let map: serde_json::Map<String, serde_json::Value> = conn
                        .config
                        .iter()
                        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                        .collect();
                    sections.insert(conn.name, serde_json::Value::Object(map));
                }
            }
            Err(e) => tracing::warn!(error = %e, "serializing config snapshot failed"),
        }
        serde_json::Value::Object(sections)
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
