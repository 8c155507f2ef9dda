// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection entity: a named, persisted provider configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Unique identifier for a Connection.
    pub struct ConnectionId;
}

/// The config key holding the provider type tag.
pub const CONFIG_TYPE_KEY: &str = "type";

/// Decrypted provider configuration: an opaque string map.
///
/// Keys are meaningful only to the remote-FS provider, except
/// [`CONFIG_TYPE_KEY`] which this system reads to pick the provider.
/// Backed by a `BTreeMap` so serialized snapshots are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionConfig(BTreeMap<String, String>);

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The provider type tag, when present.
    pub fn kind(&self) -> Option<&str> {
        self.get(CONFIG_TYPE_KEY)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ConnectionConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ConnectionConfig {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

/// A named provider configuration reaching one remote filesystem.
///
/// The encrypted config blob never leaves the storage layer; reads always
/// carry the decrypted map by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// Unique human-readable name, also the remote-FS section name.
    pub name: String,
    /// Provider type tag (`local`, `s3`, `onedrive`, ...).
    pub kind: String,
    pub config: ConnectionConfig,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Connection {
    /// Invariant: when the config carries a type tag it must equal `kind`.
    pub fn kind_matches_config(&self) -> bool {
        match self.config.kind() {
            Some(tag) => tag == self.kind,
            None => true,
        }
    }
}

/// Derived, never-persisted FS handle state for a Connection.
///
/// Recomputed from FSCache membership on every read, so a restart can
/// never report a stale status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    Loading,
    Error,
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoadStatus::Loaded => "loaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Error => "error",
        })
    }
}

/// Test builder.
#[cfg(any(test, feature = "test-support"))]
pub struct ConnectionBuilder {
    kind: String,
    config: ConnectionConfig,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self { kind: "local".into(), config: ConnectionConfig::from([("type", "local")]) }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ConnectionBuilder {
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Connection {
        Connection {
            id: ConnectionId::generate(),
            name: "test-conn".into(),
            kind: self.kind,
            config: self.config,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
