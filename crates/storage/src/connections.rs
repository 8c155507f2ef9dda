// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent, uniquely-named Connections with encrypted config maps.

use crate::crypto::SecretBox;
use crate::db::{now_ms, Database};
use crate::error::StorageError;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use sky_core::{Connection, ConnectionConfig, ConnectionId, CONFIG_TYPE_KEY};

/// Partial update applied by [`ConnectionStore::update`]. The config map,
/// when present, replaces the stored map wholesale.
#[derive(Debug, Default, Clone)]
pub struct ConnectionChanges {
    pub name: Option<String>,
    pub config: Option<ConnectionConfig>,
}

/// CRUD over the `connections` table. Reads always decrypt; the decrypted
/// map is returned by value so callers cannot mutate stored state in place.
#[derive(Clone)]
pub struct ConnectionStore {
    db: Arc<Database>,
    secrets: Arc<SecretBox>,
}

impl ConnectionStore {
    pub fn new(db: Arc<Database>, secrets: Arc<SecretBox>) -> Self {
        Self { db, secrets }
    }

    pub fn create(
        &self,
        name: &str,
        kind: &str,
        config: ConnectionConfig,
    ) -> Result<Connection, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::EmptyName);
        }
        let config = normalize_config(kind, config)?;

        let now = now_ms();
        let conn = Connection {
            id: ConnectionId::generate(),
            name: name.to_string(),
            kind: kind.to_string(),
            config,
            created_at_ms: now,
            updated_at_ms: now,
        };
        let blob = self.secrets.encrypt(&conn.config)?;

        self.db.with_tx(|tx| {
            if name_taken(tx, &conn.name, None)? {
                return Err(StorageError::NameConflict(conn.name.clone()));
            }
            tx.execute(
                "INSERT INTO connections (id, name, kind, encrypted_config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![conn.id.as_str(), conn.name, conn.kind, blob, now as i64, now as i64],
            )?;
            Ok(())
        })?;
        Ok(conn)
    }

    pub fn get(&self, id: &ConnectionId) -> Result<Connection, StorageError> {
        self.db.with(|c| {
            let row = c
                .query_row(
                    "SELECT id, name, kind, encrypted_config, created_at, updated_at
                     FROM connections WHERE id = ?1",
                    params![id.as_str()],
                    raw_row,
                )
                .optional()?;
            match row {
                Some(raw) => self.decode(raw),
                None => Err(StorageError::NotFound(format!("connection {id}"))),
            }
        })
    }

    pub fn get_by_name(&self, name: &str) -> Result<Connection, StorageError> {
        self.try_get_by_name(name)?
            .ok_or_else(|| StorageError::NotFound(format!("connection {name:?}")))
    }

    pub fn try_get_by_name(&self, name: &str) -> Result<Option<Connection>, StorageError> {
        let raw = self.db.with(|c| {
            Ok(c.query_row(
                "SELECT id, name, kind, encrypted_config, created_at, updated_at
                 FROM connections WHERE name = ?1",
                params![name],
                raw_row,
            )
            .optional()?)
        })?;
        raw.map(|r| self.decode(r)).transpose()
    }

    pub fn list(&self) -> Result<Vec<Connection>, StorageError> {
        let rows = self.db.with(|c| {
            let mut stmt = c.prepare(
                "SELECT id, name, kind, encrypted_config, created_at, updated_at
                 FROM connections ORDER BY name",
            )?;
            let rows = stmt.query_map([], raw_row)?.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(|r| self.decode(r)).collect()
    }

    /// All connection names, for the remote-FS section listing.
    pub fn names(&self) -> Result<Vec<String>, StorageError> {
        self.db.with(|c| {
            let mut stmt = c.prepare("SELECT name FROM connections ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
    }

    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.db.with(|c| {
            let found: Option<i64> = c
                .query_row(
                    "SELECT 1 FROM connections WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Replace name and/or config. The provider kind follows the config's
    /// type tag and may only change while no job references the connection.
    pub fn update(
        &self,
        id: &ConnectionId,
        changes: ConnectionChanges,
    ) -> Result<Connection, StorageError> {
        let mut current = self.get(id)?;

        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(StorageError::EmptyName);
            }
            current.name = name;
        }
        if let Some(config) = changes.config {
            if let Some(tag) = config.kind() {
                current.kind = tag.to_string();
            }
            current.config = normalize_config(&current.kind, config)?;
        }
        current.updated_at_ms = now_ms();

        let blob = self.secrets.encrypt(&current.config)?;
        self.db.with_tx(|tx| {
            let stored_kind: String = tx.query_row(
                "SELECT kind FROM connections WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )?;
            if stored_kind != current.kind && active_job_count(tx, id)? > 0 {
                return Err(StorageError::ConnectionBusy(current.name.clone()));
            }
            if name_taken(tx, &current.name, Some(id))? {
                return Err(StorageError::NameConflict(current.name.clone()));
            }
            let changed = tx.execute(
                "UPDATE connections SET name = ?2, kind = ?3, encrypted_config = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    current.name,
                    current.kind,
                    blob,
                    current.updated_at_ms as i64
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("connection {id}")));
            }
            Ok(())
        })?;
        Ok(current)
    }

    /// Delete a connection and, through foreign-key cascades, its tasks,
    /// jobs, and job logs in one transaction. Returns the deleted record so
    /// the caller can evict the FS cache entry.
    pub fn delete(&self, id: &ConnectionId) -> Result<Connection, StorageError> {
        let current = self.get(id)?;
        self.db.with_tx(|tx| {
            let changed =
                tx.execute("DELETE FROM connections WHERE id = ?1", params![id.as_str()])?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("connection {id}")));
            }
            Ok(())
        })?;
        Ok(current)
    }

    /// Best-effort delete by section name, for the adapter contract.
    pub fn delete_by_name(&self, name: &str) -> Result<bool, StorageError> {
        self.db.with_tx(|tx| {
            Ok(tx.execute("DELETE FROM connections WHERE name = ?1", params![name])? > 0)
        })
    }

    /// Merge one key into a section, creating the connection when absent.
    /// This is the write path the remote-FS library uses to persist
    /// refreshed credentials, so it must stay a single transaction.
    pub fn set_value(&self, name: &str, key: &str, value: &str) -> Result<(), StorageError> {
        match self.try_get_by_name(name)? {
            Some(mut conn) => {
                conn.config.set(key, value);
                if key == CONFIG_TYPE_KEY {
                    conn.kind = value.to_string();
                }
                let blob = self.secrets.encrypt(&conn.config)?;
                self.db.with_tx(|tx| {
                    tx.execute(
                        "UPDATE connections SET kind = ?2, encrypted_config = ?3, updated_at = ?4
                         WHERE name = ?1",
                        params![name, conn.kind, blob, now_ms() as i64],
                    )?;
                    Ok(())
                })
            }
            None => {
                let kind = if key == CONFIG_TYPE_KEY { value } else { "" };
                let mut config = ConnectionConfig::new();
                config.set(key, value);
                self.create(name, kind, config).map(|_| ())
            }
        }
    }

    /// Remove one key from a section. Returns whether the key was present.
    pub fn delete_key(&self, name: &str, key: &str) -> Result<bool, StorageError> {
        let Some(mut conn) = self.try_get_by_name(name)? else {
            return Ok(false);
        };
        if !conn.config.remove(key) {
            return Ok(false);
        }
        let blob = self.secrets.encrypt(&conn.config)?;
        self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE connections SET encrypted_config = ?2, updated_at = ?3 WHERE name = ?1",
                params![name, blob, now_ms() as i64],
            )?;
            Ok(true)
        })
    }

    /// Create or wholesale-replace a named connection (import execute path).
    pub fn replace_by_name(
        &self,
        name: &str,
        kind: &str,
        config: ConnectionConfig,
    ) -> Result<Connection, StorageError> {
        match self.try_get_by_name(name)? {
            Some(existing) => {
                self.update(&existing.id, ConnectionChanges { name: None, config: Some(config) })
            }
            None => self.create(name, kind, config),
        }
    }

    fn decode(&self, raw: RawConnection) -> Result<Connection, StorageError> {
        let config = self.secrets.decrypt(&raw.blob)?;
        Ok(Connection {
            id: ConnectionId::from_string(raw.id),
            name: raw.name,
            kind: raw.kind,
            config,
            created_at_ms: raw.created_at as u64,
            updated_at_ms: raw.updated_at as u64,
        })
    }
}

struct RawConnection {
    id: String,
    name: String,
    kind: String,
    blob: Vec<u8>,
    created_at: i64,
    updated_at: i64,
}

fn raw_row(row: &rusqlite::Row<'_>) -> Result<RawConnection, rusqlite::Error> {
    Ok(RawConnection {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        blob: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn name_taken(
    tx: &rusqlite::Transaction<'_>,
    name: &str,
    exclude: Option<&ConnectionId>,
) -> Result<bool, StorageError> {
    let taken: Option<String> = tx
        .query_row("SELECT id FROM connections WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    Ok(match (taken, exclude) {
        (Some(found), Some(id)) => found != id.as_str(),
        (Some(_), None) => true,
        (None, _) => false,
    })
}

fn active_job_count(
    tx: &rusqlite::Transaction<'_>,
    id: &ConnectionId,
) -> Result<i64, StorageError> {
    Ok(tx.query_row(
        "SELECT COUNT(*) FROM jobs j JOIN tasks t ON j.task_id = t.id
         WHERE t.connection_id = ?1 AND j.status IN ('pending', 'running')",
        params![id.as_str()],
        |row| row.get(0),
    )?)
}

/// Ensure the stored map carries a matching type tag.
fn normalize_config(
    kind: &str,
    mut config: ConnectionConfig,
) -> Result<ConnectionConfig, StorageError> {
    match config.kind() {
        Some(tag) if tag != kind => Err(StorageError::KindMismatch {
            kind: kind.to_string(),
            tag: tag.to_string(),
        }),
        Some(_) => Ok(config),
        None => {
            if !kind.is_empty() {
                config.set(CONFIG_TYPE_KEY, kind);
            }
            Ok(config)
        }
    }
}

#[cfg(test)]
#[path = "connections_tests.rs"]
mod tests;
