// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Import connections from an INI-style config blob.
//!
//! `preview` parses without side effects; `execute` applies each selected
//! section in its own transaction and aggregates per-item outcomes.

use indexmap::IndexMap;
use sky_core::{Coded, ConnectionConfig, ErrorCode};
use sky_storage::{ConnectionStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("duplicate section names: {0:?}")]
    Duplicate(Vec<String>),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Coded for ImportError {
    fn code(&self) -> ErrorCode {
        match self {
            ImportError::Duplicate(_) => ErrorCode::ImportDuplicate,
            ImportError::Storage(e) => e.code(),
        }
    }
}

/// One parsed section, ready to become a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub name: String,
    pub kind: String,
    pub config: ConnectionConfig,
    /// True iff a connection with this name already exists.
    pub will_overwrite: bool,
}

/// What happened to one selected item during `execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Overwritten,
    /// Existed and overwrite was not requested.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub name: String,
    pub outcome: ImportOutcome,
}

pub struct Importer {
    connections: ConnectionStore,
}

impl Importer {
    pub fn new(connections: ConnectionStore) -> Self {
        Self { connections }
    }

    /// Parse the blob into a proposed connection set. Fails (with no store
    /// writes) when the blob repeats a section name.
    pub fn preview(&self, blob: &str) -> Result<Vec<ImportItem>, ImportError> {
        let (sections, duplicates) = parse_sections(blob);
        if !duplicates.is_empty() {
            return Err(ImportError::Duplicate(duplicates));
        }
        sections
            .into_iter()
            .map(|(name, pairs)| {
                let config: ConnectionConfig = pairs.into_iter().collect();
                let kind = config.kind().unwrap_or_default().to_string();
                let will_overwrite = self.connections.exists(&name)?;
                Ok(ImportItem { name, kind, config, will_overwrite })
            })
            .collect()
    }

    /// Apply the selected sections. Each item is one transaction; one
    /// item's failure never rolls back the others.
    pub fn execute(
        &self,
        blob: &str,
        selection: &[String],
        overwrite: bool,
    ) -> Result<Vec<ImportResult>, ImportError> {
        let items = self.preview(blob)?;
        let mut results = Vec::new();
        for item in items {
            if !selection.iter().any(|name| name == &item.name) {
                continue;
            }
            let outcome = if item.will_overwrite && !overwrite {
                ImportOutcome::Skipped
            } else {
                let existed = item.will_overwrite;
                match self.connections.replace_by_name(&item.name, &item.kind, item.config) {
                    Ok(_) if existed => ImportOutcome::Overwritten,
                    Ok(_) => ImportOutcome::Created,
                    Err(e) => ImportOutcome::Failed(e.to_string()),
                }
            };
            results.push(ImportResult { name: item.name, outcome });
        }
        Ok(results)
    }
}

/// Parse `[section]` / `key = value` lines. Returns sections in blob order
/// plus any names repeated within the blob. Empty and `DEFAULT` sections
/// are skipped; `#`/`;` lines are comments.
#[allow(clippy::type_complexity)]
fn parse_sections(blob: &str) -> (IndexMap<String, Vec<(String, String)>>, Vec<String>) {
    let mut sections: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
    let mut duplicates = Vec::new();
    let mut current: Option<String> = None;

    for line in blob.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim();
            if name.is_empty() || name.eq_ignore_ascii_case("DEFAULT") {
                current = None;
                continue;
            }
            if sections.contains_key(name) && !duplicates.iter().any(|d| d == name) {
                duplicates.push(name.to_string());
            }
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }
        let Some(section) = &current else { continue };
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            if key.is_empty() {
                continue;
            }
            if let Some(pairs) = sections.get_mut(section) {
                pairs.push((key, value.trim().to_string()));
            }
        }
    }
    (sections, duplicates)
}

#[cfg(test)]
#[path = "importer_tests.rs"]
mod tests;
