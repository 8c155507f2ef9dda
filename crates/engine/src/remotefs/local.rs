// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `local` provider: syncs against a directory on the same machine.
//!
//! Doubles as the reference implementation of the provider contract for
//! tests. Compare-by-size-and-mtime, per-file parallelism up to the plan's
//! `transfers`, cancellation checkpoints at file boundaries.

use super::{ConfigProvider, Quota, RemoteFs, SyncContext, SyncError, SyncPlan};
use parking_lot::Mutex;
use sky_core::{
    ConflictPolicy, FilterSet, JobCounters, LogAction, LogEvent, SyncDirection,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Two files whose mtimes differ by no more than this are considered
/// unchanged (filesystem timestamp granularity).
const MODIFY_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct FileMeta {
    size: u64,
    mtime: SystemTime,
}

/// Which tree a file lives in (for conflict siblings and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Remote,
}

impl Side {
    fn name(&self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

/// One planned file operation.
struct FileOp {
    rel: String,
    src_root: PathBuf,
    dst_root: PathBuf,
    size: u64,
    /// Rename this destination file to a conflict sibling before copying.
    conflict_loser: Option<(Side, SystemTime)>,
}

#[derive(Debug)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build from a configuration section: requires a `root` key.
    pub fn from_section(name: &str, provider: &dyn ConfigProvider) -> Result<Self, SyncError> {
        let root = provider.get_value(name, "root").ok_or_else(|| {
            SyncError::ConnectionFailed(format!("section {name:?} has no root"))
        })?;
        Ok(Self::new(root))
    }

    fn remote_root(&self, remote_path: &str) -> PathBuf {
        let rel = remote_path.trim_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

impl RemoteFs for LocalFs {
    fn kind(&self) -> &str {
        "local"
    }

    fn about(&self) -> Result<Quota, SyncError> {
        let files = scan(&self.root, &FilterSet::default(), false)?;
        Ok(Quota {
            used: Some(files.values().map(|m| m.size).sum()),
            objects: Some(files.len() as u64),
            ..Quota::default()
        })
    }

    fn sync(&self, plan: &SyncPlan, ctx: &SyncContext<'_>) -> Result<JobCounters, SyncError> {
        let remote_root = self.remote_root(&plan.remote_path);
        match plan.direction {
            SyncDirection::Upload => {
                one_way(&plan.local_root, &remote_root, plan, ctx)
            }
            SyncDirection::Download => {
                one_way(&remote_root, &plan.local_root, plan, ctx)
            }
            SyncDirection::Bidirectional => {
                bidirectional(&plan.local_root, &remote_root, plan, ctx)
            }
        }
    }
}

/// Recursively collect `rel path → meta` for included files. A missing
/// root is an error when `require_root`, otherwise an empty tree.
fn scan(
    root: &Path,
    filters: &FilterSet,
    require_root: bool,
) -> Result<BTreeMap<String, FileMeta>, SyncError> {
    let mut out = BTreeMap::new();
    if !root.exists() {
        if require_root {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", root.display()),
            )));
        }
        return Ok(out);
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let meta = entry.metadata()?;
            if meta.is_dir() {
                stack.push(path);
                continue;
            }
            if !meta.is_file() {
                continue;
            }
            let rel = relative(root, &path);
            if !filters.includes(&rel) {
                continue;
            }
            let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
            out.insert(rel, FileMeta { size: meta.len(), mtime });
        }
    }
    Ok(out)
}

fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Destination is out of date when size differs or mtimes diverge beyond
/// the modify window.
fn differs(src: &FileMeta, dst: &FileMeta) -> bool {
    if src.size != dst.size {
        return true;
    }
    let gap = match src.mtime.duration_since(dst.mtime) {
        Ok(d) => d,
        Err(e) => e.duration(),
    };
    gap > MODIFY_WINDOW
}

fn newer(a: &FileMeta, b: &FileMeta) -> bool {
    matches!(a.mtime.duration_since(b.mtime), Ok(d) if d > MODIFY_WINDOW)
}

fn one_way(
    src_root: &Path,
    dst_root: &Path,
    plan: &SyncPlan,
    ctx: &SyncContext<'_>,
) -> Result<JobCounters, SyncError> {
    let src = scan(src_root, &plan.filters, true)?;
    let dst = scan(dst_root, &plan.filters, false)?;

    let ops: Vec<FileOp> = src
        .iter()
        .filter(|&(rel, meta)| dst.get(rel).map(|d| differs(meta, d)).unwrap_or(true))
        .map(|(rel, meta)| FileOp {
            rel: rel.clone(),
            src_root: src_root.to_path_buf(),
            dst_root: dst_root.to_path_buf(),
            size: meta.size,
            conflict_loser: None,
        })
        .collect();

    let counters = Mutex::new(JobCounters {
        files_total: ops.len() as u64,
        bytes_total: ops.iter().map(|op| op.size).sum(),
        ..JobCounters::default()
    });
    ctx.observer.on_progress(*counters.lock());

    run_ops(ops, plan.transfers, ctx, &counters)?;

    if !plan.no_delete {
        for rel in dst.keys().filter(|rel| !src.contains_key(*rel)) {
            if ctx.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let path = dst_root.join(rel);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    ctx.observer.on_log(LogEvent::info(LogAction::Delete).with_path(rel));
                }
                Err(e) => {
                    counters.lock().record_error();
                    ctx.observer.on_log(
                        LogEvent::error(LogAction::Delete).with_path(rel).with_message(
                            e.to_string(),
                        ),
                    );
                }
            }
            ctx.observer.on_progress(*counters.lock());
        }
    }

    let result = *counters.lock();
    Ok(result)
}

fn bidirectional(
    local_root: &Path,
    remote_root: &Path,
    plan: &SyncPlan,
    ctx: &SyncContext<'_>,
) -> Result<JobCounters, SyncError> {
    let local = scan(local_root, &plan.filters, false)?;
    let remote = scan(remote_root, &plan.filters, false)?;

    let mut ops = Vec::new();
    let all: std::collections::BTreeSet<&String> = local.keys().chain(remote.keys()).collect();
    for rel in all {
        match (local.get(rel), remote.get(rel)) {
            (Some(meta), None) => ops.push(copy_op(rel, local_root, remote_root, meta.size, None)),
            (None, Some(meta)) => ops.push(copy_op(rel, remote_root, local_root, meta.size, None)),
            (Some(l), Some(r)) => {
                if !differs(l, r) {
                    continue;
                }
                // Winner by policy; mtime ties prefer the local side.
                let local_wins = match plan.conflict {
                    ConflictPolicy::Local => true,
                    ConflictPolicy::Remote => false,
                    ConflictPolicy::Newer | ConflictPolicy::Both => !newer(r, l),
                };
                let (src_root, dst_root, size, loser_side, loser_mtime) = if local_wins {
                    (local_root, remote_root, l.size, Side::Remote, r.mtime)
                } else {
                    (remote_root, local_root, r.size, Side::Local, l.mtime)
                };
                let keep_loser = (plan.conflict == ConflictPolicy::Both)
                    .then_some((loser_side, loser_mtime));
                ops.push(copy_op(rel, src_root, dst_root, size, keep_loser));
            }
            (None, None) => {}
        }
    }

    let counters = Mutex::new(JobCounters {
        files_total: ops.len() as u64,
        bytes_total: ops.iter().map(|op| op.size).sum(),
        ..JobCounters::default()
    });
    ctx.observer.on_progress(*counters.lock());

    run_ops(ops, plan.transfers, ctx, &counters)?;
    let result = *counters.lock();
    Ok(result)
}

fn copy_op(
    rel: &str,
    src_root: &Path,
    dst_root: &Path,
    size: u64,
    conflict_loser: Option<(Side, SystemTime)>,
) -> FileOp {
    FileOp {
        rel: rel.to_string(),
        src_root: src_root.to_path_buf(),
        dst_root: dst_root.to_path_buf(),
        size,
        conflict_loser,
    }
}

/// Drain the op queue with up to `transfers` worker threads, observing
/// cancellation at every file boundary.
fn run_ops(
    ops: Vec<FileOp>,
    transfers: u32,
    ctx: &SyncContext<'_>,
    counters: &Mutex<JobCounters>,
) -> Result<(), SyncError> {
    if ops.is_empty() {
        if ctx.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        return Ok(());
    }
    let workers = (transfers.max(1) as usize).min(ops.len());
    let queue = Mutex::new(VecDeque::from(ops));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if ctx.cancel.is_cancelled() {
                    return;
                }
                let Some(op) = queue.lock().pop_front() else {
                    return;
                };
                execute_op(&op, ctx, counters);
            });
        }
    });

    if ctx.cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

fn execute_op(op: &FileOp, ctx: &SyncContext<'_>, counters: &Mutex<JobCounters>) {
    match transfer_file(op) {
        Ok(conflict_sibling) => {
            counters.lock().record_file(op.size);
            if let Some(sibling) = conflict_sibling {
                ctx.observer.on_log(
                    LogEvent::info(LogAction::Conflict)
                        .with_path(&op.rel)
                        .with_message(format!("kept losing copy as {sibling}")),
                );
            }
            ctx.observer
                .on_log(LogEvent::info(LogAction::Copy).with_path(&op.rel).with_size(op.size));
        }
        Err(e) => {
            counters.lock().record_error();
            ctx.observer.on_log(
                LogEvent::error(LogAction::Copy).with_path(&op.rel).with_message(e.to_string()),
            );
        }
    }
    ctx.observer.on_progress(*counters.lock());
}

/// Copy one file, first preserving a conflict loser as a suffixed sibling
/// when requested. Returns the sibling's relative path, if one was made.
fn transfer_file(op: &FileOp) -> Result<Option<String>, std::io::Error> {
    let src = op.src_root.join(&op.rel);
    let dst = op.dst_root.join(&op.rel);

    let mut sibling = None;
    if let Some((side, mtime)) = &op.conflict_loser {
        if dst.exists() {
            let ts = mtime.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
            let renamed = format!("{}.conflict-{ts}-{}", op.rel, side.name());
            std::fs::rename(&dst, op.dst_root.join(&renamed))?;
            sibling = Some(renamed);
        }
    }

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&src, &dst)?;

    // Preserve mtime so unchanged files are not re-copied next run.
    if let Ok(meta) = std::fs::metadata(&src) {
        if let Ok(mtime) = meta.modified() {
            if let Ok(file) = std::fs::File::options().write(true).open(&dst) {
                let _ = file.set_modified(mtime);
            }
        }
    }
    Ok(sibling)
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
