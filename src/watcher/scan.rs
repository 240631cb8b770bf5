//! Recursive enumeration and snapshot diffing.
//!
//! The polling watch does not subscribe to OS notifications. Each cycle it
//! walks the tree under the watch root, records per-path metadata, and
//! diffs the result against the previous snapshot. Renames and moves are
//! recovered by pairing a disappeared path with an appeared path that has
//! the same file identity.

use std::collections::{BTreeMap, HashMap};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use super::error::WatchError;
use super::event::{FsOp, RawEvent};
use super::filter::PathFilter;

/// Stable identity used to pair the two halves of a rename.
#[cfg(unix)]
type FileId = (u64, u64); // (device, inode)

/// Fallback identity where inodes are unavailable. Weaker: an editor that
/// rewrites on save will not pair, degrading the rename to remove+create.
#[cfg(not(unix))]
type FileId = (bool, u64, SystemTime); // (is_dir, len, mtime)

#[cfg(unix)]
fn file_id(meta: &Metadata) -> FileId {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn file_id(meta: &Metadata) -> FileId {
    (
        meta.is_dir(),
        meta.len(),
        meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    )
}

/// Metadata recorded per visited path.
#[derive(Debug, Clone)]
pub(crate) struct EntryInfo {
    pub is_dir: bool,
    pub mtime: SystemTime,
    id: FileId,
}

impl EntryInfo {
    fn from_metadata(meta: &Metadata) -> Self {
        Self {
            is_dir: meta.is_dir(),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            id: file_id(meta),
        }
    }
}

/// One full enumeration pass. Sorted by path, so diffs emit events in a
/// deterministic order.
pub(crate) type Snapshot = BTreeMap<PathBuf, EntryInfo>;

/// Walk the tree under `root`, pruning ignored directories before their
/// descendants are visited.
///
/// With `strict` set (initial enumeration) every walk error is fatal.
/// Steady-state scans pass `strict = false`, which skips `NotFound`
/// errors: entries deleted between readdir and stat are a normal race
/// with the thing being watched, not a broken watch.
pub(crate) fn scan(root: &Path, filter: &PathFilter, strict: bool) -> Result<Snapshot, WatchError> {
    let mut snapshot = Snapshot::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !filter.is_ignored(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if !strict && is_not_found(&err) => continue,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                return Err(WatchError::Scan {
                    path,
                    source: err.into(),
                });
            }
        };

        match entry.metadata() {
            Ok(meta) => {
                snapshot.insert(entry.into_path(), EntryInfo::from_metadata(&meta));
            }
            Err(err) if !strict && is_not_found(&err) => continue,
            Err(err) => {
                return Err(WatchError::Scan {
                    path: entry.into_path(),
                    source: err.into(),
                });
            }
        }
    }

    Ok(snapshot)
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|io| io.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}

/// Diff two snapshots into raw events.
///
/// Appeared paths that share a file identity with a disappeared path become
/// one Rename (same parent) or Move (different parent); the rest become
/// Create and Remove. Surviving paths whose mtime changed become Write --
/// for directories too, since a directory's mtime moves when its entries
/// change. Dropping directory writes is the translator's call, not ours.
pub(crate) fn diff(old: &Snapshot, new: &Snapshot) -> Vec<RawEvent> {
    let mut events = Vec::new();

    let mut removed_by_id: HashMap<FileId, &Path> = old
        .iter()
        .filter(|(path, _)| !new.contains_key(*path))
        .map(|(path, info)| (info.id, path.as_path()))
        .collect();

    for (path, info) in new {
        if old.contains_key(path) {
            continue;
        }
        match removed_by_id.remove(&info.id) {
            Some(old_path) => {
                let op = if old_path.parent() == path.parent() {
                    FsOp::Rename
                } else {
                    FsOp::Move
                };
                events.push(RawEvent {
                    op,
                    path: path.clone(),
                    old_path: Some(old_path.to_path_buf()),
                    is_dir: info.is_dir,
                    mtime: info.mtime,
                });
            }
            None => events.push(RawEvent {
                op: FsOp::Create,
                path: path.clone(),
                old_path: None,
                is_dir: info.is_dir,
                mtime: info.mtime,
            }),
        }
    }

    // What is left in the map was never claimed as the source half of a
    // rename; everything else that disappeared is already accounted for.
    let unpaired: Vec<&Path> = removed_by_id.values().copied().collect();
    for (path, info) in old {
        if new.contains_key(path.as_path()) {
            continue;
        }
        if !unpaired.contains(&path.as_path()) {
            continue;
        }
        events.push(RawEvent {
            op: FsOp::Remove,
            path: path.clone(),
            old_path: None,
            is_dir: info.is_dir,
            mtime: info.mtime,
        });
    }

    for (path, info) in new {
        if let Some(previous) = old.get(path)
            && previous.mtime != info.mtime
        {
            events.push(RawEvent {
                op: FsOp::Write,
                path: path.clone(),
                old_path: None,
                is_dir: info.is_dir,
                mtime: info.mtime,
            });
        }
    }

    events
}
