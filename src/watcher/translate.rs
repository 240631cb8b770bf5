//! Translation of raw events into the canonical wire message.
//!
//! `translate` is a pure function over a raw event and the watch root. It
//! produces a [`ChangeNotice`], which knows everything about the change
//! except the storage identifier; the orchestrator stamps that in via
//! [`ChangeNotice::into_message`]. The split keeps filesystem semantics out
//! of credential handling and vice versa.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::event::{FsOp, RawEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Remove,
    Rename,
    Modify,
}

/// The shape of a change. Rename structurally carries src/dest and no
/// generic path; consumers detect the rename shape by the absence of
/// `path` in the serialized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created { path: String },
    Removed { path: String },
    Renamed { src_path: String, dest_path: String },
    Modified { path: String },
}

/// One translated change, minus the storage identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub file_type: FileType,
    pub kind: ChangeKind,
    pub mtime: String,
}

/// Wire representation. Flat JSON object; absent fields are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub storage: String,
    pub file_type: FileType,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    pub mtime: String,
}

impl ChangeNotice {
    /// Stamp the storage identifier and produce the wire message.
    pub fn into_message(self, storage: &str) -> Message {
        let (action, path, src_path, dest_path) = match self.kind {
            ChangeKind::Created { path } => (Action::Create, Some(path), None, None),
            ChangeKind::Removed { path } => (Action::Remove, Some(path), None, None),
            ChangeKind::Renamed {
                src_path,
                dest_path,
            } => (Action::Rename, None, Some(src_path), Some(dest_path)),
            ChangeKind::Modified { path } => (Action::Modify, Some(path), None, None),
        };
        Message {
            storage: storage.to_string(),
            file_type: self.file_type,
            action,
            path,
            src_path,
            dest_path,
            mtime: self.mtime,
        }
    }
}

/// Translate one raw event, relativizing paths against `root`.
///
/// Returns `None` for events that carry no signal: currently only Write on
/// a directory (a directory's mtime moves whenever its entries change, and
/// those entries report themselves).
pub fn translate(event: &RawEvent, root: &Path) -> Option<ChangeNotice> {
    let file_type = if event.is_dir {
        FileType::Directory
    } else {
        FileType::File
    };
    let path = relativize(&event.path, root);

    let kind = match event.op {
        FsOp::Create => ChangeKind::Created { path },
        FsOp::Remove => ChangeKind::Removed { path },
        FsOp::Rename | FsOp::Move => ChangeKind::Renamed {
            src_path: event
                .old_path
                .as_deref()
                .map(|old| relativize(old, root))
                .unwrap_or_default(),
            dest_path: path,
        },
        FsOp::Write if event.is_dir => return None,
        FsOp::Write => ChangeKind::Modified { path },
    };

    Some(ChangeNotice {
        file_type,
        kind,
        mtime: format_mtime(event.mtime),
    })
}

/// Strip the first occurrence of the root from an absolute path.
///
/// First occurrence only: a copy of the root string deeper in the path must
/// survive. The result keeps its leading separator (`/foo.txt`).
fn relativize(path: &Path, root: &Path) -> String {
    path.to_string_lossy()
        .replacen(root.to_string_lossy().as_ref(), "", 1)
}

/// Deterministic wire format for modification time:
/// `"<unix-seconds>.<subsecond-nanoseconds>"`, both base-10, the
/// nanosecond part at natural width (no zero padding).
fn format_mtime(mtime: SystemTime) -> String {
    let since_epoch = mtime.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{}", since_epoch.as_secs(), since_epoch.subsec_nanos())
}
