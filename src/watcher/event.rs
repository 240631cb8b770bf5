//! Raw filesystem events produced by the polling watch.

use std::path::PathBuf;
use std::time::SystemTime;

/// Operation kinds the watch reports. Everything else the filesystem can
/// do is ignored at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Create,
    Remove,
    /// Same parent directory, new name.
    Rename,
    /// Different parent directory.
    Move,
    Write,
}

/// One unprocessed change notification, prior to translation.
///
/// `path` is absolute. `old_path` is present only for `Rename` and `Move`.
/// Ephemeral: consumed by the dispatch loop and discarded.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub op: FsOp,
    pub path: PathBuf,
    pub old_path: Option<PathBuf>,
    pub is_dir: bool,
    pub mtime: SystemTime,
}
