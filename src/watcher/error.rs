//! Error types for the watch and fan-out layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
///
/// Nothing here is retried. Configuration and enumeration errors are fatal
/// at startup; runtime scan and serialization errors terminate the dispatch
/// loop and are surfaced through [`Watcher::close`](crate::watcher::Watcher::close).
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("storage token must not be blank (set FSRELAY_STORAGE_TOKEN)")]
    BlankToken,

    #[error("cannot determine working directory: {source}")]
    WorkingDir {
        #[source]
        source: std::io::Error,
    },

    #[error("cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event stream closed unexpectedly")]
    Closed,
}
