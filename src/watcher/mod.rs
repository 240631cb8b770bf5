//! Filesystem watch and fan-out.
//!
//! # Architecture
//!
//! ```text
//! Watcher
//!   - FileSystemWatch (polling thread: walk, snapshot, diff)
//!   - dispatch loop (translate -> stamp -> serialize -> broadcast)
//!   - SubscriberRegistry (identity-keyed conduits, one mutex)
//! ```
//!
//! Filesystem change -> RawEvent -> dispatch loop -> Message bytes ->
//! every registered subscriber conduit.

mod error;
mod event;
mod filter;
mod fs_watch;
mod registry;
mod relay;
mod scan;
mod translate;

pub use error::WatchError;
pub use event::{FsOp, RawEvent};
pub use filter::PathFilter;
pub use fs_watch::FileSystemWatch;
pub use registry::{SubscriberId, SubscriberRegistry};
pub use relay::Watcher;
pub use translate::{Action, ChangeKind, ChangeNotice, FileType, Message, translate};
