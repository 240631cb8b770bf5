//! fsrelay: a notification fan-out layer over a recursive filesystem watch.
//!
//! Observes a directory tree with a polling scan, translates each change
//! into a flat JSON message, and broadcasts the serialized message to every
//! registered in-process subscriber channel.
//!
//! ```no_run
//! use fsrelay::{Settings, Watcher};
//!
//! let mut settings = Settings::default();
//! settings.storage_token = "token".to_string();
//!
//! let mut watcher = Watcher::new(&settings)?;
//! let (tx, rx) = crossbeam_channel::bounded(32);
//! let id = watcher.listen(tx);
//! let message_bytes = rx.recv()?;
//! watcher.unlisten(id);
//! watcher.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{Message, SubscriberId, WatchError, Watcher};
