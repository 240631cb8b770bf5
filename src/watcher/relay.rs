//! The orchestrator: owns the watch lifecycle and the dispatch loop.
//!
//! One dispatch thread is the single consumer of the watch's event stream.
//! Per event: translate, stamp the storage token, serialize, broadcast.
//! Events are handled strictly in arrival order; broadcast happens inline,
//! so a subscriber that never drains stalls dispatch and, through the
//! bounded event queue, eventually the polling thread itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};

use crate::config::Settings;
use crate::{debug_event, log_event};

use super::error::WatchError;
use super::filter::PathFilter;
use super::fs_watch::FileSystemWatch;
use super::registry::{SubscriberId, SubscriberRegistry};
use super::translate::translate;

/// Recursive watch over a directory tree with multi-subscriber fan-out.
///
/// Fatal-error policy is fail-fast: the dispatch loop exits on the first
/// runtime scan or serialization error, and [`Watcher::close`] surfaces it.
/// There is no rebuild or retry.
pub struct Watcher {
    registry: Arc<SubscriberRegistry>,
    fs_watch: FileSystemWatch,
    dispatch: Option<JoinHandle<Result<(), WatchError>>>,
    done: Receiver<()>,
}

impl Watcher {
    /// Watch the process working directory.
    ///
    /// Fails if the storage token is blank, the working directory cannot
    /// be determined, or the initial recursive enumeration fails.
    pub fn new(settings: &Settings) -> Result<Self, WatchError> {
        let root = std::env::current_dir().map_err(|source| WatchError::WorkingDir { source })?;
        Self::rooted(settings, root)
    }

    /// Watch an explicit root. For embedders and tests; the CLI only ever
    /// watches the working directory.
    pub fn rooted(settings: &Settings, root: PathBuf) -> Result<Self, WatchError> {
        settings.validate()?;

        let fs_watch = FileSystemWatch::new(
            root.clone(),
            PathFilter::new(),
            Duration::from_millis(settings.watch.poll_interval_ms),
            settings.watch.queue_capacity,
        )?;
        let registry = Arc::new(SubscriberRegistry::new());

        let events = fs_watch.events().clone();
        let errors = fs_watch.errors().clone();
        let closed = fs_watch.closed().clone();
        let dispatch_registry = Arc::clone(&registry);
        let storage = settings.storage_token.clone();
        let dispatch_root = root.clone();

        // Disconnects when the dispatch loop returns, however it returns.
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let dispatch = thread::Builder::new()
            .name("fsrelay-dispatch".into())
            .spawn(move || {
                let _done = done_tx;
                dispatch_loop(
                    &dispatch_root,
                    &storage,
                    &events,
                    &errors,
                    &closed,
                    &dispatch_registry,
                )
            })
            .map_err(|source| WatchError::Scan { path: root, source })?;

        log_event!("watcher", "started");

        Ok(Self {
            registry,
            fs_watch,
            dispatch: Some(dispatch),
            done: done_rx,
        })
    }

    /// Register a subscriber conduit for serialized messages.
    pub fn listen(&self, conduit: Sender<Vec<u8>>) -> SubscriberId {
        self.registry.subscribe(conduit)
    }

    /// Remove a subscriber conduit. No-op if already removed.
    pub fn unlisten(&self, id: SubscriberId) {
        self.registry.unsubscribe(id);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Disconnects when the dispatch loop has terminated, normally or
    /// fatally. Call [`Watcher::close`] afterwards to learn which.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    /// Stop the watch, join the dispatch loop, and surface any fatal error
    /// it terminated with. Idempotent.
    pub fn close(&mut self) -> Result<(), WatchError> {
        self.fs_watch.close();
        match self.dispatch.take() {
            Some(handle) => {
                let outcome = handle.join().unwrap_or(Err(WatchError::Closed));
                log_event!("watcher", "stopped");
                outcome
            }
            None => Ok(()),
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn dispatch_loop(
    root: &std::path::Path,
    storage: &str,
    events: &Receiver<super::event::RawEvent>,
    errors: &Receiver<WatchError>,
    closed: &Receiver<()>,
    registry: &SubscriberRegistry,
) -> Result<(), WatchError> {
    loop {
        // Closed wins over queued events: once the watch is closed, no
        // further broadcasts happen even if the queue is non-empty.
        if matches!(
            closed.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        ) {
            return Ok(());
        }

        select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    match translate(&event, root) {
                        Some(notice) => {
                            let bytes = serde_json::to_vec(&notice.into_message(storage))?;
                            registry.broadcast(&bytes);
                        }
                        None => {
                            debug_event!("dispatch", "skipped", "{}", event.path.display());
                        }
                    }
                }
                // The event stream only ends when the polling thread is
                // gone: either a fatal error (pick it up) or close.
                Err(_) => return pending_error(errors),
            },
            recv(errors) -> res => return match res {
                Ok(err) => Err(err),
                Err(_) => Ok(()),
            },
            recv(closed) -> _ => return Ok(()),
        }
    }
}

fn pending_error(errors: &Receiver<WatchError>) -> Result<(), WatchError> {
    match errors.try_recv() {
        Ok(err) => Err(err),
        Err(_) => Ok(()),
    }
}
