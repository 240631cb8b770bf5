//! Recursive polling watch over a directory tree.
//!
//! One background thread re-enumerates the tree at a fixed cadence and
//! pushes snapshot diffs into a bounded event channel. Three outcomes reach
//! the consumer, mirroring the dispatch loop's select arms: a raw event, a
//! fatal scan error, or the closed signal.
//!
//! The event channel is bounded, so a consumer that stops draining
//! eventually blocks the polling thread between scans. Changes made while
//! it is blocked coalesce into the next scan's diff.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::debug_event;

use super::error::WatchError;
use super::event::RawEvent;
use super::filter::PathFilter;
use super::scan::{Snapshot, diff, scan};

/// Owns the polling thread and the channels it feeds.
pub struct FileSystemWatch {
    events: Receiver<RawEvent>,
    errors: Receiver<WatchError>,
    closed: Receiver<()>,
    /// Dropping this disconnects `closed`, which both the polling thread
    /// and the dispatch loop treat as the shutdown signal.
    close_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FileSystemWatch {
    /// Enumerate `root` once (any error here is fatal) and start polling.
    pub fn new(
        root: PathBuf,
        filter: PathFilter,
        poll_interval: Duration,
        queue_capacity: usize,
    ) -> Result<Self, WatchError> {
        let initial = scan(&root, &filter, true)?;
        let spawn_err_path = root.clone();

        let (event_tx, event_rx) = bounded(queue_capacity);
        let (error_tx, error_rx) = bounded(1);
        let (close_tx, close_rx) = bounded::<()>(0);
        // Channels are MPMC: the polling thread and the consumer each hold
        // a receiver on the close channel, and both observe the disconnect
        // when `close_tx` is dropped.
        let poll_close_rx = close_rx.clone();

        let handle = thread::Builder::new()
            .name("fsrelay-poll".into())
            .spawn(move || {
                poll_loop(
                    &root,
                    &filter,
                    initial,
                    poll_interval,
                    &event_tx,
                    &error_tx,
                    &poll_close_rx,
                );
            })
            .map_err(|source| WatchError::Scan {
                path: spawn_err_path,
                source,
            })?;

        Ok(Self {
            events: event_rx,
            errors: error_rx,
            closed: close_rx,
            close_tx: Some(close_tx),
            handle: Some(handle),
        })
    }

    /// Raw events, in scan order.
    pub fn events(&self) -> &Receiver<RawEvent> {
        &self.events
    }

    /// Fatal watch errors. At most one is ever delivered.
    pub fn errors(&self) -> &Receiver<WatchError> {
        &self.errors
    }

    /// Disconnects when the watch is closed.
    pub fn closed(&self) -> &Receiver<()> {
        &self.closed
    }

    /// Stop the polling loop and release its thread. Safe to call once;
    /// subsequent calls are no-ops.
    pub fn close(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            drop(close_tx);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            debug_event!("fs-watch", "closed");
        }
    }
}

impl Drop for FileSystemWatch {
    fn drop(&mut self) {
        self.close();
    }
}

fn poll_loop(
    root: &std::path::Path,
    filter: &PathFilter,
    mut snapshot: Snapshot,
    poll_interval: Duration,
    event_tx: &Sender<RawEvent>,
    error_tx: &Sender<WatchError>,
    close_rx: &Receiver<()>,
) {
    debug_event!("fs-watch", "polling", "{} every {:?}", root.display(), poll_interval);

    loop {
        // Sleep for the interval, waking early on close.
        match close_rx.recv_timeout(poll_interval) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
        }

        let next = match scan(root, filter, false) {
            Ok(next) => next,
            Err(err) => {
                let _ = error_tx.send(err);
                return;
            }
        };

        for event in diff(&snapshot, &next) {
            // Blocking send is the backpressure contract; bail out if the
            // watch is closed while blocked.
            select! {
                send(event_tx, event) -> res => {
                    if res.is_err() {
                        return;
                    }
                }
                recv(close_rx) -> _ => return,
            }
        }

        snapshot = next;
    }
}
