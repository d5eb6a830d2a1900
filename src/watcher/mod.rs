//! Change watcher: a live view over the transaction change-log.
//!
//! A [`Watcher`] observes a [`ChangeLog`](crate::changelog::ChangeLog) and
//! notifies subscribers whenever a watched document's revision number is
//! seen to change. Subscribers register a channel for one document or for
//! a whole collection; the watcher owns only the send-ends and never
//! closes them.
//!
//! All watcher state is owned by a single dispatcher thread. The public
//! methods post requests to it over a rendezvous channel and select on the
//! shutdown signal, so no caller can block on a watcher that has stopped.

mod dispatcher;
mod queue;
mod registry;
mod subscriptions;

use crate::changelog::ChangeLog;
use crate::error::{Result, WatchError};
use crate::types::{Change, DocId, Revno, WatchKey};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use self::dispatcher::{Dispatcher, Request};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use self::subscriptions::WatchInfo;

/// Configuration for a [`Watcher`].
#[derive(Clone, Debug)]
pub struct WatcherConfig {
    /// Delay between periodic sync passes.
    pub sync_period: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            sync_period: Duration::from_secs(5),
        }
    }
}

/// Watches collections and documents for revision changes.
///
/// The watcher reads the newest change-log entry id at startup, so history
/// predating its creation is never reported. It then syncs periodically
/// (and on demand via [`sync`](Watcher::sync) / [`start_sync`](Watcher::start_sync)),
/// dispatching one [`Change`] per observed revision change to each
/// interested subscriber.
///
/// Dropping the watcher shuts the dispatcher down; [`stop`](Watcher::stop)
/// does the same but also waits for it to finish and reports the terminal
/// cause.
pub struct Watcher {
    requests: Sender<Request>,

    /// Dropping this sender disconnects the shutdown channel, which every
    /// blocking select in the watcher treats as the stop signal.
    shutdown: Mutex<Option<Sender<()>>>,

    /// Caller-side view of the shutdown signal.
    shutdown_rx: Receiver<()>,

    /// Disconnects when the dispatcher thread has exited.
    dead: Receiver<()>,

    /// Terminal cause, written by the dispatcher thread on exit.
    cause: Arc<Mutex<Option<WatchError>>>,

    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Watcher {
    /// Create a watcher observing `log` with the default sync period.
    pub fn new(log: impl ChangeLog) -> Self {
        Self::with_config(log, WatcherConfig::default())
    }

    /// Create a watcher observing `log` with the given configuration.
    pub fn with_config(log: impl ChangeLog, config: WatcherConfig) -> Self {
        let (request_tx, request_rx) = bounded(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (dead_tx, dead_rx) = bounded::<()>(0);
        let cause = Arc::new(Mutex::new(None));

        let thread = {
            let cause = Arc::clone(&cause);
            let shutdown_rx = shutdown_rx.clone();
            thread::Builder::new()
                .name("docwatch-dispatcher".to_string())
                .spawn(move || {
                    let mut dispatcher = Dispatcher::new(
                        Box::new(log),
                        config.sync_period,
                        request_rx,
                        shutdown_rx,
                    );
                    if let Err(err) = dispatcher.run() {
                        *cause.lock() = Some(err);
                    }
                    drop(dead_tx);
                })
                .expect("failed to spawn watcher dispatcher thread")
        };

        Watcher {
            requests: request_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            dead: dead_rx,
            cause,
            thread: Mutex::new(Some(thread)),
        }
    }

    /// Start watching the document `id` in `collection`.
    ///
    /// A [`Change`] is sent on `ch` whenever the document's revision
    /// number is observed to change. `known_revno` is the revision the
    /// subscriber currently knows, `-1` if it believes the document does
    /// not exist. If the watcher already knows a newer revision, or knows
    /// the document to be deleted while the subscriber believes it exists,
    /// a catch-up event is delivered immediately.
    ///
    /// Attaching the same channel twice to one document is a contract
    /// violation and aborts the dispatcher.
    pub fn watch(
        &self,
        collection: &str,
        id: impl Into<DocId>,
        known_revno: Revno,
        ch: Sender<Change>,
    ) {
        let key = WatchKey::document(collection, id);
        self.send_req(Request::Watch {
            key,
            info: WatchInfo {
                ch,
                revno: known_revno,
            },
        });
    }

    /// Start watching every document in `collection`. Collection
    /// subscribers receive every observed revision change.
    pub fn watch_collection(&self, collection: &str, ch: Sender<Change>) {
        let key = WatchKey::collection(collection);
        self.send_req(Request::Watch {
            key,
            info: WatchInfo { ch, revno: 0 },
        });
    }

    /// Stop watching the document `id` in `collection` via `ch`. Events
    /// still queued for this subscription are tombstoned and never
    /// delivered.
    pub fn unwatch(&self, collection: &str, id: impl Into<DocId>, ch: &Sender<Change>) {
        let key = WatchKey::document(collection, id);
        self.send_req(Request::Unwatch { key, ch: ch.clone() });
    }

    /// Stop watching `collection` via `ch`.
    pub fn unwatch_collection(&self, collection: &str, ch: &Sender<Change>) {
        let key = WatchKey::collection(collection);
        self.send_req(Request::Unwatch { key, ch: ch.clone() });
    }

    /// Request an immediate sync pass without waiting for it.
    pub fn start_sync(&self) {
        self.send_req(Request::Sync { done: None });
    }

    /// Request an immediate sync pass and block until every event it
    /// produced has been delivered or tombstoned. Returns immediately if
    /// the watcher has stopped.
    pub fn sync(&self) {
        let (done_tx, done_rx) = bounded::<()>(0);
        self.send_req(Request::Sync {
            done: Some(done_tx),
        });
        select! {
            recv(done_rx) -> _ => {}
            recv(self.shutdown_rx) -> _ => {}
        }
    }

    /// Signal shutdown, wait for the dispatcher to exit, and return the
    /// terminal cause. Idempotent.
    pub fn stop(&self) -> Result<()> {
        drop(self.shutdown.lock().take());
        let _ = self.dead.recv();
        self.reap_thread();
        match self.cause.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Current status: `Some(StillAlive)` while the dispatcher runs,
    /// `None` after a clean stop, or the terminal error.
    pub fn err(&self) -> Option<WatchError> {
        if let Err(TryRecvError::Empty) = self.dead.try_recv() {
            return Some(WatchError::StillAlive);
        }
        self.reap_thread();
        self.cause.lock().clone()
    }

    /// A receiver that disconnects once the watcher has fully stopped.
    pub fn dead(&self) -> Receiver<()> {
        self.dead.clone()
    }

    /// Join the exited dispatcher thread, recording a panic as the cause.
    fn reap_thread(&self) {
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                *self.cause.lock() = Some(WatchError::DispatcherPanicked);
            }
        }
    }

    /// Post a request to the dispatcher, giving up silently if the
    /// watcher is shutting down or already stopped.
    fn send_req(&self, req: Request) {
        select! {
            send(self.requests, req) -> _ => {}
            recv(self.shutdown_rx) -> _ => {}
        }
    }
}
