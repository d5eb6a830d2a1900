//! Single-owner dispatcher loop.
//!
//! The dispatcher is the only task that touches the revision registry, the
//! subscription table, the event queues, and the sync boundary. Every
//! mutation funnels through its request channel; the loop interleaves
//! periodic sync passes, incoming requests, and event delivery.

use crate::changelog::ChangeLog;
use crate::error::Result;
use crate::types::{Change, EntryId, WatchKey};
use super::queue::EventQueue;
use super::registry::RevisionRegistry;
use super::subscriptions::{SubscriptionTable, WatchInfo};
use crossbeam_channel::{after, select, Receiver, Sender};
use std::collections::HashSet;
use std::mem;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A request posted from the facade into the dispatcher.
pub(crate) enum Request {
    Watch {
        key: WatchKey,
        info: WatchInfo,
    },
    Unwatch {
        key: WatchKey,
        ch: Sender<Change>,
    },
    Sync {
        /// Dropped strictly after the flush following the requested sync
        /// pass, which unblocks a waiting `Watcher::sync` caller.
        done: Option<Sender<()>>,
    },
}

/// Which pending-event queue an event is delivered from.
#[derive(Clone, Copy)]
enum QueueId {
    Sync,
    Request,
}

pub(crate) struct Dispatcher {
    log: Box<dyn ChangeLog>,

    /// Latest revision observed per document key.
    registry: RevisionRegistry,

    /// Subscribers managed by watch/unwatch requests.
    table: SubscriptionTable,

    /// Events produced by sync passes. Queued newest-first because the log
    /// is scanned newest-first; the flush drains them in reverse.
    sync_events: EventQueue,

    /// Events produced by subscription catch-up, queued oldest-first. May
    /// grow while a flush is in progress.
    request_events: EventQueue,

    /// Done channels from pending sync requests.
    sync_done: Vec<Sender<()>>,

    /// Newest entry id adopted by the previous sync pass. `None` until an
    /// entry has been observed in a non-empty log.
    last_id: Option<EntryId>,

    /// Fires when the next periodic sync is due. Replaced on every pass;
    /// a sync request swaps in an already-due timer.
    next_sync: Receiver<Instant>,
    sync_period: Duration,

    requests: Receiver<Request>,
    shutdown: Receiver<()>,
}

impl Dispatcher {
    pub fn new(
        log: Box<dyn ChangeLog>,
        sync_period: Duration,
        requests: Receiver<Request>,
        shutdown: Receiver<()>,
    ) -> Self {
        Dispatcher {
            log,
            registry: RevisionRegistry::new(),
            table: SubscriptionTable::new(),
            sync_events: EventQueue::new(),
            request_events: EventQueue::new(),
            sync_done: Vec::new(),
            last_id: None,
            next_sync: after(Duration::ZERO),
            sync_period,
            requests,
            shutdown,
        }
    }

    /// Run the loop until shutdown or a terminal error.
    ///
    /// Seeds the sync boundary from the newest entry id first, so history
    /// predating the watcher is never reported.
    pub fn run(&mut self) -> Result<()> {
        self.next_sync = after(Duration::ZERO);
        self.last_id = self.log.latest_id()?;
        loop {
            let shutdown = self.shutdown.clone();
            let next_sync = self.next_sync.clone();
            let requests = self.requests.clone();
            select! {
                recv(shutdown) -> _ => return Ok(()),
                recv(next_sync) -> _ => {
                    self.next_sync = after(self.sync_period);
                    let done = mem::take(&mut self.sync_done);
                    self.sync()?;
                    self.flush();
                    drop(done);
                }
                recv(requests) -> request => match request {
                    Ok(request) => {
                        self.handle(request);
                        self.flush();
                    }
                    // The facade was dropped; treat it as a stop request.
                    Err(_) => return Ok(()),
                },
            }
        }
    }

    /// Apply one request from the public facade.
    fn handle(&mut self, request: Request) {
        match request {
            Request::Sync { done } => {
                trace!("sync requested");
                self.next_sync = after(Duration::ZERO);
                if let Some(done) = done {
                    self.sync_done.push(done);
                }
            }
            Request::Watch { key, mut info } => {
                debug!(key = ?key, known_revno = info.revno, "watch request");
                if let Some(current) = self.registry.get(&key) {
                    // Catch up a subscriber that is behind, including one
                    // that believes a document exists when the watcher
                    // already knows it to be deleted.
                    if current > info.revno || (current == -1 && info.revno >= 0) {
                        info.revno = current;
                        let change = Change {
                            collection: key.collection.clone(),
                            id: key.id.clone().expect("registry keys are document keys"),
                            revno: current,
                        };
                        self.request_events.push(info.ch.clone(), change);
                    }
                }
                self.table.attach(key, info);
            }
            Request::Unwatch { key, ch } => {
                debug!(key = ?key, "unwatch request");
                self.table.detach(&key, &ch);
                self.request_events.tombstone(&key, &ch);
                self.sync_events.tombstone(&key, &ch);
            }
        }
    }

    /// One sweep of the change-log, newest-first, back to the boundary
    /// observed by the previous pass.
    ///
    /// The first time a document key is seen in a pass wins; because the
    /// scan runs newest-first (and back-to-front within one entry, where a
    /// later position is the newer write), that is the document's newest
    /// revno. Changed revisions update the registry and fan out as queued
    /// sync events.
    fn sync(&mut self) -> Result<()> {
        debug!("loading new events from the change log");
        let Dispatcher {
            log,
            registry,
            table,
            sync_events,
            last_id,
            ..
        } = self;

        let boundary = *last_id;
        let mut first = true;
        let mut seen: HashSet<WatchKey> = HashSet::new();

        for entry in log.entries_newest_first()? {
            let entry = entry?;
            if first {
                *last_id = Some(entry.id);
                first = false;
            }
            if boundary == Some(entry.id) {
                break;
            }
            trace!(entry = %entry.id, "processing change-log entry");
            for coll in &entry.changes {
                if coll.doc_ids.is_empty() || coll.doc_ids.len() != coll.revnos.len() {
                    warn!(
                        collection = %coll.collection,
                        docs = coll.doc_ids.len(),
                        revnos = coll.revnos.len(),
                        "change-log entry has invalid document/revno lists; skipping"
                    );
                    continue;
                }
                for i in (0..coll.doc_ids.len()).rev() {
                    let key = WatchKey::document(coll.collection.clone(), coll.doc_ids[i].clone());
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    let mut revno = coll.revnos[i];
                    if revno < 0 {
                        revno = -1;
                    }
                    if registry.get(&key) == Some(revno) {
                        trace!(key = ?key, revno, "revno unchanged; ignoring");
                        continue;
                    }
                    registry.set(key.clone(), revno);

                    let change = Change {
                        collection: coll.collection.clone(),
                        id: coll.doc_ids[i].clone(),
                        revno,
                    };
                    // Collection-wide subscribers see every change.
                    let coll_key = WatchKey::collection(coll.collection.clone());
                    for info in table.get(&coll_key) {
                        sync_events.push(info.ch.clone(), change.clone());
                    }
                    // Per-document subscribers only see revisions newer
                    // than what they already know, or a deletion of a
                    // document they believe exists.
                    for info in table.get_mut(&key) {
                        if revno > info.revno || (revno < 0 && info.revno >= 0) {
                            info.revno = revno;
                            sync_events.push(info.ch.clone(), change.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Deliver every pending event to its subscriber channel.
    fn flush(&mut self) {
        // Sync events were queued newest-first; walking the queue
        // backwards delivers them oldest-first.
        let mut i = self.sync_events.len();
        while i > 0 {
            i -= 1;
            if !self.deliver(QueueId::Sync, i) {
                return;
            }
        }
        // Request events are oldest-first, and the queue may grow while
        // flushing (an interleaved watch request can append a catch-up
        // event), so the length is re-read every iteration.
        let mut i = 0;
        while i < self.request_events.len() {
            if !self.deliver(QueueId::Request, i) {
                return;
            }
            i += 1;
        }
        self.sync_events.clear();
        self.request_events.clear();
    }

    /// Deliver the event at `index` of `queue`, blocking on the subscriber
    /// while still servicing shutdown and interleaved requests. A request
    /// handled in between may tombstone the event, in which case it is
    /// skipped on retry. Returns `false` when the watcher is shutting down
    /// and the flush must be abandoned.
    fn deliver(&mut self, queue: QueueId, index: usize) -> bool {
        let shutdown = self.shutdown.clone();
        let requests = self.requests.clone();
        loop {
            let (ch, change) = {
                let event = match queue {
                    QueueId::Sync => self.sync_events.get(index),
                    QueueId::Request => self.request_events.get(index),
                };
                match &event.ch {
                    Some(ch) => (ch.clone(), event.change.clone()),
                    None => return true,
                }
            };
            select! {
                recv(shutdown) -> _ => return false,
                recv(requests) -> request => match request {
                    Ok(request) => self.handle(request),
                    Err(_) => return false,
                },
                send(ch, change) -> sent => {
                    if sent.is_err() {
                        // The subscriber dropped its receive end; nothing
                        // will ever drain this channel again.
                        debug!("subscriber receiver dropped; skipping event");
                    }
                    return true;
                }
            }
        }
    }
}
