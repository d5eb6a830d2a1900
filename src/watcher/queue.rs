//! Pending-event queues.

use crate::types::{Change, WatchKey};
use crossbeam_channel::Sender;

/// A queued delivery: one change notification bound for one subscriber.
pub(crate) struct Event {
    /// Send-end of the target subscriber, or `None` once the event has
    /// been tombstoned by an intervening unwatch.
    pub ch: Option<Sender<Change>>,
    pub change: Change,
}

/// Ordered buffer of pending deliveries.
///
/// Detaching a subscriber tombstones its queued events in place rather
/// than rewriting the queue, so detach stays O(queue length) and delivery
/// order for the surviving subscribers is untouched. Slots are reclaimed
/// only by [`EventQueue::clear`] after a flush.
#[derive(Default)]
pub(crate) struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ch: Sender<Change>, change: Change) {
        self.events.push(Event { ch: Some(ch), change });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn get(&self, index: usize) -> &Event {
        &self.events[index]
    }

    /// Clear the channel of every queued event for `key` bound for `ch`.
    ///
    /// Queued events always carry a document key, so a collection-wide
    /// `key` matches nothing here; only the subscription itself is removed
    /// in that case.
    pub fn tombstone(&mut self, key: &WatchKey, ch: &Sender<Change>) {
        for event in &mut self.events {
            let same_target = event
                .ch
                .as_ref()
                .map_or(false, |event_ch| event_ch.same_channel(ch));
            if same_target
                && event.change.collection == key.collection
                && key.id.as_ref() == Some(&event.change.id)
            {
                event.ch = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
