//! Subscriber bookkeeping per watch key.

use crate::types::{Change, Revno, WatchKey};
use crossbeam_channel::Sender;
use std::collections::HashMap;

/// One subscriber attached to a watch key.
pub(crate) struct WatchInfo {
    /// Send-end of the subscriber's channel. The watcher never closes it.
    pub ch: Sender<Change>,

    /// Last revision the subscriber is known to have seen, `-1` when the
    /// document is believed nonexistent. Advanced whenever an event is
    /// queued for this subscriber. Unused for collection-wide entries.
    pub revno: Revno,
}

/// Subscribers indexed by watch key.
///
/// Collection-wide subscriptions live under the key with no document id.
/// Subscribers are identified by channel, never by a back-reference.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    watches: HashMap<WatchKey, Vec<WatchInfo>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ch` is already attached to `key`.
    pub fn contains(&self, key: &WatchKey, ch: &Sender<Change>) -> bool {
        self.watches
            .get(key)
            .map_or(false, |infos| infos.iter().any(|info| info.ch.same_channel(ch)))
    }

    /// Attach a subscriber to `key`.
    ///
    /// Panics if the channel is already attached to this key; that is a
    /// contract violation in the caller.
    pub fn attach(&mut self, key: WatchKey, info: WatchInfo) {
        if self.contains(&key, &info.ch) {
            panic!("adding channel twice for the same watch key {:?}", key);
        }
        self.watches.entry(key).or_default().push(info);
    }

    /// Detach `ch` from `key`, returning whether a subscriber was removed.
    /// Order among the remaining subscribers is not preserved.
    pub fn detach(&mut self, key: &WatchKey, ch: &Sender<Change>) -> bool {
        if let Some(infos) = self.watches.get_mut(key) {
            if let Some(pos) = infos.iter().position(|info| info.ch.same_channel(ch)) {
                infos.swap_remove(pos);
                return true;
            }
        }
        false
    }

    /// Subscribers attached to `key`.
    pub fn get(&self, key: &WatchKey) -> &[WatchInfo] {
        self.watches.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable view of the subscribers attached to `key`.
    pub fn get_mut(&mut self, key: &WatchKey) -> impl Iterator<Item = &mut WatchInfo> {
        self.watches.get_mut(key).into_iter().flatten()
    }
}
