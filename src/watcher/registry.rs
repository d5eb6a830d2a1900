//! Last-known revision bookkeeping.

use crate::types::{Revno, WatchKey};
use std::collections::HashMap;

/// Maps each observed document to the latest revision the watcher knows.
///
/// Entries are never removed: a deletion is recorded as revno `-1`. A key
/// absent from the registry has never been observed, which is distinct
/// from every stored value, so the first observation of a key always
/// registers, including a first-observed deletion.
#[derive(Default)]
pub(crate) struct RevisionRegistry {
    current: HashMap<WatchKey, Revno>,
}

impl RevisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest revision observed for `key`, if any.
    pub fn get(&self, key: &WatchKey) -> Option<Revno> {
        self.current.get(key).copied()
    }

    pub fn set(&mut self, key: WatchKey, revno: Revno) {
        self.current.insert(key, revno);
    }
}
