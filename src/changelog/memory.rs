//! Capped in-memory change-log.

use super::{ChangeLog, CollectionChanges, LogEntry};
use crate::error::Result;
use crate::types::EntryId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of retained entries.
const DEFAULT_CAPACITY: usize = 1024;

/// A capped in-memory change-log.
///
/// Appends assign monotonically increasing entry ids; once the ring is
/// full the oldest entry is evicted. Handles are cheap to clone and share
/// the same ring, so writers and a watcher can hold the same log.
#[derive(Clone)]
pub struct MemoryLog {
    inner: Arc<Mutex<Ring>>,
}

struct Ring {
    capacity: usize,
    next_id: u64,
    /// Entries oldest-first.
    entries: VecDeque<LogEntry>,
}

impl MemoryLog {
    /// Create a log retaining up to [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log retaining up to `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "change log capacity must be non-zero");
        MemoryLog {
            inner: Arc::new(Mutex::new(Ring {
                capacity,
                next_id: 1,
                entries: VecDeque::with_capacity(capacity),
            })),
        }
    }

    /// Append one committed transaction and return its assigned entry id.
    pub fn append(&self, changes: Vec<CollectionChanges>) -> EntryId {
        let mut ring = self.inner.lock();
        let id = EntryId(ring.next_id);
        ring.next_id += 1;
        if ring.entries.len() == ring.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(LogEntry { id, changes });
        id
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeLog for MemoryLog {
    fn latest_id(&self) -> Result<Option<EntryId>> {
        Ok(self.inner.lock().entries.back().map(|entry| entry.id))
    }

    fn entries_newest_first(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<LogEntry>> + '_>> {
        // Snapshot under the lock so appenders never wait behind a scan.
        let entries: Vec<LogEntry> = {
            let ring = self.inner.lock();
            ring.entries.iter().rev().cloned().collect()
        };
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}
