//! Change-log source abstraction.
//!
//! A [`ChangeLog`] exposes the append-only record of committed transactions
//! that the watcher observes: the id of the most recent entry, plus
//! reverse-chronological iteration over the entries. The log is assumed to
//! be capped: history older than its capacity is silently lost, and a
//! watcher that falls behind a full wrap-around cannot detect the gap; it
//! simply resumes from whatever entries are still present.

mod memory;

pub use memory::MemoryLog;

use crate::error::Result;
use crate::types::{DocId, EntryId, Revno};
use serde::{Deserialize, Serialize};

/// Revisions recorded for one collection by a single committed transaction.
///
/// `doc_ids` and `revnos` are parallel lists: position `i` says document
/// `doc_ids[i]` now has revision `revnos[i]`. A negative revno records a
/// deletion. When a document appears more than once, the later position is
/// the newer write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChanges {
    /// Collection name.
    #[serde(rename = "c")]
    pub collection: String,

    /// Affected document ids.
    #[serde(rename = "d")]
    pub doc_ids: Vec<DocId>,

    /// New revision numbers, parallel to `doc_ids`.
    #[serde(rename = "r")]
    pub revnos: Vec<Revno>,
}

/// One committed transaction as recorded in the change-log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "_id")]
    pub id: EntryId,

    /// Per-collection revision updates, in no particular order.
    pub changes: Vec<CollectionChanges>,
}

/// Reverse-chronological view over a change-log of committed transactions.
///
/// The watcher drives a `ChangeLog` from a single task; implementations
/// only need to tolerate serialized access.
pub trait ChangeLog: Send + 'static {
    /// Id of the most recent entry, or `None` when the log is empty.
    fn latest_id(&self) -> Result<Option<EntryId>>;

    /// Iterate entries newest-first.
    ///
    /// An `Err` item aborts the caller's scan; the watcher treats it as a
    /// terminal iteration error.
    fn entries_newest_first(&self)
        -> Result<Box<dyn Iterator<Item = Result<LogEntry>> + '_>>;
}
