//! Core types for the change-log watcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A document revision number.
///
/// Revnos increase monotonically per document; `-1` denotes a deleted (or
/// never-existing) document. Negative revnos read from the change-log are
/// canonicalized to `-1`.
pub type Revno = i64;

/// Unique identifier for a change-log entry. Only equality is meaningful
/// to the watcher.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque document identifier, unique within its collection.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocId {
    Int(i64),
    Str(String),
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Int(v) => write!(f, "{}", v),
            DocId::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Int(v) => write!(f, "{}", v),
            DocId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocId {
    fn from(v: i64) -> Self {
        DocId::Int(v)
    }
}

impl From<i32> for DocId {
    fn from(v: i32) -> Self {
        DocId::Int(v.into())
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId::Str(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId::Str(s)
    }
}

/// A subscription target: one document, or every document in a collection
/// when `id` is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub collection: String,
    pub id: Option<DocId>,
}

impl WatchKey {
    /// Key for a single document.
    pub fn document(collection: impl Into<String>, id: impl Into<DocId>) -> Self {
        WatchKey {
            collection: collection.into(),
            id: Some(id.into()),
        }
    }

    /// Key for a whole collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        WatchKey {
            collection: collection.into(),
            id: None,
        }
    }
}

/// A document change as delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Collection name.
    pub collection: String,

    /// Document id within the collection.
    pub id: DocId,

    /// Latest known revision number, or `-1` if the document was deleted.
    pub revno: Revno,
}
