//! # docwatch
//!
//! A transactional change-log watcher for document collections.
//!
//! A [`Watcher`] observes an append-only, capped change-log of committed
//! transactions ([`ChangeLog`]) and dispatches fine-grained [`Change`]
//! notifications to any number of subscribers interested in single
//! documents or whole collections. Each subscriber sees the monotonically
//! increasing revision number of every change that occurs after it
//! subscribed, plus a catch-up event when the live revision already
//! exceeds what the subscriber declared. Only revision numbers are
//! transported, never document bodies; a revno of `-1` signals deletion.
//!
//! ## Core concepts
//!
//! - **Change-log**: capped record of committed transactions, each naming
//!   affected documents and their new revnos ([`LogEntry`])
//! - **Sync pass**: one sweep of the log from newest back to the
//!   previously observed boundary
//! - **Watch key**: (collection, doc-id) or (collection, *) identifying a
//!   subscription target ([`WatchKey`])
//!
//! ## Example
//!
//! ```ignore
//! use crossbeam_channel::unbounded;
//! use docwatch::{CollectionChanges, MemoryLog, Watcher};
//!
//! let log = MemoryLog::new();
//! let watcher = Watcher::new(log.clone());
//!
//! let (tx, rx) = unbounded();
//! watcher.watch("users", 7, -1, tx);
//!
//! log.append(vec![CollectionChanges {
//!     collection: "users".into(),
//!     doc_ids: vec![7.into()],
//!     revnos: vec![1],
//! }]);
//! watcher.sync();
//!
//! let change = rx.recv()?;
//! assert_eq!(change.revno, 1);
//! watcher.stop()?;
//! ```

pub mod changelog;
pub mod error;
pub mod types;
pub mod watcher;

// Re-exports
pub use changelog::{ChangeLog, CollectionChanges, LogEntry, MemoryLog};
pub use error::{Result, WatchError};
pub use types::{Change, DocId, EntryId, Revno, WatchKey};
pub use watcher::{Watcher, WatcherConfig};
