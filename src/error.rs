//! Error types for the watcher.

use thiserror::Error;

/// Main error type for watcher operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WatchError {
    /// Returned by `Watcher::err` while the dispatcher is still running.
    #[error("watcher is still running")]
    StillAlive,

    /// The change-log source failed while being read. Terminal: the
    /// dispatcher exits and this becomes the watcher's final cause.
    #[error("change log iteration error: {0}")]
    Iteration(String),

    /// The dispatcher thread aborted on a contract violation, such as
    /// attaching the same channel twice to one watch key.
    #[error("watcher dispatcher panicked")]
    DispatcherPanicked,
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatchError>;
