//! Error types for the watch engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::source::WatchHandle;

/// Errors from watcher operations.
///
/// Watch-level failures (`CapacityExceeded`, `OsWatch`) are contained to the
/// single watch attempt. Stream-level failures (`Decode`, `Read`) are fatal
/// for the event loop.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Maximum number of watches reached (max={limit})")]
    CapacityExceeded { limit: usize },

    #[error("Maximum number of callbacks reached (max={limit})")]
    RegistryFull { limit: usize },

    #[error("Failed to add watch for {path}: {source}")]
    OsWatch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Received event for unknown watch descriptor: {handle}")]
    UnresolvedHandle { handle: WatchHandle },

    #[error("Malformed event record at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    #[error("Failed to initialize notification source: {source}")]
    SourceInit {
        #[source]
        source: io::Error,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Read error: {0}")]
    Read(#[source] io::Error),

    #[error("Handler '{handler}' failed for {path}: {reason}")]
    HandlerFailed {
        handler: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Watcher is not running")]
    NotRunning,

    #[error("Watcher was already started")]
    AlreadyStarted,
}

impl WatchError {
    /// True for errors that leave the event stream unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::Decode { .. } | WatchError::Read(_) | WatchError::SourceInit { .. }
        )
    }
}

