//! Directory watch engine.
//!
//! This module turns the raw inotify event stream into typed callbacks.
//!
//! # Architecture
//!
//! ```text
//! NotificationSource (inotify fd)
//!         |  read_chunk
//!         v
//!      Watcher ---- decode_events ----> RawEvent
//!         |
//!         +-- WatchRegistry   handle -> directory
//!         +-- installer       new directories in recursive mode
//!         +-- PatternSet      filename filter
//!         +-- CallbackDispatcher
//!                 |
//!        +--------+--------+
//!        |        |        |
//!    handler  handler  handler
//! ```

mod dispatcher;
mod engine;
mod error;
mod event;
pub mod handlers;
pub mod installer;
pub mod pattern;
mod registry;
mod source;

pub use dispatcher::{
    CallbackDispatcher, CallbackId, DEFAULT_MAX_CALLBACKS, EventHandler, FnHandler,
};
pub use engine::{DEFAULT_BUFFER_SIZE, EventOutcome, LoopState, Watcher, WatcherBuilder};
pub use error::WatchError;
pub use event::{EventKind, EventMask, HEADER_LEN, RawEvent, decode_events};
pub use installer::{InstallReport, extend, install_recursively};
pub use pattern::PatternSet;
pub use registry::{DEFAULT_MAX_WATCHES, WatchRegistry};
pub use source::{InotifySource, NotificationSource, WatchHandle};
