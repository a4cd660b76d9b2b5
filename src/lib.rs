pub mod cli;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    EventHandler, EventKind, EventMask, InotifySource, NotificationSource, RawEvent, WatchError,
    WatchHandle, Watcher, WatcherBuilder,
};
