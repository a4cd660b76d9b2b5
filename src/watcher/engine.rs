//! The watch engine: event loop and lifecycle.
//!
//! Owns the watch registry (and through it the notification source), the
//! callback dispatcher and the filename filter. Everything runs on one task;
//! the only suspension points are the source read and the shutdown future.

use std::future::Future;
use std::path::{Path, PathBuf};

use super::dispatcher::{CallbackDispatcher, CallbackId, DEFAULT_MAX_CALLBACKS, EventHandler};
use super::error::WatchError;
use super::event::{EventKind, EventMask, RawEvent, decode_events};
use super::installer::{self, InstallReport};
use super::pattern::PatternSet;
use super::registry::{DEFAULT_MAX_WATCHES, WatchRegistry};
use super::source::{NotificationSource, WatchHandle};

/// Default read buffer: room for 1024 records with 16-byte names.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * (16 + 16);

/// Lifecycle state of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
    ShuttingDown,
    Terminated,
}

/// What happened to one decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Handed to the dispatcher; `invoked` handlers ran.
    Dispatched { invoked: usize },
    /// Filename did not match the configured patterns.
    Filtered,
    /// Record referenced a handle the registry does not know.
    Unresolved,
    /// Bookkeeping record (no name, dropped watch, queue overflow).
    Skipped,
}

/// Directory watcher that routes raw events to registered callbacks.
pub struct Watcher<S: NotificationSource> {
    root: PathBuf,
    recursive: bool,
    patterns: PatternSet,
    registry: WatchRegistry<S>,
    dispatcher: CallbackDispatcher,
    buffer: Vec<u8>,
    state: LoopState,
}

impl<S: NotificationSource> Watcher<S> {
    /// Install the root watch and, in recursive mode, the whole subtree.
    ///
    /// Failing to watch the root is fatal; subtree failures are logged.
    pub fn start(&mut self) -> Result<InstallReport, WatchError> {
        if self.state != LoopState::NotStarted {
            return Err(WatchError::AlreadyStarted);
        }

        self.registry.install(&self.root)?;
        let mut report = InstallReport {
            installed: 1,
            ..InstallReport::default()
        };

        if self.recursive {
            crate::log_event!("watcher", "recursive mode enabled, watching all subdirectories");
            let subtree = installer::install_recursively(&mut self.registry, &self.root);
            report.installed += subtree.installed;
            report.failed += subtree.failed;
            report.unreadable += subtree.unreadable;
            crate::log_event!("watcher", "total watches", "{}", self.registry.len());
        }

        self.state = LoopState::Running;
        Ok(report)
    }

    /// Run the event loop until `shutdown` resolves or the stream fails.
    ///
    /// Read and decode errors are fatal and returned. Cleanup is performed
    /// on every exit path.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()>,
    {
        if self.state != LoopState::Running {
            return Err(WatchError::NotRunning);
        }

        crate::log_event!("watcher", "started", "{}", self.root.display());
        tokio::pin!(shutdown);

        let result = loop {
            let mut buffer = std::mem::take(&mut self.buffer);

            let outcome = tokio::select! {
                biased;

                read = self.registry.source_mut().read_chunk(&mut buffer) => Some(read),
                _ = &mut shutdown => None,
            };

            let step = match outcome {
                None => {
                    crate::log_event!("watcher", "shutdown requested");
                    self.buffer = buffer;
                    break Ok(());
                }
                Some(Ok(0)) => Err(WatchError::Read(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "notification source closed",
                ))),
                Some(Ok(len)) => self.process_chunk(&buffer[..len]).map(|_| ()),
                Some(Err(e)) => Err(WatchError::Read(e)),
            };
            self.buffer = buffer;

            if let Err(e) = step {
                tracing::error!("[watcher] {e}");
                break Err(e);
            }
        };

        self.shutdown();
        result
    }

    /// Decode one chunk from the source and handle each record in order.
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Result<Vec<EventOutcome>, WatchError> {
        let events = decode_events(bytes)?;
        Ok(events.iter().map(|event| self.handle_event(event)).collect())
    }

    /// Route one decoded record.
    pub fn handle_event(&mut self, event: &RawEvent) -> EventOutcome {
        if event.mask.contains(EventMask::Q_OVERFLOW) {
            tracing::warn!("[watcher] event queue overflowed, some changes were lost");
            return EventOutcome::Skipped;
        }

        if event.mask.contains(EventMask::IGNORED) {
            self.registry.forget(event.handle);
            return EventOutcome::Skipped;
        }

        let Some(name) = event.name() else {
            return EventOutcome::Skipped;
        };

        let Some(dir) = self.registry.resolve(event.handle).map(Path::to_path_buf) else {
            let err = WatchError::UnresolvedHandle {
                handle: event.handle,
            };
            tracing::warn!("[watcher] {err}");
            return EventOutcome::Unresolved;
        };

        if event.is_dir() {
            let subject = dir.join(name);
            if event.has(EventKind::MovedFrom) {
                self.registry.retire_subtree(&subject);
            }
            if self.recursive && (event.has(EventKind::Created) || event.has(EventKind::MovedTo)) {
                installer::extend(&mut self.registry, &subject);
            }
        }

        let filename = event.filename();
        if !self.patterns.matches(&filename) {
            crate::debug_event!("watcher", "filtered", "{}", dir.join(name).display());
            return EventOutcome::Filtered;
        }

        let invoked = self.dispatcher.dispatch(event, &dir);

        for kind in event.kinds() {
            crate::log_event!("watcher", format!("file {}", kind.verb()), "{}", dir.join(name).display());
        }

        EventOutcome::Dispatched { invoked }
    }

    /// Release every watch, the source and all callbacks.
    ///
    /// Safe to call more than once; only the first call does any work.
    pub fn shutdown(&mut self) {
        if matches!(self.state, LoopState::ShuttingDown | LoopState::Terminated) {
            return;
        }
        self.state = LoopState::ShuttingDown;

        let removed = self.registry.remove_all();
        if let Err(e) = self.registry.source_mut().close() {
            tracing::warn!("[watcher] failed to close notification source: {e}");
        }
        self.dispatcher.clear();

        crate::log_event!("watcher", "stopped", "{removed} watches removed");
        self.state = LoopState::Terminated;
    }

    /// Register a callback. Intended for use before [`Watcher::run`].
    pub fn register(
        &mut self,
        events: EventMask,
        pattern: Option<&str>,
        handler: impl EventHandler + 'static,
    ) -> Result<CallbackId, WatchError> {
        self.dispatcher.register(events, pattern, handler)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn registry(&self) -> &WatchRegistry<S> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WatchRegistry<S> {
        &mut self.registry
    }

    pub fn dispatcher(&self) -> &CallbackDispatcher {
        &self.dispatcher
    }

    /// Path registered for a handle.
    pub fn resolve(&self, handle: WatchHandle) -> Option<&Path> {
        self.registry.resolve(handle)
    }
}

impl<S: NotificationSource> Drop for Watcher<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct PendingCallback {
    events: EventMask,
    pattern: Option<String>,
    handler: Box<dyn EventHandler>,
}

/// Builder for constructing a [`Watcher`].
///
/// The source type is only fixed by [`WatcherBuilder::build`], so one
/// configuration can be built over inotify or a scripted source.
pub struct WatcherBuilder {
    root: PathBuf,
    recursive: bool,
    patterns: Vec<String>,
    max_watches: usize,
    max_callbacks: usize,
    buffer_size: usize,
    callbacks: Vec<PendingCallback>,
}

impl WatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            patterns: Vec::new(),
            max_watches: DEFAULT_MAX_WATCHES,
            max_callbacks: DEFAULT_MAX_CALLBACKS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            callbacks: Vec::new(),
        }
    }

    /// Watch every subdirectory, present now or created later.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Only dispatch events whose filename matches one of these globs.
    pub fn patterns<I, T>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn max_watches(mut self, max: usize) -> Self {
        self.max_watches = max;
        self
    }

    pub fn max_callbacks(mut self, max: usize) -> Self {
        self.max_callbacks = max;
        self
    }

    /// Size of the buffer each source read fills.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Add a callback.
    pub fn handler(
        mut self,
        events: EventMask,
        pattern: Option<&str>,
        handler: impl EventHandler + 'static,
    ) -> Self {
        self.callbacks.push(PendingCallback {
            events,
            pattern: pattern.map(str::to_string),
            handler: Box::new(handler),
        });
        self
    }

    /// Build the watcher on top of `source`.
    pub fn build<S: NotificationSource>(self, source: S) -> Result<Watcher<S>, WatchError> {
        let patterns = PatternSet::new(&self.patterns)?;

        let mut dispatcher = CallbackDispatcher::new(self.max_callbacks);
        for callback in self.callbacks {
            dispatcher.register_boxed(callback.events, callback.pattern.as_deref(), callback.handler)?;
        }

        Ok(Watcher {
            root: self.root,
            recursive: self.recursive,
            patterns,
            registry: WatchRegistry::new(source, self.max_watches),
            dispatcher,
            buffer: vec![0; self.buffer_size.max(super::event::HEADER_LEN + 256)],
            state: LoopState::NotStarted,
        })
    }
}
