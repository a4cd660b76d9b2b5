//! Callback registry and event fan-out.

use std::fmt;
use std::path::Path;

use glob::Pattern;

use super::error::WatchError;
use super::event::{EventMask, RawEvent};
use super::pattern;

/// Default ceiling on registered callbacks.
pub const DEFAULT_MAX_CALLBACKS: usize = 20;

/// Trait for handlers invoked on qualifying events.
pub trait EventHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Called with the watched directory and the name of the changed entry.
    fn on_event(&self, dir: &Path, filename: &str) -> Result<(), WatchError>;
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Path, &str) -> Result<(), WatchError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Path, &str) -> Result<(), WatchError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, dir: &Path, filename: &str) -> Result<(), WatchError> {
        (self.f)(dir, filename)
    }
}

/// Identity of a registered callback; also its position in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(usize);

impl CallbackId {
    pub fn index(self) -> usize {
        self.0
    }
}

struct CallbackEntry {
    events: EventMask,
    pattern: Option<Pattern>,
    handler: Box<dyn EventHandler>,
}

impl CallbackEntry {
    fn accepts(&self, event: &RawEvent, filename: &str) -> bool {
        self.events.intersects(event.mask)
            && self
                .pattern
                .as_ref()
                .is_none_or(|p| pattern::matches(filename, std::slice::from_ref(p)))
    }
}

/// Ordered registry of (event mask, optional pattern, handler) triples.
pub struct CallbackDispatcher {
    entries: Vec<CallbackEntry>,
    max_callbacks: usize,
}

impl CallbackDispatcher {
    pub fn new(max_callbacks: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_callbacks,
        }
    }

    /// Register a handler for the kinds in `events`, optionally restricted
    /// to filenames matching `pattern`.
    ///
    /// Registration order defines dispatch order.
    pub fn register(
        &mut self,
        events: EventMask,
        pattern: Option<&str>,
        handler: impl EventHandler + 'static,
    ) -> Result<CallbackId, WatchError> {
        self.register_boxed(events, pattern, Box::new(handler))
    }

    pub fn register_boxed(
        &mut self,
        events: EventMask,
        pattern: Option<&str>,
        handler: Box<dyn EventHandler>,
    ) -> Result<CallbackId, WatchError> {
        if self.entries.len() >= self.max_callbacks {
            return Err(WatchError::RegistryFull {
                limit: self.max_callbacks,
            });
        }

        let pattern = pattern.map(pattern::compile).transpose()?;
        let id = CallbackId(self.entries.len());
        crate::debug_event!(
            "dispatcher",
            "registered",
            "{} for {:?}",
            handler.name(),
            events & EventMask::KINDS
        );
        self.entries.push(CallbackEntry {
            events: events & EventMask::KINDS,
            pattern,
            handler,
        });
        Ok(id)
    }

    /// Invoke every callback whose mask intersects the event and whose
    /// pattern (if any) matches its filename.
    ///
    /// A failing handler is logged and does not stop the remaining ones.
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &RawEvent, dir: &Path) -> usize {
        let filename = event.filename();
        let mut invoked = 0;

        for entry in &self.entries {
            if !entry.accepts(event, &filename) {
                continue;
            }

            invoked += 1;
            if let Err(e) = entry.handler.on_event(dir, &filename) {
                tracing::error!("[{}] handler error: {e}", entry.handler.name());
            }
        }

        invoked
    }

    /// Drop every registered callback.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CallbackDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLBACKS)
    }
}

impl fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| {
                (
                    e.handler.name(),
                    e.events,
                    e.pattern.as_ref().map(Pattern::as_str),
                )
            }))
            .finish()
    }
}
