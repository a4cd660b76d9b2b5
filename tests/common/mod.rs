//! Shared fixtures for watcher integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fswatcher::watcher::{EventMask, FnHandler, NotificationSource, RawEvent, WatchHandle};

/// In-memory notification source.
///
/// Handles are issued sequentially from 1. Queued chunks are returned by
/// `read_chunk` in order; once drained, reads wait forever.
#[derive(Default)]
pub struct ScriptedSource {
    next: i32,
    pub watched: HashMap<PathBuf, WatchHandle>,
    pub rejected: HashSet<PathBuf>,
    pub removed: Vec<WatchHandle>,
    pub forgotten: Vec<WatchHandle>,
    pub chunks: VecDeque<Vec<u8>>,
    pub closed: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one chunk holding `events`.
    pub fn push_events(&mut self, events: &[RawEvent]) {
        let mut chunk = Vec::new();
        for event in events {
            event.encode(&mut chunk);
        }
        self.chunks.push_back(chunk);
    }

    pub fn push_raw(&mut self, bytes: Vec<u8>) {
        self.chunks.push_back(bytes);
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
        if self.rejected.contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        if let Some(handle) = self.watched.get(path) {
            return Ok(*handle);
        }
        self.next += 1;
        let handle = WatchHandle::new(self.next);
        self.watched.insert(path.to_path_buf(), handle);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        self.removed.push(handle);
        self.watched.retain(|_, h| *h != handle);
        Ok(())
    }

    fn forget(&mut self, handle: WatchHandle) {
        self.forgotten.push(handle);
        self.watched.retain(|_, h| *h != handle);
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => std::future::pending().await,
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Dispatches recorded by [`recorder`], as `(dir, filename)`.
pub type Calls = Arc<Mutex<Vec<(PathBuf, String)>>>;

/// A handler that records every call.
pub fn recorder(
    name: &str,
) -> (
    FnHandler<impl Fn(&Path, &str) -> Result<(), fswatcher::WatchError> + Send + Sync>,
    Calls,
) {
    let calls: Calls = Arc::default();
    let sink = Arc::clone(&calls);
    let handler = FnHandler::new(name, move |dir: &Path, filename: &str| {
        sink.lock()
            .unwrap()
            .push((dir.to_path_buf(), filename.to_string()));
        Ok(())
    });
    (handler, calls)
}

pub fn event(handle: i32, mask: EventMask, name: &str) -> RawEvent {
    RawEvent::new(WatchHandle::new(handle), mask, Some(name))
}
