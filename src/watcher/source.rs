//! Notification source abstraction and the inotify implementation.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use async_trait::async_trait;
use inotify::{Inotify, WatchDescriptor, WatchMask};
use tokio::io::unix::AsyncFd;

use super::error::WatchError;

/// Opaque watch identifier issued by the notification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The OS change-notification facility as seen by the watch engine.
///
/// A source hands out watch handles for directories and yields a byte
/// stream of event records keyed by those handles.
#[async_trait]
pub trait NotificationSource: Send {
    /// Start monitoring `path` for every kind in [`EventMask::KINDS`].
    ///
    /// [`EventMask::KINDS`]: super::event::EventMask::KINDS
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle>;

    /// Stop monitoring the directory behind `handle`.
    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()>;

    /// Drop local state for a watch the OS has already released
    /// (IN_IGNORED). No system call is made.
    fn forget(&mut self, handle: WatchHandle);

    /// Wait for the next chunk of event records and copy it into `buf`.
    ///
    /// Returns the number of bytes written. A chunk always holds whole records.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the underlying facility. Reads after close fail.
    fn close(&mut self) -> io::Result<()>;
}

/// inotify-backed notification source.
///
/// The descriptor is registered with the tokio reactor so the event loop
/// can wait on it alongside the shutdown signal.
pub struct InotifySource {
    fd: Option<AsyncFd<Inotify>>,
    descriptors: HashMap<WatchHandle, WatchDescriptor>,
}

impl InotifySource {
    /// Create a new inotify instance. Must be called inside a tokio runtime.
    pub fn new() -> Result<Self, WatchError> {
        let inotify = Inotify::init().map_err(|source| WatchError::SourceInit { source })?;
        // SAFETY: `Inotify` owns its file descriptor and keeps it open for as
        // long as the `AsyncFd` that wraps it.
        let fd = unsafe { AsyncFd::register(inotify) }.map_err(|source| WatchError::SourceInit { source: source.into() })?;

        Ok(Self {
            fd: Some(fd),
            descriptors: HashMap::new(),
        })
    }

    fn inotify(&self) -> io::Result<&AsyncFd<Inotify>> {
        self.fd
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "inotify closed"))
    }

    /// Number of watch descriptors currently held.
    pub fn watch_count(&self) -> usize {
        self.descriptors.len()
    }

    fn watch_mask() -> WatchMask {
        WatchMask::CREATE
            | WatchMask::MODIFY
            | WatchMask::DELETE
            | WatchMask::MOVED_FROM
            | WatchMask::MOVED_TO
            | WatchMask::ATTRIB
    }
}

#[async_trait]
impl NotificationSource for InotifySource {
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
        let wd = self
            .inotify()?
            .get_ref()
            .watches()
            .add(path, Self::watch_mask())?;
        let handle = WatchHandle::new(wd.get_watch_descriptor_id());
        self.descriptors.insert(handle, wd);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        let wd = self.descriptors.remove(&handle).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no watch descriptor {handle}"),
            )
        })?;
        self.inotify()?.get_ref().watches().remove(wd)
    }

    fn forget(&mut self, handle: WatchHandle) {
        self.descriptors.remove(&handle);
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fd = self.inotify()?;
        loop {
            let mut guard = fd.readable().await?;
            match guard.try_io(|inner| {
                nix::unistd::read(inner.as_raw_fd(), buf).map_err(io::Error::from)
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.descriptors.clear();
        match self.fd.take() {
            Some(fd) => fd.into_inner().close(),
            None => Ok(()),
        }
    }
}
