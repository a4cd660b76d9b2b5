//! Watch registry: live watch handles and the directories they cover.
//!
//! The registry owns the notification source so that every OS-level watch
//! is created and released through one place, and enforces the configured
//! ceiling on live watches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::error::WatchError;
use super::source::{NotificationSource, WatchHandle};

/// Default ceiling on live watches.
pub const DEFAULT_MAX_WATCHES: usize = 512;

/// Registry of live watches keyed by handle.
pub struct WatchRegistry<S> {
    source: S,
    entries: HashMap<WatchHandle, PathBuf>,
    max_watches: usize,
}

impl<S: NotificationSource> WatchRegistry<S> {
    pub fn new(source: S, max_watches: usize) -> Self {
        Self {
            source,
            entries: HashMap::new(),
            max_watches,
        }
    }

    /// Install a watch for `path`.
    ///
    /// Fails with `CapacityExceeded` at the ceiling (the live count is left
    /// unchanged) and with `OsWatch` if the source rejects the path. Adding
    /// a directory that is already registered, or that the source already
    /// watches under another name, yields the existing handle, even at the
    /// ceiling for the former.
    pub fn install(&mut self, path: &Path) -> Result<WatchHandle, WatchError> {
        if let Some(handle) = self.handle_for(path) {
            crate::debug_event!("registry", "already watched", "{} (wd={handle})", path.display());
            return Ok(handle);
        }

        if self.entries.len() >= self.max_watches {
            return Err(WatchError::CapacityExceeded {
                limit: self.max_watches,
            });
        }

        let handle = self
            .source
            .add_watch(path)
            .map_err(|source| WatchError::OsWatch {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(existing) = self.entries.get(&handle) {
            crate::debug_event!(
                "registry",
                "already watched",
                "{} (wd={handle}, registered as {})",
                path.display(),
                existing.display()
            );
            return Ok(handle);
        }

        self.entries.insert(handle, path.to_path_buf());
        crate::log_event!(
            "registry",
            "watching directory",
            "{} (wd={handle})",
            path.display()
        );
        Ok(handle)
    }

    fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.entries
            .iter()
            .find(|(_, watched)| watched.as_path() == path)
            .map(|(handle, _)| *handle)
    }

    /// Path registered for `handle`, if the handle is live.
    pub fn resolve(&self, handle: WatchHandle) -> Option<&Path> {
        self.entries.get(&handle).map(PathBuf::as_path)
    }

    /// Remove one watch, releasing it at the source.
    pub fn remove(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        let path = self.entries.remove(&handle)?;
        if let Err(e) = self.source.remove_watch(handle) {
            tracing::warn!(
                "[registry] failed to remove watch {handle} for {}: {e}",
                path.display()
            );
        }
        Some(path)
    }

    /// Drop an entry whose OS-level watch is already gone.
    pub fn forget(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        self.source.forget(handle);
        let path = self.entries.remove(&handle)?;
        crate::debug_event!("registry", "watch dropped", "{} (wd={handle})", path.display());
        Some(path)
    }

    /// Remove every watch on `root` or below it. Returns how many were removed.
    pub fn retire_subtree(&mut self, root: &Path) -> usize {
        let stale: Vec<WatchHandle> = self
            .entries
            .iter()
            .filter(|(_, path)| path.starts_with(root))
            .map(|(handle, _)| *handle)
            .collect();

        for handle in &stale {
            if let Some(path) = self.remove(*handle) {
                crate::log_event!(
                    "registry",
                    "stopped watching",
                    "{} (wd={handle})",
                    path.display()
                );
            }
        }
        stale.len()
    }

    /// Release every live watch. Individual failures are logged.
    ///
    /// Returns the number of removal attempts made.
    pub fn remove_all(&mut self) -> usize {
        let mut attempts = 0;
        for (handle, path) in self.entries.drain() {
            attempts += 1;
            if let Err(e) = self.source.remove_watch(handle) {
                tracing::warn!(
                    "[registry] failed to remove watch {handle} for {}: {e}",
                    path.display()
                );
            }
        }
        attempts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_watches
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.values().map(PathBuf::as_path)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// Source that hands out sequential handles and records removals.
    #[derive(Default)]
    struct CountingSource {
        next: i32,
        by_path: HashMap<PathBuf, WatchHandle>,
        rejected: HashSet<PathBuf>,
        removed: Vec<WatchHandle>,
        forgotten: Vec<WatchHandle>,
    }

    #[async_trait::async_trait]
    impl NotificationSource for CountingSource {
        fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
            if self.rejected.contains(path) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            if let Some(handle) = self.by_path.get(path) {
                return Ok(*handle);
            }
            self.next += 1;
            let handle = WatchHandle::new(self.next);
            self.by_path.insert(path.to_path_buf(), handle);
            Ok(handle)
        }

        fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
            self.removed.push(handle);
            self.by_path.retain(|_, h| *h != handle);
            Ok(())
        }

        fn forget(&mut self, handle: WatchHandle) {
            self.forgotten.push(handle);
            self.by_path.retain(|_, h| *h != handle);
        }

        async fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::future::pending().await
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_install_then_resolve() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);

        let handle = registry.install(Path::new("/tmp/w")).unwrap();
        assert_eq!(registry.resolve(handle), Some(Path::new("/tmp/w")));
        assert_eq!(registry.resolve(WatchHandle::new(99)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capacity_ceiling() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 2);

        registry.install(Path::new("/a")).unwrap();
        registry.install(Path::new("/b")).unwrap();

        let err = registry.install(Path::new("/c")).unwrap_err();
        assert!(matches!(err, WatchError::CapacityExceeded { limit: 2 }));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.paths().filter(|p| *p == Path::new("/c")).count(), 0);
    }

    #[test]
    fn test_reinstall_at_capacity_returns_existing_handle() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 1);

        let handle = registry.install(Path::new("/a")).unwrap();
        assert_eq!(registry.install(Path::new("/a")).unwrap(), handle);
        assert_eq!(registry.len(), 1);

        let err = registry.install(Path::new("/b")).unwrap_err();
        assert!(matches!(err, WatchError::CapacityExceeded { limit: 1 }));
    }

    #[test]
    fn test_rejected_path_is_os_error() {
        let mut source = CountingSource::default();
        source.rejected.insert(PathBuf::from("/root/secret"));
        let mut registry = WatchRegistry::new(source, 8);

        let err = registry.install(Path::new("/root/secret")).unwrap_err();
        assert!(matches!(err, WatchError::OsWatch { .. }));
        assert!(err.to_string().contains("/root/secret"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_install_keeps_single_entry() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);

        let first = registry.install(Path::new("/a")).unwrap();
        let second = registry.install(Path::new("/a")).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_removed_handle_no_longer_resolves() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);
        let handle = registry.install(Path::new("/a")).unwrap();

        assert_eq!(registry.remove(handle), Some(PathBuf::from("/a")));
        assert_eq!(registry.resolve(handle), None);
        assert_eq!(registry.source().removed, vec![handle]);
    }

    #[test]
    fn test_forget_skips_removal_call() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);
        let handle = registry.install(Path::new("/a")).unwrap();

        registry.forget(handle);
        assert!(registry.is_empty());
        assert!(registry.source().removed.is_empty());
        // The source still drops its own record of the watch.
        assert_eq!(registry.source().forgotten, vec![handle]);
    }

    #[test]
    fn test_retire_subtree() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);
        registry.install(Path::new("/w")).unwrap();
        registry.install(Path::new("/w/old")).unwrap();
        registry.install(Path::new("/w/old/deep")).unwrap();
        registry.install(Path::new("/w/older")).unwrap();

        assert_eq!(registry.retire_subtree(Path::new("/w/old")), 2);

        let mut remaining: Vec<_> = registry.paths().map(Path::to_path_buf).collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![PathBuf::from("/w"), PathBuf::from("/w/older")]
        );
    }

    #[test]
    fn test_remove_all_attempts_every_watch() {
        let mut registry = WatchRegistry::new(CountingSource::default(), 8);
        for dir in ["/a", "/b", "/c"] {
            registry.install(Path::new(dir)).unwrap();
        }

        assert_eq!(registry.remove_all(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.source().removed.len(), 3);
        assert_eq!(registry.remove_all(), 0);
    }
}
