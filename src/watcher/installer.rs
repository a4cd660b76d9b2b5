//! Recursive watch installation.
//!
//! Walks a directory subtree physically (symlinks are not followed, so
//! cycles are impossible) and installs a watch on every directory below
//! the root. A failed install is logged and the walk continues.

use std::path::Path;

use walkdir::WalkDir;

use super::registry::WatchRegistry;
use super::source::NotificationSource;

/// Outcome of a subtree installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Watches successfully installed.
    pub installed: usize,
    /// Directories whose watch could not be installed.
    pub failed: usize,
    /// Entries the walk could not read.
    pub unreadable: usize,
}

impl InstallReport {
    fn merge(&mut self, other: InstallReport) {
        self.installed += other.installed;
        self.failed += other.failed;
        self.unreadable += other.unreadable;
    }
}

/// Install watches on every directory strictly below `root`.
///
/// The root itself is assumed to be watched by the caller.
pub fn install_recursively<S: NotificationSource>(
    registry: &mut WatchRegistry<S>,
    root: &Path,
) -> InstallReport {
    let mut report = InstallReport::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("[installer] failed to read {}: {e}", root.display());
                report.unreadable += 1;
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        match registry.install(entry.path()) {
            Ok(_) => report.installed += 1,
            Err(e) => {
                tracing::error!("[installer] {e}");
                report.failed += 1;
            }
        }
    }

    report
}

/// Extend coverage to a directory that appeared under a watched one.
///
/// Installs `dir` itself and then anything already below it, which catches
/// subdirectories created before the new watch took effect (`mkdir -p`).
pub fn extend<S: NotificationSource>(registry: &mut WatchRegistry<S>, dir: &Path) -> InstallReport {
    let mut report = InstallReport::default();

    match registry.install(dir) {
        Ok(_) => {
            report.installed += 1;
            crate::log_event!("installer", "added watch for new directory", "{}", dir.display());
        }
        Err(e) => {
            tracing::error!("[installer] {e}");
            report.failed += 1;
        }
    }

    report.merge(install_recursively(registry, dir));
    report
}
