//! Background service plumbing: detaching, PID file and termination signals.
//!
//! `daemonize` forks, so it must run before the tokio runtime is built.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::sys::stat::{Mode, umask};
use nix::unistd::{ForkResult, chdir, dup2, fork, setsid};
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Detach from the controlling terminal.
///
/// The parent exits with status 0. In the child: new session, umask 022,
/// working directory `/`, and stdin/stdout/stderr pointed at `/dev/null`.
/// Callers must make every path absolute beforehand.
pub fn daemonize() -> Result<()> {
    // SAFETY: called from main before any other thread (including the
    // tokio runtime) exists.
    match unsafe { fork() }.context("Failed to fork")? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    umask(Mode::S_IWGRP | Mode::S_IWOTH);
    setsid().context("Failed to create new session")?;
    chdir("/").context("Failed to change working directory")?;

    let devnull = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .context("Failed to open /dev/null")?;
    for target in 0..=2 {
        dup2(devnull.as_raw_fd(), target).context("Failed to redirect standard streams")?;
    }

    Ok(())
}

/// PID file that is removed when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to open PID file {}", path.display()))?;
        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("Failed to write PID file {}", path.display()))?;

        crate::debug_event!("daemon", "pid file", "{}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::error!("[daemon] failed to remove PID file {}: {e}", self.path.display());
        }
    }
}

/// Listens for SIGTERM, SIGINT and SIGHUP.
pub struct ShutdownSignals {
    term: Signal,
    int: Signal,
    hup: Signal,
}

impl ShutdownSignals {
    /// Install the handlers. Must be called inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
            hup: signal(SignalKind::hangup())?,
        })
    }

    /// Resolve on the first termination signal. SIGHUP is logged and ignored.
    pub async fn wait(mut self) {
        loop {
            tokio::select! {
                _ = self.term.recv() => {
                    crate::log_event!("daemon", "received SIGTERM, shutting down");
                    return;
                }
                _ = self.int.recv() => {
                    crate::log_event!("daemon", "received SIGINT, shutting down");
                    return;
                }
                _ = self.hup.recv() => {
                    tracing::warn!("[daemon] received SIGHUP, configuration reload is not supported");
                }
            }
        }
    }
}
