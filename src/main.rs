//! fswatcher: report file changes under a directory tree.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use fswatcher::cli::Cli;
use fswatcher::config::Settings;
use fswatcher::daemon::{self, PidFile, ShutdownSignals};
use fswatcher::logging;
use fswatcher::watcher::{EventKind, InotifySource, WatcherBuilder, handlers::ReportHandler, pattern};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut settings);

    if cli.print_config {
        return match settings.to_toml() {
            Ok(toml) => {
                print!("{toml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let root = match prepare(&cli.path, &mut settings) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if settings.daemon.enabled {
        if let Err(e) = daemon::daemonize() {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    }

    let log_file = settings.log_file();
    if let Err(e) = logging::init_with_config(&settings.logging, log_file.as_deref()) {
        tracing::warn!("[main] could not open log file, using stderr: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("[main] failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(root, &settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[main] {e:#}");
            if !settings.daemon.enabled {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Validate inputs before detaching; the daemon runs from `/` afterwards.
fn prepare(path: &Path, settings: &mut Settings) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Cannot watch {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    if settings.daemon.pid_file.is_relative() {
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        settings.daemon.pid_file = cwd.join(&settings.daemon.pid_file);
    }

    for glob in &settings.watch.patterns {
        pattern::compile(glob)?;
    }

    Ok(root)
}

async fn run(root: PathBuf, settings: &Settings) -> Result<()> {
    let foreground = !settings.daemon.enabled;

    let _pid_file = if settings.daemon.enabled {
        Some(PidFile::create(&settings.daemon.pid_file)?)
    } else {
        None
    };

    let source = InotifySource::new()?;

    let mut builder = WatcherBuilder::new(root)
        .recursive(settings.watch.recursive)
        .patterns(settings.watch.patterns.iter().cloned())
        .max_watches(settings.watch.max_watches)
        .max_callbacks(settings.watch.max_callbacks)
        .buffer_size(settings.watch.buffer_size);
    for kind in [EventKind::Created, EventKind::Deleted, EventKind::Modified] {
        builder = builder.handler(kind.into(), None, ReportHandler::new(kind, foreground));
    }
    let mut watcher = builder.build(source)?;

    if foreground && !settings.watch.patterns.is_empty() {
        println!("Filtering for patterns: {}", settings.watch.patterns.join(", "));
    }

    let report = watcher.start()?;
    if report.failed > 0 || report.unreadable > 0 {
        tracing::warn!(
            "[main] {} directories could not be watched, {} could not be read",
            report.failed,
            report.unreadable
        );
    }

    if foreground {
        println!(
            "Watching {} ({} directories). Press Ctrl+C to stop.",
            watcher.root().display(),
            watcher.registry().len()
        );
    }

    let signals = ShutdownSignals::install().context("Failed to install signal handlers")?;
    watcher.run(signals.wait()).await?;

    Ok(())
}
