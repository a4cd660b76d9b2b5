//! CLI argument parsing using clap.

use clap::{
    Parser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::Settings;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const EXAMPLES: &str = "\
Examples:
  fswatcher /home/user/docs             # Watch all files in docs
  fswatcher -r /var/log \"*.log\"         # Watch log files recursively
  fswatcher -d -p /tmp/fw.pid /etc      # Watch /etc as a daemon";

/// Watch a directory tree and report filesystem changes.
#[derive(Parser, Debug)]
#[command(name = "fswatcher", version, about, long_about = None)]
#[command(styles = clap_cargo_style(), after_help = EXAMPLES)]
pub struct Cli {
    /// Directory to watch
    pub path: PathBuf,

    /// Only report files matching these glob patterns
    pub patterns: Vec<String>,

    /// Run as a daemon
    #[arg(short, long)]
    pub daemon: bool,

    /// Watch directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// PID file location (default: /var/run/fswatcher.pid)
    #[arg(short, long = "pid", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Configuration file (default: ~/.config/fswatcher/settings.toml)
    #[arg(short, long, value_name = "FILE", env = "FSWATCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    ///
    /// Flags only ever switch features on; positional patterns replace any
    /// configured ones.
    pub fn apply(&self, settings: &mut Settings) {
        if self.recursive {
            settings.watch.recursive = true;
        }
        if self.daemon {
            settings.daemon.enabled = true;
        }
        if let Some(pid_file) = &self.pid_file {
            settings.daemon.pid_file = pid_file.clone();
        }
        if !self.patterns.is_empty() {
            settings.watch.patterns = self.patterns.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_path_and_patterns() {
        let cli = Cli::try_parse_from(["fswatcher", "-r", "/var/log", "*.log", "*.txt"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("/var/log"));
        assert_eq!(cli.patterns, vec!["*.log", "*.txt"]);
        assert!(cli.recursive);
        assert!(!cli.daemon);
    }

    #[test]
    fn test_daemon_flags() {
        let cli = Cli::try_parse_from(["fswatcher", "-d", "-p", "/tmp/fw.pid", "/etc"]).unwrap();
        assert!(cli.daemon);
        assert_eq!(cli.pid_file, Some(PathBuf::from("/tmp/fw.pid")));

        let long = Cli::try_parse_from(["fswatcher", "--daemon", "--pid=/tmp/x.pid", "/etc"]).unwrap();
        assert_eq!(long.pid_file, Some(PathBuf::from("/tmp/x.pid")));
    }

    #[test]
    fn test_path_is_required() {
        assert!(Cli::try_parse_from(["fswatcher"]).is_err());
    }

    #[test]
    fn test_apply_overrides_settings() {
        let mut settings = Settings::default();
        settings.watch.patterns = vec!["*.conf".to_string()];

        let cli = Cli::try_parse_from(["fswatcher", "-d", "-p", "/tmp/fw.pid", "/etc"]).unwrap();
        cli.apply(&mut settings);

        assert!(settings.daemon.enabled);
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/fw.pid"));
        // No positional patterns: configured ones stay
        assert_eq!(settings.watch.patterns, vec!["*.conf"]);

        let cli = Cli::try_parse_from(["fswatcher", "/etc", "*.rs"]).unwrap();
        cli.apply(&mut settings);
        assert_eq!(settings.watch.patterns, vec!["*.rs"]);
    }
}
