//! Environment variable layering for settings.

use std::fs;
use std::path::PathBuf;

use fswatcher::config::Settings;
use tempfile::TempDir;

// Environment is process-wide, so all env assertions live in one test.
#[test]
fn test_env_overrides_file_and_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        r#"
[watch]
max_watches = 64
patterns = ["*.log"]

[daemon]
pid_file = "/tmp/from-file.pid"
"#,
    )
    .unwrap();

    unsafe {
        std::env::set_var("FSWATCHER_WATCH__MAX_WATCHES", "2048");
        std::env::set_var("FSWATCHER_DAEMON__ENABLED", "true");
        std::env::set_var("FSWATCHER_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load(Some(&config_path)).unwrap();

    unsafe {
        std::env::remove_var("FSWATCHER_WATCH__MAX_WATCHES");
        std::env::remove_var("FSWATCHER_DAEMON__ENABLED");
        std::env::remove_var("FSWATCHER_LOGGING__DEFAULT");
    }

    assert_eq!(settings.watch.max_watches, 2048);
    assert_eq!(settings.watch.patterns, vec!["*.log"]);
    assert!(settings.daemon.enabled);
    assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/from-file.pid"));
    assert_eq!(settings.logging.default, "debug");
    assert_eq!(settings.log_file(), Some(PathBuf::from("/tmp/from-file.log")));
}
