//! Handler that reports each qualifying event.
//!
//! In the foreground it prints `CALLBACK: File <verb>: <dir>/<name>` to
//! stdout. In daemon mode stdout is gone, so it logs at debug level instead.

use std::path::Path;

use crate::watcher::{EventHandler, EventKind, WatchError};

/// Reports one kind of change for every event it is dispatched.
#[derive(Debug, Clone)]
pub struct ReportHandler {
    name: String,
    kind: EventKind,
    to_stdout: bool,
}

impl ReportHandler {
    pub fn new(kind: EventKind, to_stdout: bool) -> Self {
        Self {
            name: format!("report-{}", kind.verb().replace(' ', "-")),
            kind,
            to_stdout,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The line printed for an event in `dir` named `filename`.
    pub fn line(&self, dir: &Path, filename: &str) -> String {
        format!(
            "CALLBACK: File {}: {}",
            self.kind.verb(),
            dir.join(filename).display()
        )
    }
}

impl EventHandler for ReportHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, dir: &Path, filename: &str) -> Result<(), WatchError> {
        if self.to_stdout {
            println!("{}", self.line(dir, filename));
        } else {
            crate::debug_event!(self.name, "callback", "{}", dir.join(filename).display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_line() {
        let handler = ReportHandler::new(EventKind::Created, false);
        assert_eq!(
            handler.line(Path::new("/tmp/w"), "app.log"),
            "CALLBACK: File created: /tmp/w/app.log"
        );
        assert_eq!(handler.name(), "report-created");
    }

    #[test]
    fn test_name_has_no_spaces() {
        let handler = ReportHandler::new(EventKind::MovedFrom, true);
        assert_eq!(handler.name(), "report-moved-from");
        assert_eq!(handler.kind(), EventKind::MovedFrom);
    }

    #[test]
    fn test_on_event_succeeds() {
        let handler = ReportHandler::new(EventKind::Deleted, false);
        assert!(handler.on_event(Path::new("/w"), "gone.txt").is_ok());
    }
}
