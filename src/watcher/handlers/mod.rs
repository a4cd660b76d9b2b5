//! Built-in event handlers.

mod report;

pub use report::ReportHandler;
