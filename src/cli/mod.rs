//! CLI module for the directory watcher.
//!
//! Provides command-line interface parsing and turns parsed flags into
//! configuration overrides.

pub mod args;

pub use args::Cli;
