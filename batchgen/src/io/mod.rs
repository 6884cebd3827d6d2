//! Side-effecting helpers: configuration, HTTP, files, terminal, signals.

pub mod client;
pub mod config;
pub mod elements;
pub mod init;
pub mod output;
pub mod pacing;
pub mod progress;
pub mod run_log;
pub mod signal;
