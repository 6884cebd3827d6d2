//! Stable exit codes for batchgen CLI commands.

/// Command succeeded, or a run processed every requested image.
pub const OK: i32 = 0;
/// Invalid configuration, unreachable service, or any other startup failure.
pub const INVALID: i32 = 1;
/// The service rejected the API key mid-run.
pub const AUTH: i32 = 2;
/// The run was interrupted by Ctrl-C or SIGTERM.
pub const INTERRUPTED: i32 = 3;
/// The run stopped after repeated failed attempts.
pub const CIRCUIT_OPEN: i32 = 4;
