//! Batch image generation against the Venice image API.
//!
//! A run produces a configured number of images from one base prompt. Each
//! image gets a prompt enhanced with randomly chosen phrases, a sampled
//! guidance scale, and a fresh seed. The crate is split the same way as the
//! rest of this workspace:
//!
//! - **[`core`]**: Pure, deterministic logic (sampling, enhancement, naming,
//!   response classification, payload validation). Randomness enters only
//!   through [`core::random::RandomSource`].
//! - **[`io`]**: Side-effecting operations (configuration files, HTTP, image
//!   files, run log, signals, terminal). Isolated behind traits to enable
//!   scripted doubles in tests.
//!
//! [`engine`] drives the generation loop; [`start`] performs the one-time
//! startup that precedes it.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod start;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
