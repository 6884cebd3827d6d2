//! Deterministic, pure logic for the generation loop.
//!
//! Core modules must be free of I/O side effects. Randomness is injected via
//! [`random::RandomSource`] so every function here is testable in isolation.

pub mod cfg_scale;
pub mod classifier;
pub mod enhancer;
pub mod naming;
pub mod random;
pub mod types;
pub mod validator;
