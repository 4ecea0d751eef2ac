//! Configuration and shared types
//!
//! Limits, job states, error taxonomy and the runtime shell configuration.

pub mod settings;
pub mod types;
