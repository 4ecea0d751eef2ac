//! Thin wrappers around Unix kernel primitives.
//!
//! Signal-related `unsafe` code is concentrated here with explicit SAFETY comments.

pub mod signal;
