//! Utilities
//!
//! Command-line tokenizing.

pub mod cmdline;
