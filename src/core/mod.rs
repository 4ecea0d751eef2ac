//! Job control core.
//!
//! Core owns the job table, its process-wide instance and the signal
//! handlers that keep it in sync with the kernel's view of child processes.

pub mod bridge;
pub mod jobs;
pub mod registry;
