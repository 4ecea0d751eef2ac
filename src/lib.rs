//! tsh: a tiny Unix shell with job control
//!
//! Runs each command line as a job in its own process group, in the
//! foreground or the background, and lets the user list, stop, resume and
//! interrupt jobs.
//!
//! # Architecture
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::signal`]: Handler installation, mask guards, suspend, async-signal-safe output
//!
//! ## Job Control Core ([`core`])
//! - [`core::jobs`]: Fixed-capacity job table
//! - [`core::registry`]: The process-wide table and its access discipline
//! - [`core::bridge`]: SIGCHLD/SIGINT/SIGTSTP/SIGQUIT handlers
//!
//! ## Execution Control ([`exec`])
//! - [`exec::executor`]: Command evaluator and foreground waiter
//! - [`exec::preexec`]: Type-state enforced child setup ordering
//! - [`exec::redirect`]: Redirection and pipe planning
//! - [`exec::builtins`]: `jobs`, `bg`, `fg`, `quit`
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Limits, job states, error types
//! - [`config::settings`]: Runtime configuration from flags and JSON
//!
//! ## Utilities ([`utils`])
//! - [`utils::cmdline`]: Command-line tokenizer
//!
//! # Design Principles
//!
//! 1. **Kernel as truth** - Job state changes only on wait status reports
//! 2. **Masks, not locks** - The job table is shared with signal handlers
//! 3. **Types prevent errors** - Child setup order is checked at compile time
//! 4. **Minimal unsafe** - Thin wrappers with explicit preconditions

// Kernel Primitives
pub mod kernel;

// Job Control Core
pub mod core;

// Execution Control
pub mod exec;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the tsh binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
