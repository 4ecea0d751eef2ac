//! Execution control
//!
//! Evaluates command lines, launches jobs with type-state enforced child setup
//! and runs the builtins.

pub mod builtins;
pub mod executor;
pub mod preexec;
pub mod redirect;
