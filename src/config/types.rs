/// Core types and structures for the tsh job-control shell
use std::fmt;
use thiserror::Error;

/// Maximum line size accepted from the terminal
pub const MAX_LINE: usize = 1024;

/// Maximum number of arguments on a command line
pub const MAX_ARGS: usize = 128;

/// Maximum number of live jobs at any point in time
pub const MAX_JOBS: usize = 16;

/// Upper bound for allocated job IDs
pub const MAX_JID: u32 = 1 << 16;

/// Command-line prompt
pub const PROMPT: &str = "tsh> ";

/// Job states.
///
/// Transitions and the actions enabling them:
/// - `Foreground -> Stopped`: ctrl-z (confirmed by SIGCHLD)
/// - `Stopped -> Foreground`: `fg`
/// - `Stopped -> Background`: `bg` or an external SIGCONT
/// - `Background -> Foreground`: `fg`
///
/// Termination removes the job instead of recording a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    /// Label used by the `jobs` listing
    pub fn label(self) -> &'static str {
        match self {
            Self::Foreground => "Foreground",
            Self::Background => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-input errors raised by the `bg`/`fg` builtins.
///
/// The `Display` text is exactly what the shell prints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuiltinError {
    #[error("{cmd} command requires PID or %jobid argument")]
    MissingArgument { cmd: String },

    #[error("{cmd}: argument must be a PID or %jobid")]
    InvalidArgument { cmd: String },

    #[error("%{jid}: No such job")]
    NoSuchJob { jid: u32 },

    #[error("({pid}): No such process")]
    NoSuchProcess { pid: i32 },
}

/// Error types for the shell
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Tried to create too many jobs (capacity {capacity})")]
    JobTableFull { capacity: usize },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("{0}: Command not found")]
    CommandNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Builtin(#[from] BuiltinError),
}

impl From<nix::errno::Errno> for ShellError {
    fn from(err: nix::errno::Errno) -> Self {
        ShellError::Process(err.to_string())
    }
}

impl ShellError {
    /// Whether the shell must stop. User-input and resource errors are
    /// reported and the read/eval loop continues; a broken process model or
    /// unusable stdio is not recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShellError::Io(_) | ShellError::Process(_) | ShellError::Config(_)
        )
    }
}

/// Result type for shell operations
pub type Result<T> = std::result::Result<T, ShellError>;
