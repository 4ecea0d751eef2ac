//! Redirection and pipe planning.
//!
//! The plan is built in the shell before fork (so syntax errors never create
//! a job) and applied only in the child, where it rewires file descriptors.
//! Nothing here touches the job table.

use crate::config::types::{Result, ShellError};
use nix::unistd::{close, dup2};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::PathBuf;

/// One file redirection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// `< file`
    Input(PathBuf),
    /// `> file`
    Output(PathBuf),
    /// `>> file`
    Append(PathBuf),
    /// `2> file`
    Error(PathBuf),
}

impl Redirect {
    /// Operators, longest first so `>>` and `2>` win over `>`
    const OPERATORS: [&'static str; 4] = ["2>", ">>", ">", "<"];

    fn build(op: &str, path: &str) -> Self {
        let path = PathBuf::from(path);
        match op {
            "2>" => Redirect::Error(path),
            ">>" => Redirect::Append(path),
            ">" => Redirect::Output(path),
            _ => Redirect::Input(path),
        }
    }

    /// Descriptor this redirection replaces
    pub fn target_fd(&self) -> RawFd {
        match self {
            Redirect::Input(_) => libc::STDIN_FILENO,
            Redirect::Output(_) | Redirect::Append(_) => libc::STDOUT_FILENO,
            Redirect::Error(_) => libc::STDERR_FILENO,
        }
    }

    fn open(&self) -> std::io::Result<File> {
        match self {
            Redirect::Input(path) => File::open(path),
            Redirect::Output(path) | Redirect::Error(path) => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o666)
                .open(path),
            Redirect::Append(path) => OpenOptions::new()
                .append(true)
                .create(true)
                .mode(0o666)
                .open(path),
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Redirect::Input(p) | Redirect::Output(p) | Redirect::Append(p) | Redirect::Error(p) => p,
        }
    }

    /// Open the file and install it on the target descriptor
    pub fn apply(&self) -> Result<()> {
        let file = self.open().map_err(|e| {
            ShellError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", self.path().display(), e),
            ))
        })?;
        let fd = file.into_raw_fd();
        if fd != self.target_fd() {
            dup2(fd, self.target_fd())
                .map_err(|e| ShellError::Process(format!("dup2({}): {}", self.target_fd(), e)))?;
            let _ = close(fd);
        }
        Ok(())
    }
}

/// One program of a pipeline with its own redirections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stage {
    pub argv: Vec<String>,
    pub redirects: Vec<Redirect>,
}

impl Stage {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Apply redirections in order; a later one on the same fd wins
    pub fn apply_redirects(&self) -> Result<()> {
        for redirect in &self.redirects {
            redirect.apply()?;
        }
        Ok(())
    }
}

/// Pipeline of one or more stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    stages: Vec<Stage>,
}

impl CommandPlan {
    /// Split `argv` on `|` and pull redirection words out of each stage.
    ///
    /// An operator may be its own word (`> out`) or prefix its file (`>out`).
    pub fn parse(argv: &[String]) -> Result<Self> {
        let mut stages = Vec::new();
        let mut current = Stage::default();
        let mut words = argv.iter();

        while let Some(word) = words.next() {
            if word == "|" {
                if current.argv.is_empty() {
                    return Err(ShellError::InvalidCommand(
                        "syntax error near unexpected token `|'".to_string(),
                    ));
                }
                stages.push(std::mem::take(&mut current));
                continue;
            }

            let Some(op) = Redirect::OPERATORS.iter().find(|op| word.starts_with(*op)) else {
                current.argv.push(word.clone());
                continue;
            };

            let attached = &word[op.len()..];
            let path = if attached.is_empty() {
                words.next().map(String::as_str).ok_or_else(|| {
                    ShellError::InvalidCommand(format!("syntax error: `{}' needs a file name", op))
                })?
            } else {
                attached
            };
            current.redirects.push(Redirect::build(op, path));
        }

        if current.argv.is_empty() {
            let message = if stages.is_empty() {
                "missing command".to_string()
            } else {
                "syntax error near unexpected token `|'".to_string()
            };
            return Err(ShellError::InvalidCommand(message));
        }
        stages.push(current);

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage run by the job's group leader
    pub fn last(&self) -> &Stage {
        // parse() never yields an empty plan
        &self.stages[self.stages.len() - 1]
    }
}
