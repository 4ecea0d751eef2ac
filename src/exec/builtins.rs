//! Built-in commands: `jobs`, `bg`, `fg`, `quit`.
//!
//! Builtins run inside the shell process and never create a job. A trailing
//! `&` is ignored.

use crate::config::types::{BuiltinError, JobState, Result, ShellError};
use crate::core::jobs::{Job, JobTable};
use crate::core::registry::with_jobs;
use crate::exec::executor::{wait_foreground, Flow};
use crate::kernel::signal;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Quit,
    Jobs,
    Bg,
    Fg,
}

impl Builtin {
    pub fn lookup(program: &str) -> Option<Self> {
        match program {
            "quit" => Some(Self::Quit),
            "jobs" => Some(Self::Jobs),
            "bg" => Some(Self::Bg),
            "fg" => Some(Self::Fg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Jobs => "jobs",
            Self::Bg => "bg",
            Self::Fg => "fg",
        }
    }
}

/// Which job a `bg`/`fg` argument names
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobTarget {
    /// Bare number: process (group) id
    Pid(Pid),
    /// `%n`: job id
    Jid(u32),
}

impl JobTarget {
    pub fn parse(cmd: &str, arg: Option<&str>) -> std::result::Result<Self, BuiltinError> {
        let arg = arg.ok_or_else(|| BuiltinError::MissingArgument {
            cmd: cmd.to_string(),
        })?;
        let invalid = || BuiltinError::InvalidArgument {
            cmd: cmd.to_string(),
        };

        let (digits, is_jid) = match arg.strip_prefix('%') {
            Some(jid) => (jid, true),
            None => (arg, false),
        };
        // Bare digits only: `str::parse` would also take a sign.
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        if is_jid {
            digits.parse().map(JobTarget::Jid).map_err(|_| invalid())
        } else {
            digits
                .parse()
                .map(|raw| JobTarget::Pid(Pid::from_raw(raw)))
                .map_err(|_| invalid())
        }
    }
}

/// Find the job `target` names
pub fn resolve<const N: usize>(
    table: &mut JobTable<N>,
    target: JobTarget,
) -> std::result::Result<&mut Job, BuiltinError> {
    match target {
        JobTarget::Jid(jid) => table
            .find_by_jid_mut(jid)
            .ok_or(BuiltinError::NoSuchJob { jid }),
        JobTarget::Pid(pid) => table
            .find_by_pid_mut(pid)
            .ok_or(BuiltinError::NoSuchProcess { pid: pid.as_raw() }),
    }
}

/// Continue the job `target` names and move it to `new_state`.
///
/// The state only changes once SIGCONT has been delivered, so a failed send
/// leaves the job as it was. Returns a copy of the updated job.
pub fn continue_job<const N: usize>(
    table: &mut JobTable<N>,
    target: JobTarget,
    new_state: JobState,
    send: impl FnOnce(Pid) -> nix::Result<()>,
) -> Result<Job> {
    let job = resolve(table, target)?;
    send(job.pid()).map_err(|e| {
        ShellError::Signal(format!("Failed to continue job [{}]: {}", job.jid(), e))
    })?;
    job.set_state(new_state);
    Ok(*job)
}

/// Run a builtin with its full argument vector
pub fn run<W: Write>(builtin: Builtin, argv: &[String], out: &mut W) -> Result<Flow> {
    match builtin {
        Builtin::Quit => return Ok(Flow::Exit),
        Builtin::Jobs => list_jobs(out)?,
        Builtin::Bg | Builtin::Fg => resume(builtin, argv.get(1).map(String::as_str), out)?,
    }
    Ok(Flow::Continue)
}

fn list_jobs<W: Write>(out: &mut W) -> Result<()> {
    // Format inside the window, write outside it.
    let lines: Vec<String> = with_jobs(|table| table.list().map(Job::listing).collect())?;
    for line in &lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

fn resume<W: Write>(builtin: Builtin, arg: Option<&str>, out: &mut W) -> Result<()> {
    let cmd = builtin.name();
    let target = JobTarget::parse(cmd, arg)?;
    let new_state = match builtin {
        Builtin::Fg => JobState::Foreground,
        _ => JobState::Background,
    };

    // SIGCONT and the state change happen in one window so the handler
    // cannot reap the job in between.
    let job = with_jobs(|table| {
        continue_job(table, target, new_state, |pgid| {
            signal::signal_group(pgid, Signal::SIGCONT)
        })
    })??;

    log::debug!("Job [{}] ({}) now {}", job.jid(), job.pid(), job.state());

    match new_state {
        JobState::Foreground => wait_foreground(job.pid()),
        _ => {
            writeln!(out, "{}", job.notice())?;
            out.flush()?;
            Ok(())
        }
    }
}
