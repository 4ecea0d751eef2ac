//! Signal bridge: OS notifications -> job table updates and forwarded signals.
//!
//! Handlers here run in signal context. They may only call
//! [`registry::with_jobs_in_handler`], `waitpid`, `kill` and raw writes.
//! No logging, no allocation, no blocking.

use crate::config::types::{JobState, Result};
use crate::core::jobs::JobTable;
use crate::core::registry;
use crate::kernel::signal::{self, ErrnoGuard, SignalSafeWriter};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether handlers emit job-table diagnostics (set once at startup)
static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// What one reported child status did to the job table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildEvent {
    /// Killed by a signal; job removed
    Terminated { jid: u32, pid: Pid, signal: Signal },
    /// Exited normally; job removed
    Exited { jid: u32, pid: Pid, code: i32 },
    /// Stopped by a signal; job kept as Stopped
    Stopped { jid: u32, pid: Pid, signal: Signal },
    /// Resumed from outside the shell; Stopped job now Background
    Resumed { jid: u32, pid: Pid },
}

impl ChildEvent {
    /// Write the user-visible notice (and the verbose diagnostic) for this
    /// event. Nothing here allocates.
    pub fn report<W: std::fmt::Write>(&self, out: &mut W, verbose: bool) -> std::fmt::Result {
        match *self {
            ChildEvent::Terminated { jid, pid, signal } => {
                writeln!(out, "Job [{}] ({}) terminated by signal {}", jid, pid, signal as i32)?;
                if verbose {
                    writeln!(out, "Deleted job [{}] {}", jid, pid)?;
                }
            }
            ChildEvent::Exited { jid, pid, .. } => {
                if verbose {
                    writeln!(out, "Deleted job [{}] {}", jid, pid)?;
                }
            }
            ChildEvent::Stopped { jid, pid, signal } => {
                writeln!(out, "Job [{}] ({}) stopped by signal {}", jid, pid, signal as i32)?;
            }
            ChildEvent::Resumed { jid, pid } => {
                if verbose {
                    writeln!(out, "Job [{}] ({}) continued", jid, pid)?;
                }
            }
        }
        Ok(())
    }
}

/// Apply one child status report to `table`.
///
/// Untracked pids and uninteresting statuses yield `None`.
pub fn apply_child_status<const N: usize>(
    table: &mut JobTable<N>,
    status: WaitStatus,
) -> Option<ChildEvent> {
    match status {
        WaitStatus::Signaled(pid, signal, _) => {
            let jid = table.find_by_pid(pid)?.jid();
            table.remove(pid);
            Some(ChildEvent::Terminated { jid, pid, signal })
        }
        WaitStatus::Exited(pid, code) => {
            let jid = table.find_by_pid(pid)?.jid();
            table.remove(pid);
            Some(ChildEvent::Exited { jid, pid, code })
        }
        WaitStatus::Stopped(pid, signal) => {
            let job = table.find_by_pid_mut(pid)?;
            job.set_state(JobState::Stopped);
            Some(ChildEvent::Stopped {
                jid: job.jid(),
                pid,
                signal,
            })
        }
        WaitStatus::Continued(pid) => {
            let job = table.find_by_pid_mut(pid)?;
            if job.state() != JobState::Stopped {
                return None;
            }
            job.set_state(JobState::Background);
            Some(ChildEvent::Resumed { jid: job.jid(), pid })
        }
        _ => None,
    }
}

fn emit(event: &ChildEvent) {
    let mut out = SignalSafeWriter::<256>::new();
    let _ = event.report(&mut out, VERBOSE.load(Ordering::Relaxed));
    out.flush_to(libc::STDOUT_FILENO);
}

/// SIGCHLD: reap every child with a status to report, without blocking.
/// One delivery can stand for several children.
extern "C" fn sigchld_handler(_sig: libc::c_int) {
    let _errno = ErrnoGuard::save();
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;

    loop {
        let status = match waitpid(Pid::from_raw(-1), Some(flags)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => status,
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        };

        let event = registry::with_jobs_in_handler(|table| apply_child_status(table, status));
        if let Some(Some(event)) = event {
            emit(&event);
        }
    }
}

fn forward_to_foreground(sig: Signal) {
    let target = registry::with_jobs_in_handler(|table| table.foreground_pid());
    if let Some(Some(pgid)) = target {
        let _ = signal::signal_group(pgid, sig);
    }
}

/// SIGINT: interrupt the foreground job's whole group, never the shell
extern "C" fn sigint_handler(_sig: libc::c_int) {
    let _errno = ErrnoGuard::save();
    forward_to_foreground(Signal::SIGINT);
}

/// SIGTSTP: stop the foreground job's group. The Stopped state is recorded
/// only once SIGCHLD confirms the stop.
extern "C" fn sigtstp_handler(_sig: libc::c_int) {
    let _errno = ErrnoGuard::save();
    forward_to_foreground(Signal::SIGTSTP);
}

/// SIGQUIT: a clean way for a driver to kill the shell
extern "C" fn sigquit_handler(_sig: libc::c_int) {
    signal::write_raw(
        libc::STDOUT_FILENO,
        b"Terminating after receipt of SIGQUIT signal\n",
    );
    signal::exit_immediately(1);
}

/// Signals whose dispositions the shell changes; children reset these
pub const HANDLED_SIGNALS: [Signal; 4] = [
    Signal::SIGCHLD,
    Signal::SIGINT,
    Signal::SIGTSTP,
    Signal::SIGQUIT,
];

/// Install all bridge handlers.
/// Must be called before the first job is created.
pub fn install() -> Result<()> {
    signal::install_handler(Signal::SIGINT, sigint_handler)?;
    signal::install_handler(Signal::SIGTSTP, sigtstp_handler)?;
    signal::install_handler(Signal::SIGCHLD, sigchld_handler)?;
    signal::install_handler(Signal::SIGQUIT, sigquit_handler)?;

    log::debug!("Signal handlers installed (SIGINT, SIGTSTP, SIGCHLD, SIGQUIT)");
    Ok(())
}
