use crate::config::settings::ShellConfig;
use crate::config::types::{JobState, Result, ShellError};
use crate::core::registry::with_jobs;
/// Command evaluation and foreground waiting
use crate::exec::builtins::{self, Builtin};
use crate::exec::preexec::{child_exit, FreshChild, JobChild};
use crate::exec::redirect::CommandPlan;
use crate::kernel::signal::{self, SignalBlockGuard};
use crate::utils::cmdline::{parse_line, ParsedLine};
use nix::sys::signal::{SigSet, Signal};
use nix::unistd::{fork, setpgid, ForkResult, Pid};
use std::convert::Infallible;
use std::io::Write;

/// What the read/eval loop does after a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Command evaluator driving one line through builtin dispatch or job launch
pub struct Evaluator {
    config: ShellConfig,
}

impl Evaluator {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Evaluate one input line.
    ///
    /// Foreground jobs are waited for before this returns. User errors come
    /// back as non-fatal [`ShellError`]s for the caller to print.
    pub fn eval<W: Write>(&self, line: &str, out: &mut W) -> Result<Flow> {
        let parsed = parse_line(line)?;
        let Some(program) = parsed.program() else {
            return Ok(Flow::Continue);
        };

        if let Some(builtin) = Builtin::lookup(program) {
            return builtins::run(builtin, &parsed.argv, out);
        }

        self.launch(line, &parsed, out)?;
        Ok(Flow::Continue)
    }

    fn launch<W: Write>(&self, line: &str, parsed: &ParsedLine, out: &mut W) -> Result<()> {
        let plan = CommandPlan::parse(&parsed.argv)?;
        let state = if parsed.background {
            JobState::Background
        } else {
            JobState::Foreground
        };

        // Held until the job is in the table, so SIGCHLD for a child that
        // dies immediately is only handled once there is a job to remove.
        let guard = SignalBlockGuard::block()?;

        let full = with_jobs(|table| (!table.has_free_slot()).then(|| table.capacity()))?;
        if let Some(capacity) = full {
            log::debug!("Job table full, not launching {}", plan.last().program());
            return Err(ShellError::JobTableFull { capacity });
        }

        // Buffered output must not be duplicated into the child.
        out.flush()?;

        // SAFETY: the shell is single-threaded; the child only runs the
        // setup chain and then execs or exits.
        let pid = match unsafe { fork() }
            .map_err(|e| ShellError::Process(format!("fork failed: {}", e)))?
        {
            ForkResult::Child => {
                let err = match start_job(&plan, guard.previous()) {
                    Err(err) => err,
                    Ok(never) => match never {},
                };
                child_exit(&err)
            }
            ForkResult::Parent { child } => child,
        };

        // The child does the same; whichever runs first wins and the other
        // fails harmlessly (EACCES once the child has exec'd).
        let _ = setpgid(pid, pid);

        let inserted = with_jobs(|table| {
            let jid = table.insert(pid, state, line)?;
            Ok::<_, ShellError>(table.find_by_jid(jid).map(|job| (jid, job.notice())))
        })?;
        let notice = match inserted {
            Ok(Some((jid, notice))) => {
                log::debug!("Added job [{}] {} {}", jid, pid, line.trim_end());
                Some(notice)
            }
            Ok(None) => None,
            Err(err) => {
                let _ = signal::signal_group(pid, Signal::SIGKILL);
                return Err(err);
            }
        };
        drop(guard);

        match state {
            JobState::Foreground => wait_foreground(pid),
            _ => {
                if let Some(notice) = notice {
                    writeln!(out, "{}", notice)?;
                    out.flush()?;
                }
                Ok(())
            }
        }
    }
}

/// Child side of a launch: the whole setup chain in its fixed order
fn start_job(plan: &CommandPlan, mask: &SigSet) -> Result<Infallible> {
    JobChild::<FreshChild>::new(plan)
        .join_new_group()?
        .restore_signal_mask(mask)?
        .wire()?
        .exec()
}

/// Block until `pid` is no longer the foreground job.
///
/// Only the SIGCHLD handler changes the answer (by removing or stopping the
/// job), so the check runs with job signals blocked and the wait atomically
/// unblocks them. No polling, no lost wakeups.
pub fn wait_foreground(pid: Pid) -> Result<()> {
    let guard = SignalBlockGuard::block()?;
    let wake = guard.wake_mask();

    while is_foreground(pid)? {
        signal::suspend(&wake);
    }
    Ok(())
}

fn is_foreground(pid: Pid) -> Result<bool> {
    with_jobs(|table| {
        table
            .find_by_pid(pid)
            .is_some_and(|job| job.state() == JobState::Foreground)
    })
}
