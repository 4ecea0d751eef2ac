use crate::config::types::{Result, ShellError};
use crate::core::bridge::HANDLED_SIGNALS;
use crate::exec::redirect::{CommandPlan, Stage};
use crate::kernel::signal::{self, exit_immediately};
/// Job child setup
///
/// The sequence run in a freshly forked job leader is FIXED:
/// 1. become leader of a new process group, restore default dispositions
/// 2. restore the signal mask the shell had before it blocked SIGCHLD
/// 3. wire pipes and redirections (forking earlier pipeline stages)
/// 4. exec the program
///
/// It is a type-state chain so a different order does not compile. Nothing
/// in the chain reads or writes the shell's job table.
use nix::sys::signal::{SigSet, SigmaskHow};
use nix::unistd::{dup2, fork, pipe, setpgid, ForkResult, Pid};
use std::convert::Infallible;
use std::ffi::CString;
use std::io::Write;
use std::marker::PhantomData;
use std::os::fd::{AsRawFd, OwnedFd};

/// Exit status of a child whose program could not be invoked
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit status of a child whose setup failed before exec
pub const EXIT_SETUP_FAILED: i32 = 1;

/// Type-state marker: just forked, still in the shell's process group
pub struct FreshChild;

/// Type-state marker: leader of its own process group
pub struct Grouped;

/// Type-state marker: signal mask restored
pub struct Unmasked;

/// Type-state marker: descriptors wired, ready for exec
pub struct Wired;

/// Job leader process with type-state tracking
///
/// Exec is only reachable from `Wired`:
///
/// ```compile_fail
/// use tsh::exec::preexec::{FreshChild, JobChild};
/// use tsh::exec::redirect::CommandPlan;
///
/// let plan = CommandPlan::parse(&["true".to_string()]).unwrap();
/// let _ = JobChild::<FreshChild>::new(&plan).exec();
/// ```
///
/// and wiring cannot skip restoring the signal mask:
///
/// ```compile_fail
/// use tsh::exec::preexec::{FreshChild, JobChild};
/// use tsh::exec::redirect::CommandPlan;
///
/// let plan = CommandPlan::parse(&["true".to_string()]).unwrap();
/// let grouped = JobChild::<FreshChild>::new(&plan).join_new_group().unwrap();
/// let _ = grouped.wire();
/// ```
pub struct JobChild<'a, S> {
    plan: &'a CommandPlan,
    _state: PhantomData<S>,
}

impl<'a, S> JobChild<'a, S> {
    fn advance<T>(self) -> JobChild<'a, T> {
        JobChild {
            plan: self.plan,
            _state: PhantomData,
        }
    }

    pub fn plan(&self) -> &CommandPlan {
        self.plan
    }
}

impl<'a> JobChild<'a, FreshChild> {
    pub fn new(plan: &'a CommandPlan) -> Self {
        Self {
            plan,
            _state: PhantomData,
        }
    }

    /// Step 1: `setpgid(0, 0)` so group-targeted signals reach only this
    /// job, then drop the shell's handlers (they would act on the child's
    /// stale copy of the job table).
    pub fn join_new_group(self) -> Result<JobChild<'a, Grouped>> {
        setpgid(Pid::from_raw(0), Pid::from_raw(0))
            .map_err(|e| ShellError::Process(format!("setpgid failed: {}", e)))?;
        signal::reset_dispositions(&HANDLED_SIGNALS)?;
        Ok(self.advance())
    }
}

impl<'a> JobChild<'a, Grouped> {
    /// Step 2: reinstate the mask in effect before the shell blocked SIGCHLD
    pub fn restore_signal_mask(self, mask: &SigSet) -> Result<JobChild<'a, Unmasked>> {
        nix::sys::signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(mask), None)
            .map_err(|e| ShellError::Signal(format!("Failed to restore signal mask: {}", e)))?;
        Ok(self.advance())
    }
}

impl<'a> JobChild<'a, Unmasked> {
    /// Step 3: fork every stage but the last, chaining stdout to the next
    /// stage's stdin, then apply the last stage's redirections here.
    /// Stage processes inherit this process group.
    pub fn wire(self) -> Result<JobChild<'a, Wired>> {
        let stages = self.plan.stages();
        let (leader_stage, upstream_stages) = stages
            .split_last()
            .ok_or_else(|| ShellError::InvalidCommand("missing command".to_string()))?;

        let mut upstream: Option<OwnedFd> = None;
        for stage in upstream_stages {
            let (read_end, write_end) =
                pipe().map_err(|e| ShellError::Process(format!("pipe failed: {}", e)))?;

            // SAFETY: single-threaded process; the child only rewires fds
            // and execs or exits.
            match unsafe { fork() }.map_err(|e| ShellError::Process(format!("fork failed: {}", e)))? {
                ForkResult::Child => {
                    drop(read_end);
                    run_stage(stage, upstream.take(), write_end)
                }
                ForkResult::Parent { .. } => {
                    drop(write_end);
                    upstream = Some(read_end);
                }
            }
        }

        if let Some(input) = upstream {
            install_fd(&input, libc::STDIN_FILENO)?;
        }
        leader_stage.apply_redirects()?;

        Ok(self.advance())
    }
}

impl<'a> JobChild<'a, Wired> {
    /// Step 4: replace the process image. Only returns on failure.
    pub fn exec(self) -> Result<Infallible> {
        exec_argv(&self.plan.last().argv)
    }
}

fn install_fd(fd: &OwnedFd, target: libc::c_int) -> Result<()> {
    dup2(fd.as_raw_fd(), target)
        .map_err(|e| ShellError::Process(format!("dup2({}): {}", target, e)))?;
    Ok(())
}

/// Body of a non-final pipeline stage
fn run_stage(stage: &Stage, input: Option<OwnedFd>, output: OwnedFd) -> ! {
    let wired = (|| {
        if let Some(input) = input {
            install_fd(&input, libc::STDIN_FILENO)?;
        }
        install_fd(&output, libc::STDOUT_FILENO)?;
        drop(output);
        stage.apply_redirects()
    })();

    let err = match wired.and_then(|_| exec_argv(&stage.argv)) {
        Err(err) => err,
        Ok(never) => match never {},
    };
    child_exit(&err)
}

/// Execute a program from an argv vector, searching `PATH`.
pub fn exec_argv(argv: &[String]) -> Result<Infallible> {
    let program = argv
        .first()
        .ok_or_else(|| ShellError::InvalidCommand("empty argv for exec".to_string()))?;

    let mut cargv = Vec::with_capacity(argv.len());
    for arg in argv {
        let c = CString::new(arg.as_str())
            .map_err(|_| ShellError::InvalidCommand("command contains NUL byte".to_string()))?;
        cargv.push(c);
    }

    nix::unistd::execvp(cargv[0].as_c_str(), &cargv).map_err(|e| {
        log::debug!("execvp({}) failed: {}", program, e);
        ShellError::CommandNotFound(program.clone())
    })
}

/// Report a child-side failure on stdout and terminate the child (never the
/// shell). Skips atexit handlers and the parent's inherited buffers.
pub fn child_exit(err: &ShellError) -> ! {
    let code = match err {
        ShellError::CommandNotFound(_) => EXIT_NOT_FOUND,
        _ => EXIT_SETUP_FAILED,
    };

    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{}", err);
    let _ = stdout.flush();
    exit_immediately(code)
}
