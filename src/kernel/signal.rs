use crate::config::types::{Result, ShellError};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
/// Async-safe signal plumbing for tsh
///
/// Everything a handler may touch lives here: installation with a mask that
/// serializes the job handlers against each other, the block guard used by
/// the control loop around job-table windows, the suspend primitive, and
/// allocation-free output.
use std::fmt;

/// Signals whose handlers mutate or read the job table.
pub const JOB_SIGNALS: [Signal; 3] = [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTSTP];

/// Raw handler signature accepted by `sigaction`
pub type RawHandler = extern "C" fn(libc::c_int);

/// Set containing every job signal
pub fn job_signal_set() -> SigSet {
    let mut mask = SigSet::empty();
    for sig in JOB_SIGNALS {
        mask.add(sig);
    }
    mask
}

/// Install `handler` for `sig`.
///
/// Interrupted syscalls restart, and all job signals are blocked while any
/// handler runs so two handlers never hold the job table at once.
pub fn install_handler(sig: Signal, handler: RawHandler) -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::SA_RESTART,
        job_signal_set(),
    );

    // SAFETY: handlers registered through this function only perform
    // async-signal-safe work (waitpid, kill, write, atomics).
    unsafe { signal::sigaction(sig, &action) }
        .map_err(|e| ShellError::Signal(format!("Failed to install {} handler: {}", sig, e)))?;

    Ok(())
}

/// Restore default dispositions for the shell's handled signals.
/// Called in a freshly forked child before it unmasks anything.
pub fn reset_dispositions(signals: &[Signal]) -> Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for &sig in signals {
        // SAFETY: SIG_DFL installs no Rust code.
        unsafe { signal::sigaction(sig, &action) }
            .map_err(|e| ShellError::Signal(format!("Failed to reset {}: {}", sig, e)))?;
    }
    Ok(())
}

/// Block signals for a critical section.
/// Restores the mask that was in effect before `block` on drop, so guards nest.
pub struct SignalBlockGuard {
    previous: SigSet,
}

impl SignalBlockGuard {
    /// Block every job signal
    pub fn block() -> Result<Self> {
        let mut previous = SigSet::empty();
        signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&job_signal_set()), Some(&mut previous))
            .map_err(|e| ShellError::Signal(format!("Failed to block signals: {}", e)))?;

        Ok(Self { previous })
    }

    /// Mask that was in effect before this guard was taken
    pub fn previous(&self) -> &SigSet {
        &self.previous
    }

    /// Previous mask with every job signal removed: the mask to suspend
    /// under so any job notification can wake the waiter.
    pub fn wake_mask(&self) -> SigSet {
        let mut mask = self.previous;
        for sig in JOB_SIGNALS {
            mask.remove(sig);
        }
        mask
    }
}

impl Drop for SignalBlockGuard {
    fn drop(&mut self) {
        let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
    }
}

/// Replace the signal mask with `mask` and sleep until a handler has run.
/// The swap and the sleep are atomic, so a signal made pending while it was
/// blocked is delivered here rather than lost.
pub fn suspend(mask: &SigSet) {
    // SAFETY: `mask` is a valid, initialized sigset_t. sigsuspend always
    // returns -1/EINTR after a handler ran; there is nothing to report.
    unsafe {
        libc::sigsuspend(mask.as_ref());
    }
}

/// Send `sig` to every process in the group led by `pgid`
pub fn signal_group(pgid: nix::unistd::Pid, sig: Signal) -> nix::Result<()> {
    signal::killpg(pgid, sig)
}

/// Write all of `bytes` to `fd` with raw `write(2)` calls.
/// Async-signal-safe: no locks, no allocation.
pub fn write_raw(fd: libc::c_int, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: pointer and length come from a live slice.
        let rc = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if rc < 0 {
            if std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return;
        }
        if rc == 0 {
            return;
        }
        bytes = &bytes[rc as usize..];
    }
}

/// Terminate immediately without running atexit handlers or flushing
/// userspace buffers. Safe in handler context and in a forked child.
pub fn exit_immediately(code: i32) -> ! {
    // SAFETY: _exit is async-signal-safe and never returns.
    unsafe { libc::_exit(code) }
}

/// Fixed-capacity line buffer formatted with `core::fmt`, flushed with one
/// raw write. Used where `println!` is off limits.
/// Output beyond the capacity is dropped.
pub struct SignalSafeWriter<const CAP: usize = 256> {
    buf: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> SignalSafeWriter<CAP> {
    pub const fn new() -> Self {
        Self {
            buf: [0; CAP],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Write buffered bytes to `fd` and reset
    pub fn flush_to(&mut self, fd: libc::c_int) {
        write_raw(fd, &self.buf[..self.len]);
        self.len = 0;
    }
}

impl<const CAP: usize> Default for SignalSafeWriter<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> fmt::Write for SignalSafeWriter<CAP> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = CAP - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn errno_location() -> *mut libc::c_int {
    // SAFETY: always returns the calling thread's errno slot.
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn errno_location() -> *mut libc::c_int {
    // SAFETY: always returns the calling thread's errno slot.
    unsafe { libc::__error() }
}

/// Saves `errno` on creation and restores it on drop.
/// Every handler holds one so the interrupted code sees its own errno.
pub struct ErrnoGuard {
    saved: libc::c_int,
}

impl ErrnoGuard {
    pub fn save() -> Self {
        // SAFETY: errno_location points at thread-local storage.
        Self {
            saved: unsafe { *errno_location() },
        }
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        // SAFETY: see `save`.
        unsafe {
            *errno_location() = self.saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    #[test]
    fn test_job_signal_set() {
        let mask = job_signal_set();
        assert!(mask.contains(Signal::SIGCHLD));
        assert!(mask.contains(Signal::SIGINT));
        assert!(mask.contains(Signal::SIGTSTP));
        assert!(!mask.contains(Signal::SIGQUIT));
    }

    #[test]
    fn test_signal_block_restores_previous_mask() {
        let before = SigSet::thread_get_mask().unwrap();
        {
            let guard = SignalBlockGuard::block().unwrap();
            let during = SigSet::thread_get_mask().unwrap();
            assert!(during.contains(Signal::SIGCHLD));
            assert!(during.contains(Signal::SIGTSTP));
            assert_eq!(guard.previous().contains(Signal::SIGCHLD), before.contains(Signal::SIGCHLD));

            let wake = guard.wake_mask();
            assert!(!wake.contains(Signal::SIGCHLD));
            assert!(!wake.contains(Signal::SIGINT));
        }
        let after = SigSet::thread_get_mask().unwrap();
        assert_eq!(after.contains(Signal::SIGCHLD), before.contains(Signal::SIGCHLD));
        assert_eq!(after.contains(Signal::SIGINT), before.contains(Signal::SIGINT));
    }

    #[test]
    fn test_nested_guards_unwind_in_order() {
        let outer = SignalBlockGuard::block().unwrap();
        {
            let _inner = SignalBlockGuard::block().unwrap();
        }
        let mask = SigSet::thread_get_mask().unwrap();
        assert!(mask.contains(Signal::SIGCHLD), "inner guard must not unblock outer window");
        drop(outer);
    }

    #[test]
    fn test_signal_safe_writer_formats_without_allocating() {
        let mut writer = SignalSafeWriter::<64>::new();
        write!(writer, "Job [{}] ({}) stopped by signal {}", 1, 4242, 20).unwrap();
        assert_eq!(writer.as_bytes(), b"Job [1] (4242) stopped by signal 20");
    }

    #[test]
    fn test_signal_safe_writer_truncates() {
        let mut writer = SignalSafeWriter::<8>::new();
        write!(writer, "0123456789").unwrap();
        assert_eq!(writer.as_bytes(), b"01234567");
    }

    #[test]
    fn test_errno_guard_restores() {
        // SAFETY: test-only poke of the thread's errno.
        unsafe { *errno_location() = libc::EAGAIN };
        {
            let _guard = ErrnoGuard::save();
            unsafe { *errno_location() = libc::ECHILD };
        }
        assert_eq!(unsafe { *errno_location() }, libc::EAGAIN);
    }
}
