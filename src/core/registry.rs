//! The process-wide job table.
//!
//! Two kinds of code touch it: the control loop and the job signal handlers.
//! A lock cannot separate them (a handler would deadlock on a lock held by
//! the code it interrupted), so exclusion is done with the signal mask:
//!
//! - the control loop only enters the table through [`with_jobs`], which
//!   blocks every job signal for the duration of the closure;
//! - handlers enter through [`with_jobs_in_handler`]; they are installed with
//!   all job signals in their `sa_mask`, so they never interleave with each
//!   other, and they cannot run while the control loop has a window open.

use crate::config::types::{Result, ShellError};
use crate::core::jobs::JobTable;
use crate::kernel::signal::SignalBlockGuard;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

struct SharedJobTable {
    table: UnsafeCell<JobTable>,
    borrowed: AtomicBool,
}

// SAFETY: the shell is single-threaded; the only concurrency is signal
// delivery, which is excluded by the mask discipline described above.
unsafe impl Sync for SharedJobTable {}

static JOBS: SharedJobTable = SharedJobTable {
    table: UnsafeCell::new(JobTable::new()),
    borrowed: AtomicBool::new(false),
};

/// Releases the borrow flag even if the closure unwinds
struct BorrowFlag;

impl BorrowFlag {
    fn acquire() -> Option<Self> {
        JOBS.borrowed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BorrowFlag)
    }
}

impl Drop for BorrowFlag {
    fn drop(&mut self) {
        JOBS.borrowed.store(false, Ordering::Release);
    }
}

/// Run `f` on the job table from the control loop.
///
/// Job signals are blocked for exactly the duration of `f`. Calls must not
/// nest; a nested call fails instead of aliasing the table.
pub fn with_jobs<R>(f: impl FnOnce(&mut JobTable) -> R) -> Result<R> {
    let _mask = SignalBlockGuard::block()?;
    let _flag = BorrowFlag::acquire()
        .ok_or_else(|| ShellError::Process("job table re-entered".to_string()))?;

    // SAFETY: job signals are blocked and the borrow flag is held, so no
    // other reference to the table exists until `f` returns.
    let table = unsafe { &mut *JOBS.table.get() };
    Ok(f(table))
}

/// Run `f` on the job table from a job signal handler.
///
/// Returns `None` if the table is somehow already borrowed; handlers treat
/// that like an unknown pid and do nothing.
pub fn with_jobs_in_handler<R>(f: impl FnOnce(&mut JobTable) -> R) -> Option<R> {
    let _flag = BorrowFlag::acquire()?;

    // SAFETY: the handler runs with all job signals masked and the control
    // loop holds no reference (it only borrows with those signals blocked).
    let table = unsafe { &mut *JOBS.table.get() };
    Some(f(table))
}
