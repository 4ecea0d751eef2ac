//! Fixed-capacity job table.
//!
//! Plain data with no interior allocation: a job's command text is stored
//! inline, so removing an entry from handler context never frees heap memory.
//! Sharing and signal discipline live in [`crate::core::registry`].

use crate::config::types::{JobState, Result, ShellError, MAX_JID, MAX_JOBS, MAX_LINE};
use nix::unistd::Pid;
use std::fmt;

/// Original command line, stored inline for display
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandText {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl CommandText {
    /// Store `line` without its trailing newline, truncated to `MAX_LINE`
    /// bytes on a char boundary.
    pub fn new(line: &str) -> Self {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut end = line.len().min(MAX_LINE);
        while !line.is_char_boundary(end) {
            end -= 1;
        }

        let mut buf = [0u8; MAX_LINE];
        buf[..end].copy_from_slice(&line.as_bytes()[..end]);
        Self { buf, len: end }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl fmt::Debug for CommandText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for CommandText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked job: a process group created for a single command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pid: Pid,
    jid: u32,
    state: JobState,
    command: CommandText,
}

impl Job {
    /// Process group id, which is also the group leader's pid
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn jid(&self) -> u32 {
        self.jid
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn command(&self) -> &str {
        self.command.as_str()
    }

    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    /// `[jid] (pid) command`: the background-start notice
    pub fn notice(&self) -> String {
        format!("[{}] ({}) {}", self.jid, self.pid, self.command)
    }

    /// `[jid] (pid) State command`: one `jobs` line
    pub fn listing(&self) -> String {
        format!("[{}] ({}) {} {}", self.jid, self.pid, self.state, self.command)
    }
}

/// Registry of live jobs, at most `N` at a time.
///
/// Slot order is stable and is the display order.
pub struct JobTable<const N: usize = MAX_JOBS> {
    slots: [Option<Job>; N],
    next_jid: u32,
}

impl<const N: usize> JobTable<N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            next_jid: 1,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Largest live job id, 0 when empty
    pub fn max_jid(&self) -> u32 {
        self.list().map(Job::jid).max().unwrap_or(0)
    }

    /// Record a new job and return its job id.
    ///
    /// Fails without touching the table when it is full, when `pid` is not a
    /// valid process id or already tracked, or when a second foreground job
    /// is requested.
    pub fn insert(&mut self, pid: Pid, state: JobState, command: &str) -> Result<u32> {
        if pid.as_raw() < 1 {
            return Err(ShellError::Process(format!("invalid job pid {}", pid)));
        }
        if self.find_by_pid(pid).is_some() {
            return Err(ShellError::Process(format!("pid {} is already a job", pid)));
        }
        if state == JobState::Foreground && self.foreground_pid().is_some() {
            return Err(ShellError::Process(
                "a foreground job is already running".to_string(),
            ));
        }

        let full = ShellError::JobTableFull { capacity: N };
        if !self.has_free_slot() {
            return Err(full);
        }
        let jid = self.allocate_jid().ok_or(full)?;
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(ShellError::JobTableFull { capacity: N })?;

        *slot = Some(Job {
            pid,
            jid,
            state,
            command: CommandText::new(command),
        });
        self.next_jid = jid + 1;
        Ok(jid)
    }

    /// First id not held by a live job, scanning up from the counter and
    /// wrapping to 1 once it reaches `MAX_JID`.
    fn allocate_jid(&self) -> Option<u32> {
        let start = self.next_jid.clamp(1, MAX_JID);
        (start..MAX_JID)
            .chain(1..start)
            .find(|&jid| self.find_by_jid(jid).is_none())
    }

    /// Remove the job led by `pid`. Returns false if it is not tracked.
    pub fn remove(&mut self, pid: Pid) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(job) if job.pid == pid))
        else {
            return false;
        };

        *slot = None;
        self.next_jid = self.max_jid() + 1;
        true
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&Job> {
        if pid.as_raw() < 1 {
            return None;
        }
        self.list().find(|job| job.pid == pid)
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        if pid.as_raw() < 1 {
            return None;
        }
        self.slots.iter_mut().flatten().find(|job| job.pid == pid)
    }

    pub fn find_by_jid(&self, jid: u32) -> Option<&Job> {
        if jid < 1 {
            return None;
        }
        self.list().find(|job| job.jid == jid)
    }

    pub fn find_by_jid_mut(&mut self, jid: u32) -> Option<&mut Job> {
        if jid < 1 {
            return None;
        }
        self.slots.iter_mut().flatten().find(|job| job.jid == jid)
    }

    /// Pid of the unique foreground job
    pub fn foreground_pid(&self) -> Option<Pid> {
        self.list()
            .find(|job| job.state == JobState::Foreground)
            .map(Job::pid)
    }

    /// Live jobs in slot order
    pub fn list(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }
}

impl<const N: usize> Default for JobTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut table = JobTable::<4>::new();
        assert_eq!(table.insert(pid(100), JobState::Background, "a &\n").unwrap(), 1);
        assert_eq!(table.insert(pid(101), JobState::Background, "b &\n").unwrap(), 2);
        assert_eq!(table.insert(pid(102), JobState::Foreground, "c\n").unwrap(), 3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.max_jid(), 3);
    }

    #[test]
    fn test_remove_recompacts_next_id() {
        let mut table = JobTable::<4>::new();
        table.insert(pid(100), JobState::Background, "a").unwrap();
        table.insert(pid(101), JobState::Background, "b").unwrap();
        table.insert(pid(102), JobState::Background, "c").unwrap();

        // Removing a middle job does not free its id for the next insert.
        assert!(table.remove(pid(101)));
        assert_eq!(table.insert(pid(103), JobState::Background, "d").unwrap(), 4);

        // Removing the highest jobs lets the counter fall back.
        assert!(table.remove(pid(103)));
        assert!(table.remove(pid(102)));
        assert_eq!(table.insert(pid(104), JobState::Background, "e").unwrap(), 2);
    }

    #[test]
    fn test_empty_table_restarts_at_one() {
        let mut table = JobTable::<2>::new();
        table.insert(pid(10), JobState::Background, "a").unwrap();
        table.insert(pid(11), JobState::Background, "b").unwrap();
        table.remove(pid(10));
        table.remove(pid(11));
        assert!(table.is_empty());
        assert_eq!(table.insert(pid(12), JobState::Background, "c").unwrap(), 1);
    }

    #[test]
    fn test_remove_unknown_pid_is_noop() {
        let mut table = JobTable::<2>::new();
        table.insert(pid(10), JobState::Background, "a").unwrap();
        assert!(!table.remove(pid(99)));
        assert!(!table.remove(pid(0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_exhaustion_leaves_table_unchanged() {
        let mut table = JobTable::<2>::new();
        table.insert(pid(10), JobState::Background, "a").unwrap();
        table.insert(pid(11), JobState::Stopped, "b").unwrap();
        assert!(!table.has_free_slot());

        let err = table.insert(pid(12), JobState::Background, "c").unwrap_err();
        assert!(matches!(err, ShellError::JobTableFull { capacity: 2 }));
        assert_eq!(table.len(), 2);
        assert!(table.find_by_pid(pid(12)).is_none());
        assert_eq!(table.find_by_pid(pid(11)).unwrap().state(), JobState::Stopped);

        // A later insert still gets max + 1.
        table.remove(pid(10));
        assert_eq!(table.insert(pid(13), JobState::Background, "d").unwrap(), 3);
    }

    #[test]
    fn test_single_foreground_job() {
        let mut table = JobTable::<4>::new();
        assert_eq!(table.foreground_pid(), None);
        table.insert(pid(10), JobState::Foreground, "a").unwrap();
        assert_eq!(table.foreground_pid(), Some(pid(10)));

        assert!(table.insert(pid(11), JobState::Foreground, "b").is_err());
        assert_eq!(table.len(), 1);

        table.find_by_pid_mut(pid(10)).unwrap().set_state(JobState::Stopped);
        assert_eq!(table.foreground_pid(), None);
        table.insert(pid(11), JobState::Foreground, "b").unwrap();
        assert_eq!(table.foreground_pid(), Some(pid(11)));
    }

    #[test]
    fn test_rejects_invalid_and_duplicate_pids() {
        let mut table = JobTable::<4>::new();
        assert!(table.insert(pid(0), JobState::Background, "a").is_err());
        assert!(table.insert(pid(-3), JobState::Background, "a").is_err());
        table.insert(pid(10), JobState::Background, "a").unwrap();
        assert!(table.insert(pid(10), JobState::Background, "a").is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookups() {
        let mut table = JobTable::<4>::new();
        table.insert(pid(10), JobState::Background, "sleep 1 &\n").unwrap();
        table.insert(pid(20), JobState::Stopped, "sleep 2\n").unwrap();

        let job = table.find_by_jid(2).unwrap();
        assert_eq!(job.pid(), pid(20));
        assert_eq!(job.command(), "sleep 2");
        assert_eq!(table.find_by_pid(pid(10)).unwrap().jid(), 1);
        assert!(table.find_by_jid(0).is_none());
        assert!(table.find_by_jid(3).is_none());
    }

    #[test]
    fn test_list_is_slot_order() {
        let mut table = JobTable::<3>::new();
        table.insert(pid(10), JobState::Background, "a").unwrap();
        table.insert(pid(11), JobState::Background, "b").unwrap();
        table.insert(pid(12), JobState::Background, "c").unwrap();
        table.remove(pid(10));
        table.insert(pid(13), JobState::Background, "d").unwrap();

        let pids: Vec<i32> = table.list().map(|job| job.pid().as_raw()).collect();
        assert_eq!(pids, vec![13, 11, 12]);
        let jids: Vec<u32> = table.list().map(Job::jid).collect();
        assert_eq!(jids, vec![4, 2, 3]);
    }

    #[test]
    fn test_display_formats() {
        let mut table = JobTable::<2>::new();
        table.insert(pid(4242), JobState::Background, "sleep 100 &\n").unwrap();
        let job = table.find_by_jid(1).unwrap();
        assert_eq!(job.notice(), "[1] (4242) sleep 100 &");
        assert_eq!(job.listing(), "[1] (4242) Running sleep 100 &");
    }

    #[test]
    fn test_command_text_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_LINE);
        let text = CommandText::new(&long);
        assert!(text.as_str().len() <= MAX_LINE);
        assert!(text.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_jid_counter_exhaustion_reuses_lowest_free_id() {
        let mut table = JobTable::<3>::new();
        table.next_jid = MAX_JID;
        table.insert(pid(10), JobState::Background, "a").unwrap();
        assert_eq!(table.find_by_pid(pid(10)).unwrap().jid(), 1);
    }

    #[test]
    fn test_wrapped_counter_skips_live_ids() {
        let mut table = JobTable::<4>::new();
        table.insert(pid(10), JobState::Background, "a").unwrap();
        table.insert(pid(11), JobState::Background, "b").unwrap();
        table.insert(pid(12), JobState::Background, "c").unwrap();
        table.remove(pid(10));
        table.next_jid = MAX_JID;

        assert_eq!(table.insert(pid(13), JobState::Background, "d").unwrap(), 1);
        // Ids 2 and 3 are still live; the next free one is 4.
        assert_eq!(table.insert(pid(14), JobState::Background, "e").unwrap(), 4);

        let mut jids: Vec<u32> = table.list().map(Job::jid).collect();
        jids.sort_unstable();
        assert_eq!(jids, vec![1, 2, 3, 4]);
    }
}
