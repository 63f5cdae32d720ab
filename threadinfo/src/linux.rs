extern crate libc;

use libc::{pid_t, syscall, SYS_gettid};
use std::fmt;
use std::io::Result;
use std::path::Path;

/// A Linux task id. The main thread of a process has the same id as the process.
#[derive(Eq, PartialEq, Debug, Hash, Copy, Clone)]
pub struct Thread(pid_t);

impl Thread {
    pub fn from_raw(tid: pid_t) -> Thread {
        Thread(tid)
    }

    pub fn as_raw(&self) -> pid_t {
        self.0
    }

    pub fn is_current_thread(&self) -> bool {
        current_thread().map_or(false, |curr| *self == curr)
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns an object for the current thread.
pub fn current_thread() -> Result<Thread> {
    let tid = unsafe { syscall(SYS_gettid) as pid_t };
    Ok(Thread(tid))
}

/// Returns the threads of process `pid`.
///
/// This function does not guarantee that the threads it returns are the complete and full set of
/// threads in the process. Threads may be created that are not in the list, and threads returned
/// may have terminated by the time the caller looks at them.
///
/// Fails if the task directory cannot be read, which usually means the process has exited.
pub fn threads_of(pid: pid_t) -> Result<Vec<Thread>> {
    threads_in(Path::new(&format!("/proc/{}/task", pid)))
}

/// Reads thread ids from a `task`-style directory, one entry per thread.
///
/// Entries whose names are not positive ids are skipped with a warning.
pub fn threads_in(task_dir: &Path) -> Result<Vec<Thread>> {
    let mut threads = Vec::new();
    for entry in std::fs::read_dir(task_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // The task may exit while we iterate.
                warn!("unreadable entry in {}: {}", task_dir.display(), e);
                continue;
            }
        };
        let name = entry.file_name();
        match name.to_str().and_then(|s| s.parse::<pid_t>().ok()) {
            Some(tid) if tid > 0 => threads.push(Thread(tid)),
            _ => warn!("bad tid in {}: {:?}", task_dir.display(), name),
        }
    }
    Ok(threads)
}
