use std::io;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::tracer::TraceControl;
use crate::types::ThreadId;

/// Trace control through `ptrace(2)` and `/proc`.
#[derive(Debug, Default)]
pub struct PtraceControl;

impl PtraceControl {
    pub fn new() -> Self {
        PtraceControl
    }
}

fn pid(tid: ThreadId) -> Pid {
    Pid::from_raw(tid.as_raw())
}

impl TraceControl for PtraceControl {
    fn request_attach(&mut self, tid: ThreadId) -> nix::Result<()> {
        // A thread can't trace itself.
        if tid.is_current_thread() {
            return Err(Errno::EPERM);
        }
        ptrace::attach(pid(tid))
    }

    fn wait_stopped(&mut self, tid: ThreadId) -> nix::Result<WaitStatus> {
        loop {
            match waitpid(pid(tid), Some(WaitPidFlag::WUNTRACED | WaitPidFlag::__WALL)) {
                Err(Errno::EINTR) => continue,
                res => return res,
            }
        }
    }

    fn detach(&mut self, tid: ThreadId) -> nix::Result<()> {
        ptrace::detach(pid(tid), None::<Signal>)
    }

    fn list_threads(&mut self, pid: ThreadId) -> io::Result<Vec<ThreadId>> {
        threadinfo::threads_of(pid.as_raw())
    }
}
