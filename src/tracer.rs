use std::collections::HashSet;
use std::io;

use nix::sys::wait::WaitStatus;

use crate::error::{Error, Result};
use crate::types::ThreadId;

/// The OS primitives the tracer is built on.
///
/// `PtraceControl` is the real thing. Keeping this a trait lets the attach bookkeeping be exercised
/// without a live target.
pub trait TraceControl {
    /// Asks for trace control over `tid`. Does not wait for it to stop.
    fn request_attach(&mut self, tid: ThreadId) -> nix::Result<()>;
    /// Blocks until `tid` reports a state change.
    fn wait_stopped(&mut self, tid: ThreadId) -> nix::Result<WaitStatus>;
    fn detach(&mut self, tid: ThreadId) -> nix::Result<()>;
    fn list_threads(&mut self, pid: ThreadId) -> io::Result<Vec<ThreadId>>;
}

/// Owns the set of threads of one process currently held under trace.
///
/// Dropping the tracer releases every thread still attached, so no exit path can leave the target
/// frozen. `teardown` does the same release but reports failures.
///
/// Every successful attach is matched by exactly one detach. A thread whose attach request went
/// through but whose wait came back wrong also gets one detach, without ever entering the attached
/// set. So detaches equal successful attaches plus rejected waits, and the set is empty after
/// teardown.
pub struct ProcessTracer<C: TraceControl> {
    pid: ThreadId,
    control: C,
    attached: HashSet<ThreadId>,
    torn_down: bool,
}

impl<C: TraceControl> ProcessTracer<C> {
    /// Attaches to nothing yet.
    pub fn new(pid: ThreadId, control: C) -> Self {
        ProcessTracer {
            pid,
            control,
            attached: HashSet::new(),
            torn_down: false,
        }
    }

    pub fn pid(&self) -> ThreadId {
        self.pid
    }

    pub fn is_attached(&self, tid: ThreadId) -> bool {
        self.attached.contains(&tid)
    }

    pub fn attached(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.attached.iter().cloned()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Attaches the process's main thread.
    pub fn attach_primary(&mut self) -> Result<()> {
        self.attach(self.pid)
    }

    /// Takes trace control over `tid` and blocks until it has stopped.
    ///
    /// Attaching a thread that is already attached does nothing.
    pub fn attach(&mut self, tid: ThreadId) -> Result<()> {
        if self.attached.contains(&tid) {
            return Ok(());
        }

        self.control.request_attach(tid).map_err(|e| Error::Attach {
            tid,
            reason: e.to_string(),
        })?;

        let reason = match self.control.wait_stopped(tid) {
            Ok(WaitStatus::Stopped(pid, _)) if pid.as_raw() == tid.as_raw() => {
                self.attached.insert(tid);
                trace!("attached thread {}", tid);
                return Ok(());
            }
            Ok(WaitStatus::Stopped(pid, _)) => {
                format!("wait result {} didn't match thread {}", pid, tid)
            }
            Ok(status) => format!("unexpected wait result: {:?}", status),
            Err(e) => format!("wait failed: {}", e),
        };

        // The request went through, so the thread may be traced but never recorded.
        if let Err(e) = self.control.detach(tid) {
            debug!("releasing half-attached thread {} failed: {}", tid, e);
        }
        Err(Error::Attach { tid, reason })
    }

    /// Lists the live threads of the target, re-reading the thread table every time.
    pub fn list_threads(&mut self) -> Result<Vec<ThreadId>> {
        let pid = self.pid;
        self.control
            .list_threads(pid)
            .map_err(|source| Error::Enumeration { pid, source })
    }

    /// Releases every attached thread.
    ///
    /// Keeps going past failures; each visited thread leaves the attached set whatever its
    /// outcome. The failures are returned together.
    pub fn detach_all(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for tid in self.attached.drain() {
            match self.control.detach(tid) {
                Ok(()) => trace!("detached thread {}", tid),
                Err(e) => failures.push((tid, e.to_string())),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Detach { failures })
        }
    }

    /// Final release at the end of a run.
    pub fn teardown(mut self) -> Result<()> {
        self.torn_down = true;
        self.detach_all()
    }
}

impl<C: TraceControl> Drop for ProcessTracer<C> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if let Err(e) = self.detach_all() {
            warn!("{}", e);
        }
    }
}
