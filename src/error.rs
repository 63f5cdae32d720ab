use std::io;

use thiserror::Error;

use crate::types::{ThreadId, Word};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while profiling a process.
///
/// Whether an error is fatal depends on where it surfaces: the sampler absorbs the per-thread
/// kinds, the run controller decides between aborting and degrading for the rest.
#[derive(Error, Debug)]
pub enum Error {
    /// Trace control over a thread was refused, or the thread did not stop as expected.
    #[error("couldn't attach to thread {tid}: {reason}")]
    Attach { tid: ThreadId, reason: String },
    /// The thread table of the target could not be read.
    #[error("failed to list threads of process {pid}: {source}")]
    Enumeration {
        pid: ThreadId,
        #[source]
        source: io::Error,
    },
    #[error("unable to init libunwind address space")]
    UnwinderUnavailable,
    #[error("unable to init remote unwind for thread {tid}: rc={code}")]
    UnwindInit { tid: ThreadId, code: i32 },
    #[error("unwind step failed for thread {tid}: rc={code} ip={last_ip:#x}")]
    UnwindStep { tid: ThreadId, code: i32, last_ip: Word },
    #[error("too deeply nested for thread {tid} (over {max_frames} frames), assuming bogus unwind (start ip={start_ip:#x})")]
    UnwindTooDeep {
        tid: ThreadId,
        max_frames: usize,
        start_ip: Word,
    },
    /// One entry per thread whose release failed. Every thread listed was still dropped from the
    /// attached set.
    #[error("couldn't detach {} thread(s): {}", .failures.len(), describe(.failures))]
    Detach { failures: Vec<(ThreadId, String)> },
    #[error("failed to write report: {0}")]
    ReportWrite(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn describe(failures: &[(ThreadId, String)]) -> String {
    failures
        .iter()
        .map(|(tid, reason)| format!("{} ({})", tid, reason))
        .collect::<Vec<_>>()
        .join(", ")
}
