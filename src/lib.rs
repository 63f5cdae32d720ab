//! pmp is a sampling profiler for running processes.
//!
//! It repeatedly stops every thread of a target with ptrace, unwinds each stack with libunwind
//! and counts how often each distinct stack shows up. Nothing needs to be built into the target.

#[cfg(not(target_os = "linux"))]
compile_error!("pmp only supports Linux");

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
extern crate threadinfo;

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod ptrace;
pub mod sampler;
pub mod speedscope;
pub mod tracer;
pub mod types;
pub mod unwind;

pub use aggregator::{Histogram, TraceAggregator};
pub use config::{Config, Format};
pub use controller::{RunController, RunReport, RunState, Shutdown};
pub use error::{Error, Result};
pub use ptrace::PtraceControl;
pub use sampler::{SampleOutcome, Sampler};
pub use tracer::{ProcessTracer, TraceControl};
pub use types::{Stack, StackFrame, ThreadId};
pub use unwind::{LibunwindProvider, UnwindProvider};

/// Profiles `config.pid` until `shutdown` is requested or the process goes away.
pub fn profile(config: &Config, shutdown: Shutdown) -> Result<RunReport> {
    config.validate()?;
    let mut provider = LibunwindProvider::new(config.demangle)?;
    RunController::new(config.clone(), shutdown).run(PtraceControl::new(), &mut provider)
}
