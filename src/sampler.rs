use crate::aggregator::TraceAggregator;
use crate::error::Result;
use crate::tracer::{ProcessTracer, TraceControl};
use crate::types::DEFAULT_MAX_FRAMES;
use crate::unwind::{self, UnwindProvider};

/// How one sampling iteration went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Threads an attach or capture was attempted on.
    pub threads_attempted: usize,
    /// Threads whose stack made it into the aggregator.
    pub threads_succeeded: usize,
}

/// Drives single sampling iterations.
pub struct Sampler {
    max_frames: usize,
}

impl Sampler {
    pub fn new(max_frames: usize) -> Self {
        Sampler { max_frames }
    }

    /// Samples every live thread of the target once.
    ///
    /// Only a failure to list the threads is returned. A thread that can't be attached or
    /// unwound is skipped with a warning, since threads come and go under us. Every thread is
    /// released again before this returns so the target runs between samples.
    pub fn sample_once<C, P>(
        &self,
        tracer: &mut ProcessTracer<C>,
        provider: &mut P,
        aggregator: &mut TraceAggregator,
    ) -> Result<SampleOutcome>
    where
        C: TraceControl,
        P: UnwindProvider,
    {
        let tids = tracer.list_threads()?;

        let mut outcome = SampleOutcome::default();
        for tid in tids {
            outcome.threads_attempted += 1;

            if let Err(e) = tracer.attach(tid) {
                warn!("{}", e);
                continue;
            }

            match unwind::capture(provider, tid, self.max_frames) {
                Ok(stack) => {
                    aggregator.record(&stack);
                    outcome.threads_succeeded += 1;
                }
                Err(e) => warn!("couldn't backtrace thread {}: {}", tid, e),
            }
        }

        if let Err(e) = tracer.detach_all() {
            warn!("{}", e);
        }

        trace!(
            "sampled {}/{} threads",
            outcome.threads_succeeded,
            outcome.threads_attempted
        );
        Ok(outcome)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAMES)
    }
}
