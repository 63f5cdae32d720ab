use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::aggregator::{Histogram, TraceAggregator};
use crate::config::Config;
use crate::error::Result;
use crate::sampler::Sampler;
use crate::tracer::{ProcessTracer, TraceControl};
use crate::unwind::UnwindProvider;

/// Cooperative stop request, shared between a signal handler and the run loop.
///
/// Only checked between samples, so a capture in progress always finishes.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Attaching the main thread and taking the first sample.
    Attaching,
    Sampling,
    Draining,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct RunReport {
    pub histogram: Histogram,
    /// Sampling iterations that completed.
    pub samples: usize,
}

/// Owns the sampling loop of one run.
pub struct RunController {
    config: Config,
    shutdown: Shutdown,
    state: RunState,
}

impl RunController {
    pub fn new(config: Config, shutdown: Shutdown) -> Self {
        RunController {
            config,
            shutdown,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, to: RunState) {
        debug!("run state {:?} -> {:?}", self.state, to);
        self.state = to;
    }

    /// Samples the target until shutdown is requested or the target goes away.
    ///
    /// Failing to attach the main thread or to take the first sample aborts the run with that
    /// error. A later failure ends sampling early and the samples taken so far are returned.
    /// Every attached thread is released on all paths.
    pub fn run<C, P>(&mut self, control: C, provider: &mut P) -> Result<RunReport>
    where
        C: TraceControl,
        P: UnwindProvider,
    {
        let sampler = Sampler::new(self.config.max_frames);
        let mut aggregator = TraceAggregator::new();
        let mut tracer = ProcessTracer::new(self.config.pid, control);

        self.transition(RunState::Attaching);
        if let Err(e) = first_sample(&sampler, &mut tracer, provider, &mut aggregator) {
            self.transition(RunState::Failed);
            return Err(e);
        }
        let mut samples = 1;

        self.transition(RunState::Sampling);
        while !self.shutdown.is_requested() {
            thread::sleep(self.config.interval);
            match sampler.sample_once(&mut tracer, provider, &mut aggregator) {
                Ok(_) => samples += 1,
                Err(e) => {
                    warn!("stopping after {} samples: {}", samples, e);
                    break;
                }
            }
        }

        self.transition(RunState::Draining);
        let histogram = aggregator.into_histogram();
        if let Err(e) = tracer.teardown() {
            warn!("{}", e);
        }
        self.transition(RunState::Done);

        info!(
            "took {} samples of process {}, {} distinct stacks",
            samples,
            self.config.pid,
            histogram.len()
        );
        Ok(RunReport { histogram, samples })
    }
}

fn first_sample<C, P>(
    sampler: &Sampler,
    tracer: &mut ProcessTracer<C>,
    provider: &mut P,
    aggregator: &mut TraceAggregator,
) -> Result<()>
where
    C: TraceControl,
    P: UnwindProvider,
{
    tracer.attach_primary()?;
    sampler.sample_once(tracer, provider, aggregator)?;
    Ok(())
}
