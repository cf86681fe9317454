//! Sequential execution of a batch of print jobs.
//!
//! A [`Dispatcher`] owns one run: `NotStarted -> Running -> Finished`.
//! Starting snapshots the selection, so nothing the caller does to its
//! [`SelectionState`] afterwards changes the job list. Each job goes through
//! materialize, invoke and release before the next one is touched, with a
//! pacing pause in between. A failing job is recorded and the run moves on.

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::{Document, DocumentSet};
use crate::error::{DispatchError, JobError};
use crate::invoke::PrintInvoker;
use crate::job::{Job, JobReport};
use crate::materialize::{JobMaterializer, JobResource};
use crate::result::{BatchResult, Progress, ResultAggregator};
use crate::selection::SelectionState;
use crate::target::PrinterTarget;

pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(1500);

/// Tunables for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pause between one job's release and the next job's materialization,
    /// giving the spooler time to accept the previous job.
    pub pacing_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing_delay: DEFAULT_PACING_DELAY,
        }
    }
}

/// How the dispatcher waits between jobs.
pub trait Pause {
    fn pause(&self, delay: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    NotStarted,
    Running,
    Finished,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DispatchState::NotStarted => "not started",
            DispatchState::Running => "running",
            DispatchState::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Callbacks for surfacing progress while a run executes.
pub trait DispatchObserver {
    fn job_started(&mut self, _job: &Job, _total: usize) {}
    /// `state` is already `Finished` when `job` was the last one.
    fn job_finished(&mut self, _job: &Job, _progress: Progress, _state: DispatchState) {}
    fn run_finished(&mut self, _result: &BatchResult) {}
}

impl DispatchObserver for () {}

/// Everything a finished run reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub target: PrinterTarget,
    pub result: BatchResult,
    pub jobs: Vec<JobReport>,
}

#[derive(Debug)]
struct ActiveRun {
    target: PrinterTarget,
    jobs: Vec<Job>,
    next: usize,
    aggregator: ResultAggregator,
}

pub struct Dispatcher<M, I, P = ThreadSleep> {
    materializer: M,
    invoker: I,
    pause: P,
    config: DispatchConfig,
    state: DispatchState,
    run: Option<ActiveRun>,
}

impl<M, I> Dispatcher<M, I, ThreadSleep>
where
    M: JobMaterializer,
    I: PrintInvoker,
{
    pub fn new(materializer: M, invoker: I, config: DispatchConfig) -> Self {
        Self {
            materializer,
            invoker,
            pause: ThreadSleep,
            config,
            state: DispatchState::NotStarted,
            run: None,
        }
    }
}

impl<M, I, P> Dispatcher<M, I, P>
where
    M: JobMaterializer,
    I: PrintInvoker,
    P: Pause,
{
    /// Replaces how pacing delays are waited out.
    pub fn with_pause<Q: Pause>(self, pause: Q) -> Dispatcher<M, I, Q> {
        Dispatcher {
            materializer: self.materializer,
            invoker: self.invoker,
            pause,
            config: self.config,
            state: self.state,
            run: self.run,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Validates the configuration, snapshots the selection and queues one
    /// pending job per selected document.
    ///
    /// Configuration problems surface here, before any job exists. A
    /// selection with nothing in it finishes the run immediately.
    pub fn start(
        &mut self,
        documents: &DocumentSet,
        selection: &SelectionState,
        target: PrinterTarget,
    ) -> Result<(), DispatchError> {
        match self.state {
            DispatchState::NotStarted => {}
            DispatchState::Running => return Err(DispatchError::AlreadyStarted),
            DispatchState::Finished => return Err(DispatchError::AlreadyFinished),
        }
        if selection.batch() != documents.batch() {
            return Err(DispatchError::SelectionMismatch);
        }
        self.invoker.preflight()?;

        let jobs: Vec<Job> = selection
            .snapshot(documents)
            .into_iter()
            .filter_map(|id| documents.get(id).cloned())
            .enumerate()
            .map(|(position, document)| Job::new(position, document))
            .collect();

        info!(
            batch = %documents.batch(),
            target = %target,
            selected = jobs.len(),
            candidates = documents.len(),
            "dispatch started"
        );
        self.run = Some(ActiveRun {
            target,
            aggregator: ResultAggregator::new(jobs.len()),
            jobs,
            next: 0,
        });
        self.state = DispatchState::Running;
        if self.jobs().is_empty() {
            self.state = DispatchState::Finished;
            info!("dispatch finished with nothing selected");
        }
        Ok(())
    }

    /// Executes the next pending job. Returns `None` once the run is finished.
    pub fn step(
        &mut self,
        observer: &mut dyn DispatchObserver,
    ) -> Result<Option<&Job>, DispatchError> {
        match self.state {
            DispatchState::NotStarted => return Err(DispatchError::NotRunning),
            DispatchState::Finished => return Ok(None),
            DispatchState::Running => {}
        }
        let run = self.run.as_mut().ok_or(DispatchError::NotRunning)?;
        let index = run.next;
        let total = run.jobs.len();

        if index > 0 {
            debug!(delay_ms = self.config.pacing_delay.as_millis() as u64, "pacing");
            self.pause.pause(self.config.pacing_delay);
        }

        let job = &mut run.jobs[index];
        job.mark_running();
        info!(job = index + 1, total, document = job.name(), "printing");
        observer.job_started(job, total);

        let result = execute_job(&self.materializer, &self.invoker, job.document(), &run.target);
        if let Err(err) = &result {
            warn!(job = index + 1, document = job.name(), error = %err, "job failed");
        }
        job.finish(result);
        if let Some(outcome) = job.outcome() {
            run.aggregator.record(outcome);
        }
        run.next += 1;
        let done = run.next == total;
        if done {
            self.state = DispatchState::Finished;
        }
        let job = &run.jobs[index];
        observer.job_finished(job, run.aggregator.progress(), self.state);

        if done {
            let summary = run.aggregator.summary();
            info!(
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "dispatch finished"
            );
            observer.run_finished(&summary);
        }
        Ok(Some(&run.jobs[index]))
    }

    /// Drives every remaining job and returns the final counts.
    pub fn run(&mut self, observer: &mut dyn DispatchObserver) -> Result<BatchResult, DispatchError> {
        match self.state {
            DispatchState::NotStarted => return Err(DispatchError::NotRunning),
            DispatchState::Finished => return Err(DispatchError::AlreadyFinished),
            DispatchState::Running => {}
        }
        while self.step(observer)?.is_some() {}
        self.result().ok_or(DispatchError::NotRunning)
    }

    /// Jobs of the current run, in dispatch order.
    pub fn jobs(&self) -> &[Job] {
        self.run.as_ref().map(|run| run.jobs.as_slice()).unwrap_or(&[])
    }

    pub fn target(&self) -> Option<&PrinterTarget> {
        self.run.as_ref().map(|run| &run.target)
    }

    /// `None` before the run has started.
    pub fn progress(&self) -> Option<Progress> {
        self.run.as_ref().map(|run| run.aggregator.progress())
    }

    /// Final counts; only available once the run is finished.
    pub fn result(&self) -> Option<BatchResult> {
        match (self.state, &self.run) {
            (DispatchState::Finished, Some(run)) => Some(run.aggregator.summary()),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<BatchReport> {
        let result = self.result()?;
        let run = self.run.as_ref()?;
        Some(BatchReport {
            target: run.target.clone(),
            result,
            jobs: run.jobs.iter().map(Job::report).collect(),
        })
    }
}

/// Releases the scratch resource on every exit path, unwinding included.
struct ReleaseGuard<'a, M: JobMaterializer> {
    materializer: &'a M,
    handle: M::Handle,
}

impl<M: JobMaterializer> Drop for ReleaseGuard<'_, M> {
    fn drop(&mut self) {
        self.materializer.release(&mut self.handle);
    }
}

fn execute_job<M, I>(
    materializer: &M,
    invoker: &I,
    document: &Document,
    target: &PrinterTarget,
) -> Result<(), JobError>
where
    M: JobMaterializer,
    I: PrintInvoker,
{
    let guard = ReleaseGuard {
        materializer,
        handle: materializer.materialize(document)?,
    };
    invoker.invoke(guard.handle.path(), target)?;
    Ok(())
}

/// Runs a whole batch: start, every job, report.
pub fn dispatch<M, I>(
    documents: &DocumentSet,
    selection: &SelectionState,
    target: PrinterTarget,
    materializer: M,
    invoker: I,
    config: DispatchConfig,
    observer: &mut dyn DispatchObserver,
) -> Result<BatchReport, DispatchError>
where
    M: JobMaterializer,
    I: PrintInvoker,
{
    let mut dispatcher = Dispatcher::new(materializer, invoker, config);
    dispatcher.start(documents, selection, target)?;
    if dispatcher.state() == DispatchState::Running {
        dispatcher.run(observer)?;
    }
    dispatcher.report().ok_or(DispatchError::NotRunning)
}
