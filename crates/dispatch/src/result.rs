use std::fmt;

use serde::Serialize;

/// Terminal outcome of one job, as counted by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed (of {})",
            self.succeeded, self.failed, self.total
        )
    }
}

/// Counts outcomes as jobs complete.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    total: usize,
    succeeded: usize,
    failed: usize,
}

impl ResultAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Succeeded => self.succeeded += 1,
            JobOutcome::Failed => self.failed += 1,
        }
        debug_assert!(self.recorded() <= self.total);
    }

    pub fn recorded(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.recorded() == self.total
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.recorded(),
            total: self.total,
        }
    }

    pub fn summary(&self) -> BatchResult {
        BatchResult {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

/// Terminal jobs out of the run's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// `completed / total`. A run with no jobs is complete from the start.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}
