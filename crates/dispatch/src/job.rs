use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::document::Document;
use crate::error::{JobError, JobErrorKind};
use crate::result::JobOutcome;

/// Lifecycle of one job within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One selected document's trip through the backend.
#[derive(Debug, Clone)]
pub struct Job {
    position: usize,
    document: Arc<Document>,
    status: JobStatus,
    error_kind: Option<JobErrorKind>,
    diagnostic: Option<String>,
}

impl Job {
    pub(crate) fn new(position: usize, document: Arc<Document>) -> Self {
        Self {
            position,
            document,
            status: JobStatus::Pending,
            error_kind: None,
            diagnostic: None,
        }
    }

    /// Zero-based position within the run.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn name(&self) -> &str {
        self.document.name()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_kind(&self) -> Option<JobErrorKind> {
        self.error_kind
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// `None` until the job is terminal.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.status {
            JobStatus::Succeeded => Some(JobOutcome::Succeeded),
            JobStatus::Failed => Some(JobOutcome::Failed),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }

    pub fn report(&self) -> JobReport {
        JobReport {
            position: self.position + 1,
            name: self.document.name().to_string(),
            status: self.status,
            error: self.error_kind,
            diagnostic: self.diagnostic.clone(),
        }
    }

    pub(crate) fn mark_running(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Running;
    }

    pub(crate) fn finish(&mut self, result: Result<(), JobError>) {
        debug_assert_eq!(self.status, JobStatus::Running);
        match result {
            Ok(()) => self.status = JobStatus::Succeeded,
            Err(err) => {
                self.status = JobStatus::Failed;
                self.error_kind = Some(err.kind());
                self.diagnostic = Some(err.diagnostic());
            }
        }
    }
}

/// Serializable per-job line for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// One-based, as shown to users.
    pub position: usize,
    pub name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}
