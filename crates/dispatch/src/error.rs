//! Error taxonomy for the dispatcher.
//!
//! Resource and backend errors are scoped to a single job and never end a
//! run. Configuration errors are raised before the first job exists.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Transient storage could not be prepared for a job.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to allocate scratch file in {dir}: {source}")]
    Allocate {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write scratch file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The external backend failed to print a materialized job.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to launch backend {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backend exited with {}: {diagnostic}", describe_code(.code))]
    ExitStatus { code: Option<i32>, diagnostic: String },
    #[error("backend did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("failed to supervise backend process: {0}")]
    Supervise(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BackendError {
    /// Text suitable for showing next to the failed job.
    pub fn diagnostic(&self) -> String {
        match self {
            BackendError::ExitStatus { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

/// The run cannot begin.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("print backend not found: {}", .0.display())]
    BackendMissing(PathBuf),
    #[error("no printer target available")]
    NoTarget,
    #[error("printer target '{0}' is not installed")]
    UnknownTarget(String),
    #[error("printer target name is empty")]
    EmptyTarget,
}

/// Failure recorded on an individual job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::Resource(_) => JobErrorKind::Resource,
            JobError::Backend(_) => JobErrorKind::Backend,
        }
    }

    pub fn diagnostic(&self) -> String {
        match self {
            JobError::Resource(err) => err.to_string(),
            JobError::Backend(err) => err.diagnostic(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    Resource,
    Backend,
}

/// Misuse of the dispatcher or a configuration problem found at start.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("selection belongs to a different document set")]
    SelectionMismatch,
    #[error("dispatch already started")]
    AlreadyStarted,
    #[error("dispatch has not started")]
    NotRunning,
    #[error("dispatch already finished; start a new run")]
    AlreadyFinished,
}

/// Failure while building a document set from disk.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a '{expected}' document")]
    UnsupportedType { path: PathBuf, expected: String },
}
