//! Batch print-job dispatcher.
//!
//! Takes an ordered [`DocumentSet`], the user's [`SelectionState`] and a
//! [`PrinterTarget`], then prints each selected document through an external
//! backend one at a time. Every job gets its own scratch file, failures stay
//! with the job that caused them, and the run ends with a [`BatchResult`].

pub mod dispatcher;
pub mod document;
pub mod error;
pub mod invoke;
pub mod job;
pub mod materialize;
pub mod result;
pub mod selection;
pub mod spooler;
pub mod target;

pub use dispatcher::{
    dispatch, BatchReport, DispatchConfig, DispatchObserver, DispatchState, Dispatcher, Pause,
    ThreadSleep, DEFAULT_PACING_DELAY,
};
pub use document::{BatchId, Document, DocumentId, DocumentSet};
pub use error::{
    BackendError, ConfigurationError, DispatchError, DocumentError, JobError, JobErrorKind,
    ResourceError,
};
pub use invoke::{PrintInvoker, SumatraInvoker};
pub use job::{Job, JobReport, JobStatus};
pub use materialize::{JobMaterializer, JobResource, ScratchFile, TempFileMaterializer};
pub use result::{BatchResult, JobOutcome, Progress, ResultAggregator};
pub use selection::SelectionState;
pub use spooler::{list_printers, list_printers_or_empty, SpoolerError};
pub use target::{PrinterCatalog, PrinterTarget};
