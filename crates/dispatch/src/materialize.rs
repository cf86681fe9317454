//! Turning an in-memory document into a file the backend can open.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::ResourceError;

const FILE_PREFIX: &str = "batchprint-";

/// An on-disk resource owned by exactly one job.
pub trait JobResource {
    fn path(&self) -> &Path;
}

/// Creates and disposes of per-job transient resources.
pub trait JobMaterializer {
    type Handle: JobResource;

    fn materialize(&self, document: &Document) -> Result<Self::Handle, ResourceError>;

    /// Disposes of the resource. Must be idempotent and must not fail; cleanup
    /// problems are logged and swallowed.
    fn release(&self, handle: &mut Self::Handle);
}

impl<M: JobMaterializer + ?Sized> JobMaterializer for &M {
    type Handle = M::Handle;

    fn materialize(&self, document: &Document) -> Result<Self::Handle, ResourceError> {
        (**self).materialize(document)
    }

    fn release(&self, handle: &mut Self::Handle) {
        (**self).release(handle)
    }
}

/// Writes each document to a uniquely named file in a scratch directory.
#[derive(Debug, Clone)]
pub struct TempFileMaterializer {
    scratch_dir: PathBuf,
    suffix: String,
}

impl TempFileMaterializer {
    /// Uses the OS temp directory. `suffix` identifies the document type, e.g. `.pdf`.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            scratch_dir: env::temp_dir(),
            suffix: suffix.into(),
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

/// Scratch file handle. Dropping it without [`JobMaterializer::release`]
/// still removes the file.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl ScratchFile {
    pub fn is_released(&self) -> bool {
        self.temp.is_none()
    }
}

impl JobResource for ScratchFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl JobMaterializer for TempFileMaterializer {
    type Handle = ScratchFile;

    fn materialize(&self, document: &Document) -> Result<ScratchFile, ResourceError> {
        let mut file = Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(&self.suffix)
            .tempfile_in(&self.scratch_dir)
            .map_err(|source| ResourceError::Allocate {
                dir: self.scratch_dir.clone(),
                source,
            })?;

        let written = file.write_all(document.content());
        if let Err(source) = written.and_then(|()| file.flush()) {
            return Err(ResourceError::Write {
                path: file.path().to_path_buf(),
                source,
            });
        }

        // Close our handle so the backend can open the file on platforms with
        // mandatory locking.
        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        debug!(document = document.name(), path = %path.display(), "materialized job");
        Ok(ScratchFile {
            path,
            temp: Some(temp),
        })
    }

    fn release(&self, handle: &mut ScratchFile) {
        if let Some(temp) = handle.temp.take() {
            match temp.close() {
                Ok(()) => debug!(path = %handle.path.display(), "released scratch file"),
                Err(err) => {
                    warn!(path = %handle.path.display(), error = %err, "failed to remove scratch file")
                }
            }
        }
    }
}
