//! Handing a materialized job to the external print backend.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use batchprint_runexec::{locate_program, CommandSpec, RunError, RunExecutor};
use tracing::{info, instrument, warn};

use crate::error::{BackendError, ConfigurationError};
use crate::target::PrinterTarget;

/// Synchronous adapter around an external print backend.
pub trait PrintInvoker {
    /// Checks that the backend can be used at all. Called once before a run.
    fn preflight(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Prints one resource and blocks until the backend has finished.
    fn invoke(&self, resource: &Path, target: &PrinterTarget) -> Result<(), BackendError>;
}

impl<P: PrintInvoker + ?Sized> PrintInvoker for &P {
    fn preflight(&self) -> Result<(), ConfigurationError> {
        (**self).preflight()
    }

    fn invoke(&self, resource: &Path, target: &PrinterTarget) -> Result<(), BackendError> {
        (**self).invoke(resource, target)
    }
}

/// Drives a SumatraPDF-compatible command line:
/// `<backend> -print-to <target> -print-settings <settings> -silent <file>`.
#[derive(Debug, Clone)]
pub struct SumatraInvoker {
    backend: PathBuf,
    print_settings: String,
    timeout: Option<Duration>,
}

impl SumatraInvoker {
    pub fn new(backend: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            print_settings: "noscale".to_string(),
            timeout: None,
        }
    }

    /// Overrides `-print-settings`. Keep `noscale` unless the backend needs
    /// more options; letting it fit-to-page thins printed lines.
    pub fn with_print_settings(mut self, settings: impl Into<String>) -> Self {
        self.print_settings = settings.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Path {
        &self.backend
    }

    /// The exact process invocation for one job.
    pub fn command(&self, resource: &Path, target: &PrinterTarget) -> CommandSpec {
        let args: [OsString; 6] = [
            "-print-to".into(),
            target.as_str().into(),
            "-print-settings".into(),
            self.print_settings.as_str().into(),
            "-silent".into(),
            resource.into(),
        ];
        let spec = CommandSpec::new(&self.backend).with_args(args);
        match self.timeout {
            Some(timeout) => spec.with_timeout(timeout),
            None => spec,
        }
    }
}

impl PrintInvoker for SumatraInvoker {
    fn preflight(&self) -> Result<(), ConfigurationError> {
        match locate_program(&self.backend) {
            Some(found) => {
                info!(backend = %found.display(), "print backend located");
                Ok(())
            }
            None => Err(ConfigurationError::BackendMissing(self.backend.clone())),
        }
    }

    #[instrument(skip(self, resource), fields(backend = %self.backend.display(), resource = %resource.display()))]
    fn invoke(&self, resource: &Path, target: &PrinterTarget) -> Result<(), BackendError> {
        let spec = self.command(resource, target);
        let output = RunExecutor::execute(&spec).map_err(|err| match err {
            RunError::Spawn { program, source } => BackendError::Launch { program, source },
            other => BackendError::Supervise(other.to_string()),
        })?;

        if output.timed_out {
            let timeout = self.timeout.unwrap_or_default();
            warn!(?timeout, "backend timed out");
            return Err(BackendError::TimedOut(timeout));
        }
        if output.success() {
            info!(elapsed_ms = output.duration.as_millis() as u64, "backend accepted job");
            return Ok(());
        }

        let diagnostic = [output.stderr_text(), output.stdout_text()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| match output.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated without exit code".to_string(),
            });
        warn!(exit_code = ?output.exit_code, %diagnostic, "backend rejected job");
        Err(BackendError::ExitStatus {
            code: output.exit_code,
            diagnostic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> PrinterTarget {
        PrinterTarget::new("EPSON L3210 Series").expect("target")
    }

    #[test]
    fn command_disables_scaling_and_prompts() {
        let invoker = SumatraInvoker::new("SumatraPDF.exe");
        let spec = invoker.command(Path::new("/tmp/batchprint-1.pdf"), &target());
        assert_eq!(spec.program, PathBuf::from("SumatraPDF.exe"));
        let args: Vec<_> = spec
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-print-to",
                "EPSON L3210 Series",
                "-print-settings",
                "noscale",
                "-silent",
                "/tmp/batchprint-1.pdf",
            ]
        );
        assert_eq!(spec.timeout(), None);
    }

    #[test]
    fn command_carries_timeout_and_custom_settings() {
        let invoker = SumatraInvoker::new("SumatraPDF.exe")
            .with_print_settings("noscale,2x")
            .with_timeout(Some(Duration::from_secs(45)));
        let spec = invoker.command(Path::new("job.pdf"), &target());
        assert_eq!(spec.args[3], OsString::from("noscale,2x"));
        assert_eq!(spec.timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn preflight_fails_for_missing_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = SumatraInvoker::new(dir.path().join("SumatraPDF.exe"));
        let err = invoker.preflight().unwrap_err();
        assert!(matches!(err, ConfigurationError::BackendMissing(_)));
    }

    #[test]
    fn launch_failure_is_a_backend_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invoker = SumatraInvoker::new(dir.path().join("gone.exe"));
        let err = invoker
            .invoke(Path::new("job.pdf"), &target())
            .unwrap_err();
        assert!(matches!(err, BackendError::Launch { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("backend.sh");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            let mut perms = fs::metadata(&path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("chmod");
            path
        }

        #[test]
        fn zero_exit_is_success() {
            let dir = tempfile::tempdir().expect("tempdir");
            let invoker = SumatraInvoker::new(script(dir.path(), "exit 0"));
            invoker.preflight().expect("backend exists");
            invoker
                .invoke(Path::new("job.pdf"), &target())
                .expect("print succeeds");
        }

        #[test]
        fn non_zero_exit_captures_stderr() {
            let dir = tempfile::tempdir().expect("tempdir");
            let invoker = SumatraInvoker::new(script(
                dir.path(),
                "echo \"cannot print $6\" >&2\nexit 4",
            ));
            let err = invoker
                .invoke(Path::new("job.pdf"), &target())
                .unwrap_err();
            match err {
                BackendError::ExitStatus { code, diagnostic } => {
                    assert_eq!(code, Some(4));
                    assert_eq!(diagnostic, "cannot print job.pdf");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn silent_failure_reports_exit_code() {
            let dir = tempfile::tempdir().expect("tempdir");
            let invoker = SumatraInvoker::new(script(dir.path(), "exit 9"));
            let err = invoker
                .invoke(Path::new("job.pdf"), &target())
                .unwrap_err();
            assert_eq!(err.diagnostic(), "exit code 9");
        }

        #[test]
        fn slow_backend_times_out() {
            let dir = tempfile::tempdir().expect("tempdir");
            let invoker = SumatraInvoker::new(script(dir.path(), "sleep 4\necho done"))
                .with_timeout(Some(Duration::from_millis(200)));
            let begin = std::time::Instant::now();
            let err = invoker
                .invoke(Path::new("job.pdf"), &target())
                .unwrap_err();
            assert!(
                begin.elapsed() < Duration::from_secs(2),
                "job blocked for {:?}",
                begin.elapsed()
            );
            assert!(matches!(err, BackendError::TimedOut(t) if t == Duration::from_millis(200)));
        }
    }
}
