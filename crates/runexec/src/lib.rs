//! External command execution for unattended backend invocations.
//! （為無人值守的後端呼叫提供外部指令執行功能。）
//!
//! The executor wraps `std::process::Command` with the pieces the print
//! dispatcher needs: no shell, a closed stdin so a backend can never block on
//! an interactive prompt, captured stdout/stderr, and an optional wall-clock
//! timeout after which the child is killed.
//! 本模組封裝 `std::process::Command`：不經過 shell、關閉標準輸入以避免互動提示、
//! 擷取標準輸出與錯誤輸出，並可設定逾時後強制終止子行程。

use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(15);

/// How long output readers may keep draining after a timed-out child is killed.
/// Grandchildren that inherited the pipes can hold them open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(200);

/// Errors that may surface while launching or supervising a command.
/// （啟動或監控指令時可能發生的錯誤。）
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read process output: {0}")]
    Output(io::Error),
    #[error("failed to poll process status: {0}")]
    Poll(io::Error),
    #[error("failed to terminate process: {0}")]
    Kill(io::Error),
}

/// Program, arguments and time limit for one invocation.
/// （單次呼叫的程式、參數與時間限制。）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    /// Creates a new command pointing at the given program.
    /// （以指定的程式建立指令設定。）
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Appends an argument to the command.
    /// （為指令加入一個參數。）
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments at once.
    /// （一次加入多個參數。）
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Applies a timeout to the command execution. The child is killed once it elapses.
    /// （設定指令執行的逾時限制，逾時後會終止子行程。）
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Renders the command line for logs. Not shell-escaped.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Result information produced by a command execution.
/// （指令執行完成後的結果資訊。）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
    pub timed_out: bool,
}

impl RunOutput {
    /// Indicates whether the command exited with code `0` before any timeout.
    /// （判斷指令是否在逾時前以 0 結束。）
    pub fn success(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(0))
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Executes commands according to the provided specification.
/// （依照設定執行指令的主要元件。）
pub struct RunExecutor;

impl RunExecutor {
    /// Runs the command to completion (or timeout) and captures its output.
    /// （執行指定指令直到結束或逾時，並擷取輸出。）
    ///
    /// After a timeout the output gathered so far is returned; readers still
    /// blocked on pipes held by grandchildren are left behind.
    pub fn execute(spec: &CommandSpec) -> Result<RunOutput, RunError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %spec.display_line(), "spawning process");
        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RunError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // Drain both pipes on their own threads so a chatty child cannot fill
        // a pipe buffer and stall while we poll for its exit.
        let stdout_reader = child.stdout.take().map(OutputReader::spawn);
        let stderr_reader = child.stderr.take().map(OutputReader::spawn);

        let (status, timed_out) = match spec.timeout() {
            Some(timeout) => wait_with_deadline(&mut child, start, timeout)?,
            None => (child.wait().map_err(RunError::Poll)?, false),
        };

        let grace = timed_out.then(|| Instant::now() + READER_GRACE);
        let stdout = OutputReader::collect(stdout_reader, grace)?;
        let stderr = OutputReader::collect(stderr_reader, grace)?;
        let duration = start.elapsed();
        debug!(
            exit_code = ?status.code(),
            timed_out,
            elapsed_ms = duration.as_millis() as u64,
            "process finished"
        );

        Ok(RunOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            duration,
            timed_out,
        })
    }
}

fn wait_with_deadline(
    child: &mut Child,
    start: Instant,
    timeout: Duration,
) -> Result<(ExitStatus, bool), RunError> {
    loop {
        if let Some(status) = child.try_wait().map_err(RunError::Poll)? {
            return Ok((status, false));
        }
        if start.elapsed() >= timeout {
            warn!(timeout_ms = timeout.as_millis() as u64, "process timed out, killing");
            child.kill().map_err(RunError::Kill)?;
            let status = child.wait().map_err(RunError::Poll)?;
            return Ok((status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Background drain of one child pipe into a shared buffer.
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<io::Result<()>>,
}

impl OutputReader {
    fn spawn<R>(mut source: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match source.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(read) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..read]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(err),
                }
            }
        });
        Self { buffer, handle }
    }

    /// Joins the reader, or with a deadline, gives up on it once the deadline
    /// passes and keeps what was read.
    fn collect(reader: Option<Self>, deadline: Option<Instant>) -> Result<Vec<u8>, RunError> {
        let Some(reader) = reader else {
            return Ok(Vec::new());
        };
        if let Some(deadline) = deadline {
            while !reader.handle.is_finished() {
                if Instant::now() >= deadline {
                    debug!("output pipe still held open after kill, detaching reader");
                    return Ok(reader.take());
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        let buffer = Arc::clone(&reader.buffer);
        reader
            .handle
            .join()
            .map_err(|_| {
                RunError::Output(io::Error::new(
                    io::ErrorKind::Other,
                    "output reader thread panicked",
                ))
            })?
            .map_err(RunError::Output)?;
        let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *guard))
    }

    fn take(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Resolves a program the same way the OS loader would, without running it.
/// （在不執行的情況下，依作業系統規則尋找程式位置。）
///
/// Paths with a directory component are checked as-is. Bare names are looked
/// up in the current directory first and then along `PATH`; on Windows the
/// `.exe` extension is tried when none was given.
pub fn locate_program(program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }
    let has_dir = program
        .parent()
        .map(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(false);
    if has_dir || program.is_absolute() {
        return candidate_names(program).into_iter().find(|path| path.is_file());
    }

    let mut search_dirs = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_dirs.push(cwd);
    }
    if let Some(paths) = env::var_os("PATH") {
        search_dirs.extend(env::split_paths(&paths));
    }
    search_dirs.iter().find_map(|dir| {
        candidate_names(&dir.join(program))
            .into_iter()
            .find(|path| path.is_file())
    })
}

fn candidate_names(path: &Path) -> Vec<PathBuf> {
    let mut names = vec![path.to_path_buf()];
    if cfg!(windows) && path.extension().is_none() {
        let mut with_ext = path.as_os_str().to_os_string();
        with_ext.push(OsStr::new(".exe"));
        names.push(PathBuf::from(with_ext));
    }
    names
}
