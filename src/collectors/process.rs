//! Bounded subprocess execution.

use super::CancellationToken;
use crate::errors::{Error, Result};
use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long readers may keep draining after the process has stopped
const READER_GRACE: Duration = Duration::from_millis(500);
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was killed or ended by a signal
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed(ProcessOutput),
    /// Killed at the deadline; holds whatever was read before that
    TimedOut(ProcessOutput),
    Cancelled(ProcessOutput),
}

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Resolve an executable name (or explicit path) to a runnable file.
pub fn resolve_executable(tool: &str, executable: &str) -> Result<PathBuf> {
    let explicit = Path::new(executable);
    if explicit.components().count() > 1 {
        return if explicit.is_file() {
            Ok(explicit.to_path_buf())
        } else {
            Err(Error::ToolUnavailable {
                tool: tool.to_string(),
                message: format!("{} does not exist", explicit.display()),
            })
        };
    }
    which::which(executable).map_err(|e| Error::ToolUnavailable {
        tool: tool.to_string(),
        message: format!("{} not found on PATH ({})", executable, e),
    })
}

/// Run `spec` to completion, its deadline, or cancellation.
///
/// The child leads its own process group, so a timeout or cancellation kills
/// every process it spawned. Both pipes are drained on background threads
/// into shared buffers; once the child has stopped the readers get
/// `READER_GRACE` to finish and whatever they have read by then is returned.
pub fn run_process(spec: &ProcessSpec, cancel: &CancellationToken) -> Result<ProcessOutcome> {
    let started = Instant::now();
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ToolUnavailable {
                tool: spec.program.display().to_string(),
                message: e.to_string(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    let stdout = Drain::spawn(child.stdout.take());
    let stderr = Drain::spawn(child.stderr.take());

    enum Stop {
        Exited(Option<i32>),
        Deadline,
        Cancelled,
    }

    let stop = loop {
        if let Some(status) = child.try_wait()? {
            break Stop::Exited(status.code());
        }
        if started.elapsed() >= spec.timeout {
            kill(&mut child);
            break Stop::Deadline;
        }
        if cancel.is_cancelled() {
            kill(&mut child);
            break Stop::Cancelled;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let settle_by = Instant::now() + READER_GRACE;
    let output = |exit_code| ProcessOutput {
        stdout: stdout.collect(settle_by),
        stderr: stderr.collect(settle_by),
        exit_code,
        elapsed: started.elapsed(),
    };

    Ok(match stop {
        Stop::Exited(code) => ProcessOutcome::Completed(output(code)),
        Stop::Deadline => {
            log::warn!(
                "{} exceeded {}s, killed",
                spec.display_command(),
                spec.timeout.as_secs_f64()
            );
            ProcessOutcome::TimedOut(output(None))
        }
        Stop::Cancelled => ProcessOutcome::Cancelled(output(None)),
    })
}

/// A pipe copied into a shared buffer by a background thread.
struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buffer, handle }
    }

    /// Wait for end of stream until `deadline`, then take what was read.
    /// A reader still blocked after that is left detached.
    fn collect(&self, deadline: Instant) -> Vec<u8> {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if !self.handle.is_finished() {
            log::debug!("pipe still open after the process stopped; keeping partial output");
        }
        std::mem::take(&mut *self.buffer.lock())
    }
}

/// Kill the child's whole process group, then reap the child.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: killpg only sends a signal; the group was created for this child.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// First line of `<program> --version`, bounded to ten seconds.
pub fn detect_version(program: &Path, cwd: &Path) -> Option<String> {
    let spec = ProcessSpec {
        program: program.to_path_buf(),
        args: vec!["--version".to_string()],
        cwd: cwd.to_path_buf(),
        timeout: VERSION_TIMEOUT,
    };
    match run_process(&spec, &CancellationToken::new()) {
        Ok(ProcessOutcome::Completed(output)) if output.exit_code == Some(0) => {
            let text = if output.stdout.iter().any(|b| !b.is_ascii_whitespace()) {
                output.stdout_text()
            } else {
                output.stderr_text()
            };
            text.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        }
        _ => None,
    }
}
