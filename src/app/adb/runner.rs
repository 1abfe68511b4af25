use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;

/// Raw result of a direct (non-shell) invocation.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Trimmed, merged stdout+stderr of one bridge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Grace given to drain threads once the deadline has passed, so output
/// written just before exit is not lost.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Output collected by a helper thread. The buffer is shared so whatever was
/// read can be taken even while a grandchild still holds the pipe open.
struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(mut reader: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let (sender, done) = mpsc::channel();
        let shared = Arc::clone(&buffer);
        std::thread::spawn(move || {
            let mut temp = [0u8; 4096];
            loop {
                match reader.read(&mut temp) {
                    Ok(0) => break,
                    Ok(count) => shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&temp[..count]),
                    Err(_) => break,
                }
            }
            let _ = sender.send(());
        });
        Self { buffer, done }
    }

    /// Waits for end-of-stream until `deadline`, then takes what was read.
    fn finish(self, deadline: Instant, trace_id: &str) -> Vec<u8> {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(DRAIN_GRACE);
        if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(remaining) {
            warn!(trace_id = %trace_id, "output pipe still open after exit; keeping partial output");
        }
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }
}

fn decode(bytes: Vec<u8>, stream: &str, trace_id: &str) -> Result<String, AppError> {
    String::from_utf8(bytes).map_err(|err| {
        AppError::encoding(
            format!("Command {stream} is not valid UTF-8: {err}"),
            trace_id,
        )
    })
}

/// Polls `child` until it exits or `deadline` passes; a late child is killed.
fn wait_for_exit(
    child: &mut Child,
    timeout: Duration,
    deadline: Instant,
    trace_id: &str,
) -> Result<Option<i32>, AppError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AppError::timeout(
                        format!("Command timed out after {timeout:?}"),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    }
}

/// Waits for `child` while its pipes are drained on helper threads; a chatty
/// child would otherwise block once the pipe buffer fills. The whole call,
/// draining included, is bounded by `timeout`.
fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    trace_id: &str,
) -> Result<(Vec<u8>, Vec<u8>, Option<i32>), AppError> {
    let deadline = Instant::now() + timeout;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let stdout_drain = Drain::spawn(stdout);
    let stderr_drain = Drain::spawn(stderr);

    let exit_code = wait_for_exit(&mut child, timeout, deadline, trace_id);
    let stdout_bytes = stdout_drain.finish(deadline, trace_id);
    let stderr_bytes = stderr_drain.finish(deadline, trace_id);
    Ok((stdout_bytes, stderr_bytes, exit_code?))
}

/// Runs `program` directly, without a shell.
pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<RawOutput, AppError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::spawn(format!("Failed to spawn {program}: {err}"), trace_id))?;

    let (stdout, stderr, exit_code) = wait_with_timeout(child, timeout, trace_id)?;
    Ok(RawOutput {
        stdout: decode(stdout, "stdout", trace_id)?,
        stderr: decode(stderr, "stderr", trace_id)?,
        exit_code,
    })
}

/// Runs `program` directly with its output discarded. For tools that fork a
/// long-lived helper (xclip serving the selection), which would otherwise
/// hold captured pipes open.
pub fn run_quiet_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<Option<i32>, AppError> {
    let deadline = Instant::now() + timeout;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| AppError::spawn(format!("Failed to spawn {program}: {err}"), trace_id))?;
    wait_for_exit(&mut child, timeout, deadline, trace_id)
}

/// Executes the bridge binary through `/bin/sh`. The bridge path is fixed at
/// construction; every call takes one pre-formatted argument string.
#[derive(Debug, Clone)]
pub struct AdbRunner {
    program: PathBuf,
    timeout: Duration,
}

impl AdbRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The full shell line for `args`, with stderr folded into stdout. `exec`
    /// keeps the bridge as the direct child so a timeout kill reaches it.
    pub fn command_line(&self, args: &str) -> String {
        let program = shell_words::quote(&self.program.to_string_lossy()).into_owned();
        format!("exec {program} {args} 2>&1")
    }

    pub fn run(&self, args: &str, trace_id: &str) -> Result<CommandOutput, AppError> {
        self.run_with_timeout(args, self.timeout, trace_id)
    }

    pub fn run_with_timeout(
        &self,
        args: &str,
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let line = self.command_line(args);
        debug!(trace_id = %trace_id, args = %args, "adb");

        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AppError::spawn(format!("Failed to spawn shell: {err}"), trace_id))?;

        let (stdout, stderr, exit_code) = wait_with_timeout(child, timeout, trace_id)?;
        let mut merged = stdout;
        merged.extend_from_slice(&stderr);
        let output = decode(merged, "output", trace_id)?.trim().to_string();

        if exit_code != Some(0) {
            debug!(trace_id = %trace_id, args = %args, exit_code = ?exit_code, "adb exited non-zero");
        }
        Ok(CommandOutput { output, exit_code })
    }

    /// Like [`AdbRunner::run`], but a non-zero exit is an error.
    pub fn run_checked(&self, args: &str, trace_id: &str) -> Result<String, AppError> {
        let result = self.run(args, trace_id)?;
        if !result.success() {
            warn!(trace_id = %trace_id, args = %args, exit_code = ?result.exit_code, "adb failed");
            return Err(AppError::dependency(
                format!("adb {args} failed: {}", result.output),
                trace_id,
            ));
        }
        Ok(result.output)
    }
}
