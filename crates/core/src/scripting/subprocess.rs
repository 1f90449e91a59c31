//! Interpreter process management.
//!
//! Provides [`run_captured`], the launch + wait + capture logic behind the
//! blocking execution modes, and [`run_streaming`], which forwards output
//! lines as they arrive. [`super::command::ScriptCommand`] builds an
//! [`Invocation`] and delegates here.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::interpreter::{Interpreter, TimeoutPolicy};
use super::output::{ExecutionOutcome, OutputLine, StreamCompletion};
use crate::error::PsError;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output past this limit is read and discarded so the process never sees a
/// closed pipe; [`ExecutionOutcome::truncated`] reports the cut.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Everything needed to launch the interpreter once.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub interpreter: Interpreter,
    /// Composed script + parameters, passed as a single argument.
    pub command_line: String,
    pub working_directory: Option<PathBuf>,
    /// Wait budget for the blocking modes.
    pub timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl Invocation {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter.program);
        cmd.args(self.interpreter.args_for(&self.command_line))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child, PsError> {
        tracing::debug!(
            program = %self.interpreter.program,
            working_directory = ?self.working_directory,
            timeout_secs = self.timeout.as_secs(),
            "Launching interpreter",
        );

        cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PsError::InterpreterNotFound {
                program: self.interpreter.program.clone(),
                source: e,
            },
            _ => PsError::Io(e),
        })
    }
}

/// Launch the interpreter, drain stdout/stderr, and wait for exit within
/// the invocation's budget.
///
/// The exit code is not judged here; see [`ExecutionOutcome::into_result`].
/// When the budget elapses, [`TimeoutPolicy`] decides whether the process
/// is killed or left running and inspected.
pub async fn run_captured(invocation: &Invocation) -> Result<ExecutionOutcome, PsError> {
    let mut cmd = invocation.command();
    // Only a terminating policy may kill the child when it is dropped.
    cmd.kill_on_drop(invocation.timeout_policy == TimeoutPolicy::Terminate);

    let start = Instant::now();
    let mut child = invocation.spawn(&mut cmd)?;

    // Read both pipes in spawned tasks so a chatty process cannot block on a
    // full pipe while we wait for it.
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let status = match tokio::time::timeout(invocation.timeout, child.wait()).await {
        Ok(result) => result?,
        Err(_elapsed) => {
            let timeout_secs = invocation.timeout.as_secs();
            match invocation.timeout_policy {
                TimeoutPolicy::Terminate => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill timed-out interpreter");
                    }
                    tracing::warn!(timeout_secs, "Interpreter timed out and was terminated");
                    return Err(PsError::Timeout {
                        timeout_secs,
                        terminated: true,
                    });
                }
                TimeoutPolicy::Inspect => match child.try_wait()? {
                    Some(status) => status,
                    None => {
                        tracing::warn!(
                            timeout_secs,
                            pid = ?child.id(),
                            "Interpreter still running after wait budget; leaving it running",
                        );
                        return Err(PsError::Timeout {
                            timeout_secs,
                            terminated: false,
                        });
                    }
                },
            }
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = join_capture(stdout_task).await?;
    let stderr = join_capture(stderr_task).await?;
    let exit_code = status.code().unwrap_or(-1);
    let truncated = stdout.truncated || stderr.truncated;

    tracing::debug!(exit_code, duration_ms, "Interpreter exited");
    if truncated {
        tracing::warn!(
            limit_bytes = MAX_OUTPUT_BYTES,
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "Interpreter output exceeded the capture limit and was truncated",
        );
    }

    Ok(ExecutionOutcome {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
        duration_ms,
        truncated,
    })
}

/// Launch the interpreter and hand every stdout and stderr line to
/// `on_line` as it arrives, returning once the process has exited.
///
/// Each channel keeps its own line order; lines from the two channels are
/// interleaved in arrival order. Bytes that are not valid UTF-8 are passed
/// on lossily. Exit status is reported through the returned
/// [`StreamCompletion`], never as an error. A read error closes its channel
/// and is returned only after the process has exited. The wait budget does
/// not apply.
pub async fn run_streaming<F>(
    invocation: &Invocation,
    mut on_line: F,
) -> Result<StreamCompletion, PsError>
where
    F: FnMut(OutputLine),
{
    let mut cmd = invocation.command();
    let start = Instant::now();
    let mut child = invocation.spawn(&mut cmd)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("interpreter stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("interpreter stderr was not captured"))?;

    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    // Partial lines survive a lost `select!` race in these buffers.
    let (mut stdout_buf, mut stderr_buf) = (Vec::new(), Vec::new());
    let (mut stdout_open, mut stderr_open) = (true, true);
    let (mut stdout_count, mut stderr_count) = (0usize, 0usize);
    let mut read_error: Option<io::Error> = None;

    while stdout_open || stderr_open {
        tokio::select! {
            line = next_line(&mut stdout, &mut stdout_buf), if stdout_open => match line {
                Ok(Some(text)) => {
                    stdout_count += 1;
                    on_line(OutputLine::stdout(text));
                }
                Ok(None) => stdout_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read interpreter stdout");
                    stdout_open = false;
                    read_error.get_or_insert(e);
                }
            },
            line = next_line(&mut stderr, &mut stderr_buf), if stderr_open => match line {
                Ok(Some(text)) => {
                    stderr_count += 1;
                    on_line(OutputLine::stderr(text));
                }
                Ok(None) => stderr_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read interpreter stderr");
                    stderr_open = false;
                    read_error.get_or_insert(e);
                }
            },
        }
    }

    // Unread pipes are closed before waiting so a blocked writer cannot hang us.
    drop(stdout);
    drop(stderr);
    let status = child.wait().await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    tracing::debug!(
        exit_code = ?status.code(),
        stdout_lines = stdout_count,
        stderr_lines = stderr_count,
        duration_ms,
        "Interpreter stream finished",
    );

    if let Some(e) = read_error {
        return Err(PsError::Io(e));
    }

    Ok(StreamCompletion {
        exit_code: status.code(),
        stdout_lines: stdout_count,
        stderr_lines: stderr_count,
        duration_ms,
    })
}

/// Read the next `\n`-terminated line into `buf` and return it without its
/// `\r\n` / `\n` terminator. Returns `None` at end of stream.
///
/// `buf` is only cleared once a line is returned, so a call cancelled by
/// `select!` loses nothing.
async fn next_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Ok(Some(line))
}

/// Bytes captured from one output pipe.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    /// More than [`MAX_OUTPUT_BYTES`] arrived; the excess was discarded.
    truncated: bool,
}

/// Read an entire output stream, keeping the first [`MAX_OUTPUT_BYTES`] and
/// draining the rest.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> io::Result<Captured> {
    let mut captured = Captured::default();
    if let Some(mut h) = handle {
        (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut captured.bytes)
            .await?;
        let discarded = tokio::io::copy(&mut h, &mut tokio::io::sink()).await?;
        captured.truncated = discarded > 0;
    }
    Ok(captured)
}

async fn join_capture(task: JoinHandle<io::Result<Captured>>) -> Result<Captured, PsError> {
    Ok(task.await.map_err(io::Error::other)??)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::scripting::output::OutputSource;

    fn sh(command_line: &str) -> Invocation {
        Invocation {
            interpreter: Interpreter::posix_shell(),
            command_line: command_line.to_string(),
            working_directory: None,
            timeout: Duration::from_secs(5),
            timeout_policy: TimeoutPolicy::Terminate,
        }
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let outcome = run_captured(&sh("echo out; echo err >&2; exit 7"))
            .await
            .expect("run");
        assert_eq!(outcome.exit_code, 7);
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
    }

    #[tokio::test]
    async fn large_output_does_not_block_the_wait() {
        // Well past a typical 64 KiB pipe buffer.
        let outcome = run_captured(&sh("i=0; while [ $i -lt 20000 ]; do echo line$i; i=$((i+1)); done"))
            .await
            .expect("run");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout.lines().count(), 20000);
    }

    #[tokio::test]
    async fn terminate_policy_kills_on_timeout() {
        let mut invocation = sh("sleep 5");
        invocation.timeout = Duration::from_millis(200);
        let started = Instant::now();
        let result = run_captured(&invocation).await;
        assert_matches!(result, Err(PsError::Timeout { terminated: true, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn inspect_policy_reports_running_process_without_killing() {
        let mut invocation = sh("sleep 1");
        invocation.timeout = Duration::from_millis(100);
        invocation.timeout_policy = TimeoutPolicy::Inspect;
        let result = run_captured(&invocation).await;
        assert_matches!(result, Err(PsError::Timeout { terminated: false, .. }));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let invocation = Invocation {
            interpreter: Interpreter::new("psclient-no-such-interpreter"),
            ..sh("ignored")
        };
        let result = run_captured(&invocation).await;
        assert_matches!(result, Err(PsError::InterpreterNotFound { ref program, .. }) if program == "psclient-no-such-interpreter");
    }

    #[tokio::test]
    async fn streaming_preserves_per_channel_order() {
        let mut lines = Vec::new();
        let done = run_streaming(
            &sh("echo one; echo oops >&2; echo two; echo three"),
            |line| lines.push(line),
        )
        .await
        .expect("stream");

        let stdout: Vec<_> = lines
            .iter()
            .filter(|l| l.source == OutputSource::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(stdout, vec!["one", "two", "three"]);
        assert!(lines.contains(&OutputLine::stderr("oops")));
        assert_eq!(done.stdout_lines, 3);
        assert_eq!(done.stderr_lines, 1);
        assert!(done.success());
    }

    #[tokio::test]
    async fn streaming_passes_invalid_utf8_lossily_and_keeps_reading() {
        let mut lines = Vec::new();
        let done = run_streaming(
            &sh(r"printf 'before\n\377\nafter\n'; sleep 1; echo late"),
            |line| lines.push(line),
        )
        .await
        .expect("stream");

        let stdout: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(stdout, vec!["before", "\u{FFFD}", "after", "late"]);
        assert!(done.success());
    }

    #[tokio::test]
    async fn streaming_emits_final_line_without_newline() {
        let mut lines = Vec::new();
        run_streaming(&sh(r"printf 'one\r\ntail'"), |line| lines.push(line))
            .await
            .expect("stream");
        assert_eq!(lines, vec![OutputLine::stdout("one"), OutputLine::stdout("tail")]);
    }

    #[tokio::test]
    async fn output_past_capture_limit_is_drained_and_flagged() {
        // 11 MiB: the writer must not die of a closed pipe.
        let outcome = run_captured(&sh("head -c 11534336 /dev/zero | tr '\\0' 'a'"))
            .await
            .expect("run");
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.truncated);
        assert_eq!(outcome.stdout.len(), MAX_OUTPUT_BYTES);
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn output_within_capture_limit_is_not_flagged() {
        let outcome = run_captured(&sh("echo small")).await.expect("run");
        assert!(!outcome.truncated);
    }
}
