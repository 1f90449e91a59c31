//! Execution results: captured outcomes, the owned stdout handle, and the
//! line events of a live stream.

use std::fmt;
use std::io::{self, BufRead, Cursor, Read};

use serde::Serialize;

use crate::error::PsError;

/// Captured result of a blocking execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Either stream exceeded the capture limit and was cut short.
    pub truncated: bool,
}

impl ExecutionOutcome {
    /// Zero exit code and nothing but whitespace on stderr.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.stderr.trim().is_empty()
    }

    /// Apply the success rule, turning a failure into
    /// [`PsError::ExecutionFailed`] with stderr carried verbatim.
    pub fn into_result(self) -> Result<Self, PsError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PsError::ExecutionFailed {
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Owned standard-output handle returned by raw stream execution.
///
/// Dropping the stream releases it.
pub struct OutputStream {
    inner: Box<dyn BufRead + Send>,
}

impl OutputStream {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Cursor::new(text.into().into_bytes()))
    }

    /// Drain the remaining output into a string.
    pub fn read_all(mut self) -> Result<String, PsError> {
        let mut text = String::new();
        self.inner.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}

impl Read for OutputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for OutputStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// The channel a streamed line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line received during live stream execution, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub source: OutputSource,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            source: OutputSource::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            source: OutputSource::Stderr,
            text: text.into(),
        }
    }
}

/// Completion signal of a live stream execution.
///
/// The stream mode never fails on exit code; callers that care consult
/// [`StreamCompletion::success`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCompletion {
    /// `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
    pub duration_ms: u64,
}

impl StreamCompletion {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
