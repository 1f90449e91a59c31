/// Errors surfaced by command construction, execution and result parsing.
#[derive(Debug, thiserror::Error)]
pub enum PsError {
    /// A blank script, parameter value, parameter name or working directory,
    /// or a working directory that does not exist.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The interpreter exited non-zero, or wrote to stderr in a blocking mode.
    #[error("Script failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    /// Output did not follow the `Name : Value` list convention.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Field access while the cursor is not positioned on a record.
    #[error("Invalid reader state: {0}")]
    State(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The wait budget elapsed before the process exited.
    #[error("Script did not exit within {timeout_secs}s (terminated: {terminated})")]
    Timeout { timeout_secs: u64, terminated: bool },

    #[error("Interpreter '{program}' could not be launched: {source}")]
    InterpreterNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
