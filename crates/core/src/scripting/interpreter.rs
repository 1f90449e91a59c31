//! Interpreter profiles.
//!
//! An [`Interpreter`] names the executable (resolved from `PATH`), the
//! arguments placed before the composed command line, and the suffix that
//! asks the interpreter for its list-format report in tabular mode.

use std::fmt;
use std::str::FromStr;

use crate::error::PsError;

/// PowerShell pipeline stage that renders objects as `Name : Value` blocks.
const POWERSHELL_LIST_FORMAT: &str = " | Format-List";

/// How an interpreter is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed before the command line.
    pub leading_args: Vec<String>,
    /// Appended to the command line when tabular output is requested.
    pub list_format_suffix: Option<String>,
}

impl Interpreter {
    /// A custom interpreter that receives the command line as its only argument.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            list_format_suffix: None,
        }
    }

    /// Windows PowerShell on Windows, PowerShell 7 (`pwsh`) elsewhere.
    pub fn powershell() -> Self {
        let program = if cfg!(windows) { "powershell" } else { "pwsh" };
        Self::powershell_at(program)
    }

    /// A PowerShell profile for an explicit executable.
    pub fn powershell_at(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
            ],
            list_format_suffix: Some(POWERSHELL_LIST_FORMAT.to_string()),
        }
    }

    /// `sh -c <command line>`. Scripts are expected to print list format
    /// themselves in tabular mode.
    pub fn posix_shell() -> Self {
        Self {
            program: "sh".to_string(),
            leading_args: vec!["-c".to_string()],
            list_format_suffix: None,
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_list_format_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.list_format_suffix = Some(suffix.into());
        self
    }

    /// Full argument vector for one launch: leading args, then the command
    /// line as a single argument.
    pub fn args_for(&self, command_line: &str) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push(command_line.to_string());
        args
    }

    /// Parse a profile name from configuration.
    ///
    /// `powershell`, `pwsh` and `sh` select the built-in profiles; any other
    /// non-blank value is treated as a custom program.
    pub fn from_name(name: &str) -> Result<Self, PsError> {
        match name.trim() {
            "" => Err(PsError::Config("interpreter name must not be blank".to_string())),
            "powershell" => Ok(Self::powershell_at("powershell")),
            "pwsh" => Ok(Self::powershell_at("pwsh")),
            "sh" => Ok(Self::posix_shell()),
            other => Ok(Self::new(other)),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::powershell()
    }
}

/// What a blocking execution does when its wait budget elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Leave the process running and inspect its exit status once. If it has
    /// exited by then, the normal success/failure rules apply; otherwise the
    /// call fails with a non-terminating timeout.
    #[default]
    Inspect,
    /// Kill the process and fail with a terminating timeout.
    Terminate,
}

impl FromStr for TimeoutPolicy {
    type Err = PsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inspect" => Ok(Self::Inspect),
            "terminate" | "kill" => Ok(Self::Terminate),
            other => Err(PsError::Config(format!("unknown timeout policy: {other}"))),
        }
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inspect => f.write_str("inspect"),
            Self::Terminate => f.write_str("terminate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
