//! Script command builder and execution entry points.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::interpreter::{Interpreter, TimeoutPolicy};
use super::output::{ExecutionOutcome, OutputLine, OutputStream, StreamCompletion};
use super::parameter::{ParamValue, Parameter, QuoteOption};
use super::reader::TabularReader;
use super::subprocess::{self, Invocation};
use crate::config::ClientConfig;
use crate::error::PsError;

/// Default wait budget for the blocking execution modes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A script plus its ordered parameters, ready to run through an interpreter.
///
/// The script text is used verbatim: it is neither escaped nor validated
/// beyond being non-blank, so it must come from a trusted source.
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    script: String,
    parameters: Vec<Parameter>,
    interpreter: Interpreter,
    working_directory: Option<PathBuf>,
    timeout: Duration,
    timeout_policy: TimeoutPolicy,
}

impl ScriptCommand {
    /// Create a command with the default PowerShell profile and a 30-second
    /// budget.
    pub fn new(script: impl Into<String>) -> Result<Self, PsError> {
        Self::with_config(script, &ClientConfig::default())
    }

    /// Create a command whose interpreter and timeout come from `config`.
    pub fn with_config(script: impl Into<String>, config: &ClientConfig) -> Result<Self, PsError> {
        let script = script.into();
        if script.trim().is_empty() {
            return Err(PsError::InvalidArgument(
                "script must not be blank".to_string(),
            ));
        }
        Ok(Self {
            script,
            parameters: Vec::new(),
            interpreter: config.interpreter.clone(),
            working_directory: None,
            timeout: config.timeout,
            timeout_policy: config.timeout_policy,
        })
    }

    /// Append a positional parameter; text values are quoted.
    pub fn add_argument(&mut self, value: impl Into<ParamValue>) -> Result<&mut Self, PsError> {
        self.add_argument_with(value, QuoteOption::Quote)
    }

    pub fn add_argument_with(
        &mut self,
        value: impl Into<ParamValue>,
        quote: QuoteOption,
    ) -> Result<&mut Self, PsError> {
        self.parameters.push(Parameter::positional(value, quote)?);
        Ok(self)
    }

    /// Append a `-<name> <value>` parameter; text values are quoted.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<&mut Self, PsError> {
        self.add_parameter_with(name, value, QuoteOption::Quote)
    }

    pub fn add_parameter_with(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
        quote: QuoteOption,
    ) -> Result<&mut Self, PsError> {
        self.parameters.push(Parameter::named(name, value, quote)?);
        Ok(self)
    }

    /// Run the interpreter in `dir`. The directory must exist now; it is not
    /// checked again at launch.
    pub fn set_working_directory(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, PsError> {
        let dir = dir.as_ref();
        if dir.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(PsError::InvalidArgument(
                "working directory must not be blank".to_string(),
            ));
        }
        if !dir.is_dir() {
            return Err(PsError::InvalidArgument(format!(
                "working directory does not exist: {}",
                dir.display()
            )));
        }
        self.working_directory = Some(dir.to_path_buf());
        Ok(self)
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn set_timeout_secs(&mut self, secs: u64) -> &mut Self {
        self.set_timeout(Duration::from_secs(secs))
    }

    pub fn set_timeout_policy(&mut self, policy: TimeoutPolicy) -> &mut Self {
        self.timeout_policy = policy;
        self
    }

    pub fn set_interpreter(&mut self, interpreter: Interpreter) -> &mut Self {
        self.interpreter = interpreter;
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }

    /// The script followed by each parameter, space separated, in the order
    /// they were added.
    pub fn command_line(&self) -> String {
        let mut line = self.script.clone();
        for param in &self.parameters {
            line.push(' ');
            line.push_str(&param.to_string());
        }
        line
    }

    /// Run and return the raw outcome without applying the success rule.
    pub async fn execute(&self) -> Result<ExecutionOutcome, PsError> {
        subprocess::run_captured(&self.invocation(self.command_line())).await
    }

    /// Run and return stdout trimmed of surrounding whitespace.
    ///
    /// Fails with [`PsError::ExecutionFailed`] on a non-zero exit code or on
    /// any stderr output.
    pub async fn execute_scalar(&self) -> Result<String, PsError> {
        let stream = self.execute_raw().await?;
        Ok(stream.read_all()?.trim().to_string())
    }

    /// Run and hand over stdout as an owned stream.
    pub async fn execute_raw(&self) -> Result<OutputStream, PsError> {
        self.run_checked(self.command_line()).await
    }

    /// Run with the interpreter's list-format suffix and return a reader
    /// over the resulting records.
    pub async fn execute_reader(&self) -> Result<TabularReader, PsError> {
        let mut line = self.command_line();
        if let Some(suffix) = &self.interpreter.list_format_suffix {
            line.push_str(suffix);
        }
        Ok(TabularReader::new(self.run_checked(line).await?))
    }

    /// Run and deliver every stdout and stderr line to `on_line` as it
    /// arrives, returning once the process has exited.
    ///
    /// Exit status is reported in the returned [`StreamCompletion`] rather
    /// than as an error; stderr text reaches `on_line` like any other line.
    pub async fn execute_stream<F>(&self, on_line: F) -> Result<StreamCompletion, PsError>
    where
        F: FnMut(OutputLine),
    {
        subprocess::run_streaming(&self.invocation(self.command_line()), on_line).await
    }

    async fn run_checked(&self, command_line: String) -> Result<OutputStream, PsError> {
        let outcome = subprocess::run_captured(&self.invocation(command_line)).await?;
        if !outcome.is_success() {
            tracing::warn!(
                exit_code = outcome.exit_code,
                stderr_len = outcome.stderr.len(),
                "Script failed",
            );
        }
        let outcome = outcome.into_result()?;
        Ok(OutputStream::from_text(outcome.stdout))
    }

    fn invocation(&self, command_line: String) -> Invocation {
        Invocation {
            interpreter: self.interpreter.clone(),
            command_line,
            working_directory: self.working_directory.clone(),
            timeout: self.timeout,
            timeout_policy: self.timeout_policy,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::scripting::test_helpers::sh_command;

    /// Prints its first positional argument.
    const ECHO_FIRST: &str = r#"f() { printf '%s\n' "$1"; }; f"#;

    #[test]
    fn blank_script_is_rejected() {
        assert_matches!(ScriptCommand::new(""), Err(PsError::InvalidArgument(_)));
        assert_matches!(ScriptCommand::new(" \n\t"), Err(PsError::InvalidArgument(_)));
    }

    #[test]
    fn defaults_come_from_config() {
        let cmd = ScriptCommand::new("Get-Date").unwrap();
        assert_eq!(cmd.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(cmd.timeout_policy(), TimeoutPolicy::Inspect);
        assert_eq!(cmd.interpreter(), &Interpreter::powershell());
        assert!(cmd.working_directory().is_none());
    }

    #[test]
    fn command_line_keeps_parameter_order() {
        let mut cmd = ScriptCommand::new("Get-Thing").unwrap();
        cmd.add_argument(10)
            .unwrap()
            .add_parameter("Name", "x")
            .unwrap()
            .add_parameter_with("List", "a,b", QuoteOption::NoQuotes)
            .unwrap()
            .add_argument_with("raw", QuoteOption::NoQuotes)
            .unwrap();
        assert_eq!(
            cmd.command_line(),
            "Get-Thing 10 -Name \"\"\"x\"\"\" -List a,b raw"
        );
        assert_eq!(cmd.parameters().len(), 4);
    }

    #[test]
    fn blank_parameter_is_rejected_at_add_time() {
        let mut cmd = ScriptCommand::new("Get-Thing").unwrap();
        assert_matches!(cmd.add_argument(""), Err(PsError::InvalidArgument(_)));
        assert_matches!(cmd.add_parameter(" ", 1), Err(PsError::InvalidArgument(_)));
        assert!(cmd.parameters().is_empty());
    }

    #[test]
    fn missing_working_directory_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("nope");
        let mut cmd = ScriptCommand::new("Get-Location").unwrap();
        assert_matches!(
            cmd.set_working_directory(&missing),
            Err(PsError::InvalidArgument(_))
        );
        assert_matches!(cmd.set_working_directory(""), Err(PsError::InvalidArgument(_)));
        assert!(cmd.set_working_directory(dir.path()).is_ok());
        assert_eq!(cmd.working_directory(), Some(dir.path()));
    }

    #[tokio::test]
    async fn execute_scalar_returns_trimmed_stdout() {
        let result = sh_command("echo '  Hello, World!  '")
            .execute_scalar()
            .await
            .expect("execute");
        assert_eq!(result, "Hello, World!");
    }

    #[tokio::test]
    async fn execute_scalar_without_output_is_empty() {
        let result = sh_command("true").execute_scalar().await.expect("execute");
        assert_eq!(result, "");
    }

    #[tokio::test]
    async fn integer_argument_reaches_script() {
        let mut cmd = sh_command(ECHO_FIRST);
        cmd.add_argument(10).unwrap();
        assert_eq!(cmd.execute_scalar().await.expect("execute"), "10");
    }

    #[tokio::test]
    async fn quoted_argument_keeps_comma_together() {
        let mut cmd = sh_command(ECHO_FIRST);
        cmd.add_argument("Hello, World").unwrap();
        assert_eq!(cmd.execute_scalar().await.expect("execute"), "Hello, World");
    }

    #[tokio::test]
    async fn unquoted_argument_is_split_by_interpreter() {
        let mut cmd = sh_command(ECHO_FIRST);
        cmd.add_argument_with("Hello, World", QuoteOption::NoQuotes)
            .unwrap();
        assert_eq!(cmd.execute_scalar().await.expect("execute"), "Hello,");
    }

    #[tokio::test]
    async fn named_parameter_is_prefixed() {
        let mut cmd = sh_command(r"printf '%s|%s\n'");
        cmd.add_parameter("arg", 10).unwrap();
        assert_eq!(cmd.execute_scalar().await.expect("execute"), "-arg|10");
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_stderr() {
        let result = sh_command("echo 'no such command' >&2; exit 3")
            .execute_scalar()
            .await;
        assert_matches!(
            result,
            Err(PsError::ExecutionFailed { exit_code: 3, ref stderr }) if stderr.contains("no such command")
        );
    }

    #[tokio::test]
    async fn stderr_on_zero_exit_fails() {
        let result = sh_command("echo result; echo 'WARNING: bad' >&2")
            .execute_raw()
            .await;
        assert_matches!(result, Err(PsError::ExecutionFailed { exit_code: 0, .. }));
    }

    #[tokio::test]
    async fn execute_returns_unchecked_outcome() {
        let outcome = sh_command("echo partial; exit 2")
            .execute()
            .await
            .expect("execute");
        assert_eq!(outcome.exit_code, 2);
        assert_eq!(outcome.stdout, "partial\n");
    }

    #[tokio::test]
    async fn working_directory_is_applied() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut cmd = sh_command("pwd");
        cmd.set_working_directory(dir.path()).unwrap();
        let output = cmd.execute_scalar().await.expect("execute");
        // The resolved path may differ due to symlinks, so canonicalize both.
        let expected = dir
            .path()
            .canonicalize()
            .expect("canonicalize dir")
            .to_str()
            .expect("path")
            .to_string();
        assert!(
            output.ends_with(expected.trim_start_matches('/')),
            "pwd output '{output}' should match working directory '{expected}'"
        );
    }

    #[tokio::test]
    async fn execute_reader_parses_records() {
        let cmd = sh_command(r"printf '\nName : LEMON\nSize : 1\n\nName : PEAR\nSize : 2\n\n'");
        let mut reader = cmd.execute_reader().await.expect("execute");
        assert!(reader.read().unwrap());
        assert_eq!(reader.get("Name").unwrap(), "LEMON");
        assert!(reader.read().unwrap());
        assert_eq!(reader.get("Size").unwrap(), "2");
        assert!(!reader.read().unwrap());
    }

    #[tokio::test]
    async fn execute_reader_fails_on_scalar_output() {
        let mut reader = sh_command("echo 42").execute_reader().await.expect("execute");
        assert_matches!(reader.read(), Err(PsError::Parse(_)));
    }

    #[tokio::test]
    async fn execute_reader_propagates_failure() {
        let result = sh_command("echo boom >&2; exit 1").execute_reader().await;
        assert_matches!(result, Err(PsError::ExecutionFailed { exit_code: 1, .. }));
    }

    #[tokio::test]
    async fn execute_stream_does_not_fail_on_exit_code() {
        let mut lines = Vec::new();
        let done = sh_command("echo partial; echo FatalError >&2; exit 1")
            .execute_stream(|line| lines.push(line.text))
            .await
            .expect("stream");
        assert_eq!(done.exit_code, Some(1));
        assert!(!done.success());
        assert!(lines.contains(&"partial".to_string()));
        assert!(lines.contains(&"FatalError".to_string()));
    }
}
