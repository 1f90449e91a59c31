use std::time::Duration;

use crate::error::PsError;
use crate::scripting::command::DEFAULT_TIMEOUT;
use crate::scripting::interpreter::{Interpreter, TimeoutPolicy};

/// Defaults applied to every [`crate::ScriptCommand`] built from this config.
///
/// Each command copies these values at construction; changing a command's
/// timeout never affects other commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Interpreter profile (default: PowerShell).
    pub interpreter: Interpreter,
    /// Wait budget for the blocking modes (default: 30 seconds).
    pub timeout: Duration,
    /// Behaviour when the budget elapses (default: inspect).
    pub timeout_policy: TimeoutPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interpreter: Interpreter::default(),
            timeout: DEFAULT_TIMEOUT,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `PSCLIENT_INTERPRETER`    | `powershell` (Windows) / `pwsh` (other)  |
    /// | `PSCLIENT_TIMEOUT_SECS`   | `30`                                     |
    /// | `PSCLIENT_TIMEOUT_POLICY` | `inspect`                                |
    pub fn from_env() -> Result<Self, PsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("PSCLIENT_INTERPRETER") {
            config.interpreter = Interpreter::from_name(&name)?;
        }

        if let Some(secs) = lookup("PSCLIENT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                PsError::Config(format!("PSCLIENT_TIMEOUT_SECS must be a valid u64, got {secs:?}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(policy) = lookup("PSCLIENT_TIMEOUT_POLICY") {
            config.timeout_policy = policy.parse()?;
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
