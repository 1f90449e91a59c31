//! Script command construction, process execution and result parsing.
//!
//! [`command::ScriptCommand`] is the public entry point. It formats
//! parameters ([`parameter`]), composes the command line, and delegates
//! the spawn + I/O + timeout handling to [`subprocess`]. Tabular output is
//! turned into records by [`reader`].

pub mod command;
pub mod interpreter;
pub mod output;
pub mod parameter;
pub mod reader;
pub mod subprocess;

/// Shared test helpers for command and subprocess tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::time::Duration;

    use super::command::ScriptCommand;
    use super::interpreter::{Interpreter, TimeoutPolicy};

    /// Build a [`ScriptCommand`] that runs through `sh -c` with a 5-second
    /// budget, so process tests do not depend on a PowerShell install.
    pub fn sh_command(script: &str) -> ScriptCommand {
        let mut cmd = ScriptCommand::new(script).expect("valid script");
        cmd.set_interpreter(Interpreter::posix_shell())
            .set_timeout(Duration::from_secs(5))
            .set_timeout_policy(TimeoutPolicy::Terminate);
        cmd
    }
}
