//! `psclient` library crate.
//!
//! Argument parsing and the three run modes live here so they can be
//! tested; the binary entrypoint lives in `main.rs`.

use std::io::Write;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use psclient_core::{ClientConfig, OutputSource, ScriptCommand};

#[derive(Parser, Debug)]
#[command(name = "psclient", version, about = "Run a script through an interpreter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the trimmed stdout of the script
    Scalar(RunArgs),
    /// Parse list-format output and print one JSON object per record
    Table(RunArgs),
    /// Print output lines as they arrive and exit with the script's code
    Stream(RunArgs),
}

impl Command {
    pub fn mode(&self) -> Mode {
        match self {
            Command::Scalar(_) => Mode::Scalar,
            Command::Table(_) => Mode::Table,
            Command::Stream(_) => Mode::Stream,
        }
    }

    pub fn run_args(&self) -> &RunArgs {
        match self {
            Command::Scalar(args) | Command::Table(args) | Command::Stream(args) => args,
        }
    }
}

/// Script and parameters shared by every mode.
///
/// Positional values are appended before named parameters.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Script text passed to the interpreter
    pub script: String,

    /// Named parameter, rendered as `-NAME VALUE` (repeatable)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_named)]
    pub params: Vec<(String, String)>,

    /// Positional values; put `--` before values that start with a dash
    pub args: Vec<String>,
}

/// Which execution mode to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Scalar,
    Table,
    Stream,
}

fn parse_named(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))
}

/// Build the script command described by `args`.
pub fn build_command(args: &RunArgs, config: &ClientConfig) -> anyhow::Result<ScriptCommand> {
    let mut cmd = ScriptCommand::with_config(args.script.as_str(), config)?;
    for value in &args.args {
        cmd.add_argument(value.as_str())?;
    }
    for (name, value) in &args.params {
        cmd.add_parameter(name.as_str(), value.as_str())?;
    }
    Ok(cmd)
}

/// Run `cmd` in `mode`, writing results to `out`. Returns the process exit
/// code to report.
pub async fn run<W: Write>(cmd: &ScriptCommand, mode: Mode, out: &mut W) -> anyhow::Result<i32> {
    match mode {
        Mode::Scalar => {
            let value = cmd.execute_scalar().await?;
            writeln!(out, "{value}")?;
            Ok(0)
        }
        Mode::Table => {
            let reader = cmd.execute_reader().await?;
            let mut count = 0usize;
            for record in reader {
                let record = record?;
                writeln!(out, "{}", serde_json::to_string(&record)?)?;
                count += 1;
            }
            tracing::info!(records = count, "Table read complete");
            Ok(0)
        }
        Mode::Stream => {
            let mut write_error = None;
            let done = cmd
                .execute_stream(|line| {
                    let prefix = match line.source {
                        OutputSource::Stdout => "",
                        OutputSource::Stderr => "[stderr] ",
                    };
                    if let Err(e) = writeln!(out, "{prefix}{}", line.text) {
                        write_error.get_or_insert(e);
                    }
                })
                .await?;
            if let Some(e) = write_error {
                return Err(e).context("failed to write streamed output");
            }
            Ok(done.exit_code.unwrap_or(-1))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
