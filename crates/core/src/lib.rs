//! `psclient-core` -- drive an external script interpreter from Rust.
//!
//! Builds a command line from a script plus positional and named
//! parameters, runs it through the configured interpreter, and returns
//! the result as a trimmed scalar, as records parsed out of the
//! interpreter's list-format report, or as a live stream of output lines.

pub mod config;
pub mod error;
pub mod scripting;

pub use config::ClientConfig;
pub use error::PsError;
pub use scripting::command::ScriptCommand;
pub use scripting::interpreter::{Interpreter, TimeoutPolicy};
pub use scripting::output::{
    ExecutionOutcome, OutputLine, OutputSource, OutputStream, StreamCompletion,
};
pub use scripting::parameter::{ParamValue, Parameter, QuoteOption};
pub use scripting::reader::{Record, TabularReader};
pub use scripting::subprocess::MAX_OUTPUT_BYTES;
