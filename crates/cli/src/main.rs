//! `psclient` -- run a script through an interpreter from the command line.
//!
//! ```text
//! psclient scalar 'Get-Date -Format yyyy'
//! psclient table  'Get-Process' -p Name=pwsh
//! psclient stream 'Write-Output a; Start-Sleep 1; Write-Output b'
//! ```
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default   | Description                               |
//! |---------------------------|----------|-----------|-------------------------------------------|
//! | `PSCLIENT_INTERPRETER`    | no       | `pwsh`    | `powershell`, `pwsh`, `sh`, or a program  |
//! | `PSCLIENT_TIMEOUT_SECS`   | no       | `30`      | Wait budget for `scalar` and `table`      |
//! | `PSCLIENT_TIMEOUT_POLICY` | no       | `inspect` | `inspect` or `terminate`                  |

use clap::Parser;
use psclient_cli::{build_command, run, Cli};
use psclient_core::ClientConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "psclient=info,psclient_cli=info,psclient_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mode = cli.command.mode();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(2);
    });

    tracing::debug!(
        mode = ?mode,
        interpreter = %config.interpreter.program,
        timeout_secs = config.timeout.as_secs(),
        timeout_policy = %config.timeout_policy,
        "Starting psclient",
    );

    let cmd = build_command(cli.command.run_args(), &config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid command");
        std::process::exit(2);
    });

    let mut stdout = std::io::stdout().lock();
    match run(&cmd, mode, &mut stdout).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Script execution failed");
            std::process::exit(1);
        }
    }
}
