//! Mixdown CLI
//!
//! Command-line front end for the timeline mixing engine.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mixdown::cli::{commands, Cli, Commands};
use mixdown::MixdownError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Mixdown v{}", env!("CARGO_PKG_VERSION"));

    let outcome = match cli.command {
        Commands::Render(args) => commands::render(args).await,
        Commands::Inspect { path } => commands::inspect(&path),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(err) = e.downcast_ref::<MixdownError>() {
                eprintln!("Code:  {}", err.error_code());
                for hint in err.recovery_suggestions() {
                    eprintln!("  - {}", hint);
                }
            }
            ExitCode::FAILURE
        }
    }
}
