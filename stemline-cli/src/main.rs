//! Command line entry point of the line transformation pipeline.
//!
//! Resolves the configuration from defaults, an optional file, `APP_` environment variables
//! and command line arguments, then runs the pipeline until the input is fully processed or
//! the process receives Ctrl+C.

use std::process::ExitCode;

use clap::Parser;
use stemline_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::{Args, resolve_config};
use crate::core::run_pipeline;
use crate::error::{CliError, CliResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    // Usage errors are reported by clap, which exits with status 2.
    let args = Args::parse();

    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME")) {
        Ok(log_flusher) => log_flusher,
        Err(err) => {
            eprint!("{}", CliError::from(err).render_report());
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> CliResult<()> {
    let config = resolve_config(&args)?;
    let output_path = config.output_path.clone();

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_pipeline(config, args.transform.into()))?;

    info!(
        lines_read = report.lines_read,
        lines_skipped = report.lines_skipped,
        transform_failures = report.transform_failures,
        "run summary"
    );

    println!(
        "Processing complete. {} lines written to {}",
        report.lines_written,
        output_path.display()
    );

    Ok(())
}
