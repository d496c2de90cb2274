use stemline::pipeline::Pipeline;
use stemline::transform::BuiltinTransform;
use stemline::types::PipelineReport;
use stemline_config::shared::PipelineConfig;
use tracing::{info, warn};

use crate::error::CliResult;

/// Runs the pipeline to completion, shutting it down on Ctrl+C or SIGTERM.
///
/// The pipeline runs on plain threads, so it is driven from a blocking task while the
/// runtime listens for signals.
#[tracing::instrument(skip_all)]
pub async fn run_pipeline(
    config: PipelineConfig,
    transform: BuiltinTransform,
) -> CliResult<PipelineReport> {
    let mut pipeline = Pipeline::new(config, transform);
    pipeline.start()?;

    let shutdown_tx = pipeline.shutdown_tx();
    let signal_handle = tokio::spawn(async move {
        wait_for_signal().await;

        if shutdown_tx.shutdown() {
            info!("shutdown signal sent to the pipeline");
        }
    });

    let result = tokio::task::spawn_blocking(move || pipeline.wait()).await;
    signal_handle.abort();

    Ok(result??)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register SIGTERM handler, only ctrl+c is handled");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down pipeline");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("sigint (ctrl+c) received, shutting down pipeline"),
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl+c");
            // Never resolve, so a failed listener does not stop the pipeline.
            std::future::pending::<()>().await;
        }
    }
}
