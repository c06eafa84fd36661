//! Process-level glue around an [`orchestrator::Orchestrator`]: start it,
//! wait for a shutdown signal, and stop it cleanly. Kept deliberately thin
//! and free of any HTTP/gRPC concern — that belongs to an outer service
//! layer this workspace does not implement.

#![warn(missing_debug_implementations)]

use observability_deps::tracing::info;
use orchestrator::Orchestrator;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Orchestrator(#[from] orchestrator::OrchestratorError),
}

/// Starts `orchestrator`, blocks until SIGINT or SIGTERM (SIGTERM is a
/// no-op on platforms without it, e.g. Windows), then stops it.
pub async fn run_until_signal(orchestrator: Orchestrator) -> Result<(), BootstrapError> {
    orchestrator.start().await?;
    info!("orchestrator running, waiting for shutdown signal");

    wait_for_signal().await;

    info!("shutdown signal received, stopping orchestrator");
    orchestrator.stop().await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
