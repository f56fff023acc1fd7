use std::sync::Arc;

use anyhow::Result;
use tokio::signal;

use lib_plcsim::configs::load_config;
use lib_plcsim::core::{Simulation, TaskGroup};
use lib_plcsim::loggers::setup_logging;
use lib_plcsim::{MemoryStore, VariableStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = setup_logging(&config.log_dir(), config.log_level(), "server_plc")?;

    tracing::info!("Starting PLC simulation server");
    let config_file = config.config_file();
    if config_file.exists() {
        tracing::info!("Configuration loaded from {}.", config_file.display());
    } else {
        tracing::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file.display()
        );
    }

    let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
    let simulation = Simulation::build(Arc::clone(&store), config.plan())?;

    let mut group = TaskGroup::new();
    simulation.launch(&mut group)?;

    // Runs until every task has exited or a shutdown signal arrives. Exits
    // seen before the signal stay in the group and show up in the final report.
    let finished = tokio::select! {
        report = group.wait() => Some(report),
        _ = shutdown_signal() => None,
    };
    let report = match finished {
        Some(report) => report,
        None => group.shutdown().await,
    };

    tracing::info!(
        completed = report.completed.len(),
        cancelled = report.cancelled.len(),
        failed = report.failed.len(),
        "Shutdown complete."
    );
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        tracing::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Cannot listen for SIGTERM.");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }
}
