//! Scrape Load Generator binary
//!
//! Reads configuration from the environment, starts the scrape targets and
//! runs until interrupted.

use clap::Parser;
use tracing::{error, info};

use scrape_loadgen::logging::init_logging;
use scrape_loadgen::{Args, GeneratorConfig, LoadGenerator, Result};

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = GeneratorConfig::from_args(&args).inspect_err(|e| {
        error!("Invalid configuration: {}", e);
    })?;

    info!("Starting scrape load generator");
    info!("  Log file: {}", args.log_file.display());
    info!("  Start port: {}", config.start_port);
    info!("  Targets: {}", config.num_targets);
    info!("  Seed: {}", config.seed);
    info!("  Update interval: {:?}", config.update_interval);

    let generator = LoadGenerator::new(config)?;

    generator.run(shutdown_signal()).await.inspect_err(|e| {
        error!("Load generator failed: {}", e);
    })?;

    info!("Load generator stopped");
    Ok(())
}

// =============================================================================
// Signals
// =============================================================================

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Load generator interrupted. Exiting.");
}
