//! accel-probe CLI: prints the handler's capability report as JSON.

use clap::Parser;
use tracing::info;

use accel_probe::config::{Cli, Config};
use accel_probe::AcceleratorHandler;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "accel_probe=debug"
    } else {
        "accel_probe=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("accel-probe v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);

    info!(
        device = %config.device.device,
        project_root = %config.paths.resolved_project_root().display(),
        checkpoint_dir = %config.paths.checkpoint_dir,
        "Configuration loaded"
    );

    let handler = AcceleratorHandler::from_config(&config);
    let report = handler.report();

    info!(
        backend = %report.backend,
        accelerator_ready = report.accelerator_ready,
        models = report.models.len(),
        "Capability report ready"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
