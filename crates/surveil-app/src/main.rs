//! Market surveillance pipeline - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Watches a symbol list for abnormal price and volume behavior.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SURVEIL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Use the simulated quote provider instead of the configured ones
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    surveil_telemetry::init_logging()?;

    info!("Starting surveil v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > SURVEIL_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SURVEIL_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let mut config = surveil_app::AppConfig::from_file(&config_path)?;
    if args.dry_run {
        info!("Dry run: using simulated quotes");
        config.use_simulated_providers();
    }

    let app = surveil_app::Application::new(config)?;
    let report = app.run().await?;

    info!(
        ticks = report.scheduler.ticks,
        received = report.pipeline.received,
        alerts = report.pipeline.alerts,
        "Exited cleanly"
    );
    Ok(())
}
