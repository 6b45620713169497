use anyhow::Result;
use clap::Parser;

use remedy_core::config::RemedyConfig;
use remedy_daemon::cli::DaemonCli;
use remedy_daemon::logging::init_tracing;
use remedy_daemon::orchestrator::Orchestrator;
use remedy_daemon::validate::validate_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file -> environment -> command line
    let mut config = RemedyConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    init_tracing(&config.general)?;

    if cli.validate {
        let report = validate_config(&config).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.is_clean() {
            std::process::exit(1);
        }
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "remedy-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("remedy-daemon shut down");
    Ok(())
}
