// Root bot host
// Main entry point for the rootbot binary

use clap::Parser;
use rootbot_engine::cli::{Cli, Command};
use rootbot_engine::config::Config;
use rootbot_engine::handlers::{handle_check_config, handle_serve, handle_skills, OutputFormat};
use rootbot_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    if let Command::Serve { port: Some(port) } = &cli.command {
        config.server.port = *port;
    }

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.server.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("rootbot v{} ({} - {})", version, commit, timestamp);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve { .. } => {
            tracing::info!("Starting root bot host...");
            handle_serve(&config).await
        }
        Command::Skills => handle_skills(&config, format),
        Command::CheckConfig => handle_check_config(&config, format),
    }
}
