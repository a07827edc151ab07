//! Command handlers for CLI operations
//!
//! - serve: wire services and run the server until Ctrl-C
//! - skills: list configured skills
//! - check-config: report the validated configuration

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::{Config, StorageBackend};
use crate::server::{self, ServerState};
use crate::skills::SkillRegistry;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the server
pub async fn handle_serve(config: &Config) -> Result<()> {
    let state = ServerState::from_config(config)
        .await
        .context("Failed to initialize services")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    server::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl-C, shutting down");
}

/// List configured skills
pub fn handle_skills(config: &Config, format: OutputFormat) -> Result<()> {
    let registry = SkillRegistry::from_config(&config.skills)?;

    match format {
        OutputFormat::Text => {
            if registry.is_empty() {
                println!("No skills configured.");
                return Ok(());
            }
            println!("Configured skills:");
            println!();
            for skill in registry.list() {
                let marker = if skill.id == config.bot.target_skill_id {
                    " (target)"
                } else {
                    ""
                };
                println!("  {}{}", skill.id, marker);
                println!("    endpoint: {}", skill.endpoint);
                if !skill.app_id.is_empty() {
                    println!("    app id:   {}", skill.app_id);
                }
            }
            println!();
            println!("{} skill(s) configured.", registry.len());
        }
        OutputFormat::Json => {
            let skills: Vec<_> = registry
                .list()
                .into_iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "endpoint": s.endpoint,
                        "app_id": s.app_id,
                        "target": s.id == config.bot.target_skill_id,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "skills": skills }))?);
        }
    }

    Ok(())
}

/// Report the configuration that was loaded and validated
pub fn handle_check_config(config: &Config, format: OutputFormat) -> Result<()> {
    let storage = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Sqlite => format!("sqlite ({})", config.storage.path.display()),
    };

    match format {
        OutputFormat::Text => {
            println!("Configuration is valid.");
            println!("  Listen:           {}:{}", config.server.host, config.server.port);
            println!("  Skill host:       {}", config.bot.skill_host_endpoint);
            println!("  Target skill:     {}", config.bot.target_skill_id);
            println!("  Skills:           {}", config.skills.len());
            println!(
                "  Auth:             {}",
                if config.auth_enabled() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  Forward timeout:  {}s", config.routing.forward_timeout_secs);
            println!("  Storage:          {}", storage);
        }
        OutputFormat::Json => {
            let output = json!({
                "valid": true,
                "host": config.server.host,
                "port": config.server.port,
                "skill_host_endpoint": config.bot.skill_host_endpoint,
                "target_skill_id": config.bot.target_skill_id,
                "skills": config.skills.len(),
                "auth_enabled": config.auth_enabled(),
                "forward_timeout_secs": config.routing.forward_timeout_secs,
                "storage": storage,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
