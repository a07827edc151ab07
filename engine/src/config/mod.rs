//! Configuration management
//!
//! This module handles loading, validation, and management of the rootbot
//! configuration. Configuration is stored in TOML format at
//! ~/.rootbot/config.toml unless a path is given on the command line.
//!
//! # Configuration Sections
//!
//! - **server**: Bind address, port, log level
//! - **bot**: App credentials, skill host endpoint, target skill
//! - **skills**: One `[[skills]]` table per child skill
//! - **auth**: Extra allowed callers and token lifetime
//! - **routing**: Skill forwarding timeout
//! - **storage**: Conversation state backend
//!
//! # Environment Overrides
//!
//! `MICROSOFT_APP_ID`, `MICROSOFT_APP_PASSWORD`, `SKILL_HOST_ENDPOINT` and
//! `PORT` override the file values after it is parsed, so credentials can be
//! kept out of the file.
//!
//! # Examples
//!
//! ```no_run
//! use rootbot_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Listening on port {}", config.server.port);
//! println!("Skills: {}", config.skills.len());
//! # Ok(())
//! # }
//! ```

use reqwest::Url;
use sdk::errors::HostError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot identity and skill host settings
    #[serde(default)]
    pub bot: BotConfig,

    /// Configured child skills
    #[serde(default)]
    pub skills: Vec<SkillConfig>,

    /// Inbound/outbound authentication
    #[serde(default)]
    pub auth: AuthConfig,

    /// Routing settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Conversation state storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Bot identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Application id. Empty disables authentication (local/emulator use).
    #[serde(default)]
    pub app_id: String,

    /// Application password, used to sign outbound tokens
    #[serde(default)]
    pub app_password: String,

    /// Public URL of this host's skill channel service (`/api/skills`)
    #[serde(default = "default_skill_host_endpoint")]
    pub skill_host_endpoint: String,

    /// Skill the root dialog connects users to
    #[serde(default = "default_target_skill_id")]
    pub target_skill_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_password: String::new(),
            skill_host_endpoint: default_skill_host_endpoint(),
            target_skill_id: default_target_skill_id(),
        }
    }
}

/// A single child skill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillConfig {
    /// Skill identifier
    pub id: String,

    /// Skill application id (also added to the caller allow-list)
    #[serde(default)]
    pub app_id: String,

    /// Skill messaging endpoint
    pub skill_endpoint: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Caller app ids accepted on the skill channel service, in addition to
    /// the configured skills' app ids. `"*"` accepts any caller.
    #[serde(default)]
    pub allowed_callers: Vec<String>,

    /// Lifetime of minted outbound tokens (seconds)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_callers: Vec::new(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Upper bound on a single forward to a skill (seconds)
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            forward_timeout_secs: default_forward_timeout(),
        }
    }
}

/// Conversation state backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// SQLite database path (supports ~ expansion)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3978
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_skill_host_endpoint() -> String {
    "http://localhost:3978/api/skills".to_string()
}

fn default_target_skill_id() -> String {
    "EchoSkillBot".to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_forward_timeout() -> u64 {
    30
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("~/.rootbot/state.db")
}

impl Config {
    /// Load configuration from the default location (~/.rootbot/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (bad endpoints, duplicate skills, unknown target skill)
    pub fn load_or_create() -> Result<Self, HostError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, HostError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| HostError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_toml_str(contents: &str) -> Result<Self, HostError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| HostError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, HostError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                HostError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| HostError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, &toml_string)
            .map_err(|e| HostError::Config(format!("Failed to write config file: {}", e)))?;

        Self::from_toml_str(&toml_string)
    }

    /// Get the default configuration file path (~/.rootbot/config.toml)
    fn default_config_path() -> Result<PathBuf, HostError> {
        let home = dirs::home_dir()
            .ok_or_else(|| HostError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".rootbot").join("config.toml"))
    }

    /// Create a default configuration with the sample echo skill
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            bot: BotConfig::default(),
            skills: vec![SkillConfig {
                id: default_target_skill_id(),
                app_id: String::new(),
                skill_endpoint: "http://localhost:39783/api/messages".to_string(),
            }],
            auth: AuthConfig::default(),
            routing: RoutingConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Apply overrides from a variable source (the process environment in
    /// production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(app_id) = lookup("MICROSOFT_APP_ID") {
            self.bot.app_id = app_id;
        }
        if let Some(password) = lookup("MICROSOFT_APP_PASSWORD") {
            self.bot.app_password = password;
        }
        if let Some(endpoint) = lookup("SKILL_HOST_ENDPOINT") {
            self.bot.skill_host_endpoint = endpoint;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Whether inbound/outbound authentication is enabled
    pub fn auth_enabled(&self) -> bool {
        !self.bot.app_id.is_empty()
    }

    /// Validate and process configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level is unknown
    /// - The skill host endpoint or a skill endpoint is not a URL
    /// - Two skills share an id
    /// - The target skill is not configured
    /// - Auth is enabled without an app password
    pub fn validate_and_process(&mut self) -> Result<(), HostError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.server.log_level.as_str()) {
            return Err(HostError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.server.log_level,
                valid_log_levels.join(", ")
            )));
        }

        Url::parse(&self.bot.skill_host_endpoint).map_err(|e| {
            HostError::Config(format!(
                "Invalid skill_host_endpoint '{}': {}",
                self.bot.skill_host_endpoint, e
            ))
        })?;

        let mut seen = HashSet::new();
        for skill in &self.skills {
            if skill.id.trim().is_empty() {
                return Err(HostError::Config("Skill id must not be empty".to_string()));
            }
            if !seen.insert(skill.id.as_str()) {
                return Err(HostError::Config(format!(
                    "Duplicate skill id '{}'",
                    skill.id
                )));
            }
            Url::parse(&skill.skill_endpoint).map_err(|e| {
                HostError::Config(format!(
                    "Invalid endpoint for skill '{}': {}",
                    skill.id, e
                ))
            })?;
        }

        if !seen.contains(self.bot.target_skill_id.as_str()) {
            return Err(HostError::Config(format!(
                "target_skill_id '{}' is not a configured skill",
                self.bot.target_skill_id
            )));
        }

        if self.auth_enabled() && self.bot.app_password.is_empty() {
            return Err(HostError::Config(
                "app_password is required when app_id is set".to_string(),
            ));
        }

        if self.routing.forward_timeout_secs == 0 {
            return Err(HostError::Config(
                "forward_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.storage.path = expand_path(&self.storage.path)?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, HostError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| HostError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| HostError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| HostError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
