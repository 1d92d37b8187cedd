use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fallback variable the webhook has always read its token from
pub const TOKEN_ENV_VAR: &str = "CLUBHOUSE_API_TOKEN";

/// Main configuration structure for epic-sync
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EpicSyncConfig {
    /// Clubhouse API access
    pub clubhouse: ClubhouseConfig,
    /// Webhook server settings
    pub server: ServerConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClubhouseConfig {
    /// API token (can be set via env var)
    pub api_token: Option<String>,
    /// Scheme and host of the API, without the `/api/v2` suffix
    pub base_url: String,
    /// Client-side throttle
    pub requests_per_minute: u32,
    /// Transport timeout; 0 disables it
    pub request_timeout_seconds: u64,
}

impl Default for ClubhouseConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api.clubhouse.io".to_string(),
            requests_per_minute: 200,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl EpicSyncConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (epic-sync.toml, or `path` when given)
    /// 3. Environment variables (prefixed with EPIC_SYNC_, `__` between sections)
    /// 4. CLUBHOUSE_API_TOKEN when no token was set above
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => builder = builder.add_source(File::from(path)),
            None => {
                if Path::new("epic-sync.toml").exists() {
                    builder = builder.add_source(File::with_name("epic-sync"));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("EPIC_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: EpicSyncConfig = builder.build()?.try_deserialize()?;

        if loaded.clubhouse.api_token.is_none() {
            loaded.clubhouse.api_token = std::env::var(TOKEN_ENV_VAR).ok();
        }

        Ok(loaded)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
        }
        Ok(())
    }

    /// The API token, or an error naming where to set it.
    pub fn api_token(&self) -> Result<&str> {
        self.clubhouse
            .api_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Clubhouse API token not configured. Set {TOKEN_ENV_VAR} or EPIC_SYNC_CLUBHOUSE__API_TOKEN."
                )
            })
    }

    /// Render the effective configuration as TOML with the token masked
    pub fn to_toml_redacted(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.clubhouse.api_token.is_some() {
            shown.clubhouse.api_token = Some("********".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}
