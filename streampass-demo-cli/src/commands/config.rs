//! Demo configuration commands
//!
//! The demo host keeps its gateway, engine timings and bearer token in one
//! JSON file inside the storage directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use streampass_lib::GatewayConfig;
use streampass_sync::EngineConfig;

use crate::ui;

const CONFIG_FILE: &str = "config.json";

/// Demo configuration stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "GatewayConfig::localhost")]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Bearer token for the backend (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::localhost(),
            engine: EngineConfig::default(),
            token: None,
        }
    }
}

impl DemoConfig {
    /// Load configuration from disk
    pub fn load(storage_dir: &Path) -> Result<Option<Self>> {
        let config_path = storage_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(None);
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read demo configuration")?;
        let config: Self =
            serde_json::from_str(&contents).context("Failed to parse demo configuration")?;
        config
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(Some(config))
    }

    /// Load configuration, falling back to defaults
    pub fn load_or_default(storage_dir: &Path) -> Result<Self> {
        Ok(Self::load(storage_dir)?.unwrap_or_default())
    }

    /// Save configuration to disk
    pub fn save(&self, storage_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(storage_dir)?;
        let config_path = storage_dir.join(CONFIG_FILE);
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize demo config")?;
        std::fs::write(&config_path, contents).context("Failed to write demo configuration")?;
        Ok(())
    }
}

/// Write a new configuration file
pub async fn init(
    storage_dir: &Path,
    base_url: &str,
    token: Option<&str>,
    timeout_secs: Option<u64>,
    sync_period_secs: Option<u64>,
    verbose: bool,
) -> Result<()> {
    ui::header("Configure StreamPass Demo");

    let mut config = DemoConfig::load_or_default(storage_dir)?;
    config.gateway.base_url = base_url.to_string();
    if let Some(secs) = timeout_secs {
        config.gateway.timeout_secs = secs;
    }
    if let Some(secs) = sync_period_secs {
        config.engine.sync_period_secs = secs;
    }
    if let Some(token) = token {
        config.token = Some(token.to_string());
    }
    config
        .engine
        .validate()
        .context("Invalid engine configuration")?;

    config.save(storage_dir)?;

    ui::success("Configuration saved");
    ui::key_value("Backend", &config.gateway.base_url);
    if verbose {
        ui::key_value(
            "Location",
            &storage_dir.join(CONFIG_FILE).display().to_string(),
        );
    }
    Ok(())
}

/// Print the active configuration
pub async fn show(storage_dir: &Path, verbose: bool) -> Result<()> {
    ui::header("StreamPass Demo Configuration");

    let config = match DemoConfig::load(storage_dir)? {
        Some(config) => config,
        None => {
            ui::warning("No configuration found, using defaults");
            ui::info("Run: streampass-demo config init --base-url <url>");
            DemoConfig::default()
        }
    };

    ui::key_value("Backend", &config.gateway.base_url);
    ui::key_value("Timeout", &format!("{}s", config.gateway.timeout_secs));
    ui::key_value(
        "Token",
        if config.token.is_some() {
            "configured"
        } else {
            "not set"
        },
    );
    ui::key_value(
        "Tick interval",
        &format!("{}ms", config.engine.tick_interval_ms),
    );
    ui::key_value("Sync period", &format!("{}s", config.engine.sync_period_secs));

    if verbose {
        let mut redacted = config.clone();
        redacted.token = redacted.token.map(|_| "<redacted>".to_string());
        ui::separator();
        ui::json(&serde_json::to_value(&redacted)?);
    }
    Ok(())
}
