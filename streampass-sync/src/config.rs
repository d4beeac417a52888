//! Engine timing configuration.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timing knobs for the countdown and reconciliation tasks.
///
/// The status fetch at expiry is not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Countdown tick interval (default: 1000 ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Periodic reconciliation interval while active (default: 30 s).
    #[serde(default = "default_sync_period_secs")]
    pub sync_period_secs: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_sync_period_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            sync_period_secs: default_sync_period_secs(),
        }
    }
}

impl EngineConfig {
    /// Create a config with custom intervals.
    pub fn new(tick_interval_ms: u64, sync_period_secs: u64) -> Self {
        Self {
            tick_interval_ms,
            sync_period_secs,
        }
    }

    /// Reject zero intervals.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(SyncError::Config("tick_interval_ms must be positive".into()));
        }
        if self.sync_period_secs == 0 {
            return Err(SyncError::Config("sync_period_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.sync_period_secs)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::Config(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| SyncError::Config(format!("failed to write {}: {}", path.display(), e)))
    }
}
