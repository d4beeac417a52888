//! CLI command implementations

pub mod buy;
pub mod config;
pub mod plans;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use streampass_lib::test_utils::{BackendConfig, SimulatedBackend, TestFixtures};
use streampass_lib::{HttpGateway, RemoteStateGateway, Session};
use streampass_sync::SubscriptionEngine;

use self::config::DemoConfig;
use crate::ui;

/// Seconds left on the simulated pass at startup
const SIMULATED_REMAINING: u64 = 90;

/// How the engine reaches a backend
pub struct Backend {
    pub simulate: bool,
    pub token: Option<String>,
}

/// Build and mount an engine for one command.
///
/// A failed initial status fetch is reported but not fatal; the engine keeps
/// polling in the background.
pub async fn connect(storage_dir: &Path, backend: &Backend) -> Result<SubscriptionEngine> {
    let config = DemoConfig::load_or_default(storage_dir)?;

    let token = backend
        .token
        .clone()
        .or_else(|| config.token.clone())
        .unwrap_or_else(|| "demo-token".to_string());
    let session = Arc::new(Session::init("demo-viewer", token));

    let gateway: Arc<dyn RemoteStateGateway> = if backend.simulate {
        let simulated = SimulatedBackend::with_config(
            TestFixtures::plans(),
            BackendConfig {
                latency: Duration::from_millis(400),
                grant_skew_seconds: 2,
            },
        );
        simulated.set_remaining(SIMULATED_REMAINING);
        tracing::debug!(remaining = SIMULATED_REMAINING, "using simulated backend");
        simulated
    } else {
        tracing::debug!(base_url = %config.gateway.base_url, "using HTTP backend");
        Arc::new(
            HttpGateway::new(config.gateway.clone()).context("Failed to create HTTP gateway")?,
        )
    };

    let engine = SubscriptionEngine::new(session, gateway, config.engine.clone())
        .context("Failed to create engine")?;

    let spinner = ui::spinner("Syncing subscription status...");
    let mounted = engine.mount().await;
    spinner.finish_and_clear();

    if let Err(e) = mounted {
        ui::warning(&format!("Initial sync failed: {}", e));
    }
    Ok(engine)
}
