//! Configuration for the HTTP gateway.

use serde::{Deserialize, Serialize};

/// Configuration for [`HttpGateway`](crate::HttpGateway).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API base URL (e.g., `https://api.example.com/v1`).
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("streampass/{}", env!("CARGO_PKG_VERSION"))
}

impl GatewayConfig {
    /// Create a new gateway configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Local development backend.
    pub fn localhost() -> Self {
        Self::new("http://127.0.0.1:8080/api")
    }

    /// Build the full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::localhost()
    }
}
