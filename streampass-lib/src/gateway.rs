//! Remote state gateway.
//!
//! The sync engine consumes exactly three backend operations, expressed by
//! [`RemoteStateGateway`]. [`HttpGateway`] is the JSON-over-HTTPS
//! implementation used by real hosts.
//!
//! # Feature Flags
//!
//! [`HttpGateway`] requires the `http-gateway` feature for actual HTTP
//! requests. Without it, every call returns [`GatewayError::Unimplemented`].
//!
//! ```toml
//! [dependencies]
//! streampass-lib = { version = "0.1", features = ["http-gateway"] }
//! ```
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | status    | `GET {base}/subscription/status` |
//! | plans     | `GET {base}/subscription/plans` |
//! | purchase  | `POST {base}/subscription/purchase` with `{"plan_id": ...}` |

use async_trait::async_trait;
#[cfg(feature = "http-gateway")]
use serde::Deserialize;
#[cfg(feature = "http-gateway")]
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::{GatewayError, Plan, Result, Session, SubscriptionStatus};

#[cfg_attr(not(feature = "http-gateway"), allow(dead_code))]
const STATUS_PATH: &str = "subscription/status";
#[cfg_attr(not(feature = "http-gateway"), allow(dead_code))]
const PLANS_PATH: &str = "subscription/plans";
#[cfg_attr(not(feature = "http-gateway"), allow(dead_code))]
const PURCHASE_PATH: &str = "subscription/purchase";

/// Backend operations consumed by the sync engine.
///
/// Implementations validate payloads before returning them; the engine
/// trusts every `Ok` value it receives. Timeout policy belongs here, not in
/// the engine.
#[async_trait]
pub trait RemoteStateGateway: Send + Sync {
    /// Fetch the authoritative subscription status.
    async fn fetch_status(&self, session: &Session) -> Result<SubscriptionStatus>;

    /// Fetch purchasable plans. An empty list is a valid answer.
    async fn fetch_plans(&self, session: &Session) -> Result<Vec<Plan>>;

    /// Purchase or extend with the given plan, returning the new authoritative status.
    async fn submit_extend_or_purchase(
        &self,
        session: &Session,
        plan_id: &str,
    ) -> Result<SubscriptionStatus>;
}

/// JSON-over-HTTPS gateway.
pub struct HttpGateway {
    config: GatewayConfig,
    #[cfg(feature = "http-gateway")]
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a new HTTP gateway with the given configuration.
    #[cfg(feature = "http-gateway")]
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a new HTTP gateway (stub when feature disabled).
    #[cfg(not(feature = "http-gateway"))]
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[cfg(feature = "http-gateway")]
    async fn get<T: for<'de> Deserialize<'de>>(&self, session: &Session, path: &str) -> Result<T> {
        let token = session.bearer_token()?;
        let response = self
            .client
            .get(self.config.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, path))?;

        self.handle_response(response).await
    }

    #[cfg(feature = "http-gateway")]
    async fn post<B: serde::Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let token = session.bearer_token()?;
        let response = self
            .client
            .post(self.config.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, path))?;

        self.handle_response(response).await
    }

    /// Handle API response.
    #[cfg(feature = "http-gateway")]
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), &error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Serialization(format!("Failed to parse response: {}", e)))
    }

    /// Map reqwest errors to GatewayError.
    #[cfg(feature = "http-gateway")]
    fn map_reqwest_error(&self, e: reqwest::Error, path: &str) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                operation: path.to_string(),
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else if e.is_connect() {
            GatewayError::ConnectionFailed {
                target: self.config.base_url.clone(),
                reason: e.to_string(),
            }
        } else {
            GatewayError::Transport(format!("request to {} failed: {}", path, e))
        }
    }
}

/// Map HTTP status codes to GatewayError.
///
/// Rejections carry the body's `message` field when present so it can be
/// shown to the user verbatim.
#[cfg_attr(not(feature = "http-gateway"), allow(dead_code))]
fn map_status_error(status: u16, error_text: &str) -> GatewayError {
    let message = serde_json::from_str::<crate::wire::ErrorBody>(error_text)
        .map(|body| body.message)
        .unwrap_or_else(|_| error_text.to_string());

    match status {
        401 => GatewayError::SessionExpired,
        400 | 402 | 404 | 409 | 422 => GatewayError::Rejected { message },
        429 => GatewayError::RateLimited {
            retry_after_ms: 5000,
        },
        500..=599 => GatewayError::Server { status, message },
        _ => GatewayError::Transport(format!("request failed ({}): {}", status, message)),
    }
}

#[cfg(feature = "http-gateway")]
#[async_trait]
impl RemoteStateGateway for HttpGateway {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, session), fields(user = %session.user_id())))]
    async fn fetch_status(&self, session: &Session) -> Result<SubscriptionStatus> {
        let body: crate::wire::StatusResponse = self.get(session, STATUS_PATH).await?;
        body.into_status()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, session), fields(user = %session.user_id())))]
    async fn fetch_plans(&self, session: &Session) -> Result<Vec<Plan>> {
        let body: Vec<crate::wire::PlanResponse> = self.get(session, PLANS_PATH).await?;
        Ok(crate::wire::into_plans(body))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, session), fields(user = %session.user_id())))]
    async fn submit_extend_or_purchase(
        &self,
        session: &Session,
        plan_id: &str,
    ) -> Result<SubscriptionStatus> {
        let request = crate::wire::PurchaseRequest {
            plan_id: plan_id.to_string(),
        };
        let body: crate::wire::PurchaseResponse =
            self.post(session, PURCHASE_PATH, &request).await?;
        body.into_status()
    }
}

#[cfg(not(feature = "http-gateway"))]
#[async_trait]
impl RemoteStateGateway for HttpGateway {
    async fn fetch_status(&self, _session: &Session) -> Result<SubscriptionStatus> {
        Err(GatewayError::Unimplemented(
            "HTTP gateway not compiled - enable the 'http-gateway' feature",
        ))
    }

    async fn fetch_plans(&self, _session: &Session) -> Result<Vec<Plan>> {
        Err(GatewayError::Unimplemented(
            "HTTP gateway not compiled - enable the 'http-gateway' feature",
        ))
    }

    async fn submit_extend_or_purchase(
        &self,
        _session: &Session,
        _plan_id: &str,
    ) -> Result<SubscriptionStatus> {
        Err(GatewayError::Unimplemented(
            "HTTP gateway not compiled - enable the 'http-gateway' feature",
        ))
    }
}
