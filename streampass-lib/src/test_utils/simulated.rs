//! In-memory backend for tests and demos.
//!
//! The backend keeps a real expiry instant on the tokio clock, so it agrees
//! with `tokio::time::pause`/`advance` in tests and with wall time in the
//! demo CLI.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{GatewayError, Plan, RemoteStateGateway, Result, Session, SubscriptionStatus};

/// Configuration for the simulated backend.
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    /// Delay applied to every call.
    pub latency: Duration,
    /// Seconds the server grants less than the plan duration, simulating
    /// clock skew between the optimistic guess and server truth.
    pub grant_skew_seconds: u64,
}

#[derive(Debug, Default)]
struct BackendState {
    expires_at: Option<Instant>,
    plans: Vec<Plan>,
    reject_message: Option<String>,
    status_failures: usize,
    plans_failure: bool,
}

/// A simulated subscription backend.
pub struct SimulatedBackend {
    config: RwLock<BackendConfig>,
    state: RwLock<BackendState>,
    status_calls: AtomicUsize,
    plans_calls: AtomicUsize,
    purchase_calls: AtomicUsize,
}

impl SimulatedBackend {
    /// Create a backend with an expired subscription and the given catalog.
    pub fn new(plans: Vec<Plan>) -> Arc<Self> {
        Self::with_config(plans, BackendConfig::default())
    }

    /// Create a backend with custom configuration.
    pub fn with_config(plans: Vec<Plan>, config: BackendConfig) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            state: RwLock::new(BackendState {
                plans,
                ..BackendState::default()
            }),
            status_calls: AtomicUsize::new(0),
            plans_calls: AtomicUsize::new(0),
            purchase_calls: AtomicUsize::new(0),
        })
    }

    /// Set the server-side remaining time.
    pub fn set_remaining(&self, seconds: u64) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.expires_at = (seconds > 0).then(|| Instant::now() + Duration::from_secs(seconds));
    }

    /// Server-side remaining time, in whole seconds.
    pub fn remaining(&self) -> u64 {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        remaining_at(state.expires_at, Instant::now())
    }

    /// Reject every purchase with the given message until cleared.
    pub fn reject_purchases(&self, message: impl Into<String>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.reject_message = Some(message.into());
    }

    /// Accept purchases again.
    pub fn accept_purchases(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.reject_message = None;
    }

    /// Fail the next `count` status fetches with a transport error.
    pub fn fail_next_status(&self, count: usize) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.status_failures = count;
    }

    /// Fail plan fetches until cleared.
    pub fn set_plans_failure(&self, failing: bool) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.plans_failure = failing;
    }

    /// Replace the catalog.
    pub fn set_plans(&self, plans: Vec<Plan>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.plans = plans;
    }

    /// Change the simulated latency.
    pub fn set_latency(&self, latency: Duration) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.latency = latency;
    }

    /// Number of status fetches received.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of plan fetches received.
    pub fn plans_calls(&self) -> usize {
        self.plans_calls.load(Ordering::SeqCst)
    }

    /// Number of purchase submissions received.
    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    fn config(&self) -> BackendConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn simulate_latency(&self) {
        let latency = self.config().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn snapshot(&self, expires_at: Option<Instant>) -> SubscriptionStatus {
        let remaining = remaining_at(expires_at, Instant::now());
        SubscriptionStatus::expiring_in(remaining, chrono::Utc::now())
    }
}

fn remaining_at(expires_at: Option<Instant>, now: Instant) -> u64 {
    expires_at
        .map(|at| at.saturating_duration_since(now).as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl RemoteStateGateway for SimulatedBackend {
    async fn fetch_status(&self, session: &Session) -> Result<SubscriptionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        session.bearer_token()?;
        self.simulate_latency().await;

        let expires_at = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.status_failures > 0 {
                state.status_failures -= 1;
                return Err(GatewayError::Transport("simulated network failure".into()));
            }
            state.expires_at
        };
        Ok(self.snapshot(expires_at))
    }

    async fn fetch_plans(&self, session: &Session) -> Result<Vec<Plan>> {
        self.plans_calls.fetch_add(1, Ordering::SeqCst);
        session.bearer_token()?;
        self.simulate_latency().await;

        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.plans_failure {
            return Err(GatewayError::Server {
                status: 503,
                message: "catalog unavailable".into(),
            });
        }
        Ok(state.plans.clone())
    }

    async fn submit_extend_or_purchase(
        &self,
        session: &Session,
        plan_id: &str,
    ) -> Result<SubscriptionStatus> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        session.bearer_token()?;
        self.simulate_latency().await;

        let skew = self.config().grant_skew_seconds;
        let expires_at = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if let Some(message) = &state.reject_message {
                return Err(GatewayError::rejected(message.clone()));
            }
            let plan = state
                .plans
                .iter()
                .find(|p| p.plan_id == plan_id)
                .cloned()
                .ok_or_else(|| GatewayError::rejected(format!("unknown plan {}", plan_id)))?;

            let now = Instant::now();
            let base = state.expires_at.filter(|at| *at > now).unwrap_or(now);
            let granted = plan.duration_seconds.saturating_sub(skew);
            state.expires_at = Some(base + Duration::from_secs(granted));
            state.expires_at
        };
        Ok(self.snapshot(expires_at))
    }
}
