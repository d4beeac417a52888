//! Wire payloads and boundary validation.
//!
//! The backend speaks loosely-typed JSON. These DTOs mirror it exactly and
//! are converted into [`SubscriptionStatus`] / [`Plan`] before anything
//! reaches the engine.

use crate::{GatewayError, Plan, Result, SubscriptionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub is_active: bool,
    pub remaining_seconds: i64,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// One entry of the plans endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan_id: String,
    pub duration_seconds: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_display")]
    pub price: String,
    #[serde(default)]
    pub currency: String,
}

/// Request body of the purchase endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub plan_id: String,
}

/// Successful response of the purchase endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub remaining_seconds: i64,
    pub expires_at: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Error body returned alongside non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Prices arrive either as strings or numbers.
fn de_display<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatewayError::invalid_data("expires_at", format!("{raw:?}: {e}")))
}

fn clamp_remaining(remaining_seconds: i64) -> u64 {
    if remaining_seconds < 0 {
        #[cfg(feature = "tracing")]
        tracing::warn!(remaining_seconds, "negative remaining_seconds clamped to 0");
    }
    remaining_seconds.max(0) as u64
}

impl StatusResponse {
    /// Validate into a [`SubscriptionStatus`].
    pub fn into_status(self) -> Result<SubscriptionStatus> {
        let expires_at = self.expires_at.as_deref().map(parse_instant).transpose()?;
        let status = SubscriptionStatus::from_remaining(
            clamp_remaining(self.remaining_seconds),
            expires_at,
        );
        if status.is_active != self.is_active {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                server_flag = self.is_active,
                remaining = status.remaining_seconds,
                "server is_active disagrees with remaining_seconds; using derived flag"
            );
        }
        Ok(status)
    }
}

impl PurchaseResponse {
    /// Validate into a [`SubscriptionStatus`].
    pub fn into_status(self) -> Result<SubscriptionStatus> {
        let expires_at = parse_instant(&self.expires_at)?;
        Ok(SubscriptionStatus::from_remaining(
            clamp_remaining(self.remaining_seconds),
            Some(expires_at),
        ))
    }
}

impl PlanResponse {
    /// Validate into a [`Plan`]; `None` for entries the engine cannot use.
    pub fn into_plan(self) -> Option<Plan> {
        if self.plan_id.trim().is_empty() || self.duration_seconds <= 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                plan_id = %self.plan_id,
                duration = self.duration_seconds,
                "dropping unusable plan"
            );
            return None;
        }
        Some(
            Plan::new(self.plan_id, self.duration_seconds as u64).with_display(
                self.name,
                self.price,
                self.currency,
            ),
        )
    }
}

/// Validate a plan list, dropping unusable and duplicate entries.
pub fn into_plans(entries: Vec<PlanResponse>) -> Vec<Plan> {
    let mut plans: Vec<Plan> = Vec::with_capacity(entries.len());
    for plan in entries.into_iter().filter_map(PlanResponse::into_plan) {
        if plans.iter().any(|p| p.plan_id == plan.plan_id) {
            continue;
        }
        plans.push(plan);
    }
    plans
}
