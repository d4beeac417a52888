//! Subscription status and plan catalog types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access-pass state as last known to the client.
///
/// `is_active` is always derived from `remaining_seconds`; construct through
/// [`SubscriptionStatus::from_remaining`] so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// True iff `remaining_seconds > 0`.
    pub is_active: bool,
    /// Seconds until expiry.
    pub remaining_seconds: u64,
    /// Absolute expiry instant matching `remaining_seconds` when it was set.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionStatus {
    /// Create a status from a remaining duration.
    pub fn from_remaining(remaining_seconds: u64, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            is_active: remaining_seconds > 0,
            remaining_seconds,
            expires_at,
        }
    }

    /// An expired status with no expiry instant.
    pub fn expired() -> Self {
        Self::from_remaining(0, None)
    }

    /// Create a status whose expiry is `remaining_seconds` after `now`.
    pub fn expiring_in(remaining_seconds: u64, now: DateTime<Utc>) -> Self {
        let expires_at = i64::try_from(remaining_seconds)
            .ok()
            .and_then(|secs| now.checked_add_signed(chrono::Duration::seconds(secs)));
        Self::from_remaining(remaining_seconds, expires_at)
    }

    /// Check whether the pass has run out.
    pub fn is_expired(&self) -> bool {
        self.remaining_seconds == 0
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::expired()
    }
}

/// A purchasable access-pass plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan key.
    pub plan_id: String,
    /// Duration granted by one purchase, always positive.
    pub duration_seconds: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display price, opaque to the engine.
    #[serde(default)]
    pub price: String,
    /// Display currency code.
    #[serde(default)]
    pub currency: String,
}

impl Plan {
    /// Create a plan with empty display fields.
    pub fn new(plan_id: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            plan_id: plan_id.into(),
            duration_seconds,
            name: String::new(),
            price: String::new(),
            currency: String::new(),
        }
    }

    /// Set display fields.
    pub fn with_display(
        mut self,
        name: impl Into<String>,
        price: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        self.name = name.into();
        self.price = price.into();
        self.currency = currency.into();
        self
    }

    /// Display label, falling back to the plan id when unnamed.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.plan_id
        } else {
            &self.name
        }
    }
}
