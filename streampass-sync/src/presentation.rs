//! Presentation adapter: pure mapping from engine state to a view model.

use serde::Serialize;
use streampass_lib::{Plan, SubscriptionStatus};

/// What a plan button does for the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Affordance {
    Purchase,
    Extend,
}

/// One purchasable plan as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanView {
    pub plan_id: String,
    pub label: String,
    pub price: String,
    pub currency: String,
    /// Plan duration, formatted like the countdown.
    pub duration: String,
    pub affordance: Affordance,
    /// False while a transaction is pending.
    pub enabled: bool,
}

/// Everything a host needs to draw the countdown widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    /// Zero-padded `HH:MM:SS`.
    pub formatted: String,
    pub is_active: bool,
    /// True only while a transaction is pending.
    pub updating: bool,
    /// False until the first successful reconciliation.
    pub known: bool,
    pub plans: Vec<PlanView>,
}

/// Format seconds as zero-padded `HH:MM:SS`. Hours are not truncated at 99.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Build the view model for a status and catalog.
pub fn render(status: Option<&SubscriptionStatus>, updating: bool, plans: &[Plan]) -> ViewModel {
    let remaining = status.map(|s| s.remaining_seconds).unwrap_or(0);
    let is_active = status.is_some_and(|s| s.is_active);
    let affordance = if is_active {
        Affordance::Extend
    } else {
        Affordance::Purchase
    };

    ViewModel {
        formatted: format_hms(remaining),
        is_active,
        updating,
        known: status.is_some(),
        plans: plans
            .iter()
            .map(|plan| PlanView {
                plan_id: plan.plan_id.clone(),
                label: plan.label().to_string(),
                price: plan.price.clone(),
                currency: plan.currency.clone(),
                duration: format_hms(plan.duration_seconds),
                affordance,
                enabled: !updating,
            })
            .collect(),
    }
}
