//! Countdown clock.
//!
//! A tick mutates the status held by the sync core in place, so it always
//! works on the freshest value: a reconciliation or transaction that replaced
//! the status between two ticks is never undone by a decrement of an older
//! copy.

use streampass_lib::SubscriptionStatus;

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to count: status unknown or already at zero.
    Idle,
    /// Decremented; carries the new remaining seconds (always > 0).
    Decremented(u64),
    /// Reached exactly zero on this tick. Fires once per expiry.
    Expired,
}

impl TickOutcome {
    /// Check whether the tick crossed into expiry.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

/// Count `seconds` off the countdown, saturating at zero.
///
/// Crossing into zero reports [`TickOutcome::Expired`] even when the step
/// jumps past several seconds at once.
pub fn tick(status: Option<&mut SubscriptionStatus>, seconds: u64) -> TickOutcome {
    let Some(status) = status else {
        return TickOutcome::Idle;
    };
    if status.remaining_seconds == 0 {
        status.is_active = false;
        return TickOutcome::Idle;
    }

    status.remaining_seconds = status.remaining_seconds.saturating_sub(seconds);
    if status.remaining_seconds == 0 {
        status.is_active = false;
        TickOutcome::Expired
    } else {
        TickOutcome::Decremented(status.remaining_seconds)
    }
}
