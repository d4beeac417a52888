//! Optimistic purchase/extend transactions.
//!
//! A transaction snapshots the visible status, shows a locally computed
//! guess straight away, and is resolved exactly once: confirmed with the
//! server's value or rolled back to the snapshot.

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streampass_lib::{Plan, SubscriptionStatus};

/// Kind of user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    /// Buy a pass on an expired or absent subscription.
    Purchase,
    /// Add time to the current pass.
    Extend,
}

impl std::fmt::Display for PurchaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseKind::Purchase => write!(f, "purchase"),
            PurchaseKind::Extend => write!(f, "extend"),
        }
    }
}

impl std::str::FromStr for PurchaseKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "purchase" | "buy" => Ok(Self::Purchase),
            "extend" => Ok(Self::Extend),
            other => Err(SyncError::Config(format!("unknown purchase kind: {}", other))),
        }
    }
}

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionLifecycle {
    /// Guess is visible; request in flight.
    Pending,
    /// Server accepted; its value replaced the guess.
    Confirmed,
    /// Server refused; the snapshot was restored.
    RolledBack,
}

impl TransactionLifecycle {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The single in-flight purchase/extend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Sequence number stamped when the guess was applied.
    pub id: u64,
    pub kind: PurchaseKind,
    pub plan_id: String,
    /// Status immediately before the guess; `None` if it was still unknown.
    pub snapshot: Option<SubscriptionStatus>,
    pub guessed_status: SubscriptionStatus,
    pub lifecycle: TransactionLifecycle,
    /// Set when a reconciliation replaced the guess while pending.
    pub reconciled_while_pending: bool,
}

/// Compute the optimistic status for an action.
///
/// A purchase on an active pass is guessed like an extend; the server sees a
/// single purchase-or-extend request either way.
pub fn guess_status(
    kind: PurchaseKind,
    current: Option<&SubscriptionStatus>,
    plan: &Plan,
    now: DateTime<Utc>,
) -> SubscriptionStatus {
    let current_remaining = current.map(|s| s.remaining_seconds).unwrap_or(0);
    let remaining = match kind {
        PurchaseKind::Extend => current_remaining.saturating_add(plan.duration_seconds),
        PurchaseKind::Purchase if current_remaining == 0 => plan.duration_seconds,
        PurchaseKind::Purchase => {
            tracing::warn!(
                plan_id = %plan.plan_id,
                current_remaining,
                "purchase on an active pass; guessing as extend"
            );
            current_remaining.saturating_add(plan.duration_seconds)
        }
    };
    SubscriptionStatus::expiring_in(remaining, now)
}

/// Owner of the at-most-one pending transaction.
#[derive(Debug, Default)]
pub struct TransactionManager {
    pending: Option<PendingTransaction>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a transaction is pending.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending transaction, if any.
    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    /// Open a transaction and return its guessed status.
    ///
    /// Fails fast with [`SyncError::TransactionPending`] rather than queuing,
    /// so optimistic guesses never compound.
    pub fn begin(
        &mut self,
        id: u64,
        kind: PurchaseKind,
        plan: &Plan,
        current: Option<&SubscriptionStatus>,
        now: DateTime<Utc>,
    ) -> Result<&PendingTransaction> {
        if self.pending.is_some() {
            return Err(SyncError::TransactionPending);
        }

        let guessed_status = guess_status(kind, current, plan, now);
        Ok(self.pending.insert(PendingTransaction {
            id,
            kind,
            plan_id: plan.plan_id.clone(),
            snapshot: current.cloned(),
            guessed_status,
            lifecycle: TransactionLifecycle::Pending,
            reconciled_while_pending: false,
        }))
    }

    /// Note that a reconciliation overwrote the guess.
    pub fn note_reconciled(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.reconciled_while_pending = true;
        }
    }

    /// Resolve as confirmed. The transaction is removed and returned.
    pub fn confirm(&mut self, id: u64) -> Result<PendingTransaction> {
        let mut resolved = self.take(id)?;
        resolved.lifecycle = TransactionLifecycle::Confirmed;
        Ok(resolved)
    }

    /// Resolve as rolled back. The caller restores `snapshot`.
    pub fn rollback(&mut self, id: u64) -> Result<PendingTransaction> {
        let mut resolved = self.take(id)?;
        resolved.lifecycle = TransactionLifecycle::RolledBack;
        Ok(resolved)
    }

    /// Forget the pending transaction without resolving it (teardown).
    pub fn abandon(&mut self) -> Option<PendingTransaction> {
        self.pending.take()
    }

    fn take(&mut self, id: u64) -> Result<PendingTransaction> {
        match self.pending.take() {
            Some(pending) if pending.id == id => Ok(pending),
            other => {
                self.pending = other;
                Err(SyncError::NotPending)
            }
        }
    }
}
