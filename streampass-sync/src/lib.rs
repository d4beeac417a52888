//! # StreamPass Subscription Sync
//!
//! Keeps a user-visible "time remaining on my access pass" countdown
//! consistent with the server-held expiry.
//!
//! ## Model
//!
//! - A per-second countdown runs locally and never waits on the network
//! - Server truth always replaces local derivation on reconciliation
//! - Purchase/extend operations apply an optimistic guess immediately, then
//!   confirm with the server value or roll back to an exact snapshot
//! - Reconciliation requests are sequence-numbered; responses older than the
//!   latest state write are discarded, and overlapping triggers coalesce
//!
//! All state lives in one [`SyncCore`] that is only mutated in short
//! synchronous sections; [`SubscriptionEngine`] drives it from tokio tasks.

pub mod clock;
pub mod config;
pub mod countdown;
pub mod engine;
pub mod events;
pub mod presentation;
pub mod reconcile;
pub mod state;
pub mod transaction;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::EngineConfig;
pub use countdown::TickOutcome;
pub use engine::{SubscriptionEngine, TransactionHandle};
pub use events::{EngineEvent, EventCallback};
pub use presentation::{format_hms, render, Affordance, PlanView, ViewModel};
pub use reconcile::{ReconcileScheduler, SyncOutcome, SyncRequest, SyncTicket};
pub use state::{Settlement, SyncCompletion, SyncCore};
pub use transaction::{PendingTransaction, PurchaseKind, TransactionLifecycle};

use streampass_lib::GatewayError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("status fetch failed: {0}")]
    Fetch(GatewayError),
    #[error("plan fetch failed: {0}")]
    Plans(GatewayError),
    #[error("transaction for plan {plan_id} failed: {message}")]
    TransactionFailed { plan_id: String, message: String },
    #[error("a transaction is already pending")]
    TransactionPending,
    #[error("no pending transaction matches")]
    NotPending,
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("engine already mounted")]
    AlreadyMounted,
    #[error("engine disposed")]
    Disposed,
    #[error("session is closed")]
    SessionClosed,
    #[error("no tokio runtime is running")]
    NoRuntime,
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Wrap a status fetch failure.
    pub fn fetch(err: GatewayError) -> Self {
        match err {
            GatewayError::SessionClosed => Self::SessionClosed,
            other => Self::Fetch(other),
        }
    }

    /// Wrap a plan fetch failure.
    pub fn plans(err: GatewayError) -> Self {
        match err {
            GatewayError::SessionClosed => Self::SessionClosed,
            other => Self::Plans(other),
        }
    }

    /// Check whether the failure is worth showing to the end user.
    ///
    /// Usage errors such as [`SyncError::TransactionPending`] are for the host
    /// to prevent, not for a toast.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_) | Self::Plans(_) | Self::TransactionFailed { .. } | Self::SessionClosed
        )
    }
}
