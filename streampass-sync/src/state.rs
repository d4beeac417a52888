//! The synchronous sync core.
//!
//! `SyncCore` owns the one status value, the plan catalog, the pending
//! transaction and the reconciliation scheduler. Every method is a short
//! synchronous critical section; the engine calls them between awaits and
//! never holds the core across a suspension point.
//!
//! Methods that produce observable changes return the [`EngineEvent`]s to
//! deliver, so the caller can emit them after releasing the lock.

use crate::clock::elapsed_seconds;
use crate::countdown::{self, TickOutcome};
use crate::events::EngineEvent;
use crate::presentation::{self, ViewModel};
use crate::reconcile::{self, ReconcileScheduler, SyncOutcome, SyncRequest, SyncTicket};
use crate::transaction::{PendingTransaction, PurchaseKind, TransactionManager};
use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use streampass_lib::{GatewayError, Plan, SubscriptionStatus};
use tracing::{debug, info, warn};

/// Result of completing a status fetch.
#[derive(Debug)]
pub struct SyncCompletion {
    pub outcome: Result<SyncOutcome>,
    /// Queued rerun the caller must now perform.
    pub rerun: Option<SyncTicket>,
    /// Delay before a one-off retry of a transient failure.
    pub retry_after: Option<Duration>,
    pub events: Vec<EngineEvent>,
}

/// How a transaction was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The server value replaced the guess.
    Confirmed {
        transaction: PendingTransaction,
        status: SubscriptionStatus,
    },
    /// The snapshot was restored.
    RolledBack {
        transaction: PendingTransaction,
        error: SyncError,
        /// A reconciliation landed while pending; fetch again.
        resync: bool,
    },
}

impl Settlement {
    pub fn transaction(&self) -> &PendingTransaction {
        match self {
            Self::Confirmed { transaction, .. } | Self::RolledBack { transaction, .. } => {
                transaction
            }
        }
    }

    /// Events describing this resolution.
    pub fn events(&self) -> Vec<EngineEvent> {
        match self {
            Self::Confirmed {
                transaction,
                status,
            } => vec![
                EngineEvent::StatusChanged(status.clone()),
                EngineEvent::TransactionConfirmed {
                    kind: transaction.kind,
                    plan_id: transaction.plan_id.clone(),
                    status: status.clone(),
                },
            ],
            Self::RolledBack {
                transaction, error, ..
            } => {
                let mut events = Vec::with_capacity(2);
                if let Some(restored) = &transaction.snapshot {
                    events.push(EngineEvent::StatusChanged(restored.clone()));
                }
                events.push(EngineEvent::TransactionRolledBack {
                    kind: transaction.kind,
                    plan_id: transaction.plan_id.clone(),
                    error: error.clone(),
                });
                events
            }
        }
    }
}

/// Single owner of all engine state.
#[derive(Debug, Default)]
pub struct SyncCore {
    status: Option<SubscriptionStatus>,
    plans: Vec<Plan>,
    transactions: TransactionManager,
    scheduler: ReconcileScheduler,
    last_drift: Option<i64>,
    last_tick_at: Option<DateTime<Utc>>,
    failed_fetches: u32,
    disposed: bool,
}

impl SyncCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status; `None` until the first successful fetch.
    pub fn status(&self) -> Option<&SubscriptionStatus> {
        self.status.as_ref()
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.plan_id == plan_id)
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.transactions.pending()
    }

    pub fn is_updating(&self) -> bool {
        self.transactions.is_pending()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn scheduler(&self) -> &ReconcileScheduler {
        &self.scheduler
    }

    /// Local remaining minus server remaining at the last applied fetch.
    /// Positive when the local countdown was running slow.
    pub fn last_drift(&self) -> Option<i64> {
        self.last_drift
    }

    /// Consecutive transient fetch failures since the last successful fetch.
    pub fn failed_fetches(&self) -> u32 {
        self.failed_fetches
    }

    /// Snapshot the state for display.
    pub fn view_model(&self) -> ViewModel {
        presentation::render(self.status.as_ref(), self.is_updating(), &self.plans)
    }

    /// Advance the countdown by one interval.
    ///
    /// A tick consumes one second, or every whole wall-clock second since the
    /// previous tick when the process stalled in between. The first tick after
    /// the status was replaced always consumes exactly one.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.disposed {
            return TickOutcome::Idle;
        }
        let seconds = self
            .last_tick_at
            .map_or(1, |prev| elapsed_seconds(prev, now).max(1));
        self.last_tick_at = Some(now);
        if seconds > 1 {
            debug!(seconds, "countdown catching up after a stall");
        }

        let outcome = countdown::tick(self.status.as_mut(), seconds);
        if outcome.is_expired() {
            debug!("countdown reached zero");
        }
        outcome
    }

    fn replace_status(&mut self, status: Option<SubscriptionStatus>) {
        self.status = status;
        self.last_tick_at = None;
    }

    /// Ask for a status fetch.
    pub fn request_sync(&mut self) -> Result<SyncRequest> {
        if self.disposed {
            return Err(SyncError::Disposed);
        }
        let request = self.scheduler.request();
        match &request {
            SyncRequest::Issued(ticket) => debug!(seq = ticket.seq(), "status fetch issued"),
            SyncRequest::Coalesced => debug!("status fetch coalesced into queued rerun"),
        }
        Ok(request)
    }

    /// Whether the periodic poller should fetch now.
    ///
    /// Polling continues past expiry while transient failures are
    /// outstanding, so a failed expiry fetch is retried.
    pub fn should_poll(&self) -> bool {
        !self.disposed
            && (self.failed_fetches > 0 || reconcile::should_poll(self.status.as_ref()))
    }

    /// Apply the result of a status fetch.
    ///
    /// A fresh success overwrites the status unconditionally, including a
    /// pending optimistic guess. A stale success is dropped. A failure leaves
    /// state untouched.
    pub fn complete_sync(
        &mut self,
        ticket: SyncTicket,
        result: std::result::Result<SubscriptionStatus, GatewayError>,
    ) -> SyncCompletion {
        let seq = ticket.seq();
        if self.disposed {
            debug!(seq, "ignoring status fetch completed after dispose");
            return SyncCompletion {
                outcome: Err(SyncError::Disposed),
                rerun: None,
                retry_after: None,
                events: Vec::new(),
            };
        }

        let completion = self.scheduler.complete(ticket, result.is_ok());
        let mut events = Vec::new();
        let mut retry_after = None;
        if result.is_ok() {
            self.failed_fetches = 0;
        }
        let outcome = match result {
            Ok(server) if completion.fresh => {
                if let Some(local) = &self.status {
                    let drift = local.remaining_seconds as i64 - server.remaining_seconds as i64;
                    if drift != 0 {
                        debug!(seq, drift, "local countdown drifted from server");
                    }
                    self.last_drift = Some(drift);
                }
                if self.transactions.is_pending() {
                    debug!(seq, "reconciliation replaced a pending guess");
                    self.transactions.note_reconciled();
                }
                if self.status.as_ref() != Some(&server) {
                    events.push(EngineEvent::StatusChanged(server.clone()));
                }
                self.replace_status(Some(server));
                Ok(SyncOutcome::Applied)
            }
            Ok(_) => {
                debug!(seq, floor = self.scheduler.write_floor(), "discarding stale status");
                Ok(SyncOutcome::Stale)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.failed_fetches += 1;
                    if self.failed_fetches == 1 {
                        retry_after = e.retry_after_ms().map(Duration::from_millis);
                    }
                }
                warn!(
                    seq,
                    code = e.code() as i32,
                    failures = self.failed_fetches,
                    error = %e,
                    "status fetch failed"
                );
                let err = SyncError::fetch(e);
                events.push(EngineEvent::SyncFailed(err.clone()));
                Err(err)
            }
        };

        SyncCompletion {
            outcome,
            rerun: completion.rerun,
            retry_after,
            events,
        }
    }

    /// Open a transaction and apply its guess.
    ///
    /// Fails without mutating anything when disposed, when a transaction is
    /// already pending, or when the plan is not in the catalog.
    pub fn begin(
        &mut self,
        kind: PurchaseKind,
        plan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PendingTransaction> {
        if self.disposed {
            return Err(SyncError::Disposed);
        }
        if self.transactions.is_pending() {
            return Err(SyncError::TransactionPending);
        }
        let plan = self
            .plan(plan_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownPlan(plan_id.to_string()))?;

        let id = self.scheduler.supersede();
        let pending = self
            .transactions
            .begin(id, kind, &plan, self.status.as_ref(), now)?
            .clone();
        self.replace_status(Some(pending.guessed_status.clone()));

        info!(
            id,
            %kind,
            plan_id,
            guess = pending.guessed_status.remaining_seconds,
            "transaction started"
        );
        Ok(pending)
    }

    /// Resolve the pending transaction with the server's answer.
    pub fn settle(
        &mut self,
        id: u64,
        result: std::result::Result<SubscriptionStatus, GatewayError>,
    ) -> Result<Settlement> {
        if self.disposed {
            return Err(SyncError::Disposed);
        }

        match result {
            Ok(status) => {
                let transaction = self.transactions.confirm(id)?;
                self.scheduler.supersede();
                self.replace_status(Some(status.clone()));
                info!(
                    id,
                    plan_id = %transaction.plan_id,
                    guess = transaction.guessed_status.remaining_seconds,
                    server = status.remaining_seconds,
                    "transaction confirmed"
                );
                Ok(Settlement::Confirmed {
                    transaction,
                    status,
                })
            }
            Err(e) => {
                let transaction = self.transactions.rollback(id)?;
                self.scheduler.supersede();
                self.replace_status(transaction.snapshot.clone());
                let resync = transaction.reconciled_while_pending;
                warn!(
                    id,
                    plan_id = %transaction.plan_id,
                    error = %e,
                    resync,
                    "transaction rolled back"
                );
                let error = SyncError::TransactionFailed {
                    plan_id: transaction.plan_id.clone(),
                    message: e.message(),
                };
                Ok(Settlement::RolledBack {
                    transaction,
                    error,
                    resync,
                })
            }
        }
    }

    /// Replace the plan catalog.
    pub fn replace_plans(&mut self, plans: Vec<Plan>) -> Result<()> {
        if self.disposed {
            return Err(SyncError::Disposed);
        }
        debug!(count = plans.len(), "plan catalog replaced");
        self.plans = plans;
        Ok(())
    }

    /// Tear down. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        if let Some(abandoned) = self.transactions.abandon() {
            debug!(id = abandoned.id, "abandoning pending transaction on dispose");
        }
        self.scheduler.cancel();
        true
    }
}
