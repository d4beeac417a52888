//! Async driver around [`SyncCore`].
//!
//! The engine owns the gateway, the session, the time source and two
//! background tasks (countdown ticker and periodic poller). Gateway calls run
//! in spawned tasks so a dropped caller future can never leave a fetch
//! ticket uncompleted. The first transient failure in a row schedules one
//! retry after the gateway's suggested delay; later ones wait for the poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use streampass_lib::{Plan, RemoteStateGateway, Session, SubscriptionStatus};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{SystemClock, TimeSource};
use crate::config::EngineConfig;
use crate::countdown::TickOutcome;
use crate::events::{EngineEvent, EventBus, EventCallback};
use crate::presentation::ViewModel;
use crate::reconcile::{SyncOutcome, SyncRequest, SyncTicket};
use crate::state::{Settlement, SyncCore};
use crate::transaction::{PendingTransaction, PurchaseKind};
use crate::{Result, SyncError};

struct EngineInner {
    core: Mutex<SyncCore>,
    gateway: Arc<dyn RemoteStateGateway>,
    session: Arc<Session>,
    clock: Arc<dyn TimeSource>,
    config: EngineConfig,
    events: EventBus,
    cancel: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    mounted: AtomicBool,
}

/// Subscription state synchronization engine for one view.
///
/// Dropping the engine disposes it.
pub struct SubscriptionEngine {
    inner: Arc<EngineInner>,
}

/// Handle to an in-flight purchase/extend.
///
/// The optimistic guess is already visible when the handle is returned;
/// awaiting [`TransactionHandle::settled`] yields the resolution.
#[derive(Debug)]
pub struct TransactionHandle {
    transaction: PendingTransaction,
    rx: oneshot::Receiver<Result<SubscriptionStatus>>,
}

impl TransactionHandle {
    pub fn id(&self) -> u64 {
        self.transaction.id
    }

    pub fn kind(&self) -> PurchaseKind {
        self.transaction.kind
    }

    pub fn plan_id(&self) -> &str {
        &self.transaction.plan_id
    }

    /// The status shown while pending.
    pub fn guessed_status(&self) -> &SubscriptionStatus {
        &self.transaction.guessed_status
    }

    /// Wait for confirmation (server value) or rollback (the error).
    pub async fn settled(self) -> Result<SubscriptionStatus> {
        self.rx.await.unwrap_or(Err(SyncError::Disposed))
    }
}

impl SubscriptionEngine {
    /// Create an engine reading time from the system clock.
    pub fn new(
        session: Arc<Session>,
        gateway: Arc<dyn RemoteStateGateway>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_clock(session, gateway, config, Arc::new(SystemClock))
    }

    /// Create an engine with an injected time source.
    pub fn with_clock(
        session: Arc<Session>,
        gateway: Arc<dyn RemoteStateGateway>,
        config: EngineConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate()?;
        if !session.is_active() {
            return Err(SyncError::SessionClosed);
        }

        let (cancel, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(EngineInner {
                core: Mutex::new(SyncCore::new()),
                gateway,
                session,
                clock,
                config,
                events: EventBus::new(),
                cancel,
                tasks: Mutex::new(Vec::new()),
                mounted: AtomicBool::new(false),
            }),
        })
    }

    /// Initial status and plan fetch, then start the ticker and poller.
    ///
    /// A failed plan fetch is reported through events only. A failed status
    /// fetch is returned, but the background tasks still start so the poller
    /// can recover.
    #[tracing::instrument(name = "engine_mount", skip_all, fields(user = %self.inner.session.user_id()))]
    pub async fn mount(&self) -> Result<SyncOutcome> {
        if self.inner.core().is_disposed() {
            return Err(SyncError::Disposed);
        }
        if self.inner.mounted.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyMounted);
        }

        let (status, plans) = tokio::join!(self.inner.sync_now(), self.inner.refresh_plans());
        if let Err(e) = &plans {
            warn!(error = %e, "initial plan fetch failed");
        }
        match &status {
            Ok(outcome) => info!(?outcome, "engine mounted"),
            Err(e) => warn!(error = %e, "initial status fetch failed"),
        }

        self.inner.start_tasks();
        status
    }

    /// Current view model.
    pub fn current_view_model(&self) -> ViewModel {
        self.inner.core().view_model()
    }

    /// Current status; `None` until the first successful fetch.
    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.inner.core().status().cloned()
    }

    pub fn plans(&self) -> Vec<Plan> {
        self.inner.core().plans().to_vec()
    }

    pub fn pending_transaction(&self) -> Option<PendingTransaction> {
        self.inner.core().pending().cloned()
    }

    /// Signed drift measured at the last applied reconciliation.
    pub fn last_drift(&self) -> Option<i64> {
        self.inner.core().last_drift()
    }

    /// Start a purchase/extend.
    ///
    /// The guess is applied before this returns; the gateway call runs in the
    /// background. Outside a tokio runtime this fails with
    /// [`SyncError::NoRuntime`] before touching any state.
    pub fn begin_transaction(&self, kind: PurchaseKind, plan_id: &str) -> Result<TransactionHandle> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let now = self.inner.clock.now();
        let transaction = self.inner.core().begin(kind, plan_id, now)?;
        self.inner
            .events
            .emit(&EngineEvent::StatusChanged(transaction.guessed_status.clone()));

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let id = transaction.id;
        let submit_plan = transaction.plan_id.clone();
        runtime.spawn(async move {
            let result = inner
                .gateway
                .submit_extend_or_purchase(&inner.session, &submit_plan)
                .await;
            let settled = inner.settle(id, result);
            let _ = tx.send(settled);
        });

        Ok(TransactionHandle { transaction, rx })
    }

    /// Fetch status now. Coalesces with an in-flight fetch.
    pub async fn force_sync(&self) -> Result<SyncOutcome> {
        self.inner.sync_now().await
    }

    /// Re-fetch the plan catalog; the previous catalog survives a failure.
    pub async fn refresh_plans(&self) -> Result<Vec<Plan>> {
        self.inner.refresh_plans().await
    }

    /// Register an event observer.
    pub fn on_event(&self, callback: EventCallback) {
        self.inner.events.subscribe(callback);
    }

    /// Advance the countdown once, outside the ticker task.
    pub fn tick(&self) -> TickOutcome {
        self.inner.on_tick()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core().is_disposed()
    }

    /// Stop background tasks and ignore every late completion. Idempotent.
    pub fn dispose(&self) {
        let first = self.inner.core().dispose();
        if !first {
            return;
        }

        self.inner.cancel.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        info!(tasks = tasks.len(), "engine disposed");

        self.inner.events.emit(&EngineEvent::Disposed);
        self.inner.events.clear();
    }
}

impl Drop for SubscriptionEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SubscriptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("core", &*self.inner.core())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl EngineInner {
    fn core(&self) -> MutexGuard<'_, SyncCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_tasks(self: &Arc<Self>) {
        let ticker = {
            let inner = self.clone();
            let mut cancel = self.cancel.subscribe();
            let period = self.config.tick_interval();
            tokio::spawn(async move {
                // Missed ticks are recovered from the wall clock in `SyncCore::tick`.
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            inner.on_tick();
                        }
                        _ = cancelled(&mut cancel) => break,
                    }
                }
                debug!("ticker stopped");
            })
        };

        let poller = {
            let inner = self.clone();
            let mut cancel = self.cancel.subscribe();
            let period = self.config.sync_period();
            tokio::spawn(async move {
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let due = inner.core().should_poll();
                            if due {
                                inner.trigger_sync();
                            }
                        }
                        _ = cancelled(&mut cancel) => break,
                    }
                }
                debug!("poller stopped");
            })
        };

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(ticker);
        tasks.push(poller);
    }

    fn on_tick(self: &Arc<Self>) -> TickOutcome {
        let now = self.clock.now();
        let (outcome, request) = {
            let mut core = self.core();
            let outcome = core.tick(now);
            let request = if outcome.is_expired() {
                core.request_sync().ok()
            } else {
                None
            };
            (outcome, request)
        };

        if outcome.is_expired() {
            self.events.emit(&EngineEvent::Expired);
            if let Some(SyncRequest::Issued(ticket)) = request {
                self.spawn_sync(ticket);
            }
        }
        outcome
    }

    /// Request a fetch without waiting for it.
    fn trigger_sync(self: &Arc<Self>) {
        let request = self.core().request_sync();
        if let Ok(SyncRequest::Issued(ticket)) = request {
            self.spawn_sync(ticket);
        }
    }

    async fn sync_now(self: &Arc<Self>) -> Result<SyncOutcome> {
        let request = self.core().request_sync()?;
        match request {
            SyncRequest::Coalesced => Ok(SyncOutcome::Coalesced),
            SyncRequest::Issued(ticket) => self.spawn_sync(ticket).await.unwrap_or_else(|e| {
                warn!(error = %e, "status fetch task failed");
                Err(SyncError::Disposed)
            }),
        }
    }

    fn spawn_sync(self: &Arc<Self>, ticket: SyncTicket) -> JoinHandle<Result<SyncOutcome>> {
        let inner = self.clone();
        tokio::spawn(async move { inner.run_sync(ticket).await })
    }

    async fn run_sync(self: Arc<Self>, ticket: SyncTicket) -> Result<SyncOutcome> {
        let result = self.gateway.fetch_status(&self.session).await;
        let completion = self.core().complete_sync(ticket, result);
        self.events.emit_all(completion.events);
        if let Some(rerun) = completion.rerun {
            self.spawn_sync(rerun);
        }
        if let Some(delay) = completion.retry_after {
            self.schedule_retry(delay);
        }
        completion.outcome
    }

    fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let inner = self.clone();
        let mut cancel = self.cancel.subscribe();
        let retry = tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "retrying status fetch");
                    inner.trigger_sync();
                }
                _ = cancelled(&mut cancel) => {}
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|task| !task.is_finished());
        tasks.push(retry);
    }

    async fn refresh_plans(self: &Arc<Self>) -> Result<Vec<Plan>> {
        if self.core().is_disposed() {
            return Err(SyncError::Disposed);
        }

        match self.gateway.fetch_plans(&self.session).await {
            Ok(plans) => {
                let replaced = self.core().replace_plans(plans.clone());
                replaced?;
                self.events.emit(&EngineEvent::PlansUpdated(plans.clone()));
                Ok(plans)
            }
            Err(e) => {
                let err = SyncError::plans(e);
                let disposed = self.core().is_disposed();
                if disposed {
                    return Err(SyncError::Disposed);
                }
                warn!(error = %err, "plan fetch failed; keeping previous catalog");
                self.events.emit(&EngineEvent::SyncFailed(err.clone()));
                Err(err)
            }
        }
    }

    fn settle(
        self: &Arc<Self>,
        id: u64,
        result: std::result::Result<SubscriptionStatus, streampass_lib::GatewayError>,
    ) -> Result<SubscriptionStatus> {
        let settlement = self.core().settle(id, result);
        let settlement = match settlement {
            Ok(settlement) => settlement,
            Err(e) => {
                debug!(id, error = %e, "transaction completed after teardown");
                return Err(e);
            }
        };
        self.events.emit_all(settlement.events());

        match settlement {
            Settlement::Confirmed { status, .. } => {
                self.trigger_sync();
                Ok(status)
            }
            Settlement::RolledBack { error, resync, .. } => {
                if resync {
                    self.trigger_sync();
                }
                Err(error)
            }
        }
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}
