//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use streampass_lib::test_utils::TestFixtures;
use streampass_lib::{GatewayError, Plan, RemoteStateGateway, Session, SubscriptionStatus};
use streampass_sync::{EngineConfig, EngineEvent, SubscriptionEngine, TimeSource};
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, GatewayError>>;

/// Gateway whose status and purchase calls block until the test releases
/// them, in any order.
#[derive(Default)]
pub struct ScriptedGateway {
    status_waiters: Mutex<VecDeque<Reply<SubscriptionStatus>>>,
    purchase_waiters: Mutex<VecDeque<(String, Reply<SubscriptionStatus>)>>,
    plans: Mutex<Vec<Plan>>,
    status_calls: AtomicUsize,
    purchase_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        let gateway = Self::default();
        *gateway.plans.lock().unwrap() = TestFixtures::plans();
        Arc::new(gateway)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    /// Number of status calls still waiting for a reply.
    pub fn held_status(&self) -> usize {
        self.status_waiters.lock().unwrap().len()
    }

    /// Yield until `count` status calls have arrived.
    pub async fn wait_for_status_calls(&self, count: usize) {
        for _ in 0..1_000 {
            if self.status_calls() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} status calls, saw {}",
            count,
            self.status_calls()
        );
    }

    /// Yield until `count` purchase calls have arrived.
    pub async fn wait_for_purchase_calls(&self, count: usize) {
        for _ in 0..1_000 {
            if self.purchase_calls() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} purchase calls, saw {}",
            count,
            self.purchase_calls()
        );
    }

    /// Answer the oldest held status call.
    pub fn release_status(&self, reply: Result<SubscriptionStatus, GatewayError>) {
        let waiter = self
            .status_waiters
            .lock()
            .unwrap()
            .pop_front()
            .expect("no status call is held");
        let _ = waiter.send(reply);
    }

    /// Answer the oldest held purchase call; returns its plan id.
    pub fn release_purchase(&self, reply: Result<SubscriptionStatus, GatewayError>) -> String {
        let (plan_id, waiter) = self
            .purchase_waiters
            .lock()
            .unwrap()
            .pop_front()
            .expect("no purchase call is held");
        let _ = waiter.send(reply);
        plan_id
    }
}

#[async_trait]
impl RemoteStateGateway for ScriptedGateway {
    async fn fetch_status(&self, session: &Session) -> Result<SubscriptionStatus, GatewayError> {
        session.bearer_token()?;
        let (tx, rx) = oneshot::channel();
        self.status_waiters.lock().unwrap().push_back(tx);
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        rx.await
            .unwrap_or_else(|_| Err(GatewayError::Transport("reply dropped".into())))
    }

    async fn fetch_plans(&self, session: &Session) -> Result<Vec<Plan>, GatewayError> {
        session.bearer_token()?;
        Ok(self.plans.lock().unwrap().clone())
    }

    async fn submit_extend_or_purchase(
        &self,
        session: &Session,
        plan_id: &str,
    ) -> Result<SubscriptionStatus, GatewayError> {
        session.bearer_token()?;
        let (tx, rx) = oneshot::channel();
        self.purchase_waiters
            .lock()
            .unwrap()
            .push_back((plan_id.to_string(), tx));
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        rx.await
            .unwrap_or_else(|_| Err(GatewayError::Transport("reply dropped".into())))
    }
}

pub fn active(remaining: u64) -> SubscriptionStatus {
    SubscriptionStatus::from_remaining(remaining, None)
}

/// Build an engine over the scripted gateway.
pub fn scripted_engine(gateway: &Arc<ScriptedGateway>) -> Arc<SubscriptionEngine> {
    Arc::new(
        SubscriptionEngine::new(
            Arc::new(TestFixtures::session()),
            gateway.clone(),
            EngineConfig::default(),
        )
        .unwrap(),
    )
}

/// Build an engine over the scripted gateway with custom timing and clock.
pub fn scripted_engine_with(
    gateway: &Arc<ScriptedGateway>,
    config: EngineConfig,
    clock: Arc<dyn TimeSource>,
) -> Arc<SubscriptionEngine> {
    Arc::new(
        SubscriptionEngine::with_clock(
            Arc::new(TestFixtures::session()),
            gateway.clone(),
            config,
            clock,
        )
        .unwrap(),
    )
}

/// Mount, answering the initial status fetch with `initial`.
pub async fn mount_with(
    engine: &SubscriptionEngine,
    gateway: &ScriptedGateway,
    initial: SubscriptionStatus,
) {
    let (mounted, _) = tokio::join!(engine.mount(), async {
        gateway.wait_for_status_calls(1).await;
        gateway.release_status(Ok(initial));
    });
    mounted.unwrap();
}

/// Record every event the engine emits.
pub fn record_events(engine: &SubscriptionEngine) -> Arc<Mutex<Vec<EngineEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.on_event(Arc::new(move |event: &EngineEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    seen
}
