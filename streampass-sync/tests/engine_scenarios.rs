//! End-to-end engine scenarios over scripted and simulated gateways.

mod common;

use chrono::{DateTime, Utc};
use common::{
    active, mount_with, record_events, scripted_engine, scripted_engine_with, ScriptedGateway,
};
use std::sync::Arc;
use std::time::Duration;
use streampass_lib::test_utils::{BackendConfig, SimulatedBackend, TestFixtures};
use streampass_lib::{GatewayError, Session, SubscriptionStatus};
use streampass_sync::{
    EngineConfig, EngineEvent, ManualClock, PurchaseKind, SubscriptionEngine, SyncError,
    SyncOutcome, TickOutcome,
};
use tokio::time;

fn simulated_engine(backend: &Arc<SimulatedBackend>) -> SubscriptionEngine {
    SubscriptionEngine::new(
        Arc::new(TestFixtures::session()),
        backend.clone(),
        EngineConfig::default(),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_countdown_expiry_fetches_once() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(5);
    let engine = simulated_engine(&backend);
    let events = record_events(&engine);

    engine.mount().await.unwrap();
    assert_eq!(engine.current_view_model().formatted, "00:00:05");

    time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(engine.current_view_model().formatted, "00:00:01");
    assert_eq!(backend.status_calls(), 1);

    time::sleep(Duration::from_millis(1_000)).await;
    let view = engine.current_view_model();
    assert_eq!(view.formatted, "00:00:00");
    assert!(!view.is_active);
    assert_eq!(backend.status_calls(), 2, "expiry should trigger exactly one fetch");

    let expired = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, EngineEvent::Expired))
        .count();
    assert_eq!(expired, 1);
}

/// Ticker and poller far enough out that only manual ticks move the countdown.
fn manual_ticks() -> EngineConfig {
    EngineConfig::new(3_600_000, 3_600)
}

fn epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-01T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test(start_paused = true)]
async fn test_expiry_fetch_issued_in_same_turn() {
    let gateway = ScriptedGateway::new();
    let clock = ManualClock::new(epoch());
    let engine = scripted_engine_with(&gateway, manual_ticks(), Arc::new(clock));
    mount_with(&engine, &gateway, active(2)).await;

    assert_eq!(engine.tick(), TickOutcome::Decremented(1));
    tokio::task::yield_now().await;
    assert_eq!(gateway.status_calls(), 1);

    assert_eq!(engine.tick(), TickOutcome::Expired);
    tokio::task::yield_now().await;
    assert_eq!(gateway.status_calls(), 2);
    assert_eq!(gateway.held_status(), 1);

    gateway.release_status(Ok(SubscriptionStatus::expired()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_expiry_fetch_is_retried() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(5);
    let engine = simulated_engine(&backend);
    engine.mount().await.unwrap();

    // The server granted more time than the local countdown knows about.
    backend.set_remaining(600);
    backend.fail_next_status(1);

    time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(backend.status_calls(), 2);
    assert_eq!(engine.current_view_model().formatted, "00:00:00");

    time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(backend.status_calls(), 3, "transient failure should be retried");
    let view = engine.current_view_model();
    assert!(view.is_active);
    assert!(engine.status().unwrap().remaining_seconds > 590);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_fall_back_to_polling() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(2);
    let engine = simulated_engine(&backend);
    engine.mount().await.unwrap();

    backend.set_remaining(600);
    backend.fail_next_status(2);

    // Expiry fetch at 2s fails, the retry at 3s fails too.
    time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(backend.status_calls(), 3);
    assert!(!engine.current_view_model().is_active);

    // The poller keeps going past expiry until a fetch succeeds.
    time::sleep(Duration::from_secs(27)).await;
    assert_eq!(backend.status_calls(), 4);
    assert!(engine.current_view_model().is_active);
}

#[tokio::test(start_paused = true)]
async fn test_tick_catches_up_from_wall_clock() {
    let gateway = ScriptedGateway::new();
    let clock = ManualClock::new(epoch());
    let engine = scripted_engine_with(&gateway, manual_ticks(), Arc::new(clock.clone()));
    mount_with(&engine, &gateway, active(600)).await;

    assert_eq!(engine.tick(), TickOutcome::Decremented(599));
    clock.advance(chrono::Duration::seconds(120));
    assert_eq!(engine.tick(), TickOutcome::Decremented(479));
    assert_eq!(engine.current_view_model().formatted, "00:07:59");
}

#[tokio::test(start_paused = true)]
async fn test_guess_expiry_stamped_from_clock() {
    let gateway = ScriptedGateway::new();
    let clock = ManualClock::new(epoch());
    let engine = scripted_engine_with(&gateway, manual_ticks(), Arc::new(clock.clone()));
    mount_with(&engine, &gateway, active(100)).await;

    clock.advance(chrono::Duration::seconds(30));
    let handle = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();

    let expected = epoch() + chrono::Duration::seconds(30 + 3_700);
    assert_eq!(handle.guessed_status().expires_at, Some(expected));
    assert_eq!(engine.status().unwrap().expires_at, Some(expected));

    gateway.wait_for_purchase_calls(1).await;
    gateway.release_purchase(Ok(active(3_695)));
    handle.settled().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_purchase_guess_visible_before_network() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, SubscriptionStatus::expired()).await;

    let handle = engine
        .begin_transaction(PurchaseKind::Purchase, "trial")
        .unwrap();

    let view = engine.current_view_model();
    assert_eq!(view.formatted, "00:30:00");
    assert!(view.is_active);
    assert!(view.updating);
    assert!(view.plans.iter().all(|p| !p.enabled));

    gateway.wait_for_purchase_calls(1).await;
    let mut settled = tokio_test::task::spawn(handle.settled());
    tokio_test::assert_pending!(settled.poll());

    assert_eq!(gateway.release_purchase(Ok(active(1800))), "trial");
    for _ in 0..100 {
        if settled.is_woken() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let confirmed = tokio_test::assert_ready!(settled.poll());
    assert_eq!(confirmed, Ok(active(1800)));

    let view = engine.current_view_model();
    assert!(!view.updating);
    assert!(view.plans.iter().all(|p| p.enabled));

    // Confirmation triggers a full reconciliation.
    gateway.wait_for_status_calls(2).await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_purchase_restores_view() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.reject_purchases("card declined");
    let engine = simulated_engine(&backend);
    let events = record_events(&engine);
    engine.mount().await.unwrap();

    let before = engine.current_view_model();
    let handle = engine
        .begin_transaction(PurchaseKind::Purchase, "trial")
        .unwrap();
    assert!(engine.current_view_model().updating);

    let err = handle.settled().await.unwrap_err();
    assert_eq!(
        err,
        SyncError::TransactionFailed {
            plan_id: "trial".into(),
            message: "card declined".into()
        }
    );
    assert!(err.is_user_facing());
    assert_eq!(engine.current_view_model(), before);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, EngineEvent::TransactionRolledBack { plan_id, .. } if plan_id == "trial")));
}

#[tokio::test(start_paused = true)]
async fn test_extend_server_value_replaces_guess() {
    let backend = SimulatedBackend::with_config(
        TestFixtures::plans(),
        BackendConfig {
            grant_skew_seconds: 5,
            ..BackendConfig::default()
        },
    );
    backend.set_remaining(100);
    let engine = simulated_engine(&backend);
    engine.mount().await.unwrap();

    let handle = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();
    assert_eq!(handle.guessed_status().remaining_seconds, 3700);
    assert_eq!(engine.current_view_model().formatted, "01:01:40");

    let confirmed = handle.settled().await.unwrap();
    assert_eq!(confirmed.remaining_seconds, 3695);
    assert_eq!(engine.current_view_model().formatted, "01:01:35");
}

#[tokio::test(start_paused = true)]
async fn test_fetch_issued_before_guess_is_discarded() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, active(100)).await;

    let syncing = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.force_sync().await })
    };
    gateway.wait_for_status_calls(2).await;

    let handle = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();
    gateway.release_status(Ok(active(100)));
    assert_eq!(syncing.await.unwrap(), Ok(SyncOutcome::Stale));
    assert_eq!(engine.status().unwrap().remaining_seconds, 3700);

    gateway.wait_for_purchase_calls(1).await;
    gateway.release_purchase(Ok(active(3695)));
    handle.settled().await.unwrap();
    assert_eq!(engine.status().unwrap().remaining_seconds, 3695);
}

#[tokio::test(start_paused = true)]
async fn test_second_begin_rejected_without_mutation() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, active(100)).await;

    let _first = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();
    let view = engine.current_view_model();

    let err = engine
        .begin_transaction(PurchaseKind::Purchase, "trial")
        .unwrap_err();
    assert_eq!(err, SyncError::TransactionPending);
    assert!(!err.is_user_facing());
    assert_eq!(engine.current_view_model(), view);
    assert_eq!(engine.pending_transaction().unwrap().plan_id, "hour");

    gateway.wait_for_purchase_calls(1).await;
    assert_eq!(gateway.purchase_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_syncs_coalesce() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, active(100)).await;

    let (first, second, third, _) = tokio::join!(
        engine.force_sync(),
        engine.force_sync(),
        engine.force_sync(),
        async {
            gateway.wait_for_status_calls(2).await;
            gateway.release_status(Ok(active(90)));
        }
    );
    assert_eq!(first, Ok(SyncOutcome::Applied));
    assert_eq!(second, Ok(SyncOutcome::Coalesced));
    assert_eq!(third, Ok(SyncOutcome::Coalesced));

    // Exactly one rerun for both coalesced triggers.
    gateway.wait_for_status_calls(3).await;
    gateway.release_status(Ok(active(80)));
    for _ in 0..100 {
        if engine.status().unwrap().remaining_seconds == 80 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.status().unwrap().remaining_seconds, 80);
    assert_eq!(gateway.status_calls(), 3);
    assert_eq!(gateway.held_status(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_after_reconciliation_resyncs() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, active(100)).await;

    let handle = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();
    let (synced, _) = tokio::join!(engine.force_sync(), async {
        gateway.wait_for_status_calls(2).await;
        gateway.release_status(Ok(active(98)));
    });
    assert_eq!(synced, Ok(SyncOutcome::Applied));
    assert_eq!(engine.status().unwrap().remaining_seconds, 98);

    gateway.wait_for_purchase_calls(1).await;
    gateway.release_purchase(Err(GatewayError::rejected("declined")));
    assert!(handle.settled().await.is_err());
    assert_eq!(engine.status().unwrap().remaining_seconds, 100);

    gateway.wait_for_status_calls(3).await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_ignores_late_completions() {
    let gateway = ScriptedGateway::new();
    let engine = scripted_engine(&gateway);
    mount_with(&engine, &gateway, active(100)).await;
    let events = record_events(&engine);

    let syncing = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.force_sync().await })
    };
    gateway.wait_for_status_calls(2).await;
    let handle = engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap();
    gateway.wait_for_purchase_calls(1).await;

    engine.dispose();
    let frozen = engine.status();

    gateway.release_status(Ok(active(999)));
    gateway.release_purchase(Ok(active(5000)));

    assert_eq!(syncing.await.unwrap(), Err(SyncError::Disposed));
    assert_eq!(handle.settled().await, Err(SyncError::Disposed));
    assert_eq!(engine.status(), frozen);
    assert!(!engine.current_view_model().updating);
    assert!(matches!(events.lock().unwrap().last(), Some(EngineEvent::Disposed)));
    assert_eq!(
        engine.begin_transaction(PurchaseKind::Extend, "hour").unwrap_err(),
        SyncError::Disposed
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_sync_leaves_state() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(100);
    let engine = simulated_engine(&backend);
    let events = record_events(&engine);
    engine.mount().await.unwrap();
    let before = engine.status();

    backend.fail_next_status(1);
    let err = engine.force_sync().await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch(GatewayError::Transport(_))));
    assert_eq!(engine.status(), before);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, EngineEvent::SyncFailed(SyncError::Fetch(_)))));

    assert_eq!(engine.force_sync().await, Ok(SyncOutcome::Applied));
}

#[tokio::test(start_paused = true)]
async fn test_failed_mount_recovers() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(600);
    backend.fail_next_status(1);
    let engine = simulated_engine(&backend);

    assert!(engine.mount().await.is_err());
    assert!(!engine.current_view_model().known);

    time::sleep(Duration::from_millis(1_500)).await;
    assert!(engine.current_view_model().known);
    assert_eq!(backend.status_calls(), 2);

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_mount_recovers_through_polling() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(600);
    backend.fail_next_status(2);
    let engine = simulated_engine(&backend);

    assert!(engine.mount().await.is_err());
    time::sleep(Duration::from_millis(1_500)).await;
    assert!(!engine.current_view_model().known);
    assert_eq!(backend.status_calls(), 2);

    time::sleep(Duration::from_secs(30)).await;
    assert!(engine.current_view_model().known);
    assert_eq!(backend.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_polling_runs_only_while_active() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    backend.set_remaining(600);
    let engine = simulated_engine(&backend);
    engine.mount().await.unwrap();

    time::sleep(Duration::from_secs(61)).await;
    assert_eq!(backend.status_calls(), 3);

    let expired_backend = SimulatedBackend::new(TestFixtures::plans());
    let expired_engine = simulated_engine(&expired_backend);
    expired_engine.mount().await.unwrap();

    time::sleep(Duration::from_secs(95)).await;
    assert_eq!(expired_backend.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_plan_refresh_failure_keeps_catalog() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    let engine = simulated_engine(&backend);
    let events = record_events(&engine);
    engine.mount().await.unwrap();
    assert_eq!(engine.plans().len(), 3);

    backend.set_plans_failure(true);
    let err = engine.refresh_plans().await.unwrap_err();
    assert!(matches!(err, SyncError::Plans(GatewayError::Server { status: 503, .. })));
    assert_eq!(engine.plans().len(), 3);

    backend.set_plans_failure(false);
    backend.set_plans(Vec::new());
    assert_eq!(engine.refresh_plans().await, Ok(Vec::new()));
    assert!(engine.current_view_model().plans.is_empty());
    assert_eq!(
        engine.begin_transaction(PurchaseKind::Purchase, "trial").unwrap_err(),
        SyncError::UnknownPlan("trial".into())
    );

    let updates = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, EngineEvent::PlansUpdated(_)))
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test(start_paused = true)]
async fn test_torn_down_session_reports_closed() {
    let backend = SimulatedBackend::new(TestFixtures::plans());
    let session = Arc::new(Session::init("viewer-logout", "token"));
    let engine =
        SubscriptionEngine::new(session.clone(), backend.clone(), EngineConfig::default()).unwrap();
    engine.mount().await.unwrap();

    session.teardown();
    assert_eq!(engine.force_sync().await, Err(SyncError::SessionClosed));
    assert_eq!(
        engine.refresh_plans().await,
        Err(SyncError::SessionClosed)
    );
}
