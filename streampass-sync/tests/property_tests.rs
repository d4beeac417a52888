//! Property-based tests for streampass-sync
//!
//! Random interleavings of ticks, fetches and transactions against the sync
//! core, checking the ordering and exactness rules after every step.

#[cfg(test)]
mod core_properties {
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use streampass_lib::test_utils::TestFixtures;
    use streampass_lib::{GatewayError, SubscriptionStatus};
    use streampass_sync::{PurchaseKind, SyncCore, SyncError, SyncRequest, SyncTicket};

    #[derive(Debug, Clone)]
    enum Op {
        Tick,
        Request,
        Complete(Option<u64>),
        Begin(bool, usize),
        Settle(Option<u64>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Tick),
            2 => Just(Op::Request),
            2 => proptest::option::of(0u64..10_000).prop_map(Op::Complete),
            1 => (any::<bool>(), 0usize..3).prop_map(|(extend, plan)| Op::Begin(extend, plan)),
            1 => proptest::option::of(0u64..10_000).prop_map(Op::Settle),
        ]
    }

    fn reply(remaining: Option<u64>) -> Result<SubscriptionStatus, GatewayError> {
        remaining
            .map(|r| SubscriptionStatus::from_remaining(r, None))
            .ok_or_else(|| GatewayError::Transport("injected".into()))
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    proptest! {
        /// Every interleaving keeps the core's invariants.
        #[test]
        fn interleavings_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..80)) {
            let plans = TestFixtures::plans();
            let mut core = SyncCore::new();
            core.replace_plans(plans.clone()).unwrap();
            let mut in_flight: Option<SyncTicket> = None;

            for op in ops {
                match op {
                    Op::Tick => {
                        let before = core.status().map(|s| s.remaining_seconds);
                        core.tick(now());
                        let after = core.status().map(|s| s.remaining_seconds);
                        prop_assert_eq!(after, before.map(|r| r.saturating_sub(1)));
                    }
                    Op::Request => match core.request_sync().unwrap() {
                        SyncRequest::Issued(ticket) => {
                            prop_assert!(in_flight.is_none(), "two fetches in flight");
                            in_flight = Some(ticket);
                        }
                        SyncRequest::Coalesced => prop_assert!(in_flight.is_some()),
                    },
                    Op::Complete(remaining) => {
                        if let Some(ticket) = in_flight.take() {
                            let stale = ticket.seq() <= core.scheduler().write_floor();
                            let before = core.status().cloned();
                            let result = reply(remaining);
                            let done = core.complete_sync(ticket, result.clone());

                            match result {
                                Ok(server) if !stale => prop_assert_eq!(core.status(), Some(&server)),
                                _ => prop_assert_eq!(core.status().cloned(), before),
                            }
                            in_flight = done.rerun;
                        }
                    }
                    Op::Begin(extend, index) => {
                        let kind = if extend { PurchaseKind::Extend } else { PurchaseKind::Purchase };
                        let was_pending = core.is_updating();
                        let before = core.status().cloned();

                        let result = core.begin(kind, &plans[index].plan_id, now());
                        if was_pending {
                            prop_assert_eq!(result, Err(SyncError::TransactionPending));
                            prop_assert_eq!(core.status().cloned(), before);
                        } else {
                            let pending = result.unwrap();
                            prop_assert_eq!(pending.snapshot, before);
                            prop_assert_eq!(core.status(), Some(&pending.guessed_status));
                        }
                    }
                    Op::Settle(remaining) => {
                        if let Some(pending) = core.pending().cloned() {
                            let result = reply(remaining);
                            core.settle(pending.id, result.clone()).unwrap();
                            match result {
                                Ok(server) => prop_assert_eq!(core.status(), Some(&server)),
                                Err(_) => prop_assert_eq!(core.status().cloned(), pending.snapshot),
                            }
                        }
                    }
                }

                if let Some(status) = core.status() {
                    prop_assert_eq!(status.is_active, status.remaining_seconds > 0);
                }
                prop_assert_eq!(core.view_model().updating, core.pending().is_some());
            }
        }

        /// Stale responses never reach the visible status.
        #[test]
        fn fetch_before_any_write_is_stale(server in 0u64..100_000, plan in 0usize..3) {
            let plans = TestFixtures::plans();
            let mut core = SyncCore::new();
            core.replace_plans(plans.clone()).unwrap();

            let ticket = match core.request_sync().unwrap() {
                SyncRequest::Issued(ticket) => ticket,
                SyncRequest::Coalesced => unreachable!(),
            };
            let pending = core.begin(PurchaseKind::Purchase, &plans[plan].plan_id, now()).unwrap();
            core.complete_sync(ticket, reply(Some(server)));

            prop_assert_eq!(core.status(), Some(&pending.guessed_status));
        }
    }
}
