//! Test fixtures.

use crate::{Plan, Session};

/// Collection of commonly used test fixtures.
pub struct TestFixtures;

impl TestFixtures {
    /// Half-hour trial pass.
    pub const TRIAL_SECONDS: u64 = 1800;
    /// One-hour pass.
    pub const HOUR_SECONDS: u64 = 3600;
    /// Thirty-day pass.
    pub const MONTH_SECONDS: u64 = 30 * 86_400;

    /// Sample plan catalog.
    pub fn plans() -> Vec<Plan> {
        vec![
            Plan::new("trial", Self::TRIAL_SECONDS).with_display("Trial", "0.99", "USD"),
            Plan::new("hour", Self::HOUR_SECONDS).with_display("One Hour", "1.99", "USD"),
            Plan::new("month", Self::MONTH_SECONDS).with_display("Monthly", "9.99", "USD"),
        ]
    }

    /// Look up one of the sample plans.
    pub fn plan(plan_id: &str) -> Option<Plan> {
        Self::plans().into_iter().find(|p| p.plan_id == plan_id)
    }

    /// An active session for a throwaway viewer.
    pub fn session() -> Session {
        Session::init("viewer-test", "test-token")
    }
}
