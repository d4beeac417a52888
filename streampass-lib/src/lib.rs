//! StreamPass library.
//!
//! Shared vocabulary for the StreamPass access-pass client: the subscription
//! status and plan types, the explicit user [`Session`], the error taxonomy
//! and the [`RemoteStateGateway`] trait through which the sync engine reaches
//! the backend.
//!
//! The crate stays stateless apart from the session; transport is injected
//! through the gateway trait.
//!
//! # Features
//!
//! - **Gateway abstraction**: trait-based access to status, plans and purchases
//! - **Boundary validation**: wire payloads are checked before they reach the engine
//! - **HTTP gateway** (`http-gateway`): reqwest-backed implementation
//! - **Simulated backend** (`test-utils`): in-memory server for tests and demos
//!
//! # Example
//!
//! ```
//! use streampass_lib::{Plan, SubscriptionStatus};
//!
//! let status = SubscriptionStatus::from_remaining(90, None);
//! assert!(status.is_active);
//!
//! let plan = Plan::new("monthly", 30 * 86_400).with_display("Monthly", "9.99", "USD");
//! assert_eq!(plan.duration_seconds, 2_592_000);
//! ```

pub mod config;
pub mod errors;
pub mod gateway;
pub mod session;
pub mod types;
pub mod wire;

/// Test utilities for exercising the engine against an in-memory backend.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::GatewayConfig;
pub use errors::{GatewayError, GatewayErrorCode};
pub use gateway::{HttpGateway, RemoteStateGateway};
pub use session::Session;
pub use types::{Plan, SubscriptionStatus};

/// Common result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
