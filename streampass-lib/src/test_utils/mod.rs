//! Test utilities for StreamPass.
//!
//! This module provides:
//! - A simulated backend implementing [`RemoteStateGateway`](crate::RemoteStateGateway)
//!   with a real expiry instant, latency and failure injection
//! - Fixture plans matching a typical video-platform catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use streampass_lib::test_utils::{SimulatedBackend, TestFixtures};
//!
//! let backend = SimulatedBackend::new(TestFixtures::plans());
//! backend.set_remaining(5);
//! backend.reject_purchases("payment rejected");
//! ```

mod fixtures;
mod simulated;

pub use fixtures::TestFixtures;
pub use simulated::{BackendConfig, SimulatedBackend};
