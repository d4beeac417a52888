//! Explicit user session.
//!
//! A [`Session`] is created when the host has verified a login token and is
//! torn down on logout. It is passed by reference into the sync engine and
//! into every gateway call; there is no ambient global auth state.
//!
//! # Thread Safety
//!
//! The token is kept behind an `RwLock`. Poisoned locks are recovered with
//! `into_inner` since the guarded data is a plain `Option<String>`.

use crate::{GatewayError, Result};
use std::sync::RwLock;

/// Authenticated user session.
#[derive(Debug)]
pub struct Session {
    user_id: String,
    token: RwLock<Option<String>>,
}

impl Session {
    /// Initialize a session after the token has been verified.
    pub fn init(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: RwLock::new(Some(token.into())),
        }
    }

    /// User this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Check whether the session is still usable.
    pub fn is_active(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Bearer token for outgoing requests.
    ///
    /// Returns [`GatewayError::SessionClosed`] once the session was torn down.
    pub fn bearer_token(&self) -> Result<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(GatewayError::SessionClosed)
    }

    /// Replace the token after a refresh.
    pub fn refresh(&self, token: impl Into<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token.into());
    }

    /// Tear down the session (logout). Idempotent.
    pub fn teardown(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}
