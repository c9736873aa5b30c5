//! Sign-in state and the provider that owns it.
//!
//! A provider publishes every session change into its `SessionContext`.
//! Everything that needs the viewer's identity takes that context
//! explicitly; nothing reads session state from a global.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{AuthSession, UserId};
use storage::remote::AccessTokenSource;
use tokio::sync::watch;

use crate::error::IdentityError;

mod hosted;
mod memory;

pub use hosted::HostedIdentity;
pub use memory::InMemoryIdentity;

/// Shared handle to the current session.
///
/// Clones observe the same state. Subscribers are woken on every change.
#[derive(Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<Option<AuthSession>>>,
}

impl SessionContext {
    /// A context with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn signed_in(session: AuthSession) -> Self {
        let context = Self::new();
        context.publish(Some(session));
        context
    }

    #[must_use]
    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.tx.borrow().as_ref().map(AuthSession::user_id)
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The session, unless it expired before `now`.
    #[must_use]
    pub fn active_session(&self, now: DateTime<Utc>) -> Option<AuthSession> {
        self.tx
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    /// The signed-in user, unless the session expired before `now`.
    #[must_use]
    pub fn active_user_id(&self, now: DateTime<Utc>) -> Option<UserId> {
        self.tx
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired(now))
            .map(AuthSession::user_id)
    }

    /// Replace the session and notify subscribers.
    pub fn publish(&self, session: Option<AuthSession>) {
        self.tx.send_replace(session);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user_id", &self.user_id())
            .finish()
    }
}

impl AccessTokenSource for SessionContext {
    fn access_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.access_token.clone())
    }
}

/// Managed authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The context this provider publishes into.
    fn session_context(&self) -> SessionContext;

    /// The current session, refreshed first if it has expired and can be.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if a refresh was attempted and failed.
    async fn current_session(&self) -> Result<Option<AuthSession>, IdentityError>;

    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` for bad credentials.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    /// Create an account. Returns `None` when the provider requires email
    /// confirmation before issuing a session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` if the account cannot be created.
    async fn sign_up(&self, email: &str, password: &str)
    -> Result<Option<AuthSession>, IdentityError>;

    /// End the session. The context is cleared even if the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the provider could not revoke the token.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// # Errors
    ///
    /// Returns `IdentityError` if the provider refuses or cannot be reached.
    async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    /// Set a new password for the account that owns `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` for an invalid or expired token.
    async fn update_password(&self, access_token: &str, password: &str)
    -> Result<(), IdentityError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::session_for;

    #[test]
    fn publish_updates_every_clone() {
        let context = SessionContext::new();
        let other = context.clone();
        assert!(!other.is_signed_in());
        assert!(other.access_token().is_none());

        let user = UserId::random();
        context.publish(Some(session_for(user)));
        assert_eq!(other.user_id(), Some(user));
        assert_eq!(other.access_token(), Some(format!("token-{user}")));

        context.publish(None);
        assert!(other.current().is_none());
    }

    #[test]
    fn expired_sessions_are_not_active() {
        use course_core::time::fixed_now;

        let user = UserId::random();
        let live = SessionContext::signed_in(session_for(user));
        assert_eq!(live.active_user_id(fixed_now()), Some(user));
        assert!(live.active_session(fixed_now()).is_some());

        let stale = SessionContext::signed_in(test_support::expired_session_for(user));
        assert!(stale.is_signed_in());
        assert!(stale.active_user_id(fixed_now()).is_none());
        assert!(stale.active_session(fixed_now()).is_none());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let context = SessionContext::new();
        let mut rx = context.subscribe();
        let user = UserId::random();
        context.publish(Some(session_for(user)));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(AuthSession::user_id), Some(user));
    }
}
