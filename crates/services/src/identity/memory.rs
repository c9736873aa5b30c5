use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_core::model::{AuthSession, AuthUser, UserId};

use super::{IdentityProvider, SessionContext};
use crate::error::IdentityError;

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    reset_requests: Vec<String>,
}

/// Local identity provider for tests and offline runs. Sessions never expire.
#[derive(Clone, Default)]
pub struct InMemoryIdentity {
    context: SessionContext,
    state: Arc<Mutex<State>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> IdentityError {
    IdentityError::Malformed(e.to_string())
}

fn local_session(user_id: UserId, email: &str) -> AuthSession {
    AuthSession {
        access_token: format!("local-{user_id}"),
        refresh_token: None,
        expires_at: None,
        user: AuthUser {
            id: user_id,
            email: Some(email.to_owned()),
        },
    }
}

impl InMemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that starts signed in as `user_id`.
    #[must_use]
    pub fn signed_in_as(user_id: UserId) -> Self {
        let identity = Self::new();
        identity
            .context
            .publish(Some(local_session(user_id, "dev@localhost")));
        identity
    }

    /// Register an account up front.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Malformed` if the lock is poisoned.
    pub fn add_account(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        let user_id = UserId::random();
        self.state.lock().map_err(poisoned)?.accounts.insert(
            email.to_owned(),
            Account {
                user_id,
                password: password.to_owned(),
            },
        );
        Ok(user_id)
    }

    /// Emails that asked for a reset link, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Malformed` if the lock is poisoned.
    pub fn reset_requests(&self) -> Result<Vec<String>, IdentityError> {
        Ok(self.state.lock().map_err(poisoned)?.reset_requests.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    fn session_context(&self) -> SessionContext {
        self.context.clone()
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        Ok(self.context.current())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let account = {
            let state = self.state.lock().map_err(poisoned)?;
            state.accounts.get(email).cloned()
        };
        let account = account
            .filter(|a| a.password == password)
            .ok_or_else(|| IdentityError::Rejected {
                status: 400,
                message: "Invalid login credentials".into(),
            })?;
        let session = local_session(account.user_id, email);
        self.context.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, IdentityError> {
        let user_id = {
            let mut state = self.state.lock().map_err(poisoned)?;
            if state.accounts.contains_key(email) {
                return Err(IdentityError::Rejected {
                    status: 422,
                    message: "User already registered".into(),
                });
            }
            let user_id = UserId::random();
            state.accounts.insert(
                email.to_owned(),
                Account {
                    user_id,
                    password: password.to_owned(),
                },
            );
            user_id
        };
        let session = local_session(user_id, email);
        self.context.publish(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.context.publish(None);
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        self.state
            .lock()
            .map_err(poisoned)?
            .reset_requests
            .push(email.to_owned());
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().map_err(poisoned)?;
        let account = state
            .accounts
            .values_mut()
            .find(|a| format!("local-{}", a.user_id) == access_token)
            .ok_or_else(|| IdentityError::Rejected {
                status: 401,
                message: "Invalid token".into(),
            })?;
        password.clone_into(&mut account.password);
        Ok(())
    }
}
