use std::sync::Arc;

use course_core::model::AuthSession;
use tracing::info;

use crate::error::AccountError;
use crate::identity::{IdentityProvider, SessionContext};

fn required<'a>(value: &'a str, missing: AccountError) -> Result<&'a str, AccountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(missing)
    } else {
        Ok(trimmed)
    }
}

/// Sign-in, registration and password flows over the identity provider.
#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
}

impl AccountService {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    #[must_use]
    pub fn session_context(&self) -> SessionContext {
        self.identity.session_context()
    }

    /// The signed-in session, refreshed by the provider if it has expired.
    /// An expired session that cannot be refreshed is dropped.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Identity` if a refresh was attempted and failed.
    pub async fn current_session(&self) -> Result<Option<AuthSession>, AccountError> {
        Ok(self.identity.current_session().await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::MissingEmail`/`MissingPassword` before calling the
    /// provider, or `AccountError::Identity` if it rejects the credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AccountError> {
        let email = required(email, AccountError::MissingEmail)?;
        if password.is_empty() {
            return Err(AccountError::MissingPassword);
        }
        Ok(self.identity.sign_in(email, password).await?)
    }

    /// Returns `None` when the account still needs email confirmation.
    ///
    /// # Errors
    ///
    /// Same as `sign_in`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, AccountError> {
        let email = required(email, AccountError::MissingEmail)?;
        if password.is_empty() {
            return Err(AccountError::MissingPassword);
        }
        let session = self.identity.sign_up(email, password).await?;
        info!(confirmed = session.is_some(), "account registered");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Identity` if the provider call fails. The local
    /// session is cleared either way.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        Ok(self.identity.sign_out().await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::MissingEmail` for blank input, or
    /// `AccountError::Identity` if the provider refuses.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let email = required(email, AccountError::MissingEmail)?;
        self.identity.request_password_reset(email).await?;
        info!("password reset requested");
        Ok(())
    }

    /// Finish a reset with the token carried by the emailed link.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidResetLink` without a token,
    /// `PasswordMismatch` when the confirmation differs, `MissingPassword` for
    /// an empty password, or `Identity` if the provider refuses.
    pub async fn reset_password(
        &self,
        access_token: Option<&str>,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AccountError> {
        let token = access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AccountError::InvalidResetLink)?;
        if password != confirmation {
            return Err(AccountError::PasswordMismatch);
        }
        if password.is_empty() {
            return Err(AccountError::MissingPassword);
        }
        self.identity.update_password(token, password).await?;
        info!("password updated");
        Ok(())
    }
}
