use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use course_core::Clock;
use course_core::model::{AuthSession, AuthUser, UserId};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{IdentityProvider, SessionContext};
use crate::config::BackendConfig;
use crate::error::IdentityError;

/// Identity provider backed by the hosted auth endpoints (`/auth/v1`).
#[derive(Clone)]
pub struct HostedIdentity {
    client: Client,
    config: BackendConfig,
    context: SessionContext,
    clock: Clock,
}

impl HostedIdentity {
    #[must_use]
    pub fn new(config: BackendConfig, context: SessionContext, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            config,
            context,
            clock,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.config.auth_url(path))
            .header("apikey", self.config.anon_key())
            .bearer_auth(self.config.anon_key())
    }

    async fn checked(response: Response) -> Result<Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(rejected(status.as_u16(), &body))
    }

    async fn password_grant(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let response = self
            .post("token?grant_type=password")
            .json(&Credentials { email, password })
            .send()
            .await?;
        let token: TokenResponse = Self::checked(response).await?.json().await?;
        token.into_session(self.clock.now())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, IdentityError> {
        let response = self
            .post("token?grant_type=refresh_token")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let token: TokenResponse = Self::checked(response).await?.json().await?;
        token.into_session(self.clock.now())
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    fn session_context(&self) -> SessionContext {
        self.context.clone()
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        let Some(session) = self.context.current() else {
            return Ok(None);
        };
        if !session.is_expired(self.clock.now()) {
            return Ok(Some(session));
        }
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            debug!("session expired without a refresh token");
            self.context.publish(None);
            return Ok(None);
        };
        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                self.context.publish(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(err) => {
                warn!(error = %err, "session refresh failed");
                self.context.publish(None);
                Err(err)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let session = self.password_grant(email, password).await?;
        info!(user_id = %session.user_id(), "signed in");
        self.context.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, IdentityError> {
        let response = self
            .post("signup")
            .json(&Credentials { email, password })
            .send()
            .await?;
        let body: SignUpResponse = Self::checked(response).await?.json().await?;
        let Some(token) = body.session else {
            info!("account created; confirmation pending");
            return Ok(None);
        };
        let session = token.into_session(self.clock.now())?;
        self.context.publish(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.context.current() else {
            return Ok(());
        };
        self.context.publish(None);
        let response = self
            .client
            .post(self.config.auth_url("logout"))
            .header("apikey", self.config.anon_key())
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        Self::checked(response).await?;
        info!(user_id = %session.user_id(), "signed out");
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let response = self
            .post("recover")
            .json(&EmailOnly { email })
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let response = self
            .client
            .put(self.config.auth_url("user"))
            .header("apikey", self.config.anon_key())
            .bearer_auth(access_token)
            .json(&PasswordOnly { password })
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct EmailOnly<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct PasswordOnly<'a> {
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserBody,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<AuthSession, IdentityError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Some(
                DateTime::<Utc>::from_timestamp(at, 0)
                    .ok_or_else(|| IdentityError::Malformed(format!("expires_at {at}")))?,
            ),
            (None, Some(secs)) => Some(now + Duration::seconds(secs)),
            (None, None) => None,
        };
        Ok(AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: AuthUser {
                id: UserId::new(self.user.id),
                email: self.user.email,
            },
        })
    }
}

/// Sign-up answers with a full token response when accounts are
/// auto-confirmed and with the bare user otherwise.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(flatten)]
    session: Option<TokenResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn rejected(status: u16, body: &str) -> IdentityError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_owned());
    IdentityError::Rejected { status, message }
}
