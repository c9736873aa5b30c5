//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ProfileError, RouteError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::access::DenialReason;

/// Errors emitted by the identity provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// The provider answered but refused the request (bad credentials,
    /// weak password, expired link, ...).
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("no active session")]
    NoSession,
    #[error("unexpected identity response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ContentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error(transparent)]
    InvalidRoute(#[from] RouteError),
    #[error("chapter not found")]
    ChapterNotFound,
    #[error("video not found")]
    VideoNotFound,
    #[error("access denied: {0:?}")]
    AccessDenied(DenialReason),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ContentError {
    /// Text shown to the viewer in place of the page.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            ContentError::InvalidRoute(_) => "Invalid link.",
            ContentError::ChapterNotFound => "Chapter not found.",
            ContentError::VideoNotFound => "Content not found.",
            ContentError::AccessDenied(reason) => reason.message(),
            ContentError::Storage(_) => "Could not load content. Please try again later.",
        }
    }
}

/// Errors emitted by `HistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("sign in to see your watch history")]
    NotSignedIn,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileServiceError {
    #[error("sign in to edit your profile")]
    NotSignedIn,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AccountService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccountError {
    #[error("email is required")]
    MissingEmail,
    #[error("password is required")]
    MissingPassword,
    #[error("invalid reset link")]
    InvalidResetLink,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Errors emitted while reading backend configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
