#![forbid(unsafe_code)]

pub mod access;
pub mod account_service;
pub mod app_services;
pub mod config;
pub mod content_service;
pub mod error;
pub mod history_service;
pub mod identity;
pub mod next_content;
pub mod profile_service;
pub mod watch_progress;

pub use course_core::Clock;

pub use access::{AccessDecision, AccessGate, DenialReason};
pub use account_service::AccountService;
pub use app_services::AppServices;
pub use config::BackendConfig;
pub use content_service::{ChapterPage, ContentService, VideoPage};
pub use error::{
    AccountError, AppServicesError, ConfigError, ContentError, HistoryError, IdentityError,
    ProfileServiceError,
};
pub use history_service::{HistoryEntry, HistoryService};
pub use identity::{HostedIdentity, IdentityProvider, InMemoryIdentity, SessionContext};
pub use next_content::NextContentResolver;
pub use profile_service::ProfileService;
pub use watch_progress::{PlaybackEngine, TrackerNotice, WatchProgressTracker};
