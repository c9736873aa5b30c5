use std::sync::Arc;

use course_core::model::VideoId;
use storage::repository::{Storage, WatchStatusRepository};

use crate::Clock;
use crate::access::AccessGate;
use crate::account_service::AccountService;
use crate::config::BackendConfig;
use crate::content_service::ContentService;
use crate::error::AppServicesError;
use crate::history_service::HistoryService;
use crate::identity::{HostedIdentity, IdentityProvider, SessionContext};
use crate::profile_service::ProfileService;
use crate::watch_progress::WatchProgressTracker;

/// Assembles app-facing services around one session context.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    session: SessionContext,
    watch_status: Arc<dyn WatchStatusRepository>,
    content: Arc<ContentService>,
    history: Arc<HistoryService>,
    profiles: Arc<ProfileService>,
    accounts: Arc<AccountService>,
}

impl AppServices {
    /// Build services against the hosted backend. Data requests carry the
    /// token of whoever is signed in through the returned account service.
    #[must_use]
    pub fn remote(config: &BackendConfig, clock: Clock) -> Self {
        let session = SessionContext::new();
        let identity = Arc::new(HostedIdentity::new(config.clone(), session.clone(), clock));
        let storage = Storage::remote(config.remote(), Arc::new(session.clone()));
        Self::from_parts(storage, identity, clock)
    }

    /// Build services backed by a local `SQLite` mirror.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        identity: Arc<dyn IdentityProvider>,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_parts(storage, identity, clock))
    }

    /// Wire services over an existing storage aggregate. The session context
    /// is the identity provider's.
    #[must_use]
    pub fn from_parts(storage: Storage, identity: Arc<dyn IdentityProvider>, clock: Clock) -> Self {
        let session = identity.session_context();
        let gate = AccessGate::new(clock, Arc::clone(&storage.profiles));
        let content = Arc::new(ContentService::new(
            Arc::clone(&storage.chapters),
            Arc::clone(&storage.videos),
            gate,
        ));
        let history = Arc::new(HistoryService::new(
            clock,
            Arc::clone(&storage.watch_status),
            Arc::clone(&storage.videos),
        ));
        let profiles = Arc::new(ProfileService::new(clock, Arc::clone(&storage.profiles)));
        let accounts = Arc::new(AccountService::new(identity));

        Self {
            clock,
            session,
            watch_status: storage.watch_status,
            content,
            history,
            profiles,
            accounts,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// A tracker for one player showing `video_id`.
    #[must_use]
    pub fn tracker(&self, video_id: VideoId) -> WatchProgressTracker {
        WatchProgressTracker::new(
            Arc::clone(&self.watch_status),
            self.clock,
            self.session.clone(),
            video_id,
        )
    }

    #[must_use]
    pub fn content(&self) -> Arc<ContentService> {
        Arc::clone(&self.content)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn accounts(&self) -> Arc<AccountService> {
        Arc::clone(&self.accounts)
    }
}
