use std::sync::Arc;

use course_core::Clock;
use course_core::model::{Profile, UserId, normalize_username};
use storage::repository::{ProfileRepository, StorageError};
use tracing::{info, warn};

use crate::error::ProfileServiceError;
use crate::identity::SessionContext;

/// Reads and edits the signed-in viewer's profile.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    #[must_use]
    pub fn new(clock: Clock, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { clock, profiles }
    }

    fn viewer(&self, session: &SessionContext) -> Result<UserId, ProfileServiceError> {
        session
            .active_user_id(self.clock.now())
            .ok_or(ProfileServiceError::NotSignedIn)
    }

    /// The viewer's profile, or `None` if no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::NotSignedIn` without a session, or
    /// `ProfileServiceError::Storage` if the lookup fails.
    pub async fn profile(
        &self,
        session: &SessionContext,
    ) -> Result<Option<Profile>, ProfileServiceError> {
        let user_id = self.viewer(session)?;
        match self.profiles.get_profile(user_id).await {
            Ok(profile) => Ok(Some(profile)),
            Err(StorageError::NotFound) => Ok(None),
            Err(err) => {
                warn!(%user_id, error = %err, "could not load profile");
                Err(err.into())
            }
        }
    }

    /// # Errors
    ///
    /// See `profile`.
    pub async fn username(
        &self,
        session: &SessionContext,
    ) -> Result<Option<String>, ProfileServiceError> {
        Ok(self.profile(session).await?.and_then(|p| p.username))
    }

    /// Upsert the username keyed on the viewer's user id.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` for a blank name (checked before
    /// any lookup), `NotSignedIn` without a session, or `Storage` if the write fails.
    pub async fn save_username(
        &self,
        session: &SessionContext,
        raw: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let username = normalize_username(raw)?;
        let user_id = self.viewer(session)?;
        let profile = self
            .profiles
            .upsert_username(user_id, &username)
            .await
            .inspect_err(|err| warn!(%user_id, error = %err, "could not save username"))?;
        info!(%user_id, "username updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::{expired_session_for, session_for};
    use course_core::model::ProfileError;
    use course_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn missing_profile_is_none() {
        let service = ProfileService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let session = SessionContext::signed_in(session_for(UserId::random()));
        assert_eq!(service.username(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_instead_of_duplicating() {
        let repo = InMemoryRepository::new();
        let service = ProfileService::new(fixed_clock(), Arc::new(repo.clone()));
        let user = UserId::random();
        let session = SessionContext::signed_in(session_for(user));

        service.save_username(&session, "  first ").await.unwrap();
        service.save_username(&session, "second").await.unwrap();

        assert_eq!(
            service.username(&session).await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(repo.get_profile(user).await.unwrap().user_id, user);

        let stale = SessionContext::signed_in(expired_session_for(user));
        assert!(matches!(
            service.save_username(&stale, "third").await,
            Err(ProfileServiceError::NotSignedIn)
        ));
        assert_eq!(
            service.username(&session).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_session_check() {
        let service = ProfileService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        assert!(matches!(
            service.save_username(&SessionContext::new(), "   ").await,
            Err(ProfileServiceError::Profile(ProfileError::EmptyUsername))
        ));
        assert!(matches!(
            service.save_username(&SessionContext::new(), "kei").await,
            Err(ProfileServiceError::NotSignedIn)
        ));
    }
}
