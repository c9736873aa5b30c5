use std::sync::Arc;

use course_core::Clock;
use course_core::model::Video;
use storage::repository::{ProfileRepository, StorageError};
use tracing::{debug, warn};

use crate::identity::SessionContext;

/// Why a gated video stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    SignInRequired,
    /// Signed in, but the profile is missing, unreadable, or does not carry
    /// the member role.
    NotPermitted,
}

impl DenialReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            DenialReason::SignInRequired => "Sign in to watch this content.",
            DenialReason::NotPermitted => "You do not have permission to watch this content.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied(DenialReason),
}

impl AccessDecision {
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Decides whether the viewer may play a video.
///
/// Public videos are always open. Authenticated videos need an unexpired
/// session and a profile whose role unlocks member content; the role is
/// looked up on every check.
#[derive(Clone)]
pub struct AccessGate {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
}

impl AccessGate {
    #[must_use]
    pub fn new(clock: Clock, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { clock, profiles }
    }

    pub async fn check(&self, session: &SessionContext, video: &Video) -> AccessDecision {
        if !video.access_level.requires_sign_in() {
            return AccessDecision::Granted;
        }
        let Some(user_id) = session.active_user_id(self.clock.now()) else {
            if session.is_signed_in() {
                debug!(video_id = %video.id, "session expired");
            }
            return AccessDecision::Denied(DenialReason::SignInRequired);
        };
        match self.profiles.get_profile(user_id).await {
            Ok(profile) if profile.role.unlocks_member_content() => AccessDecision::Granted,
            Ok(profile) => {
                debug!(%user_id, role = %profile.role, video_id = %video.id, "role does not unlock video");
                AccessDecision::Denied(DenialReason::NotPermitted)
            }
            Err(StorageError::NotFound) => {
                debug!(%user_id, "no profile row");
                AccessDecision::Denied(DenialReason::NotPermitted)
            }
            Err(err) => {
                warn!(%user_id, error = %err, "profile lookup failed");
                AccessDecision::Denied(DenialReason::NotPermitted)
            }
        }
    }
}
