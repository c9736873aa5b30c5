//! Per-player watch progress: load or create the viewer's row when the
//! player mounts, resume once, and write the position on every tick.
//!
//! Failures never stop playback. They are logged and kept as a
//! `TrackerNotice` for the surface to show.

use std::sync::Arc;

use course_core::Clock;
use course_core::model::{UserId, VideoId, WatchStatus};
use course_core::progress::ProgressSnapshot;
use storage::repository::{StorageError, WatchStatusRepository};
use tracing::{debug, info, warn};

use crate::identity::SessionContext;

/// The player's native controls, as far as the tracker needs them.
pub trait PlaybackEngine {
    /// Media length in seconds. May be 0 until metadata has loaded.
    fn duration(&self) -> f64;

    fn seek_to(&mut self, seconds: u32);
}

/// Something the viewer should know about, without blocking playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerNotice {
    NotSignedIn,
    LoadFailed(String),
    SaveFailed(String),
    Playback(String),
}

impl TrackerNotice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            TrackerNotice::NotSignedIn => "Sign in to save your progress.".into(),
            TrackerNotice::LoadFailed(_) => "Could not load your watch progress.".into(),
            TrackerNotice::SaveFailed(_) => "Could not save your watch progress.".into(),
            TrackerNotice::Playback(reason) => format!("Video could not be played: {reason}"),
        }
    }
}

/// Tracks one mounted player for one video.
pub struct WatchProgressTracker {
    watch: Arc<dyn WatchStatusRepository>,
    clock: Clock,
    session: SessionContext,
    video_id: VideoId,
    last_position: u32,
    watch_count: u32,
    completed: bool,
    duration: f64,
    has_seeked: bool,
    row_loaded: bool,
    notice: Option<TrackerNotice>,
}

impl WatchProgressTracker {
    #[must_use]
    pub fn new(
        watch: Arc<dyn WatchStatusRepository>,
        clock: Clock,
        session: SessionContext,
        video_id: VideoId,
    ) -> Self {
        Self {
            watch,
            clock,
            session,
            video_id,
            last_position: 0,
            watch_count: 0,
            completed: false,
            duration: 0.0,
            has_seeked: false,
            row_loaded: false,
            notice: None,
        }
    }

    /// Load the viewer's row for this video, creating it on first view.
    /// An expired session counts as signed out.
    pub async fn initialize(&mut self) {
        let Some(user_id) = self.session.active_user_id(self.clock.now()) else {
            info!(video_id = %self.video_id, "not signed in; progress will not be saved");
            self.notice = Some(TrackerNotice::NotSignedIn);
            return;
        };

        match self.load_or_create(user_id).await {
            Ok(row) => {
                self.last_position = row.last_position;
                self.watch_count = row.watch_count;
                self.completed = row.completed;
                self.row_loaded = true;
            }
            Err(err) => {
                warn!(%user_id, video_id = %self.video_id, error = %err, "could not load watch status");
                self.notice = Some(TrackerNotice::LoadFailed(err.to_string()));
            }
        }
    }

    async fn load_or_create(&self, user_id: UserId) -> Result<WatchStatus, StorageError> {
        match self.watch.get_watch_status(user_id, self.video_id).await {
            Ok(row) => return Ok(row),
            Err(StorageError::NotFound) => {}
            Err(err) => return Err(err),
        }

        debug!(%user_id, video_id = %self.video_id, "first view; creating watch status");
        let fresh = WatchStatus::first_view(user_id, self.video_id, self.clock.now());
        match self.watch.insert_watch_status(&fresh).await {
            Ok(row) => Ok(row),
            // Another player created the row between our read and insert.
            Err(StorageError::Conflict) => {
                debug!(%user_id, video_id = %self.video_id, "watch status created concurrently");
                self.watch.get_watch_status(user_id, self.video_id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Record the player's duration once metadata is known.
    pub fn on_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.duration = seconds;
        }
    }

    /// Player became ready: take its duration, then resume.
    pub fn on_ready(&mut self, player: &mut dyn PlaybackEngine) {
        self.on_duration(player.duration());
        self.resume_seek_on_ready(player);
    }

    /// Seek to the stored position. Happens at most once per tracker and
    /// only when there is somewhere to resume to.
    pub fn resume_seek_on_ready(&mut self, player: &mut dyn PlaybackEngine) {
        if self.has_seeked || self.last_position == 0 {
            return;
        }
        debug!(video_id = %self.video_id, position = self.last_position, "resuming playback");
        player.seek_to(self.last_position);
        self.has_seeked = true;
    }

    /// Write progress for one tick. Every tick issues one update once a row
    /// has been loaded; before that the snapshot is only kept locally.
    pub async fn on_progress_tick(&mut self, played_seconds: f64) -> ProgressSnapshot {
        let snapshot = ProgressSnapshot::from_tick(played_seconds, self.duration);
        self.last_position = snapshot.position;
        self.completed = snapshot.completed;

        if !self.row_loaded {
            return snapshot;
        }
        let Some(user_id) = self.session.active_user_id(self.clock.now()) else {
            debug!(video_id = %self.video_id, "session ended; progress not saved");
            return snapshot;
        };

        match self
            .watch
            .update_progress(user_id, self.video_id, &snapshot, self.clock.now())
            .await
        {
            Ok(row) => {
                self.watch_count = row.watch_count;
                self.completed = row.completed;
            }
            Err(err) => {
                warn!(%user_id, video_id = %self.video_id, error = %err, "could not save watch status");
                self.notice = Some(TrackerNotice::SaveFailed(err.to_string()));
            }
        }
        snapshot
    }

    /// The playback engine reported an error.
    pub fn on_error(&mut self, message: &str) {
        warn!(video_id = %self.video_id, error = message, "playback error");
        self.notice = Some(TrackerNotice::Playback(message.to_owned()));
    }

    #[must_use]
    pub fn video_id(&self) -> VideoId {
        self.video_id
    }

    #[must_use]
    pub fn last_position(&self) -> u32 {
        self.last_position
    }

    #[must_use]
    pub fn watch_count(&self) -> u32 {
        self.watch_count
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn has_seeked(&self) -> bool {
        self.has_seeked
    }

    #[must_use]
    pub fn notice(&self) -> Option<&TrackerNotice> {
        self.notice.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::{expired_session_for, session_for};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use course_core::time::{fixed_clock, fixed_now};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::InMemoryRepository;

    /// Counts writes and can inject failures.
    #[derive(Default)]
    struct Recording {
        inner: InMemoryRepository,
        inserts: AtomicUsize,
        updates: AtomicUsize,
        // Simulate another client inserting between our read and our insert.
        race_on_insert: bool,
        fail_reads: bool,
        fail_updates: bool,
    }

    #[async_trait]
    impl WatchStatusRepository for Recording {
        async fn get_watch_status(
            &self,
            user_id: UserId,
            video_id: VideoId,
        ) -> Result<WatchStatus, StorageError> {
            if self.fail_reads {
                return Err(StorageError::Connection("offline".into()));
            }
            self.inner.get_watch_status(user_id, video_id).await
        }

        async fn insert_watch_status(
            &self,
            status: &WatchStatus,
        ) -> Result<WatchStatus, StorageError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.race_on_insert {
                let mut theirs = status.clone();
                theirs.last_position = 42;
                theirs.watch_count = 3;
                self.inner.insert_watch_status(&theirs).await?;
            }
            self.inner.insert_watch_status(status).await
        }

        async fn update_progress(
            &self,
            user_id: UserId,
            video_id: VideoId,
            snapshot: &ProgressSnapshot,
            at: DateTime<Utc>,
        ) -> Result<WatchStatus, StorageError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(StorageError::Connection("offline".into()));
            }
            self.inner
                .update_progress(user_id, video_id, snapshot, at)
                .await
        }

        async fn recent_watch_statuses(
            &self,
            user_id: UserId,
            limit: u32,
        ) -> Result<Vec<WatchStatus>, StorageError> {
            self.inner.recent_watch_statuses(user_id, limit).await
        }
    }

    #[derive(Default)]
    struct FakePlayer {
        duration: f64,
        seeks: Vec<u32>,
    }

    impl PlaybackEngine for FakePlayer {
        fn duration(&self) -> f64 {
            self.duration
        }

        fn seek_to(&mut self, seconds: u32) {
            self.seeks.push(seconds);
        }
    }

    fn tracker(repo: Arc<Recording>, session: SessionContext) -> WatchProgressTracker {
        WatchProgressTracker::new(repo, fixed_clock(), session, VideoId::new(5))
    }

    #[tokio::test]
    async fn initialize_twice_creates_once() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(session_for(UserId::random()));

        let mut first = tracker(Arc::clone(&repo), session.clone());
        first.initialize().await;
        let mut second = tracker(Arc::clone(&repo), session);
        second.initialize().await;

        assert_eq!(repo.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(repo.inner.watch_row_count().unwrap(), 1);
        assert_eq!(second.watch_count(), 1);
        assert_eq!(second.last_position(), 0);
        assert!(second.notice().is_none());
    }

    #[tokio::test]
    async fn insert_race_rereads_existing_row() {
        let repo = Arc::new(Recording {
            race_on_insert: true,
            ..Recording::default()
        });
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);

        tracker.initialize().await;

        assert!(tracker.notice().is_none());
        assert_eq!(tracker.last_position(), 42);
        assert_eq!(tracker.watch_count(), 3);
        assert_eq!(repo.inner.watch_row_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn load_failure_is_a_notice_and_playback_starts_at_zero() {
        let repo = Arc::new(Recording {
            fail_reads: true,
            ..Recording::default()
        });
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);

        tracker.initialize().await;

        assert!(matches!(tracker.notice(), Some(TrackerNotice::LoadFailed(_))));
        assert_eq!(tracker.last_position(), 0);
        assert_eq!(repo.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn load_failure_keeps_first_notice_and_skips_writes() {
        let repo = Arc::new(Recording {
            fail_reads: true,
            ..Recording::default()
        });
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);
        tracker.initialize().await;
        tracker.on_duration(100.0);

        for tick in [1.0, 2.0, 3.5] {
            tracker.on_progress_tick(tick).await;
        }

        assert!(matches!(tracker.notice(), Some(TrackerNotice::LoadFailed(_))));
        assert_eq!(tracker.last_position(), 3);
        assert_eq!(repo.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_session_is_treated_as_signed_out() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(expired_session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);

        tracker.initialize().await;
        let snapshot = tracker.on_progress_tick(8.2).await;

        assert_eq!(tracker.notice(), Some(&TrackerNotice::NotSignedIn));
        assert_eq!(snapshot.position, 8);
        assert_eq!(repo.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(repo.updates.load(Ordering::SeqCst), 0);
        assert_eq!(repo.inner.watch_row_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn signed_out_viewer_never_touches_storage() {
        let repo = Arc::new(Recording::default());
        let mut tracker = tracker(Arc::clone(&repo), SessionContext::new());

        tracker.initialize().await;
        let snapshot = tracker.on_progress_tick(12.7).await;

        assert_eq!(tracker.notice(), Some(&TrackerNotice::NotSignedIn));
        assert_eq!(snapshot.position, 12);
        assert_eq!(repo.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(repo.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resume_seeks_at_most_once() {
        let repo = Arc::new(Recording::default());
        let user = UserId::random();
        let mut row = WatchStatus::first_view(user, VideoId::new(5), fixed_now());
        row.last_position = 90;
        repo.inner.insert_watch_status(&row).await.unwrap();

        let mut tracker = tracker(Arc::clone(&repo), SessionContext::signed_in(session_for(user)));
        tracker.initialize().await;
        let mut player = FakePlayer {
            duration: 200.0,
            ..FakePlayer::default()
        };

        tracker.on_ready(&mut player);
        tracker.resume_seek_on_ready(&mut player);
        tracker.on_ready(&mut player);

        assert_eq!(player.seeks, vec![90]);
        assert!(tracker.has_seeked());
        assert!((tracker.duration() - 200.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fresh_row_does_not_seek() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(repo, session);
        tracker.initialize().await;

        let mut player = FakePlayer::default();
        tracker.on_ready(&mut player);

        assert!(player.seeks.is_empty());
        assert!(!tracker.has_seeked());
    }

    #[tokio::test]
    async fn every_tick_writes_and_completion_follows_threshold() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);
        tracker.initialize().await;
        tracker.on_duration(200.0);

        let at_189 = tracker.on_progress_tick(189.9).await;
        assert!(!at_189.completed);
        assert!(!tracker.completed());

        let at_190 = tracker.on_progress_tick(190.0).await;
        assert!(at_190.completed);
        assert!((at_190.completion_rate - 0.95).abs() < 1e-9);
        assert!(tracker.completed());
        assert_eq!(tracker.last_position(), 190);

        assert_eq!(repo.updates.load(Ordering::SeqCst), 2);
        assert!(tracker.notice().is_none());
    }

    #[tokio::test]
    async fn unknown_duration_never_completes() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);
        tracker.initialize().await;
        tracker.on_duration(0.0);

        let snapshot = tracker.on_progress_tick(500.0).await;
        assert!(!snapshot.completed);
        assert!(snapshot.completion_rate.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn save_failure_is_a_notice() {
        let repo = Arc::new(Recording {
            fail_updates: true,
            ..Recording::default()
        });
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);
        tracker.initialize().await;
        assert!(tracker.notice().is_none());

        tracker.on_progress_tick(3.0).await;
        assert!(matches!(tracker.notice(), Some(TrackerNotice::SaveFailed(_))));
        assert_eq!(tracker.last_position(), 3);
        assert_eq!(repo.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ticks_before_initialize_are_local_only() {
        let repo = Arc::new(Recording::default());
        let session = SessionContext::signed_in(session_for(UserId::random()));
        let mut tracker = tracker(Arc::clone(&repo), session);

        let snapshot = tracker.on_progress_tick(4.0).await;
        assert_eq!(snapshot.position, 4);
        assert!(tracker.notice().is_none());
        assert_eq!(repo.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn playback_errors_are_noticed() {
        let repo = Arc::new(Recording::default());
        let mut tracker = tracker(repo, SessionContext::new());
        tracker.on_error("network error");
        assert!(tracker.notice().unwrap().message().contains("network error"));
    }
}
