use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::Clock;
use course_core::model::{ChapterId, VideoId};
use course_core::progress::percent;
use storage::repository::{VideoRepository, WatchStatusRepository};
use tracing::warn;

use crate::error::HistoryError;
use crate::identity::SessionContext;

/// Title shown for history rows whose video no longer resolves.
pub const UNKNOWN_TITLE: &str = "unknown";

/// Number of entries the dashboard shows.
pub const DASHBOARD_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub video_id: VideoId,
    pub chapter_id: Option<ChapterId>,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub last_position: u32,
    pub completed: bool,
    pub progress_percent: u8,
    pub last_watched_at: Option<DateTime<Utc>>,
}

/// Recently watched videos for the signed-in viewer.
#[derive(Clone)]
pub struct HistoryService {
    clock: Clock,
    watch: Arc<dyn WatchStatusRepository>,
    videos: Arc<dyn VideoRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(
        clock: Clock,
        watch: Arc<dyn WatchStatusRepository>,
        videos: Arc<dyn VideoRepository>,
    ) -> Self {
        Self {
            clock,
            watch,
            videos,
        }
    }

    /// Most recent first, at most `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NotSignedIn` without a live session, or
    /// `HistoryError::Storage` if either lookup fails.
    pub async fn recent(
        &self,
        session: &SessionContext,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, HistoryError> {
        let user_id = session
            .active_user_id(self.clock.now())
            .ok_or(HistoryError::NotSignedIn)?;

        let rows = self
            .watch
            .recent_watch_statuses(user_id, limit)
            .await
            .inspect_err(|err| warn!(%user_id, error = %err, "could not load watch history"))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<VideoId> = rows.iter().map(|row| row.video_id).collect();
        let videos: HashMap<VideoId, _> = self
            .videos
            .get_videos(&ids)
            .await
            .inspect_err(|err| warn!(%user_id, error = %err, "could not load watched videos"))?
            .into_iter()
            .map(|video| (video.id, video))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let video = videos.get(&row.video_id);
                HistoryEntry {
                    video_id: row.video_id,
                    chapter_id: video.map(|v| v.chapter_id),
                    title: video.map_or_else(|| UNKNOWN_TITLE.to_owned(), |v| v.title.clone()),
                    thumbnail_url: video.and_then(|v| v.thumbnail_url.clone()),
                    last_position: row.last_position,
                    completed: row.completed,
                    progress_percent: percent(row.completion_rate),
                    last_watched_at: row.last_watched_at,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::{expired_session_for, session_for};
    use chrono::Duration;
    use course_core::model::{AccessLevel, UserId, Video, WatchStatus};
    use course_core::progress::ProgressSnapshot;
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn video(id: u64) -> Video {
        Video {
            id: VideoId::new(id),
            chapter_id: ChapterId::new(1),
            title: format!("Lesson {id}"),
            description: None,
            thumbnail_url: Some(format!("https://cdn.example.com/{id}.jpg")),
            video_url: format!("https://cdn.example.com/{id}.mp4"),
            access_level: AccessLevel::Public,
            sort_order: i32::try_from(id).unwrap(),
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn requires_session() {
        let repo = InMemoryRepository::new();
        let service = HistoryService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo));
        assert!(matches!(
            service.recent(&SessionContext::new(), 3).await,
            Err(HistoryError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn newest_first_limited_with_unknown_fallback() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        repo.put_video(video(1)).unwrap();
        repo.put_video(video(2)).unwrap();

        // Video 99 has no catalogue row.
        for (offset, id) in [(0, 1), (1, 99), (2, 2)] {
            let row =
                WatchStatus::first_view(user, VideoId::new(id), fixed_now() + Duration::minutes(offset));
            repo.insert_watch_status(&row).await.unwrap();
        }
        repo.update_progress(
            user,
            VideoId::new(2),
            &ProgressSnapshot::from_tick(50.0, 200.0),
            fixed_now() + Duration::minutes(10),
        )
        .await
        .unwrap();
        let other = WatchStatus::first_view(UserId::random(), VideoId::new(1), fixed_now());
        repo.insert_watch_status(&other).await.unwrap();

        let service = HistoryService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo));
        let session = SessionContext::signed_in(session_for(user));

        let entries = service.recent(&session, 2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].video_id, VideoId::new(2));
        assert_eq!(entries[0].progress_percent, 25);
        assert_eq!(entries[0].title, "Lesson 2");
        assert_eq!(entries[1].video_id, VideoId::new(99));
        assert_eq!(entries[1].title, UNKNOWN_TITLE);
        assert!(entries[1].chapter_id.is_none());

        let all = service.recent(&session, DASHBOARD_LIMIT).await.unwrap();
        assert_eq!(all.len(), 3);

        let stale = SessionContext::signed_in(expired_session_for(user));
        assert!(matches!(
            service.recent(&stale, DASHBOARD_LIMIT).await,
            Err(HistoryError::NotSignedIn)
        ));
    }
}
