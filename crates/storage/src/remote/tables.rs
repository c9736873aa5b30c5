use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{Chapter, ChapterId, Profile, UserId, Video, VideoId, WatchStatus};
use course_core::progress::ProgressSnapshot;
use serde::Serialize;

use super::{Query, RemoteRepository};
use crate::repository::{
    ChapterRepository, ProfileRepository, StorageError, VideoRepository, WatchStatusRepository,
};

const CHAPTERS: &str = "chapters";
const VIDEOS: &str = "videos";
const PROFILES: &str = "profiles";
const WATCH_STATUS: &str = "video_watch_status";

#[derive(Debug, Serialize)]
struct ProgressPatch {
    last_position: u32,
    completed: bool,
    completion_rate: f64,
    last_watched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct UsernameUpsert<'a> {
    user_id: UserId,
    username: &'a str,
}

fn checked_video(video: Video) -> Result<Video, StorageError> {
    video
        .validate()
        .map_err(|e| StorageError::Serialization(format!("video {}: {e}", video.id)))?;
    Ok(video)
}

fn checked_videos(videos: Vec<Video>) -> Result<Vec<Video>, StorageError> {
    videos.into_iter().map(checked_video).collect()
}

fn watch_row(user_id: UserId, video_id: VideoId) -> Query {
    Query::new()
        .eq("user_id", user_id)
        .eq("video_id", video_id)
}

#[async_trait]
impl ChapterRepository for RemoteRepository {
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError> {
        let query = Query::new()
            .select("id,title,description,thumbnail_url")
            .order("id", true);
        self.select_many(CHAPTERS, &query).await
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter, StorageError> {
        let query = Query::new()
            .select("id,title,description,thumbnail_url")
            .eq("id", id);
        self.select_one(CHAPTERS, &query).await
    }
}

#[async_trait]
impl VideoRepository for RemoteRepository {
    async fn get_video(&self, chapter_id: ChapterId, id: VideoId) -> Result<Video, StorageError> {
        let query = Query::new()
            .select("*")
            .eq("id", id)
            .eq("is_deleted", false)
            .eq("chapter_id", chapter_id);
        checked_video(self.select_one(VIDEOS, &query).await?)
    }

    async fn list_chapter_videos(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Vec<Video>, StorageError> {
        let query = Query::new()
            .select("*")
            .eq("chapter_id", chapter_id)
            .eq("is_deleted", false)
            .order("sort_order", true)
            .order("id", true);
        checked_videos(self.select_many(VIDEOS, &query).await?)
    }

    async fn next_video(&self, chapter_id: ChapterId, after: i32) -> Result<Video, StorageError> {
        let query = Query::new()
            .select("*")
            .eq("chapter_id", chapter_id)
            .eq("is_deleted", false)
            .gt("sort_order", after)
            .order("sort_order", true)
            .order("id", true)
            .limit(1);
        checked_video(self.select_one(VIDEOS, &query).await?)
    }

    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().select("*").in_list("id", ids.iter());
        checked_videos(self.select_many(VIDEOS, &query).await?)
    }
}

#[async_trait]
impl ProfileRepository for RemoteRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let query = Query::new()
            .select("user_id,username,role")
            .eq("user_id", user_id);
        self.select_one(PROFILES, &query).await
    }

    async fn upsert_username(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<Profile, StorageError> {
        let body = UsernameUpsert { user_id, username };
        self.upsert_one(PROFILES, "user_id", &body).await
    }
}

#[async_trait]
impl WatchStatusRepository for RemoteRepository {
    async fn get_watch_status(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<WatchStatus, StorageError> {
        let query = watch_row(user_id, video_id).select("*");
        self.select_one(WATCH_STATUS, &query).await
    }

    async fn insert_watch_status(
        &self,
        status: &WatchStatus,
    ) -> Result<WatchStatus, StorageError> {
        self.insert_one(WATCH_STATUS, status).await
    }

    async fn update_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
        snapshot: &ProgressSnapshot,
        at: DateTime<Utc>,
    ) -> Result<WatchStatus, StorageError> {
        let patch = ProgressPatch {
            last_position: snapshot.position,
            completed: snapshot.completed,
            completion_rate: snapshot.completion_rate,
            last_watched_at: at,
        };
        self.update_one(WATCH_STATUS, &watch_row(user_id, video_id), &patch)
            .await
    }

    async fn recent_watch_statuses(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<WatchStatus>, StorageError> {
        let query = Query::new()
            .select("*")
            .eq("user_id", user_id)
            .order("last_watched_at", false)
            .limit(limit);
        self.select_many(WATCH_STATUS, &query).await
    }
}
