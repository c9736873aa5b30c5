use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{Chapter, ChapterId, Profile, UserId, Video, VideoId, WatchStatus};
use course_core::progress::ProgressSnapshot;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A single-row query matched nothing.
    #[error("not found")]
    NotFound,

    /// A unique key already exists.
    #[error("conflict")]
    Conflict,

    #[error("not authorized")]
    Unauthorized,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error ({status}): {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound)
    }
}

/// Read access to the chapter catalogue.
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// List chapters ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError>;

    /// Fetch one chapter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter, StorageError>;
}

/// Read access to videos. Soft-deleted rows are never returned.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Fetch a video that belongs to `chapter_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no visible video matches both ids.
    async fn get_video(&self, chapter_id: ChapterId, id: VideoId) -> Result<Video, StorageError>;

    /// Videos of a chapter ordered by `sort_order`, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn list_chapter_videos(&self, chapter_id: ChapterId)
    -> Result<Vec<Video>, StorageError>;

    /// The video with the smallest `sort_order` strictly greater than `after`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when `after` is the last position in the chapter.
    async fn next_video(&self, chapter_id: ChapterId, after: i32) -> Result<Video, StorageError>;

    /// Bulk lookup by id. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no profile row.
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError>;

    /// Insert or update the username, keyed on `user_id`. Other columns keep
    /// their stored values.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_username(&self, user_id: UserId, username: &str)
    -> Result<Profile, StorageError>;
}

#[async_trait]
pub trait WatchStatusRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the pair has no row yet.
    async fn get_watch_status(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<WatchStatus, StorageError>;

    /// Insert a new row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the pair already has a row.
    async fn insert_watch_status(&self, status: &WatchStatus)
    -> Result<WatchStatus, StorageError>;

    /// Overwrite the progress columns of the matching row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row matched.
    async fn update_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
        snapshot: &ProgressSnapshot,
        at: DateTime<Utc>,
    ) -> Result<WatchStatus, StorageError>;

    /// A user's rows, most recently watched first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn recent_watch_statuses(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<WatchStatus>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    chapters: Arc<Mutex<HashMap<ChapterId, Chapter>>>,
    videos: Arc<Mutex<HashMap<VideoId, Video>>>,
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    watch: Arc<Mutex<HashMap<(UserId, VideoId), WatchStatus>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a chapter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_chapter(&self, chapter: Chapter) -> Result<(), StorageError> {
        self.chapters
            .lock()
            .map_err(poisoned)?
            .insert(chapter.id, chapter);
        Ok(())
    }

    /// Add or replace a video.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_video(&self, video: Video) -> Result<(), StorageError> {
        self.videos.lock().map_err(poisoned)?.insert(video.id, video);
        Ok(())
    }

    /// Add or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_profile(&self, profile: Profile) -> Result<(), StorageError> {
        self.profiles
            .lock()
            .map_err(poisoned)?
            .insert(profile.user_id, profile);
        Ok(())
    }

    /// Number of stored watch rows, for assertions in tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn watch_row_count(&self) -> Result<usize, StorageError> {
        Ok(self.watch.lock().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl ChapterRepository for InMemoryRepository {
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        let mut chapters: Vec<Chapter> = guard.values().cloned().collect();
        chapters.sort_by_key(|c| c.id);
        Ok(chapters)
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl VideoRepository for InMemoryRepository {
    async fn get_video(&self, chapter_id: ChapterId, id: VideoId) -> Result<Video, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        guard
            .get(&id)
            .filter(|v| v.chapter_id == chapter_id && v.is_visible())
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_chapter_videos(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Vec<Video>, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        let mut videos: Vec<Video> = guard
            .values()
            .filter(|v| v.chapter_id == chapter_id && v.is_visible())
            .cloned()
            .collect();
        videos.sort_by_key(|v| (v.sort_order, v.id));
        Ok(videos)
    }

    async fn next_video(&self, chapter_id: ChapterId, after: i32) -> Result<Video, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        guard
            .values()
            .filter(|v| v.chapter_id == chapter_id && v.is_visible() && v.sort_order > after)
            .min_by_key(|v| (v.sort_order, v.id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        guard.get(&user_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn upsert_username(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<Profile, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let profile = guard
            .entry(user_id)
            .or_insert_with(|| Profile::new(user_id));
        profile.username = Some(username.to_owned());
        Ok(profile.clone())
    }
}

#[async_trait]
impl WatchStatusRepository for InMemoryRepository {
    async fn get_watch_status(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<WatchStatus, StorageError> {
        let guard = self.watch.lock().map_err(poisoned)?;
        guard
            .get(&(user_id, video_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn insert_watch_status(
        &self,
        status: &WatchStatus,
    ) -> Result<WatchStatus, StorageError> {
        let mut guard = self.watch.lock().map_err(poisoned)?;
        let key = (status.user_id, status.video_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, status.clone());
        Ok(status.clone())
    }

    async fn update_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
        snapshot: &ProgressSnapshot,
        at: DateTime<Utc>,
    ) -> Result<WatchStatus, StorageError> {
        let mut guard = self.watch.lock().map_err(poisoned)?;
        let row = guard
            .get_mut(&(user_id, video_id))
            .ok_or(StorageError::NotFound)?;
        row.apply(snapshot, at);
        Ok(row.clone())
    }

    async fn recent_watch_statuses(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<WatchStatus>, StorageError> {
        let guard = self.watch.lock().map_err(poisoned)?;
        let mut rows: Vec<WatchStatus> = guard
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        // Newest first; rows never stamped sort last.
        rows.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub chapters: Arc<dyn ChapterRepository>,
    pub videos: Arc<dyn VideoRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub watch_status: Arc<dyn WatchStatusRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from(InMemoryRepository::new())
    }
}

impl From<InMemoryRepository> for Storage {
    fn from(repo: InMemoryRepository) -> Self {
        Self {
            chapters: Arc::new(repo.clone()),
            videos: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            watch_status: Arc::new(repo),
        }
    }
}
