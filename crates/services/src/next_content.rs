use std::sync::Arc;

use course_core::model::{ChapterId, Video};
use storage::repository::{StorageError, VideoRepository};

/// Finds the video that follows the current one within its chapter.
#[derive(Clone)]
pub struct NextContentResolver {
    videos: Arc<dyn VideoRepository>,
}

impl NextContentResolver {
    #[must_use]
    pub fn new(videos: Arc<dyn VideoRepository>) -> Self {
        Self { videos }
    }

    /// The non-deleted video in `chapter_id` with the smallest `sort_order`
    /// strictly greater than `sort_order`. `Ok(None)` means the current
    /// video is the last one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for failures other than "no such row".
    pub async fn resolve(
        &self,
        chapter_id: ChapterId,
        sort_order: i32,
    ) -> Result<Option<Video>, StorageError> {
        match self.videos.next_video(chapter_id, sort_order).await {
            Ok(video) => Ok(Some(video)),
            Err(StorageError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` for failures other than "no such row".
    pub async fn after(&self, current: &Video) -> Result<Option<Video>, StorageError> {
        self.resolve(current.chapter_id, current.sort_order).await
    }
}
