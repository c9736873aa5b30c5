use course_core::model::{Chapter, ChapterId, Video, VideoId};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_chapter_row, map_video_row};
use crate::repository::{ChapterRepository, StorageError, VideoRepository};

const VIDEO_COLUMNS: &str = "id, chapter_id, title, description, thumbnail_url, video_url, access_level, sort_order, is_deleted";

impl SqliteRepository {
    /// Insert or replace a chapter. Catalogue writes only happen from the seed tool.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    pub async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO chapters (id, title, description, thumbnail_url)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                thumbnail_url = excluded.thumbnail_url
            ",
        )
        .bind(id_to_i64("chapter_id", chapter.id.value())?)
        .bind(chapter.title.as_str())
        .bind(chapter.description.as_deref())
        .bind(chapter.thumbnail_url.as_deref())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert or replace a video.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    pub async fn upsert_video(&self, video: &Video) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO videos (id, chapter_id, title, description, thumbnail_url, video_url, access_level, sort_order, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                chapter_id = excluded.chapter_id,
                title = excluded.title,
                description = excluded.description,
                thumbnail_url = excluded.thumbnail_url,
                video_url = excluded.video_url,
                access_level = excluded.access_level,
                sort_order = excluded.sort_order,
                is_deleted = excluded.is_deleted
            ",
        )
        .bind(id_to_i64("video_id", video.id.value())?)
        .bind(id_to_i64("chapter_id", video.chapter_id.value())?)
        .bind(video.title.as_str())
        .bind(video.description.as_deref())
        .bind(video.thumbnail_url.as_deref())
        .bind(video.video_url.as_str())
        .bind(video.access_level.as_str())
        .bind(i64::from(video.sort_order))
        .bind(i64::from(video.is_deleted))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChapterRepository for SqliteRepository {
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, thumbnail_url
            FROM chapters
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_chapter_row).collect()
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, thumbnail_url
            FROM chapters WHERE id = ?1
            ",
        )
        .bind(id_to_i64("chapter_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => map_chapter_row(&row),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait::async_trait]
impl VideoRepository for SqliteRepository {
    async fn get_video(&self, chapter_id: ChapterId, id: VideoId) -> Result<Video, StorageError> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1 AND chapter_id = ?2 AND is_deleted = 0"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("video_id", id.value())?)
            .bind(id_to_i64("chapter_id", chapter_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => map_video_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn list_chapter_videos(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Vec<Video>, StorageError> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE chapter_id = ?1 AND is_deleted = 0 ORDER BY sort_order ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("chapter_id", chapter_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_video_row).collect()
    }

    async fn next_video(&self, chapter_id: ChapterId, after: i32) -> Result<Video, StorageError> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE chapter_id = ?1 AND is_deleted = 0 AND sort_order > ?2
             ORDER BY sort_order ASC, id ASC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("chapter_id", chapter_id.value())?)
            .bind(i64::from(after))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => map_video_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<Video>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id_to_i64("video_id", id.value())?);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        rows.iter().map(map_video_row).collect()
    }
}
