use chrono::{DateTime, Utc};
use course_core::model::{UserId, VideoId, WatchStatus};
use course_core::progress::ProgressSnapshot;

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_watch_row};
use crate::repository::{StorageError, WatchStatusRepository};

const WATCH_COLUMNS: &str =
    "user_id, video_id, last_position, watch_count, completed, completion_rate, last_watched_at";

#[async_trait::async_trait]
impl WatchStatusRepository for SqliteRepository {
    async fn get_watch_status(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<WatchStatus, StorageError> {
        let sql = format!(
            "SELECT {WATCH_COLUMNS} FROM video_watch_status WHERE user_id = ?1 AND video_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(id_to_i64("video_id", video_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => map_watch_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn insert_watch_status(
        &self,
        status: &WatchStatus,
    ) -> Result<WatchStatus, StorageError> {
        // Plain INSERT: a duplicate pair surfaces as `Conflict` for the caller to resolve.
        sqlx::query(
            r"
            INSERT INTO video_watch_status (
                user_id, video_id, last_position, watch_count, completed, completion_rate, last_watched_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(status.user_id.to_string())
        .bind(id_to_i64("video_id", status.video_id.value())?)
        .bind(i64::from(status.last_position))
        .bind(i64::from(status.watch_count))
        .bind(i64::from(status.completed))
        .bind(status.completion_rate)
        .bind(status.last_watched_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_watch_status(status.user_id, status.video_id).await
    }

    async fn update_progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
        snapshot: &ProgressSnapshot,
        at: DateTime<Utc>,
    ) -> Result<WatchStatus, StorageError> {
        let res = sqlx::query(
            r"
            UPDATE video_watch_status SET
                last_position = ?3,
                completed = ?4,
                completion_rate = ?5,
                last_watched_at = ?6
            WHERE user_id = ?1 AND video_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(id_to_i64("video_id", video_id.value())?)
        .bind(i64::from(snapshot.position))
        .bind(i64::from(snapshot.completed))
        .bind(snapshot.completion_rate)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_watch_status(user_id, video_id).await
    }

    async fn recent_watch_statuses(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<WatchStatus>, StorageError> {
        let sql = format!(
            "SELECT {WATCH_COLUMNS} FROM video_watch_status
             WHERE user_id = ?1
             ORDER BY last_watched_at IS NULL, last_watched_at DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_watch_row).collect()
    }
}
