use course_core::model::{
    AccessLevel, Chapter, ChapterId, Profile, Role, UserId, Video, VideoId, WatchStatus,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, keeping unique-key violations distinguishable.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::RowNotFound => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn video_id_from_i64(v: i64) -> Result<VideoId, StorageError> {
    Ok(VideoId::new(i64_to_u64("video_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn user_id_from_text(raw: &str) -> Result<UserId, StorageError> {
    raw.parse()
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {raw}")))
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    Ok(Chapter {
        id: chapter_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        thumbnail_url: row.try_get("thumbnail_url").map_err(ser)?,
    })
}

pub(crate) fn map_video_row(row: &SqliteRow) -> Result<Video, StorageError> {
    let access: String = row.try_get("access_level").map_err(ser)?;
    let access_level: AccessLevel = access.parse().map_err(ser)?;
    let sort_order = i32::try_from(row.try_get::<i64, _>("sort_order").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("sort_order overflow".into()))?;

    let video = Video {
        id: video_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        chapter_id: chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        thumbnail_url: row.try_get("thumbnail_url").map_err(ser)?,
        video_url: row.try_get("video_url").map_err(ser)?,
        access_level,
        sort_order,
        is_deleted: row.try_get::<i64, _>("is_deleted").map_err(ser)? != 0,
    };
    video.validate().map_err(ser)?;
    Ok(video)
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let role: Option<String> = row.try_get("role").map_err(ser)?;
    Ok(Profile {
        user_id: user_id_from_text(&user_id)?,
        username: row.try_get("username").map_err(ser)?,
        role: Role::from(role),
    })
}

pub(crate) fn map_watch_row(row: &SqliteRow) -> Result<WatchStatus, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let last_position = u32::try_from(row.try_get::<i64, _>("last_position").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("invalid last_position".into()))?;
    let watch_count = u32::try_from(row.try_get::<i64, _>("watch_count").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("invalid watch_count".into()))?;

    let status = WatchStatus {
        user_id: user_id_from_text(&user_id)?,
        video_id: video_id_from_i64(row.try_get::<i64, _>("video_id").map_err(ser)?)?,
        last_position,
        watch_count,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        completion_rate: row.try_get("completion_rate").map_err(ser)?,
        last_watched_at: row.try_get("last_watched_at").map_err(ser)?,
    };
    status.validate().map_err(ser)?;
    Ok(status)
}
