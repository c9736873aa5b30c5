use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ChapterId, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VideoError {
    #[error("video title cannot be empty")]
    EmptyTitle,

    #[error("video url cannot be empty")]
    EmptyVideoUrl,

    #[error("unknown access level: {0}")]
    UnknownAccessLevel(String),
}

//
// ─── ACCESS LEVEL ──────────────────────────────────────────────────────────────
//

/// Visibility tier of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Authenticated,
}

impl AccessLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Authenticated => "authenticated",
        }
    }

    #[must_use]
    pub fn requires_sign_in(self) -> bool {
        matches!(self, AccessLevel::Authenticated)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessLevel::Public),
            "authenticated" => Ok(AccessLevel::Authenticated),
            other => Err(VideoError::UnknownAccessLevel(other.to_owned())),
        }
    }
}

//
// ─── VIDEO ─────────────────────────────────────────────────────────────────────
//

/// A lesson video as stored in the `videos` table.
///
/// Rows are owned by the backend; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub chapter_id: ChapterId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Video {
    /// Check the fields a player needs before rendering.
    ///
    /// # Errors
    ///
    /// Returns `VideoError` when the title or url is blank.
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.title.trim().is_empty() {
            return Err(VideoError::EmptyTitle);
        }
        if self.video_url.trim().is_empty() {
            return Err(VideoError::EmptyVideoUrl);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Video {
        Video {
            id: VideoId::new(1),
            chapter_id: ChapterId::new(2),
            title: "Intro".into(),
            description: None,
            thumbnail_url: None,
            video_url: "https://cdn.example.com/intro.mp4".into(),
            access_level: AccessLevel::Authenticated,
            sort_order: 1,
            is_deleted: false,
        }
    }

    #[test]
    fn access_level_round_trips_through_str() {
        for level in [AccessLevel::Public, AccessLevel::Authenticated] {
            assert_eq!(level.as_str().parse::<AccessLevel>().unwrap(), level);
        }
        assert!(matches!(
            "premium".parse::<AccessLevel>(),
            Err(VideoError::UnknownAccessLevel(_))
        ));
    }

    #[test]
    fn deserializes_backend_row_with_nulls() {
        let json = r#"{
            "id": 7, "chapter_id": 3, "title": "Prompts", "description": null,
            "thumbnail_url": null, "video_url": "v.mp4",
            "access_level": "public", "sort_order": 4, "is_deleted": false
        }"#;
        let video: Video = serde_json::from_str(json).unwrap();
        assert_eq!(video.id, VideoId::new(7));
        assert_eq!(video.access_level, AccessLevel::Public);
        assert_eq!(video.sort_order, 4);
        assert!(video.description.is_none());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let mut video = sample();
        assert!(video.validate().is_ok());
        video.title = "  ".into();
        assert_eq!(video.validate(), Err(VideoError::EmptyTitle));
        video.title = "ok".into();
        video.video_url.clear();
        assert_eq!(video.validate(), Err(VideoError::EmptyVideoUrl));
    }
}
