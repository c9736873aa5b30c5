use thiserror::Error;

use crate::model::ids::{ChapterId, VideoId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("invalid chapter id: {0:?}")]
    InvalidChapterId(String),

    #[error("invalid video id: {0:?}")]
    InvalidVideoId(String),
}

/// Address of a video page: `/videos/{chapter}/content/{video}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoRoute {
    pub chapter_id: ChapterId,
    pub video_id: VideoId,
}

impl VideoRoute {
    /// Parse raw path segments. Nothing remote should be attempted when this fails.
    ///
    /// # Errors
    ///
    /// Returns `RouteError` naming the first segment that is not a valid id.
    pub fn parse(chapter: &str, video: &str) -> Result<Self, RouteError> {
        let chapter_id = chapter
            .parse()
            .map_err(|_| RouteError::InvalidChapterId(chapter.to_owned()))?;
        let video_id = video
            .parse()
            .map_err(|_| RouteError::InvalidVideoId(video.to_owned()))?;
        Ok(Self {
            chapter_id,
            video_id,
        })
    }
}
