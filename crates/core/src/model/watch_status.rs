use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{UserId, VideoId};
use crate::progress::ProgressSnapshot;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum WatchStatusError {
    #[error("watch count must be >= 1")]
    InvalidWatchCount,

    #[error("completion rate must be in [0, 1], got {0}")]
    InvalidCompletionRate(f64),
}

/// Per-user, per-video playback record (`video_watch_status` table).
///
/// One row exists per `(user_id, video_id)`. It is created on the first
/// playback attempt and rewritten on every progress tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchStatus {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub last_position: u32,
    pub watch_count: u32,
    pub completed: bool,
    pub completion_rate: f64,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
}

impl WatchStatus {
    /// The row inserted the first time a user opens a video.
    #[must_use]
    pub fn first_view(user_id: UserId, video_id: VideoId, now: DateTime<Utc>) -> Self {
        let start = ProgressSnapshot::start();
        Self {
            user_id,
            video_id,
            last_position: start.position,
            watch_count: 1,
            completed: start.completed,
            completion_rate: start.completion_rate,
            last_watched_at: Some(now),
        }
    }

    /// Overwrite the progress columns with a tick's values.
    pub fn apply(&mut self, snapshot: &ProgressSnapshot, now: DateTime<Utc>) {
        self.last_position = snapshot.position;
        self.completion_rate = snapshot.completion_rate;
        self.completed = snapshot.completed;
        self.last_watched_at = Some(now);
    }

    /// Check the row invariants after reading it back from a backend.
    ///
    /// # Errors
    ///
    /// Returns `WatchStatusError` if `watch_count` is 0 or the rate is out of range.
    pub fn validate(&self) -> Result<(), WatchStatusError> {
        if self.watch_count == 0 {
            return Err(WatchStatusError::InvalidWatchCount);
        }
        if !(0.0..=1.0).contains(&self.completion_rate) {
            return Err(WatchStatusError::InvalidCompletionRate(self.completion_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn first_view_starts_at_zero() {
        let row = WatchStatus::first_view(UserId::random(), VideoId::new(3), fixed_now());
        assert_eq!(row.last_position, 0);
        assert_eq!(row.watch_count, 1);
        assert!(!row.completed);
        assert!(row.validate().is_ok());
    }

    #[test]
    fn apply_keeps_watch_count() {
        let mut row = WatchStatus::first_view(UserId::random(), VideoId::new(3), fixed_now());
        row.watch_count = 4;
        row.apply(&ProgressSnapshot::from_tick(190.4, 200.0), fixed_now());
        assert_eq!(row.last_position, 190);
        assert!(row.completed);
        assert_eq!(row.watch_count, 4);
    }

    #[test]
    fn validate_rejects_zero_watch_count() {
        let mut row = WatchStatus::first_view(UserId::random(), VideoId::new(3), fixed_now());
        row.watch_count = 0;
        assert_eq!(row.validate(), Err(WatchStatusError::InvalidWatchCount));
    }
}
