//! Playback progress math shared by the tracker and the storage backends.
//!
//! A video counts as completed once the viewer reaches 95% of its duration.
//! While the player has not reported a duration yet (it reads 0 for a moment
//! after loading) the completion rate is pinned to 0 so a resume position
//! never marks a video as completed by accident.

use serde::{Deserialize, Serialize};

/// Fraction of the duration at which a video is considered watched.
pub const COMPLETION_THRESHOLD: f64 = 0.95;

/// Truncate a player-reported position to whole seconds.
///
/// Negative and non-finite inputs map to 0.
#[must_use]
pub fn whole_seconds(played_seconds: f64) -> u32 {
    if !played_seconds.is_finite() || played_seconds <= 0.0 {
        return 0;
    }
    // Saturating float-to-int cast.
    played_seconds.floor() as u32
}

/// Ratio of `position` to `duration`, clamped to `[0, 1]`.
///
/// Returns 0 when the duration is unknown (zero, negative, or non-finite).
#[must_use]
pub fn completion_rate(position: u32, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    (f64::from(position) / duration).clamp(0.0, 1.0)
}

/// Values written to the backend for one progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub position: u32,
    pub completion_rate: f64,
    pub completed: bool,
}

impl ProgressSnapshot {
    /// Build the snapshot for a player progress callback.
    #[must_use]
    pub fn from_tick(played_seconds: f64, duration: f64) -> Self {
        let position = whole_seconds(played_seconds);
        let completion_rate = completion_rate(position, duration);
        Self {
            position,
            completion_rate,
            completed: completion_rate >= COMPLETION_THRESHOLD,
        }
    }

    /// Snapshot of a video that has not been played yet.
    #[must_use]
    pub fn start() -> Self {
        Self {
            position: 0,
            completion_rate: 0.0,
            completed: false,
        }
    }

    /// Rounded percentage, as shown on the dashboard.
    #[must_use]
    pub fn percent(&self) -> u8 {
        percent(self.completion_rate)
    }
}

/// Convert a completion rate to a whole percentage in `0..=100`.
#[must_use]
pub fn percent(rate: f64) -> u8 {
    if !rate.is_finite() {
        return 0;
    }
    (rate.clamp(0.0, 1.0) * 100.0).round() as u8
}
