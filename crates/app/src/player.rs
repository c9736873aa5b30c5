use services::PlaybackEngine;

/// Stand-in for a media player when driving the tracker from the terminal.
#[derive(Debug)]
pub struct SimulatedPlayer {
    duration: f64,
    position: u32,
}

impl SimulatedPlayer {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            position: 0,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }
}

impl PlaybackEngine for SimulatedPlayer {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn seek_to(&mut self, seconds: u32) {
        self.position = seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_moves_position() {
        let mut player = SimulatedPlayer::new(60.0);
        player.seek_to(42);
        assert_eq!(player.position(), 42);
        assert!((player.duration() - 60.0).abs() < f64::EPSILON);
    }
}
