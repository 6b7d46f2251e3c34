// Frame clock
// Tracks elapsed animation time and the per-frame delta supplied by the render loop

use std::time::Duration;

/// Frame rate the smoothing factors are tuned for
pub const REFERENCE_FRAME_RATE: f32 = 60.0;

/// Render-loop clock
///
/// Advanced once per displayed frame by the caller; it never reads the wall
/// clock itself, so tests and the headless driver control time exactly.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    elapsed: Duration,
    last_delta: Duration,
    frame_count: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame
    ///
    /// Returns the new elapsed time.
    pub fn advance(&mut self, delta: Duration) -> Duration {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.last_delta = delta;
        self.frame_count += 1;
        self.elapsed
    }

    /// Time since the clock was created or last reset
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Delta of the most recent frame
    pub fn delta(&self) -> Duration {
        self.last_delta
    }

    /// Most recent delta expressed in reference frames (1.0 at 60 fps)
    pub fn normalized_delta(&self) -> f32 {
        normalized_delta(self.last_delta)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Convert a frame delta into reference frames
pub fn normalized_delta(delta: Duration) -> f32 {
    delta.as_secs_f32() * REFERENCE_FRAME_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.advance(Duration::from_millis(16));
        let now = clock.advance(Duration::from_millis(17));

        assert_eq!(now, Duration::from_millis(33));
        assert_eq!(clock.delta(), Duration::from_millis(17));
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_normalized_delta() {
        assert!((normalized_delta(Duration::from_secs_f32(1.0 / 60.0)) - 1.0).abs() < 1e-4);
        assert!((normalized_delta(Duration::from_secs_f32(1.0 / 30.0)) - 2.0).abs() < 1e-4);
        assert_eq!(normalized_delta(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut clock = FrameClock::new();
        clock.advance(Duration::from_secs(3));
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.frame_count(), 0);
        assert_eq!(clock.normalized_delta(), 0.0);
    }
}
