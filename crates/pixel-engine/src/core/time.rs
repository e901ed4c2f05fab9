/// Coarse periodic timer driven by frame deltas.
/// Only used to trigger display refreshes; no state is derived from it.
pub struct RefreshTimer {
    /// Seconds between firings.
    interval: f32,
    /// Accumulated time from variable frame deltas.
    accumulator: f32,
}

impl RefreshTimer {
    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(f32::EPSILON),
            accumulator: 0.0,
        }
    }

    /// Add frame time. Returns true if at least one interval elapsed.
    /// Missed intervals collapse into a single firing.
    pub fn advance(&mut self, frame_dt: f32) -> bool {
        self.accumulator += frame_dt.max(0.0);
        if self.accumulator < self.interval {
            return false;
        }
        self.accumulator %= self.interval;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_interval() {
        let mut timer = RefreshTimer::new(1.0);
        assert!(!timer.advance(0.4));
        assert!(!timer.advance(0.4));
        assert!(timer.advance(0.4));
        // 0.2 carried over
        assert!(!timer.advance(0.7));
        assert!(timer.advance(0.2));
    }

    #[test]
    fn long_frames_fire_once() {
        let mut timer = RefreshTimer::new(1.0);
        assert!(timer.advance(5.5));
        assert!(!timer.advance(0.1));
    }

    #[test]
    fn negative_delta_is_ignored() {
        let mut timer = RefreshTimer::new(1.0);
        assert!(!timer.advance(-3.0));
        assert!(timer.advance(1.0));
    }
}
