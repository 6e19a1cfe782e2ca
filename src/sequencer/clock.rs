//! Tempo clock - turns elapsed time into step boundaries

pub const MIN_BPM: f32 = 30.0;
pub const MAX_BPM: f32 = 300.0;
pub const DEFAULT_BPM: f32 = 120.0;

/// One step per beat. The accumulator resets to zero on every boundary, and
/// overshoot past the boundary is dropped rather than carried.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoClock {
    bpm: f32,
    step_interval: f32,
    elapsed: f32,
    running: bool,
}

impl TempoClock {
    pub fn new(bpm: f32) -> Self {
        let mut clock = Self {
            bpm: DEFAULT_BPM,
            step_interval: step_interval(DEFAULT_BPM),
            elapsed: 0.0,
            running: false,
        };
        clock.set_bpm(bpm);
        clock
    }

    pub fn is_valid_bpm(bpm: f32) -> bool {
        (MIN_BPM..=MAX_BPM).contains(&bpm)
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Requests outside `[MIN_BPM, MAX_BPM]` keep the current tempo.
    pub fn set_bpm(&mut self, bpm: f32) {
        if Self::is_valid_bpm(bpm) {
            self.bpm = bpm;
            self.step_interval = step_interval(bpm);
        }
    }

    /// Length of one step in seconds
    pub fn step_interval(&self) -> f32 {
        self.step_interval
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
        self.elapsed = 0.0;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed = 0.0;
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Returns true at most once per call, when a step boundary is crossed.
    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        if !self.running {
            return false;
        }
        if delta_seconds.is_finite() && delta_seconds > 0.0 {
            self.elapsed += delta_seconds;
        }

        if self.elapsed >= self.step_interval {
            self.elapsed = 0.0;
            return true;
        }
        false
    }
}

impl Default for TempoClock {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

fn step_interval(bpm: f32) -> f32 {
    60.0 / bpm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_follows_bpm() {
        for bpm in [30.0, 60.0, 120.0, 147.5, 300.0] {
            let clock = TempoClock::new(bpm);
            assert!((clock.step_interval() - 60.0 / bpm).abs() < 1e-6);
        }
    }

    #[test]
    fn out_of_range_bpm_is_ignored() {
        let mut clock = TempoClock::new(100.0);
        clock.set_bpm(29.9);
        assert_eq!(clock.bpm(), 100.0);
        clock.set_bpm(300.1);
        assert_eq!(clock.bpm(), 100.0);
        clock.set_bpm(f32::NAN);
        assert_eq!(clock.bpm(), 100.0);
        assert_eq!(clock.step_interval(), 0.6);
    }

    #[test]
    fn invalid_initial_bpm_uses_default() {
        let clock = TempoClock::new(0.0);
        assert_eq!(clock.bpm(), DEFAULT_BPM);
    }

    #[test]
    fn fires_once_per_boundary() {
        let mut clock = TempoClock::new(120.0);
        clock.start();
        assert!(!clock.tick(0.25));
        assert!(clock.tick(0.25));
        assert_eq!(clock.elapsed(), 0.0);
        assert!(!clock.tick(0.25));
    }

    #[test]
    fn large_delta_fires_once() {
        let mut clock = TempoClock::new(120.0);
        clock.start();
        assert!(clock.tick(5.0));
        assert!(!clock.tick(0.0));
    }

    #[test]
    fn overshoot_is_dropped() {
        let mut clock = TempoClock::new(120.0);
        clock.start();
        assert!(clock.tick(0.75));
        assert!(!clock.tick(0.25));
        assert!(clock.tick(0.25));
    }

    #[test]
    fn stopped_clock_never_fires() {
        let mut clock = TempoClock::new(120.0);
        assert!(!clock.tick(10.0));
        clock.start();
        clock.tick(0.3);
        clock.stop();
        assert_eq!(clock.elapsed(), 0.0);
        assert!(!clock.tick(10.0));
    }

    #[test]
    fn start_resets_accumulator() {
        let mut clock = TempoClock::new(120.0);
        clock.start();
        clock.tick(0.4);
        clock.start();
        assert!(!clock.tick(0.2));
    }
}
