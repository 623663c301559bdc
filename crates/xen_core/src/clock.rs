//! # Clock
//!
//! Wall-clock timing source for both loops.
//!
//! ```text
//! start() ── tick() ── update() ── tick() ── update() ── ... ── stop()
//!            │         │
//!            │         └─ frame_time: work done since the tick
//!            └─ delta_time: time since the previous tick
//! ```

use std::time::{Duration, Instant};

/// Delta-time and frame-time source.
///
/// Each loop owns its own clock; nothing here is shared between threads.
#[derive(Clone, Debug)]
pub struct Clock {
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    last_tick: Instant,
    delta: Duration,
    frame_time: Duration,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Creates a stopped clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: None,
            stopped_at: None,
            last_tick: Instant::now(),
            delta: Duration::ZERO,
            frame_time: Duration::ZERO,
        }
    }

    /// Starts (or restarts) the clock. Resets delta and frame time.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Stops the clock. Elapsed time freezes at this instant.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.stopped_at = Some(Instant::now());
        }
    }

    /// Advances one tick and returns the time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Records how long the current frame has taken since its tick.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// Returns whether the clock has been started and not stopped.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// Time between the last two ticks.
    #[inline]
    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Time between the last two ticks, in seconds.
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Work time of the last frame, in milliseconds.
    #[inline]
    #[must_use]
    pub fn frame_time(&self) -> f32 {
        self.frame_time.as_secs_f32() * 1000.0
    }

    /// Milliseconds since `start()`. Frozen once stopped, zero if never started.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let end = self.stopped_at.unwrap_or_else(Instant::now);
        end.saturating_duration_since(started).as_secs_f32() * 1000.0
    }

    /// Ticks per second implied by the last delta. Zero before the first tick.
    #[must_use]
    pub fn frame_rate(&self) -> f32 {
        let delta = self.delta_time();
        if delta > 0.0 {
            1.0 / delta
        } else {
            0.0
        }
    }

    fn start_at(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.stopped_at = None;
        self.last_tick = now;
        self.delta = Duration::ZERO;
        self.frame_time = Duration::ZERO;
    }

    fn tick_at(&mut self, now: Instant) -> Duration {
        self.delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.delta
    }

    fn update_at(&mut self, now: Instant) {
        self.frame_time = now.saturating_duration_since(self.last_tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_is_idle() {
        let clock = Clock::new();
        assert!(!clock.is_running());
        assert_eq!(clock.elapsed(), 0.0);
        assert_eq!(clock.frame_rate(), 0.0);
    }

    #[test]
    fn test_tick_measures_delta() {
        let mut clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);

        let delta = clock.tick_at(t0 + Duration::from_millis(20));
        assert_eq!(delta, Duration::from_millis(20));
        assert!((clock.delta_time() - 0.020).abs() < 1e-6);
        assert!((clock.frame_rate() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_update_measures_frame_time() {
        let mut clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        clock.tick_at(t0 + Duration::from_millis(10));
        clock.update_at(t0 + Duration::from_millis(14));
        assert!((clock.frame_time() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_stop_freezes_elapsed() {
        let mut clock = Clock::new();
        clock.start();
        assert!(clock.is_running());
        clock.stop();
        assert!(!clock.is_running());

        let frozen = clock.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), frozen);
    }

    #[test]
    fn test_restart_resets_delta() {
        let mut clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        clock.tick_at(t0 + Duration::from_millis(30));
        clock.start_at(t0 + Duration::from_millis(40));
        assert_eq!(clock.delta(), Duration::ZERO);
        assert!(clock.is_running());
    }
}
