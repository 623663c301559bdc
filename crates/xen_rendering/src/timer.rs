//! GPU frame timing.

use crate::device::GraphicsDevice;

/// Wraps the device's timer query around a frame's GPU work.
///
/// `end` blocks until the result is available. It is the only readback the
/// render loop waits on.
#[derive(Debug, Default)]
pub struct GpuTimer {
    active: bool,
    last_ms: f32,
}

impl GpuTimer {
    /// Creates an idle timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing. A second `begin` without `end` is ignored.
    pub fn begin(&mut self, device: &mut dyn GraphicsDevice) {
        if self.active {
            return;
        }
        device.begin_timer_query();
        self.active = true;
    }

    /// Stops timing and returns the elapsed GPU milliseconds.
    ///
    /// Returns the previous measurement if the timer was not running.
    pub fn end(&mut self, device: &mut dyn GraphicsDevice) -> f32 {
        if !self.active {
            return self.last_ms;
        }
        self.active = false;
        if let Some(elapsed) = device.end_timer_query() {
            self.last_ms = elapsed.as_secs_f32() * 1000.0;
        }
        self.last_ms
    }

    /// Last measured GPU time in milliseconds.
    #[must_use]
    pub fn last_ms(&self) -> f32 {
        self.last_ms
    }

    /// Returns true between `begin` and `end`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}
