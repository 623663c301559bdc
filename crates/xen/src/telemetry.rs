//! # Frame Telemetry
//!
//! Timing metrics published by both loops and readable from anywhere
//! without locking. One instance is owned by the [`GameLoop`](crate::GameLoop)
//! and lent to each loop by reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use atomig::Atomic;
use xen_core::SwapStats;

/// Converts a duration to fractional milliseconds.
#[inline]
#[must_use]
pub fn millis(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

/// Atomically published timing and backpressure metrics.
#[derive(Debug)]
pub struct FrameTelemetry {
    sim_tick_ms: Atomic<f32>,
    render_cpu_ms: Atomic<f32>,
    gpu_ms: Atomic<f32>,
    frame_ms: Atomic<f32>,
    ticks: AtomicU64,
    frames: AtomicU64,
    stale_frames: AtomicU64,
    dropped_snapshots: AtomicU64,
}

impl Default for FrameTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTelemetry {
    /// All metrics zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sim_tick_ms: Atomic::new(0.0),
            render_cpu_ms: Atomic::new(0.0),
            gpu_ms: Atomic::new(0.0),
            frame_ms: Atomic::new(0.0),
            ticks: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            stale_frames: AtomicU64::new(0),
            dropped_snapshots: AtomicU64::new(0),
        }
    }

    /// Simulation thread: one tick finished in `tick_ms`.
    pub fn record_tick(&self, tick_ms: f32) {
        self.sim_tick_ms.store(tick_ms, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Render thread: one frame finished.
    pub fn record_frame(&self, render_cpu_ms: f32, gpu_ms: f32, frame_ms: f32) {
        self.render_cpu_ms.store(render_cpu_ms, Ordering::Relaxed);
        self.gpu_ms.store(gpu_ms, Ordering::Relaxed);
        self.frame_ms.store(frame_ms, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the state buffer's backpressure counters.
    pub fn record_backpressure(&self, stats: &SwapStats) {
        self.stale_frames.store(stats.stale_reads(), Ordering::Relaxed);
        self.dropped_snapshots.store(stats.superseded(), Ordering::Relaxed);
    }

    /// Simulation ticks completed.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Frames presented.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every metric.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            sim_tick_ms: self.sim_tick_ms.load(Ordering::Relaxed),
            render_cpu_ms: self.render_cpu_ms.load(Ordering::Relaxed),
            gpu_ms: self.gpu_ms.load(Ordering::Relaxed),
            frame_ms: self.frame_ms.load(Ordering::Relaxed),
            ticks: self.ticks(),
            frames: self.frames(),
            stale_frames: self.stale_frames.load(Ordering::Relaxed),
            dropped_snapshots: self.dropped_snapshots.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`FrameTelemetry`] for overlays and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Last simulation tick duration (ms).
    pub sim_tick_ms: f32,
    /// Last render thread CPU time (ms).
    pub render_cpu_ms: f32,
    /// Last GPU time (ms).
    pub gpu_ms: f32,
    /// Last total frame time (ms).
    pub frame_ms: f32,
    /// Simulation ticks completed.
    pub ticks: u64,
    /// Frames presented.
    pub frames: u64,
    /// Frames that re-rendered an old snapshot.
    pub stale_frames: u64,
    /// Snapshots replaced before the renderer saw them.
    pub dropped_snapshots: u64,
}

impl TelemetrySnapshot {
    /// Frames per second implied by the last frame time.
    #[must_use]
    pub fn fps(&self) -> f32 {
        if self.frame_ms > 0.0 {
            1000.0 / self.frame_ms
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let telemetry = FrameTelemetry::new();
        telemetry.record_tick(1.5);
        telemetry.record_frame(2.0, 3.0, 8.0);

        let snap = telemetry.snapshot();
        assert_eq!(snap.sim_tick_ms, 1.5);
        assert_eq!(snap.gpu_ms, 3.0);
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.fps(), 125.0);
    }

    #[test]
    fn test_shared_across_threads() {
        let telemetry = FrameTelemetry::new();
        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..100 {
                    telemetry.record_tick(0.5);
                }
            });
            for _ in 0..50 {
                telemetry.record_frame(1.0, 1.0, 1.0);
            }
        });
        assert_eq!(telemetry.ticks(), 100);
        assert_eq!(telemetry.frames(), 50);
    }

    #[test]
    fn test_millis() {
        assert!((millis(Duration::from_micros(2500)) - 2.5).abs() < 1e-4);
    }
}
