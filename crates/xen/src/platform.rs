//! # Platform
//!
//! The window/context side of the engine: event polling, presenting, and
//! creating the graphics device on the thread that owns the context.
//! Windowing backends implement [`Platform`]; [`HeadlessPlatform`] is the
//! built-in one for tests, CI and the demo.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use xen_rendering::{GraphicsDevice, HeadlessDevice, RenderResult};

use crate::config::EngineConfig;

/// Keys the engine itself reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Escape (quits with `escape_to_quit`).
    Escape,
    /// Space bar.
    Space,
    /// F3 (conventional debug overlay toggle).
    F3,
    /// Any printable character.
    Char(char),
}

/// Something that happened to the window since the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The user asked to close the window.
    CloseRequested,
    /// The framebuffer changed size.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// A key went down.
    KeyPressed(Key),
}

/// Window and graphics context owner.
///
/// Every method is called from the render thread only.
pub trait Platform {
    /// Creates the graphics device for this platform's context.
    ///
    /// # Errors
    ///
    /// Returns a render error if no device can be created.
    fn create_device(&mut self) -> RenderResult<Box<dyn GraphicsDevice>>;

    /// Appends pending events to `events` without blocking.
    fn poll_events(&mut self, events: &mut Vec<PlatformEvent>);

    /// Shows the finished frame.
    fn present(&mut self);

    /// Current framebuffer size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

/// Which device a [`HeadlessPlatform`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceBackend {
    /// [`HeadlessDevice`] bookkeeping, no GPU.
    #[default]
    Headless,
    /// Offscreen wgpu device on the default adapter.
    #[cfg(feature = "wgpu")]
    Wgpu,
}

/// Platform with no window.
///
/// Presents `max_frames` frames and then reports [`PlatformEvent::CloseRequested`].
/// Extra events can be scheduled for specific frames.
#[derive(Debug)]
pub struct HeadlessPlatform {
    width: u32,
    height: u32,
    max_frames: u64,
    presented: u64,
    backend: DeviceBackend,
    /// (frame, event), sorted by frame.
    scheduled: VecDeque<(u64, PlatformEvent)>,
    vsync_interval: Option<Duration>,
    last_present: Option<Instant>,
}

impl HeadlessPlatform {
    /// A `width` x `height` surface that closes after `max_frames` frames
    /// (`0` = never).
    #[must_use]
    pub fn new(width: u32, height: u32, max_frames: u64) -> Self {
        Self {
            width,
            height,
            max_frames,
            presented: 0,
            backend: DeviceBackend::default(),
            scheduled: VecDeque::new(),
            vsync_interval: None,
            last_present: None,
        }
    }

    /// Builds the platform from engine settings.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut platform = Self::new(config.width, config.height, config.headless.max_frames);
        if config.vsync && config.headless.refresh_hz > 0 {
            platform.vsync_interval = Some(Duration::from_nanos(
                1_000_000_000 / u64::from(config.headless.refresh_hz),
            ));
        }
        platform
    }

    /// Selects the device created by [`Platform::create_device`].
    #[must_use]
    pub fn with_backend(mut self, backend: DeviceBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Delivers `event` on the poll that precedes frame `frame`.
    pub fn schedule(&mut self, frame: u64, event: PlatformEvent) {
        let at = self.scheduled.partition_point(|(f, _)| *f <= frame);
        self.scheduled.insert(at, (frame, event));
    }

    /// Frames presented so far.
    #[must_use]
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Platform for HeadlessPlatform {
    fn create_device(&mut self) -> RenderResult<Box<dyn GraphicsDevice>> {
        match self.backend {
            DeviceBackend::Headless => Ok(Box::new(HeadlessDevice::new())),
            #[cfg(feature = "wgpu")]
            DeviceBackend::Wgpu => Ok(Box::new(xen_rendering::WgpuDevice::new(self.width, self.height)?)),
        }
    }

    fn poll_events(&mut self, events: &mut Vec<PlatformEvent>) {
        while let Some(&(frame, event)) = self.scheduled.front() {
            if frame > self.presented {
                break;
            }
            self.scheduled.pop_front();
            if let PlatformEvent::Resized { width, height } = event {
                self.width = width;
                self.height = height;
            }
            events.push(event);
        }
        if self.max_frames > 0 && self.presented >= self.max_frames {
            events.push(PlatformEvent::CloseRequested);
        }
    }

    fn present(&mut self) {
        if let Some(interval) = self.vsync_interval {
            if let Some(last) = self.last_present {
                let spent = last.elapsed();
                if spent < interval {
                    thread::sleep(interval - spent);
                }
            }
        }
        self.last_present = Some(Instant::now());
        self.presented += 1;
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(platform: &mut HeadlessPlatform) -> Vec<PlatformEvent> {
        let mut events = Vec::new();
        platform.poll_events(&mut events);
        events
    }

    #[test]
    fn test_close_after_max_frames() {
        let mut platform = HeadlessPlatform::new(4, 4, 2);
        assert!(poll(&mut platform).is_empty());
        platform.present();
        platform.present();
        assert_eq!(poll(&mut platform), vec![PlatformEvent::CloseRequested]);
    }

    #[test]
    fn test_scheduled_events_fire_in_frame_order() {
        let mut platform = HeadlessPlatform::new(4, 4, 0);
        platform.schedule(1, PlatformEvent::KeyPressed(Key::Escape));
        platform.schedule(0, PlatformEvent::Resized { width: 8, height: 6 });

        assert_eq!(
            poll(&mut platform),
            vec![PlatformEvent::Resized { width: 8, height: 6 }]
        );
        assert_eq!(platform.framebuffer_size(), (8, 6));
        platform.present();
        assert_eq!(poll(&mut platform), vec![PlatformEvent::KeyPressed(Key::Escape)]);
        assert!(poll(&mut platform).is_empty());
    }

    #[test]
    fn test_vsync_paces_present() {
        let config = EngineConfig {
            vsync: true,
            headless: crate::config::HeadlessConfig {
                max_frames: 0,
                refresh_hz: 100,
            },
            ..EngineConfig::default()
        };
        let mut platform = HeadlessPlatform::from_config(&config);
        let start = Instant::now();
        for _ in 0..3 {
            platform.present();
        }
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_creates_headless_device() {
        let mut platform = HeadlessPlatform::new(4, 4, 0);
        assert_eq!(platform.create_device().unwrap().name(), "headless");
    }
}
