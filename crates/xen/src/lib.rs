//! # Xen
//!
//! Engine driver: configuration, telemetry, the platform seam and the
//! two-thread [`GameLoop`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────┐          ┌────────────────────────────┐
//! │ Simulation (Send)          │          │ Game (render thread only)  │
//! │   update(&mut GameState)   │          │   draw(&GameState)         │
//! └─────────────┬──────────────┘          └─────────────▲──────────────┘
//!               │ publish                               │ read
//!               ▼                                       │
//!        ┌──────────────────────────────────────────────┴──┐
//!        │ StateBuffer (xen_core): write / ready / read     │
//!        └──────────────────────────────────────────────────┘
//!                                                        │
//!                              RenderSystem (xen_rendering) ── GraphicsDevice
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use xen::{EngineConfig, GameLoop, HeadlessPlatform};
//!
//! let config = EngineConfig::default();
//! let mut platform = HeadlessPlatform::from_config(&config);
//! let summary = GameLoop::new(config).run(&mut platform, &mut my_game, my_simulation)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod game;
pub mod game_loop;
pub mod platform;
pub mod telemetry;

pub use config::{EngineConfig, HeadlessConfig, LoggingConfig, SimulationConfig};
pub use error::{EngineError, EngineResult};
pub use game::{Game, Simulation, TickContext};
pub use game_loop::{GameLoop, RunSummary, ShutdownHandle, SIMULATION_THREAD_NAME};
pub use platform::{DeviceBackend, HeadlessPlatform, Key, Platform, PlatformEvent};
pub use telemetry::{millis, FrameTelemetry, TelemetrySnapshot};

pub use xen_core;
pub use xen_rendering;
