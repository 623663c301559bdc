//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so a config
//! file only needs the values it changes:
//!
//! ```toml
//! title = "Space Game"
//! width = 1920
//! height = 1080
//!
//! [simulation]
//! tick_rate_hz = 60
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window title.
    pub title: String,
    /// Initial framebuffer width.
    pub width: u32,
    /// Initial framebuffer height.
    pub height: u32,
    /// Pace `present` to the display refresh.
    pub vsync: bool,
    /// End the run when Escape is pressed.
    pub escape_to_quit: bool,
    /// Run the debug overlay pass after each draw.
    pub debug_overlay: bool,
    /// Simulation thread settings.
    pub simulation: SimulationConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// Headless platform settings.
    pub headless: HeadlessConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Xen".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            escape_to_quit: true,
            debug_overlay: false,
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
            headless: HeadlessConfig::default(),
        }
    }
}

/// Simulation thread pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed ticks per second; `0` runs a variable tick as fast as possible.
    pub tick_rate_hz: u32,
    /// Upper bound on the delta handed to `update`, in seconds.
    pub max_delta_seconds: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            max_delta_seconds: 0.25,
        }
    }
}

impl SimulationConfig {
    /// Target tick period, or `None` for a variable tick.
    #[must_use]
    pub fn fixed_tick(&self) -> Option<Duration> {
        (self.tick_rate_hz > 0).then(|| Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz)))
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Settings for the windowless platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Frames to present before requesting close; `0` runs until `quit`.
    pub max_frames: u64,
    /// Refresh rate used for vsync pacing.
    pub refresh_hz: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            max_frames: 600,
            refresh_hz: 60,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigParse`] on malformed TOML,
    /// [`EngineError::InvalidConfig`] on out-of-range values.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigRead`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigWrite`] if serialization fails.
    pub fn to_toml_string(&self) -> EngineResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "framebuffer size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        let max_delta = self.simulation.max_delta_seconds;
        if max_delta.is_nan() || max_delta <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "simulation.max_delta_seconds must be positive, got {}",
                self.simulation.max_delta_seconds
            )));
        }
        if self.vsync && self.headless.refresh_hz == 0 {
            return Err(EngineError::InvalidConfig(
                "headless.refresh_hz must be non-zero with vsync".to_string(),
            ));
        }
        Ok(())
    }
}
