//! # Snapshot State
//!
//! [`GameState`] plus the singletons every snapshot carries.

mod camera;
mod game_state;
mod lighting;

pub use camera::CameraState;
pub use game_state::GameState;
pub use lighting::{DirectionalLight, Light, LightingState, PointLight};
