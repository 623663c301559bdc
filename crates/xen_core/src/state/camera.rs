//! Camera singleton carried by every snapshot.

use glam::{Mat4, Vec3};

/// View/projection matrices and eye position for the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// World -> view transform.
    pub view: Mat4,
    /// View -> clip transform.
    pub projection: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

impl CameraState {
    /// Right-handed perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_radians, aspect, 0.1, 1000.0),
            position: eye,
        }
    }

    /// Combined world -> clip transform.
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}
