//! # Lighting State
//!
//! Lights are a closed set of variants. Consumers `match` on [`Light`] once,
//! at the point of uniform upload; there is no light trait object.

use glam::Vec3;

/// Infinitely distant light (the sun).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Normalized direction the light travels in.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Render a shadow map for this light.
    pub casts_shadows: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
            casts_shadows: true,
        }
    }
}

/// Light radiating from a point with finite range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    /// World position.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Distance at which the contribution reaches zero.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
        }
    }
}

/// Every kind of light the renderer knows about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    /// See [`DirectionalLight`].
    Directional(DirectionalLight),
    /// See [`PointLight`].
    Point(PointLight),
}

/// Scene-wide lighting singleton.
#[derive(Clone, Debug, PartialEq)]
pub struct LightingState {
    /// The single directional light.
    pub sun: DirectionalLight,
    /// Additional local lights.
    pub point_lights: Vec<PointLight>,
    /// Flat ambient term (linear RGB).
    pub ambient: Vec3,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            sun: DirectionalLight::default(),
            point_lights: Vec::new(),
            ambient: Vec3::splat(0.03),
        }
    }
}

impl LightingState {
    /// All lights, sun first.
    pub fn lights(&self) -> impl Iterator<Item = Light> + '_ {
        std::iter::once(Light::Directional(self.sun))
            .chain(self.point_lights.iter().copied().map(Light::Point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sun_is_normalized() {
        let sun = DirectionalLight::default();
        assert!((sun.direction.length() - 1.0).abs() < 1e-6);
        assert!(sun.casts_shadows);
    }

    #[test]
    fn test_lights_lists_sun_first() {
        let mut lighting = LightingState::default();
        lighting.point_lights.push(PointLight::default());
        let lights: Vec<_> = lighting.lights().collect();
        assert_eq!(lights.len(), 2);
        assert!(matches!(lights[0], Light::Directional(_)));
        assert!(matches!(lights[1], Light::Point(_)));
    }
}
