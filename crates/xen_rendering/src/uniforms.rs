//! # Uniform Packing
//!
//! GPU-layout (std140-compatible, vec4-aligned) copies of snapshot data.
//! Lights and materials are closed enums; this is the one place they are
//! matched on.

use bytemuck::{Pod, Zeroable};
use xen_core::{CameraState, Light, LightingState, Material};

/// Max lights in one [`LightsUniform`].
pub const MAX_LIGHTS: usize = 16;

/// Light kind tag stored in `LightUniform::params[2]`.
const KIND_DIRECTIONAL: f32 = 0.0;
const KIND_POINT: f32 = 1.0;

/// Shading model tag stored in `MaterialUniform::albedo_model[3]`.
const MODEL_PBR: f32 = 0.0;
const MODEL_BLINN_PHONG: f32 = 1.0;

/// Per-frame camera block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    /// World -> clip.
    pub view_projection: [[f32; 4]; 4],
    /// World -> view.
    pub view: [[f32; 4]; 4],
    /// Eye position (w = 1).
    pub position: [f32; 4],
}

impl From<&CameraState> for CameraUniform {
    fn from(camera: &CameraState) -> Self {
        Self {
            view_projection: camera.view_projection().to_cols_array_2d(),
            view: camera.view.to_cols_array_2d(),
            position: camera.position.extend(1.0).to_array(),
        }
    }
}

/// One light.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// Direction (directional, w = 0) or position (point, w = 1).
    pub vector: [f32; 4],
    /// RGB color, intensity in w.
    pub color: [f32; 4],
    /// x = range (0 = infinite), y = casts shadows, z = kind.
    pub params: [f32; 4],
}

impl From<Light> for LightUniform {
    fn from(light: Light) -> Self {
        match light {
            Light::Directional(sun) => Self {
                vector: sun.direction.extend(0.0).to_array(),
                color: sun.color.extend(sun.intensity).to_array(),
                params: [0.0, f32::from(u8::from(sun.casts_shadows)), KIND_DIRECTIONAL, 0.0],
            },
            Light::Point(point) => Self {
                vector: point.position.extend(1.0).to_array(),
                color: point.color.extend(point.intensity).to_array(),
                params: [point.range, 0.0, KIND_POINT, 0.0],
            },
        }
    }
}

/// Every light in the scene plus the ambient term.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightsUniform {
    /// First `count` entries are valid.
    pub lights: [LightUniform; MAX_LIGHTS],
    /// Ambient RGB; w holds the light count.
    pub ambient_count: [f32; 4],
}

impl LightsUniform {
    /// Number of valid entries.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self) -> usize {
        self.ambient_count[3] as usize
    }
}

/// Packs the lighting singleton, sun first. Lights past [`MAX_LIGHTS`] are
/// dropped.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pack_lights(lighting: &LightingState) -> LightsUniform {
    let mut packed = LightsUniform::default();
    let mut count = 0;
    for (slot, light) in packed.lights.iter_mut().zip(lighting.lights()) {
        *slot = light.into();
        count += 1;
    }
    let total = 1 + lighting.point_lights.len();
    if total > MAX_LIGHTS {
        tracing::trace!("{} lights exceed the uniform limit of {}", total, MAX_LIGHTS);
    }
    packed.ambient_count = lighting.ambient.extend(count as f32).to_array();
    packed
}

/// Surface parameters for one draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Albedo / diffuse RGB; w = shading model.
    pub albedo_model: [f32; 4],
    /// PBR: metallic, roughness, ao. Blinn-Phong: specular RGB.
    pub params: [f32; 4],
    /// Blinn-Phong shininess in x.
    pub extra: [f32; 4],
    /// Non-zero where a texture map is bound (albedo, normal, mr, ao).
    pub texture_mask: [u32; 4],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        match *material {
            Material::Pbr {
                albedo,
                metallic,
                roughness,
                ao,
                textures,
            } => Self {
                albedo_model: albedo.extend(MODEL_PBR).to_array(),
                params: [metallic, roughness, ao, 0.0],
                extra: [0.0; 4],
                texture_mask: [
                    textures.albedo.is_some(),
                    textures.normal.is_some(),
                    textures.metallic_roughness.is_some(),
                    textures.ao.is_some(),
                ]
                .map(u32::from),
            },
            Material::BlinnPhong {
                diffuse,
                specular,
                shininess,
                diffuse_map,
            } => Self {
                albedo_model: diffuse.extend(MODEL_BLINN_PHONG).to_array(),
                params: specular.extend(0.0).to_array(),
                extra: [shininess, 0.0, 0.0, 0.0],
                texture_mask: [u32::from(diffuse_map.is_some()), 0, 0, 0],
            },
        }
    }
}
