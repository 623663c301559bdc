//! # Component Definitions
//!
//! Components are plain values. Anything that refers to GPU memory does so
//! through ids (see [`crate::gpu`]), so cloning a component never duplicates
//! or shares a driver object; it only copies the name.

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::table::ComponentTable;
use crate::gpu::{BufferId, GpuResource, ResourceReleaser, TextureId};
use crate::state::GameState;

/// Trait for component kinds stored in a [`GameState`].
///
/// Each kind maps to exactly one table inside the state; the generic
/// accessors on `GameState` go through this mapping.
pub trait Component: Clone + Send + Sync + 'static {
    /// Human-readable kind name (for logs).
    const NAME: &'static str;

    /// The table holding this kind.
    fn table(state: &GameState) -> &ComponentTable<Self>;

    /// The table holding this kind, mutably.
    fn table_mut(state: &mut GameState) -> &mut ComponentTable<Self>;
}

// =============================================================================
// TRANSFORM
// =============================================================================

/// Local position, rotation and scale of an entity.
///
/// Rotation is XYZ Euler angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformComponent {
    /// Translation relative to the parent.
    pub position: Vec3,
    /// Euler rotation (radians, XYZ order).
    pub rotation: Vec3,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl TransformComponent {
    /// Identity transform placed at `position`.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Moves by `delta`.
    #[inline]
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Adds `euler` (radians) to the rotation.
    #[inline]
    pub fn rotate(&mut self, euler: Vec3) {
        self.rotation += euler;
    }

    /// Multiplies the scale per axis.
    #[inline]
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    /// Local model matrix (scale, then rotate, then translate).
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

// =============================================================================
// RENDER
// =============================================================================

/// GPU buffers of an uploaded mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshHandle {
    /// Vertex data.
    pub vertex_buffer: BufferId,
    /// Index data.
    pub index_buffer: BufferId,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Texture maps used by the PBR material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PbrTextures {
    /// Base color map.
    pub albedo: Option<TextureId>,
    /// Tangent-space normal map.
    pub normal: Option<TextureId>,
    /// Metallic (B) / roughness (G) map.
    pub metallic_roughness: Option<TextureId>,
    /// Ambient occlusion map.
    pub ao: Option<TextureId>,
}

impl PbrTextures {
    fn slots_mut(&mut self) -> [&mut Option<TextureId>; 4] {
        [
            &mut self.albedo,
            &mut self.normal,
            &mut self.metallic_roughness,
            &mut self.ao,
        ]
    }
}

/// Surface description. A closed set, matched once at uniform upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    /// Metallic/roughness physically based material.
    Pbr {
        /// Base color (linear RGB).
        albedo: Vec3,
        /// 0 = dielectric, 1 = metal.
        metallic: f32,
        /// Perceptual roughness.
        roughness: f32,
        /// Ambient occlusion factor.
        ao: f32,
        /// Optional texture maps.
        textures: PbrTextures,
    },
    /// Classic Blinn-Phong material.
    BlinnPhong {
        /// Diffuse color (linear RGB).
        diffuse: Vec3,
        /// Specular color (linear RGB).
        specular: Vec3,
        /// Specular exponent.
        shininess: f32,
        /// Optional diffuse map.
        diffuse_map: Option<TextureId>,
    },
}

impl Default for Material {
    fn default() -> Self {
        Self::Pbr {
            albedo: Vec3::splat(0.8),
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
            textures: PbrTextures::default(),
        }
    }
}

impl Material {
    fn texture_slots_mut(&mut self) -> Vec<&mut Option<TextureId>> {
        match self {
            Self::Pbr { textures, .. } => textures.slots_mut().into_iter().collect(),
            Self::BlinnPhong { diffuse_map, .. } => vec![diffuse_map],
        }
    }

    /// Appends every texture this material samples.
    pub fn collect_textures(&self, out: &mut Vec<GpuResource>) {
        match self {
            Self::Pbr { textures, .. } => {
                let maps = [
                    textures.albedo,
                    textures.normal,
                    textures.metallic_roughness,
                    textures.ao,
                ];
                out.extend(maps.into_iter().flatten().map(GpuResource::Texture));
            }
            Self::BlinnPhong { diffuse_map, .. } => {
                out.extend(diffuse_map.map(GpuResource::Texture));
            }
        }
    }
}

/// Drawable state of an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderComponent {
    /// Uploaded mesh, if any.
    pub mesh: Option<MeshHandle>,
    /// Surface material.
    pub material: Material,
    /// Skip drawing when false.
    pub visible: bool,
    /// Include in shadow passes.
    pub casts_shadows: bool,
}

impl Default for RenderComponent {
    fn default() -> Self {
        Self {
            mesh: None,
            material: Material::default(),
            visible: true,
            casts_shadows: true,
        }
    }
}

impl RenderComponent {
    /// Visible component drawing `mesh` with `material`.
    #[must_use]
    pub fn new(mesh: MeshHandle, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            material,
            ..Self::default()
        }
    }

    /// Appends every GPU object this component refers to.
    pub fn collect_resources(&self, out: &mut Vec<GpuResource>) {
        if let Some(mesh) = &self.mesh {
            out.push(GpuResource::Buffer(mesh.vertex_buffer));
            out.push(GpuResource::Buffer(mesh.index_buffer));
        }
        self.material.collect_textures(out);
    }

    /// Releases every referenced GPU object and forgets the handles.
    ///
    /// # Returns
    ///
    /// Number of objects released.
    pub fn release<R: ResourceReleaser + ?Sized>(&mut self, releaser: &mut R) -> usize {
        let mut released = 0;
        if let Some(mesh) = self.mesh.take() {
            releaser.release(GpuResource::Buffer(mesh.vertex_buffer));
            releaser.release(GpuResource::Buffer(mesh.index_buffer));
            released += 2;
        }
        for slot in self.material.texture_slots_mut() {
            if let Some(texture) = slot.take() {
                releaser.release(GpuResource::Texture(texture));
                released += 1;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> MeshHandle {
        MeshHandle {
            vertex_buffer: BufferId(1),
            index_buffer: BufferId(2),
            index_count: 36,
        }
    }

    #[test]
    fn test_transform_matrix_applies_translation() {
        let t = TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0));
        let p = t.matrix().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_transform_mutators() {
        let mut t = TransformComponent::default();
        t.translate(Vec3::X);
        t.translate(Vec3::X);
        t.scale_by(Vec3::splat(2.0));
        t.rotate(Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(t.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
        assert_eq!(t.rotation.y, 0.5);
    }

    #[test]
    fn test_render_component_collects_mesh_and_textures() {
        let material = Material::Pbr {
            albedo: Vec3::ONE,
            metallic: 1.0,
            roughness: 0.2,
            ao: 1.0,
            textures: PbrTextures {
                albedo: Some(TextureId(5)),
                normal: Some(TextureId(6)),
                ..PbrTextures::default()
            },
        };
        let render = RenderComponent::new(mesh(), material);

        let mut out = Vec::new();
        render.collect_resources(&mut out);
        assert_eq!(
            out,
            vec![
                GpuResource::Buffer(BufferId(1)),
                GpuResource::Buffer(BufferId(2)),
                GpuResource::Texture(TextureId(5)),
                GpuResource::Texture(TextureId(6)),
            ]
        );
    }

    #[test]
    fn test_release_forgets_handles() {
        let material = Material::BlinnPhong {
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            shininess: 32.0,
            diffuse_map: Some(TextureId(3)),
        };
        let mut render = RenderComponent::new(mesh(), material);

        let mut released: Vec<GpuResource> = Vec::new();
        assert_eq!(render.release(&mut released), 3);
        assert!(render.mesh.is_none());

        // Second release is a no-op.
        assert_eq!(render.release(&mut released), 0);
        assert_eq!(released.len(), 3);
    }
}
