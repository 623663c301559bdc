//! # Graphics Device Contract
//!
//! The driver surface the engine core talks to. Calls follow the classic
//! immediate-mode driver model:
//!
//! ```text
//! create_*()  -> names (ids), no error return
//! bind/draw   -> side effects, no error return
//! check_error -> first error raised since the last check (sticky, then cleared)
//! ```
//!
//! A device is NOT `Send`: it lives and dies on the thread that created the
//! context. Other threads reach it only through queued commands.

mod headless;
#[cfg(feature = "wgpu")]
mod wgpu_device;

pub use headless::{DeviceCall, HeadlessDevice};
#[cfg(feature = "wgpu")]
pub use wgpu_device::WgpuDevice;

use std::time::Duration;

use xen_core::{BufferId, FramebufferId, GpuResource, ResourceReleaser, TextureId};

use crate::error::DeviceError;

/// Pixel format of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit sRGB color with alpha.
    Rgba8,
    /// 16-bit float HDR color.
    Rgba16Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true for depth formats.
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

/// Size and format of a 2D texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
}

impl TextureDesc {
    /// HDR color target.
    #[must_use]
    pub const fn color(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba16Float,
        }
    }

    /// Depth target.
    #[must_use]
    pub const fn depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Depth32Float,
        }
    }
}

/// Texture binding point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Regular 2D texture.
    Texture2D,
    /// Cube map (environment, shadow cubes).
    CubeMap,
}

/// Framebuffer attachment point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Color attachment `n`.
    Color(u8),
    /// Depth attachment.
    Depth,
}

/// Primitive assembly mode for indexed draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveMode {
    /// Independent triangles.
    Triangles,
    /// Triangle strip.
    TriangleStrip,
    /// Independent lines.
    Lines,
}

/// Width of each index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexType {
    /// Bytes per index.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Viewport rectangle in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge.
    pub x: u32,
    /// Bottom edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Viewport {
    /// Full-surface viewport.
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Object and draw counters a device keeps for overlays and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Live buffers.
    pub buffers: usize,
    /// Live textures.
    pub textures: usize,
    /// Live framebuffers.
    pub framebuffers: usize,
    /// Draw calls issued since creation.
    pub draw_calls: u64,
}

impl DeviceStats {
    /// All live objects.
    #[must_use]
    pub const fn live_objects(&self) -> usize {
        self.buffers + self.textures + self.framebuffers
    }
}

/// The driver contract.
///
/// Also a [`ResourceReleaser`], so a device can be handed straight to
/// [`StateBuffer::cleanup`](xen_core::StateBuffer::cleanup).
pub trait GraphicsDevice: ResourceReleaser {
    /// Backend name (for logs).
    fn name(&self) -> &str;

    /// Generates `count` buffer names.
    fn create_buffers(&mut self, count: usize) -> Vec<BufferId>;

    /// Replaces the contents of `buffer`.
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]);

    /// Deletes buffers. Unknown names are ignored.
    fn delete_buffers(&mut self, buffers: &[BufferId]);

    /// Creates `count` textures with the given storage.
    fn create_textures(&mut self, count: usize, desc: TextureDesc) -> Vec<TextureId>;

    /// Binds `texture` to `target`.
    fn bind_texture(&mut self, texture: TextureId, target: TextureTarget);

    /// Deletes textures. Unknown names are ignored.
    fn delete_textures(&mut self, textures: &[TextureId]);

    /// Generates `count` framebuffer names.
    fn create_framebuffers(&mut self, count: usize) -> Vec<FramebufferId>;

    /// Attaches `texture` to `framebuffer` at `attachment`.
    fn attach_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId);

    /// Binds `framebuffer`, or the default framebuffer with `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Deletes framebuffers. Unknown names are ignored.
    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears the bound framebuffer's color (and depth) attachments.
    fn clear(&mut self, color: [f32; 4]);

    /// Draws `count` indices from the bound index buffer starting at byte `offset`.
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: usize);

    /// Starts a GPU timer query.
    fn begin_timer_query(&mut self);

    /// Ends the timer query and waits for the result. The only blocking
    /// readback in the frame. `None` if no query was started.
    fn end_timer_query(&mut self) -> Option<Duration>;

    /// Returns (and clears) the first error raised since the last check.
    fn check_error(&mut self) -> Option<DeviceError>;

    /// Current object and draw counters.
    fn stats(&self) -> DeviceStats;
}

/// Dispatches a [`GpuResource`] to the matching delete call.
pub fn release_resource<D: GraphicsDevice + ?Sized>(device: &mut D, resource: GpuResource) {
    match resource {
        GpuResource::Buffer(id) => device.delete_buffers(&[id]),
        GpuResource::Texture(id) => device.delete_textures(&[id]),
        GpuResource::Framebuffer(id) => device.delete_framebuffers(&[id]),
    }
}
