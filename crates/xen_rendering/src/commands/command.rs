//! # Render Commands
//!
//! A command is data plus an `execute` contract: everything needed for one
//! driver operation, captured by value so it can wait in a queue.
//!
//! Closures taking `&mut dyn GraphicsDevice` are commands too, for one-off
//! work that does not deserve a type.

use bytemuck::Pod;
use xen_core::{BufferId, FramebufferId, TextureId};

use super::output::CommandOutput;
use crate::device::{
    Attachment, GraphicsDevice, IndexType, PrimitiveMode, TextureDesc, TextureTarget, Viewport,
};

/// A deferred driver operation.
pub trait RenderCommand: Send + 'static {
    /// What the command yields when run synchronously.
    type Output;

    /// Runs the command. Context thread only.
    fn execute(self, device: &mut dyn GraphicsDevice) -> Self::Output;
}

impl<F, T> RenderCommand for F
where
    F: FnOnce(&mut dyn GraphicsDevice) -> T + Send + 'static,
{
    type Output = T;

    #[inline]
    fn execute(self, device: &mut dyn GraphicsDevice) -> T {
        self(device)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Clears the bound framebuffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearCommand {
    /// RGBA clear color.
    pub color: [f32; 4],
}

impl ClearCommand {
    /// Clear to `(r, g, b, a)`.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { color: [r, g, b, a] }
    }
}

impl RenderCommand for ClearCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.clear(self.color);
    }
}

/// Sets the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetViewportCommand(pub Viewport);

impl RenderCommand for SetViewportCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.set_viewport(self.0);
    }
}

/// Binds a texture to a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindTextureCommand {
    /// Texture to bind.
    pub texture: TextureId,
    /// Binding point.
    pub target: TextureTarget,
}

impl RenderCommand for BindTextureCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.bind_texture(self.texture, self.target);
    }
}

/// Binds a framebuffer (`None` = default framebuffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindFramebufferCommand(pub Option<FramebufferId>);

impl RenderCommand for BindFramebufferCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(self.0);
    }
}

/// Indexed draw from the bound index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawElementsCommand {
    /// Primitive mode.
    pub mode: PrimitiveMode,
    /// Number of indices.
    pub count: u32,
    /// Index width.
    pub index_type: IndexType,
    /// Byte offset into the index buffer.
    pub offset: usize,
}

impl DrawElementsCommand {
    /// Triangle list of `count` 32-bit indices from the start of the buffer.
    #[must_use]
    pub const fn triangles(count: u32) -> Self {
        Self {
            mode: PrimitiveMode::Triangles,
            count,
            index_type: IndexType::U32,
            offset: 0,
        }
    }
}

impl RenderCommand for DrawElementsCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.draw_elements(self.mode, self.count, self.index_type, self.offset);
    }
}

// =============================================================================
// BUFFERS
// =============================================================================

/// Creates `count` buffers.
#[derive(Clone, Debug, Default)]
pub struct CreateBuffersCommand {
    count: usize,
    output: Option<CommandOutput<Vec<BufferId>>>,
}

impl CreateBuffersCommand {
    /// Creates `count` buffers.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            output: None,
        }
    }

    /// Also stores the new ids in `output` (for queued execution).
    #[must_use]
    pub fn into_output(mut self, output: &CommandOutput<Vec<BufferId>>) -> Self {
        self.output = Some(output.clone());
        self
    }
}

impl RenderCommand for CreateBuffersCommand {
    type Output = Vec<BufferId>;

    fn execute(self, device: &mut dyn GraphicsDevice) -> Vec<BufferId> {
        let ids = device.create_buffers(self.count);
        if let Some(output) = &self.output {
            output.set(ids.clone());
        }
        ids
    }
}

/// Replaces a buffer's contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadBufferCommand {
    /// Target buffer.
    pub buffer: BufferId,
    /// Bytes to upload (owned; the caller's data may be gone by drain time).
    pub data: Vec<u8>,
}

impl UploadBufferCommand {
    /// Uploads a slice of plain-old-data values.
    #[must_use]
    pub fn from_pod<T: Pod>(buffer: BufferId, values: &[T]) -> Self {
        Self {
            buffer,
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }
}

impl RenderCommand for UploadBufferCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.upload_buffer(self.buffer, &self.data);
    }
}

/// Deletes buffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteBuffersCommand(pub Vec<BufferId>);

impl RenderCommand for DeleteBuffersCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.delete_buffers(&self.0);
    }
}

// =============================================================================
// TEXTURES
// =============================================================================

/// Creates `count` textures with the same storage.
#[derive(Clone, Debug)]
pub struct CreateTexturesCommand {
    count: usize,
    desc: TextureDesc,
    output: Option<CommandOutput<Vec<TextureId>>>,
}

impl CreateTexturesCommand {
    /// Creates `count` textures described by `desc`.
    #[must_use]
    pub fn new(count: usize, desc: TextureDesc) -> Self {
        Self {
            count,
            desc,
            output: None,
        }
    }

    /// Also stores the new ids in `output`.
    #[must_use]
    pub fn into_output(mut self, output: &CommandOutput<Vec<TextureId>>) -> Self {
        self.output = Some(output.clone());
        self
    }
}

impl RenderCommand for CreateTexturesCommand {
    type Output = Vec<TextureId>;

    fn execute(self, device: &mut dyn GraphicsDevice) -> Vec<TextureId> {
        let ids = device.create_textures(self.count, self.desc);
        if let Some(output) = &self.output {
            output.set(ids.clone());
        }
        ids
    }
}

/// Deletes textures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteTexturesCommand(pub Vec<TextureId>);

impl RenderCommand for DeleteTexturesCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.delete_textures(&self.0);
    }
}

// =============================================================================
// FRAMEBUFFERS
// =============================================================================

/// Creates `count` framebuffers.
#[derive(Clone, Debug, Default)]
pub struct CreateFramebuffersCommand {
    count: usize,
    output: Option<CommandOutput<Vec<FramebufferId>>>,
}

impl CreateFramebuffersCommand {
    /// Creates `count` framebuffers.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            output: None,
        }
    }

    /// Also stores the new ids in `output`.
    #[must_use]
    pub fn into_output(mut self, output: &CommandOutput<Vec<FramebufferId>>) -> Self {
        self.output = Some(output.clone());
        self
    }
}

impl RenderCommand for CreateFramebuffersCommand {
    type Output = Vec<FramebufferId>;

    fn execute(self, device: &mut dyn GraphicsDevice) -> Vec<FramebufferId> {
        let ids = device.create_framebuffers(self.count);
        if let Some(output) = &self.output {
            output.set(ids.clone());
        }
        ids
    }
}

/// Attaches a texture to a framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachTextureCommand {
    /// Target framebuffer.
    pub framebuffer: FramebufferId,
    /// Attachment point.
    pub attachment: Attachment,
    /// Texture to attach.
    pub texture: TextureId,
}

impl RenderCommand for AttachTextureCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.attach_texture(self.framebuffer, self.attachment, self.texture);
    }
}

/// Deletes framebuffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFramebuffersCommand(pub Vec<FramebufferId>);

impl RenderCommand for DeleteFramebuffersCommand {
    type Output = ();

    fn execute(self, device: &mut dyn GraphicsDevice) {
        device.delete_framebuffers(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, HeadlessDevice};

    #[test]
    fn test_create_fills_output() {
        let mut device = HeadlessDevice::new();
        let out = CommandOutput::new();
        let ids = CreateBuffersCommand::new(3).into_output(&out).execute(&mut device);
        assert_eq!(ids.len(), 3);
        assert_eq!(out.take(), Some(ids));
    }

    #[test]
    fn test_upload_from_pod() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffers(1)[0];
        UploadBufferCommand::from_pod(buffer, &[1.0f32, 2.0, 3.0]).execute(&mut device);
        assert_eq!(
            device.calls().last(),
            Some(&DeviceCall::UploadBuffer { buffer, bytes: 12 })
        );
    }

    #[test]
    fn test_closure_is_a_command() {
        let mut device = HeadlessDevice::new();
        let name = (|d: &mut dyn GraphicsDevice| d.name().to_string()).execute(&mut device);
        assert_eq!(name, "headless");
    }
}
