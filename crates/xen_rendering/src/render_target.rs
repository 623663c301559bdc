//! # Render Target
//!
//! Offscreen framebuffer with one HDR color texture and one depth texture,
//! sized to the window. Allocation is a single scoped batch:
//!
//! ```text
//! create framebuffer ─┐
//! create color tex ───┼─> attach color(0) + depth ─> (batch drops, executes)
//! create depth tex ───┘
//! ```
//!
//! On resize the new objects are allocated first; the old ones are deleted
//! only once every new object exists. A failed allocation deletes whatever
//! it did create, so a target never owns a half-built set or a dead id.

use xen_core::{FramebufferId, GpuResource, TextureId};

use crate::batch::ScopedBatchQueue;
use crate::commands::{
    BindFramebufferCommand, CommandOutput, CreateFramebuffersCommand, CreateTexturesCommand,
    DeleteFramebuffersCommand, DeleteTexturesCommand, SetViewportCommand,
};
use crate::device::{Attachment, GraphicsDevice, TextureDesc, Viewport};
use crate::error::{RenderError, RenderResult};
use crate::system::RenderSystem;
use crate::volatile::Volatile;

/// Outputs of one allocation batch.
struct Allocation {
    framebuffer: CommandOutput<Vec<FramebufferId>>,
    color: CommandOutput<Vec<TextureId>>,
    depth: CommandOutput<Vec<TextureId>>,
}

fn first<T: Copy>(output: &CommandOutput<Vec<T>>) -> Option<T> {
    output.with(|ids| ids.and_then(|ids| ids.first().copied()))
}

fn delete_objects(
    batch: &mut ScopedBatchQueue<'_>,
    framebuffer: Option<FramebufferId>,
    textures: Vec<TextureId>,
) {
    if let Some(framebuffer) = framebuffer {
        batch.submit(DeleteFramebuffersCommand(vec![framebuffer]));
    }
    if !textures.is_empty() {
        batch.submit(DeleteTexturesCommand(textures));
    }
}

impl Allocation {
    fn submit(batch: &mut ScopedBatchQueue<'_>, width: u32, height: u32) -> Self {
        let allocation = Self {
            framebuffer: CommandOutput::new(),
            color: CommandOutput::new(),
            depth: CommandOutput::new(),
        };
        let (fb, color, depth) = (
            allocation.framebuffer.clone(),
            allocation.color.clone(),
            allocation.depth.clone(),
        );
        batch
            .submit(CreateFramebuffersCommand::new(1).into_output(&allocation.framebuffer))
            .submit(CreateTexturesCommand::new(1, TextureDesc::color(width, height)).into_output(&allocation.color))
            .submit(CreateTexturesCommand::new(1, TextureDesc::depth(width, height)).into_output(&allocation.depth))
            .submit(move |device: &mut dyn GraphicsDevice| {
                let (Some(fb), Some(color), Some(depth)) = (first(&fb), first(&color), first(&depth)) else {
                    return;
                };
                device.attach_texture(fb, Attachment::Color(0), color);
                device.attach_texture(fb, Attachment::Depth, depth);
            });
        allocation
    }

    /// All three ids, or the first missing object after deleting the ones
    /// that were created.
    fn finish(&self, render: &mut RenderSystem) -> RenderResult<(FramebufferId, TextureId, TextureId)> {
        let (framebuffer, color, depth) = (first(&self.framebuffer), first(&self.color), first(&self.depth));
        if let (Some(framebuffer), Some(color), Some(depth)) = (framebuffer, color, depth) {
            return Ok((framebuffer, color, depth));
        }

        let what = match (framebuffer, color) {
            (None, _) => "framebuffer",
            (Some(_), None) => "color texture",
            (Some(_), Some(_)) => "depth texture",
        };
        let textures: Vec<TextureId> = color.into_iter().chain(depth).collect();
        tracing::warn!(
            "render target allocation failed at {}, deleting {} partial objects",
            what,
            usize::from(framebuffer.is_some()) + textures.len()
        );
        delete_objects(&mut render.batch(), framebuffer, textures);
        Err(RenderError::Allocation { what })
    }
}

/// Framebuffer + color + depth, rebuilt on resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    framebuffer: FramebufferId,
    color: TextureId,
    depth: TextureId,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Allocates a `width` x `height` target.
    ///
    /// # Errors
    ///
    /// [`RenderError::Allocation`] if the device could not create an object.
    /// Nothing stays allocated in that case.
    pub fn new(render: &mut RenderSystem, width: u32, height: u32) -> RenderResult<Self> {
        let allocation = {
            let mut batch = render.batch();
            Allocation::submit(&mut batch, width, height)
        };
        let (framebuffer, color, depth) = allocation.finish(render)?;
        tracing::debug!("render target {} allocated at {}x{}", framebuffer, width, height);
        Ok(Self {
            framebuffer,
            color,
            depth,
            width,
            height,
        })
    }

    /// Allocates objects at the new size, then deletes the current ones.
    ///
    /// Needs room for both sets on the device while it runs.
    ///
    /// # Errors
    ///
    /// [`RenderError::Allocation`] if the device could not create an object.
    /// The target then keeps its current objects and size, all still live.
    pub fn rebuild(&mut self, render: &mut RenderSystem, width: u32, height: u32) -> RenderResult<()> {
        let allocation = {
            let mut batch = render.batch();
            Allocation::submit(&mut batch, width, height)
        };
        let (framebuffer, color, depth) = allocation.finish(render)?;
        let old = std::mem::replace(
            self,
            Self {
                framebuffer,
                color,
                depth,
                width,
                height,
            },
        );
        delete_objects(&mut render.batch(), Some(old.framebuffer), vec![old.color, old.depth]);
        tracing::debug!(
            "render target {} rebuilt at {}x{} (was {} at {}x{})",
            framebuffer,
            width,
            height,
            old.framebuffer,
            old.width,
            old.height
        );
        Ok(())
    }

    /// Queues binding this target with a full viewport.
    pub fn bind(&self, render: &mut RenderSystem) {
        render
            .submit(BindFramebufferCommand(Some(self.framebuffer)))
            .submit(SetViewportCommand(Viewport::full(self.width, self.height)));
    }

    /// Queues deletion of every object.
    pub fn release(self, render: &mut RenderSystem) {
        render
            .submit(DeleteFramebuffersCommand(vec![self.framebuffer]))
            .submit(DeleteTexturesCommand(vec![self.color, self.depth]));
    }

    /// The framebuffer.
    #[must_use]
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// The color attachment.
    #[must_use]
    pub fn color(&self) -> TextureId {
        self.color
    }

    /// The depth attachment.
    #[must_use]
    pub fn depth(&self) -> TextureId {
        self.depth
    }

    /// Current size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Every GPU object the target owns.
    #[must_use]
    pub fn resources(&self) -> [GpuResource; 3] {
        [
            GpuResource::Framebuffer(self.framebuffer),
            GpuResource::Texture(self.color),
            GpuResource::Texture(self.depth),
        ]
    }
}

impl Volatile for RenderTarget {
    fn on_resize(&mut self, width: u32, height: u32, render: &mut RenderSystem) {
        if (width, height) == self.size() {
            return;
        }
        if let Err(error) = self.rebuild(render, width, height) {
            tracing::error!(
                "render target rebuild at {}x{} failed, keeping {}x{}: {}",
                width,
                height,
                self.width,
                self.height,
                error
            );
        }
    }
}
