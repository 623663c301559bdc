//! Resources that must be rebuilt when the framebuffer size changes.

use crate::system::RenderSystem;

/// A GPU-backed object tied to the framebuffer size.
///
/// Register with [`RenderSystem::register_volatile`]; the render system keeps
/// only a weak reference, so dropping the owner unregisters it.
pub trait Volatile {
    /// Called on the context thread after the framebuffer was resized.
    fn on_resize(&mut self, width: u32, height: u32, render: &mut RenderSystem);
}
