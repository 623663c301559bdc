//! # GPU Object Handles
//!
//! Game state never owns GPU objects directly. It stores the ids the driver
//! handed out, and release is delegated to whoever owns the context:
//!
//! ```text
//! GameState ──(ids)──> ResourceReleaser ──> driver delete calls
//!                       (context thread only)
//! ```

use std::fmt;

macro_rules! gpu_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw driver name.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

gpu_id!(
    /// Driver name of a GPU buffer (vertex, index or uniform data).
    BufferId,
    "buffer"
);
gpu_id!(
    /// Driver name of a GPU texture.
    TextureId,
    "texture"
);
gpu_id!(
    /// Driver name of a framebuffer object.
    FramebufferId,
    "framebuffer"
);

/// Any GPU object a snapshot can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpuResource {
    /// A buffer object.
    Buffer(BufferId),
    /// A texture object.
    Texture(TextureId),
    /// A framebuffer object.
    Framebuffer(FramebufferId),
}

impl fmt::Display for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(id) => id.fmt(f),
            Self::Texture(id) => id.fmt(f),
            Self::Framebuffer(id) => id.fmt(f),
        }
    }
}

/// Issues the real delete call for a GPU object.
///
/// Implemented by graphics devices. Must only be driven from the thread that
/// owns the graphics context.
pub trait ResourceReleaser {
    /// Deletes one GPU object.
    fn release(&mut self, resource: GpuResource);
}

/// Collects handles instead of deleting them. Handy for tooling and tests.
impl ResourceReleaser for Vec<GpuResource> {
    fn release(&mut self, resource: GpuResource) {
        self.push(resource);
    }
}
