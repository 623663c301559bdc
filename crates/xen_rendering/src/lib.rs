//! # Xen Rendering
//!
//! Everything that talks to the graphics driver, and the rules that keep
//! driver calls on the one thread allowed to make them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    CONTEXT THREAD                             │
//! ├───────────────────────────────────────────────────────────────┤
//! │  RenderSystem ── CommandQueue (FIFO) ──> GraphicsDevice       │
//! │       │               ▲                                       │
//! │       │               └── CommandReceiver <── CommandSender ◄─┼── other threads
//! │       ├── ScopedBatchQueue (executes on drop)                 │
//! │       └── Volatiles (RenderTarget, ...) rebuilt on resize     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - `RenderSystem` and `GraphicsDevice` trait objects are `!Send`
//! - Queued driver errors are logged after each command, never propagated
//! - Queued commands are `'static`; results come back through [`CommandOutput`]

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod batch;
pub mod commands;
pub mod device;
pub mod error;
pub mod render_target;
pub mod system;
pub mod timer;
pub mod uniforms;
pub mod volatile;

pub use batch::ScopedBatchQueue;
pub use commands::{
    command_channel, AttachTextureCommand, BindFramebufferCommand, BindTextureCommand,
    ClearCommand, CommandOutput, CommandQueue, CommandReceiver, CommandSender,
    CreateBuffersCommand, CreateFramebuffersCommand, CreateTexturesCommand, DeleteBuffersCommand,
    DeleteFramebuffersCommand, DeleteTexturesCommand, DrawElementsCommand, QueueState,
    RenderCommand, SetViewportCommand, UploadBufferCommand,
};
pub use device::{
    Attachment, DeviceCall, DeviceStats, GraphicsDevice, HeadlessDevice, IndexType,
    PrimitiveMode, TextureDesc, TextureFormat, TextureTarget, Viewport,
};
#[cfg(feature = "wgpu")]
pub use device::WgpuDevice;
pub use error::{DeviceError, QueueError, RenderError, RenderResult};
pub use render_target::RenderTarget;
pub use system::{RenderSystem, DEFAULT_CHANNEL_CAPACITY};
pub use timer::GpuTimer;
pub use uniforms::{pack_lights, CameraUniform, LightUniform, LightsUniform, MaterialUniform, MAX_LIGHTS};
pub use volatile::Volatile;
