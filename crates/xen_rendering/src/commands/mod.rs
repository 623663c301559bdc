//! # Render Commands
//!
//! Deferred GPU work: typed commands, the FIFO queue that drains them on the
//! context thread, and the channel other threads submit through.

mod channel;
mod command;
mod output;
mod queue;

pub use channel::{command_channel, CommandReceiver, CommandSender, DrainGuard};
pub use command::{
    AttachTextureCommand, BindFramebufferCommand, BindTextureCommand, ClearCommand,
    CreateBuffersCommand, CreateFramebuffersCommand, CreateTexturesCommand, DeleteBuffersCommand,
    DeleteFramebuffersCommand, DeleteTexturesCommand, DrawElementsCommand, RenderCommand,
    SetViewportCommand, UploadBufferCommand,
};
pub use output::CommandOutput;
pub use queue::{CommandQueue, QueueState};
