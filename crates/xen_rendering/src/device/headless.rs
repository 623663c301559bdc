//! # Headless Device
//!
//! A [`GraphicsDevice`] with real bookkeeping and no GPU behind it. Object
//! names, bindings, attachments and errors behave like a driver would; the
//! only thing missing is pixels. Runs the whole engine in tests and CI.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use xen_core::{BufferId, FramebufferId, GpuResource, ResourceReleaser, TextureId};

use super::{
    release_resource, Attachment, DeviceStats, GraphicsDevice, IndexType, PrimitiveMode,
    TextureDesc, TextureTarget, Viewport,
};
use crate::error::DeviceError;

/// One recorded driver call.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    /// `create_buffers`.
    CreateBuffers(Vec<BufferId>),
    /// `upload_buffer`.
    UploadBuffer {
        /// Target buffer.
        buffer: BufferId,
        /// Bytes uploaded.
        bytes: usize,
    },
    /// `delete_buffers`.
    DeleteBuffers(Vec<BufferId>),
    /// `create_textures`.
    CreateTextures(Vec<TextureId>),
    /// `bind_texture`.
    BindTexture(TextureId, TextureTarget),
    /// `delete_textures`.
    DeleteTextures(Vec<TextureId>),
    /// `create_framebuffers`.
    CreateFramebuffers(Vec<FramebufferId>),
    /// `attach_texture`.
    AttachTexture {
        /// Target framebuffer.
        framebuffer: FramebufferId,
        /// Attachment point.
        attachment: Attachment,
        /// Attached texture.
        texture: TextureId,
    },
    /// `bind_framebuffer`.
    BindFramebuffer(Option<FramebufferId>),
    /// `delete_framebuffers`.
    DeleteFramebuffers(Vec<FramebufferId>),
    /// `set_viewport`.
    SetViewport(Viewport),
    /// `clear`.
    Clear([f32; 4]),
    /// `draw_elements`.
    DrawElements {
        /// Primitive mode.
        mode: PrimitiveMode,
        /// Index count.
        count: u32,
        /// Index width.
        index_type: IndexType,
        /// Byte offset.
        offset: usize,
    },
}

/// Bookkeeping-only graphics device.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    /// Last name handed out (names start at 1; 0 means "none").
    last_name: u32,
    buffers: HashMap<BufferId, usize>,
    textures: HashMap<TextureId, TextureDesc>,
    framebuffers: HashMap<FramebufferId, Vec<(Attachment, TextureId)>>,
    bound_framebuffer: Option<FramebufferId>,
    bound_textures: HashMap<TextureTarget, TextureId>,
    viewport: Viewport,
    /// Max live objects before creation fails with `OutOfMemory`.
    object_budget: Option<usize>,
    pending_error: Option<DeviceError>,
    timer_started: Option<Instant>,
    calls: Vec<DeviceCall>,
    draw_calls: u64,
}

impl HeadlessDevice {
    /// Creates a device with no object limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of live objects; creation past the cap raises
    /// [`DeviceError::OutOfMemory`].
    #[must_use]
    pub fn with_object_budget(mut self, budget: usize) -> Self {
        self.object_budget = Some(budget);
        self
    }

    /// Raises `error` as if the last call had failed.
    pub fn inject_error(&mut self, error: DeviceError) {
        self.raise(error);
    }

    /// Live buffer count.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Live texture count.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Live framebuffer count.
    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// All live objects.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live_buffers() + self.live_textures() + self.live_framebuffers()
    }

    /// Returns true if `resource` names a live object.
    #[must_use]
    pub fn is_live(&self, resource: GpuResource) -> bool {
        match resource {
            GpuResource::Buffer(id) => self.buffers.contains_key(&id),
            GpuResource::Texture(id) => self.textures.contains_key(&id),
            GpuResource::Framebuffer(id) => self.framebuffers.contains_key(&id),
        }
    }

    /// Storage of a live texture.
    #[must_use]
    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(&texture).copied()
    }

    /// Attachments of a live framebuffer.
    #[must_use]
    pub fn attachments(&self, framebuffer: FramebufferId) -> &[(Attachment, TextureId)] {
        self.framebuffers
            .get(&framebuffer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Currently bound framebuffer (`None` = default).
    #[must_use]
    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound_framebuffer
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Number of `draw_elements` calls so far.
    #[must_use]
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Recorded calls, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Takes the recorded calls, leaving the log empty.
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    fn raise(&mut self, error: DeviceError) {
        tracing::trace!("headless device error: {}", error);
        // First error sticks until checked.
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    fn reserve(&mut self, count: usize) -> bool {
        if let Some(budget) = self.object_budget {
            let live = self.live_objects();
            if live + count > budget {
                self.raise(DeviceError::OutOfMemory {
                    requested: count,
                    live,
                });
                return false;
            }
        }
        true
    }

    fn next_names(&mut self, count: usize) -> impl Iterator<Item = u32> {
        let first = self.last_name + 1;
        // Never wraps back onto live names.
        self.last_name = self
            .last_name
            .saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        first..=self.last_name
    }
}

impl ResourceReleaser for HeadlessDevice {
    fn release(&mut self, resource: GpuResource) {
        release_resource(self, resource);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_buffers(&mut self, count: usize) -> Vec<BufferId> {
        let ids: Vec<BufferId> = if self.reserve(count) {
            self.next_names(count).map(BufferId).collect()
        } else {
            Vec::new()
        };
        for &id in &ids {
            self.buffers.insert(id, 0);
        }
        self.calls.push(DeviceCall::CreateBuffers(ids.clone()));
        ids
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        self.calls.push(DeviceCall::UploadBuffer {
            buffer,
            bytes: data.len(),
        });
        match self.buffers.get_mut(&buffer) {
            Some(size) => *size = data.len(),
            None => self.raise(DeviceError::InvalidHandle {
                kind: "buffer",
                name: buffer.raw(),
            }),
        }
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) {
        for id in buffers {
            self.buffers.remove(id);
        }
        self.calls.push(DeviceCall::DeleteBuffers(buffers.to_vec()));
    }

    fn create_textures(&mut self, count: usize, desc: TextureDesc) -> Vec<TextureId> {
        let ids: Vec<TextureId> = if self.reserve(count) {
            self.next_names(count).map(TextureId).collect()
        } else {
            Vec::new()
        };
        for &id in &ids {
            self.textures.insert(id, desc);
        }
        self.calls.push(DeviceCall::CreateTextures(ids.clone()));
        ids
    }

    fn bind_texture(&mut self, texture: TextureId, target: TextureTarget) {
        self.calls.push(DeviceCall::BindTexture(texture, target));
        if self.textures.contains_key(&texture) {
            self.bound_textures.insert(target, texture);
        } else {
            self.raise(DeviceError::InvalidHandle {
                kind: "texture",
                name: texture.raw(),
            });
        }
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for id in textures {
            self.textures.remove(id);
            self.bound_textures.retain(|_, bound| *bound != *id);
        }
        self.calls.push(DeviceCall::DeleteTextures(textures.to_vec()));
    }

    fn create_framebuffers(&mut self, count: usize) -> Vec<FramebufferId> {
        let ids: Vec<FramebufferId> = if self.reserve(count) {
            self.next_names(count).map(FramebufferId).collect()
        } else {
            Vec::new()
        };
        for &id in &ids {
            self.framebuffers.insert(id, Vec::new());
        }
        self.calls.push(DeviceCall::CreateFramebuffers(ids.clone()));
        ids
    }

    fn attach_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId) {
        self.calls.push(DeviceCall::AttachTexture {
            framebuffer,
            attachment,
            texture,
        });

        let Some(desc) = self.textures.get(&texture).copied() else {
            self.raise(DeviceError::InvalidHandle {
                kind: "texture",
                name: texture.raw(),
            });
            return;
        };
        if desc.format.is_depth() != matches!(attachment, Attachment::Depth) {
            self.raise(DeviceError::InvalidOperation(format!(
                "{:?} texture cannot be attached at {:?}",
                desc.format, attachment
            )));
            return;
        }
        match self.framebuffers.get_mut(&framebuffer) {
            Some(slots) => {
                slots.retain(|(at, _)| *at != attachment);
                slots.push((attachment, texture));
            }
            None => self.raise(DeviceError::InvalidHandle {
                kind: "framebuffer",
                name: framebuffer.raw(),
            }),
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
        match framebuffer {
            Some(id) if !self.framebuffers.contains_key(&id) => {
                self.raise(DeviceError::InvalidHandle {
                    kind: "framebuffer",
                    name: id.raw(),
                });
            }
            _ => self.bound_framebuffer = framebuffer,
        }
    }

    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]) {
        for id in framebuffers {
            self.framebuffers.remove(id);
            if self.bound_framebuffer == Some(*id) {
                self.bound_framebuffer = None;
            }
        }
        self.calls.push(DeviceCall::DeleteFramebuffers(framebuffers.to_vec()));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(DeviceCall::SetViewport(viewport));
        self.viewport = viewport;
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(DeviceCall::Clear(color));
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: usize) {
        self.calls.push(DeviceCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
        if offset % index_type.size() != 0 {
            self.raise(DeviceError::InvalidOperation(format!(
                "index offset {offset} not aligned to {index_type:?}"
            )));
            return;
        }
        self.draw_calls += 1;
    }

    fn begin_timer_query(&mut self) {
        if self.timer_started.is_some() {
            self.raise(DeviceError::InvalidOperation(
                "timer query already active".to_string(),
            ));
            return;
        }
        self.timer_started = Some(Instant::now());
    }

    fn end_timer_query(&mut self) -> Option<Duration> {
        self.timer_started.take().map(|start| start.elapsed())
    }

    fn check_error(&mut self) -> Option<DeviceError> {
        self.pending_error.take()
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            framebuffers: self.framebuffers.len(),
            draw_calls: self.draw_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TextureFormat;

    #[test]
    fn test_names_are_unique_across_kinds() {
        let mut device = HeadlessDevice::new();
        let buffers = device.create_buffers(2);
        let textures = device.create_textures(1, TextureDesc::color(4, 4));
        assert_eq!(buffers, vec![BufferId(1), BufferId(2)]);
        assert_eq!(textures, vec![TextureId(3)]);
        assert_eq!(device.live_objects(), 3);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let ids = device.create_buffers(1);
        device.delete_buffers(&ids);
        device.delete_buffers(&ids);
        assert_eq!(device.live_buffers(), 0);
        assert!(device.check_error().is_none());
    }

    #[test]
    fn test_invalid_handle_is_reported_once() {
        let mut device = HeadlessDevice::new();
        device.bind_texture(TextureId(99), TextureTarget::Texture2D);
        device.upload_buffer(BufferId(98), &[0; 4]);

        // First error sticks.
        assert_eq!(
            device.check_error(),
            Some(DeviceError::InvalidHandle {
                kind: "texture",
                name: 99
            })
        );
        assert!(device.check_error().is_none());
    }

    #[test]
    fn test_attachment_kind_is_validated() {
        let mut device = HeadlessDevice::new();
        let fb = device.create_framebuffers(1)[0];
        let color = device.create_textures(1, TextureDesc::color(8, 8))[0];
        let depth = device.create_textures(1, TextureDesc::depth(8, 8))[0];

        device.attach_texture(fb, Attachment::Color(0), color);
        device.attach_texture(fb, Attachment::Depth, depth);
        assert!(device.check_error().is_none());
        assert_eq!(device.attachments(fb).len(), 2);

        device.attach_texture(fb, Attachment::Color(0), depth);
        assert!(matches!(
            device.check_error(),
            Some(DeviceError::InvalidOperation(_))
        ));
        assert_eq!(
            device.texture_desc(depth).map(|d| d.format),
            Some(TextureFormat::Depth32Float)
        );
    }

    #[test]
    fn test_budget_raises_out_of_memory() {
        let mut device = HeadlessDevice::new().with_object_budget(2);
        assert_eq!(device.create_buffers(2).len(), 2);
        assert!(device.create_buffers(1).is_empty());
        assert_eq!(
            device.check_error(),
            Some(DeviceError::OutOfMemory {
                requested: 1,
                live: 2
            })
        );
    }

    #[test]
    fn test_release_dispatches_by_kind() {
        let mut device = HeadlessDevice::new();
        let fb = device.create_framebuffers(1)[0];
        device.bind_framebuffer(Some(fb));
        device.release(GpuResource::Framebuffer(fb));
        assert!(!device.is_live(GpuResource::Framebuffer(fb)));
        assert_eq!(device.bound_framebuffer(), None);
    }

    #[test]
    fn test_timer_query_measures() {
        let mut device = HeadlessDevice::new();
        assert!(device.end_timer_query().is_none());
        device.begin_timer_query();
        std::thread::sleep(Duration::from_millis(2));
        assert!(device.end_timer_query().unwrap() >= Duration::from_millis(2));
    }
}
