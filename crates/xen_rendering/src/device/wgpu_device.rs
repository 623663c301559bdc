//! # wgpu Device
//!
//! [`GraphicsDevice`] on a real adapter, rendering offscreen. Buffers and
//! textures are wgpu objects; framebuffers are attachment lists resolved into
//! render passes at `clear` time.
//!
//! No pipeline or shader is bound, so `draw_elements` never rasterizes:
//! it checks the index offset and bumps [`DeviceStats::draw_calls`]. Clears
//! and uploads do reach the GPU.
//!
//! Validation errors reported by wgpu are captured and surface through
//! [`check_error`](GraphicsDevice::check_error) like any other device error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use xen_core::{BufferId, FramebufferId, GpuResource, ResourceReleaser, TextureId};

use super::{
    release_resource, Attachment, DeviceStats, GraphicsDevice, IndexType, PrimitiveMode,
    TextureDesc, TextureFormat, TextureTarget, Viewport,
};
use crate::error::{DeviceError, RenderError, RenderResult};

const BUFFER_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX
    .union(wgpu::BufferUsages::INDEX)
    .union(wgpu::BufferUsages::UNIFORM)
    .union(wgpu::BufferUsages::COPY_DST);

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    desc: TextureDesc,
}

/// Offscreen wgpu device.
///
/// Draws are validated and counted, not recorded into a pass.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    /// Stands in for the default framebuffer.
    backbuffer: wgpu::Texture,
    last_name: u32,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    textures: HashMap<TextureId, GpuTexture>,
    framebuffers: HashMap<FramebufferId, Vec<(Attachment, TextureId)>>,
    bound_framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    validation: Arc<Mutex<Option<String>>>,
    pending_error: Option<DeviceError>,
    timer_started: Option<Instant>,
    draw_calls: u64,
}

impl WgpuDevice {
    /// Opens the default adapter and allocates a `width` x `height`
    /// backbuffer.
    ///
    /// # Errors
    ///
    /// [`RenderError::Unavailable`] if no adapter or device can be created.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::Unavailable("no GPU adapter found".to_string()))?;

        let adapter_name = adapter.get_info().name;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("xen"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let validation = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&validation);
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            let mut slot = sink.lock();
            if slot.is_none() {
                *slot = Some(error.to_string());
            }
        }));

        let backbuffer = Self::allocate_texture(
            &device,
            TextureDesc {
                width,
                height,
                format: TextureFormat::Rgba8,
            },
        );
        tracing::info!("wgpu device on {} ({}x{})", adapter_name, width, height);

        Ok(Self {
            device,
            queue,
            adapter_name,
            backbuffer,
            last_name: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_framebuffer: None,
            viewport: Viewport::full(width, height),
            validation,
            pending_error: None,
            timer_started: None,
            draw_calls: 0,
        })
    }

    /// Name of the adapter in use.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Viewport set by the last `set_viewport`.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn allocate_texture(device: &wgpu::Device, desc: TextureDesc) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("xen texture"),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    }

    fn raise(&mut self, error: DeviceError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    fn next_names(&mut self, count: usize) -> impl Iterator<Item = u32> {
        let first = self.last_name + 1;
        self.last_name = self
            .last_name
            .saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        first..=self.last_name
    }

    fn render_views(&self) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
        let default_view = || self.backbuffer.create_view(&wgpu::TextureViewDescriptor::default());
        let Some(fb) = self.bound_framebuffer else {
            return (default_view(), None);
        };
        let mut color = None;
        let mut depth = None;
        for (attachment, texture) in self.framebuffers.get(&fb).into_iter().flatten() {
            let Some(gpu) = self.textures.get(texture) else {
                continue;
            };
            let view = gpu.texture.create_view(&wgpu::TextureViewDescriptor::default());
            match attachment {
                Attachment::Color(0) => color = Some(view),
                Attachment::Depth => depth = Some(view),
                Attachment::Color(_) => {}
            }
        }
        (color.unwrap_or_else(default_view), depth)
    }
}

impl ResourceReleaser for WgpuDevice {
    fn release(&mut self, resource: GpuResource) {
        release_resource(self, resource);
    }
}

impl GraphicsDevice for WgpuDevice {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_buffers(&mut self, count: usize) -> Vec<BufferId> {
        let ids: Vec<BufferId> = self.next_names(count).map(BufferId).collect();
        for &id in &ids {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("xen buffer"),
                size: wgpu::COPY_BUFFER_ALIGNMENT,
                usage: BUFFER_USAGE,
                mapped_at_creation: false,
            });
            self.buffers.insert(id, buffer);
        }
        ids
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        if !self.buffers.contains_key(&buffer) {
            self.raise(DeviceError::InvalidHandle {
                kind: "buffer",
                name: buffer.raw(),
            });
            return;
        }
        let mut padded = data.to_vec();
        let align = usize::try_from(wgpu::COPY_BUFFER_ALIGNMENT).unwrap_or(4);
        padded.resize(data.len().div_ceil(align).max(1) * align, 0);
        let size = padded.len() as u64;

        let too_small = self.buffers.get(&buffer).is_some_and(|b| b.size() < size);
        if too_small {
            let grown = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("xen buffer"),
                size,
                usage: BUFFER_USAGE,
                mapped_at_creation: false,
            });
            if let Some(old) = self.buffers.insert(buffer, grown) {
                old.destroy();
            }
        }
        if let Some(target) = self.buffers.get(&buffer) {
            self.queue.write_buffer(target, 0, &padded);
        }
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) {
        for id in buffers {
            if let Some(buffer) = self.buffers.remove(id) {
                buffer.destroy();
            }
        }
    }

    fn create_textures(&mut self, count: usize, desc: TextureDesc) -> Vec<TextureId> {
        let ids: Vec<TextureId> = self.next_names(count).map(TextureId).collect();
        for &id in &ids {
            let texture = Self::allocate_texture(&self.device, desc);
            self.textures.insert(id, GpuTexture { texture, desc });
        }
        ids
    }

    fn bind_texture(&mut self, texture: TextureId, _target: TextureTarget) {
        // Bindings are resolved into bind groups by the pass using them.
        if !self.textures.contains_key(&texture) {
            self.raise(DeviceError::InvalidHandle {
                kind: "texture",
                name: texture.raw(),
            });
        }
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for id in textures {
            if let Some(gpu) = self.textures.remove(id) {
                gpu.texture.destroy();
            }
        }
    }

    fn create_framebuffers(&mut self, count: usize) -> Vec<FramebufferId> {
        let ids: Vec<FramebufferId> = self.next_names(count).map(FramebufferId).collect();
        for &id in &ids {
            self.framebuffers.insert(id, Vec::new());
        }
        ids
    }

    fn attach_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId) {
        let Some(desc) = self.textures.get(&texture).map(|t| t.desc) else {
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
        match framebuffer {
            Some(id) if !self.framebuffers.contains_key(&id) => self.raise(DeviceError::InvalidHandle {
                kind: "framebuffer",
                name: id.raw(),
            }),
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
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: [f32; 4]) {
        let (color_view, depth_view) = self.render_views();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("xen clear") });
        {
            let [r, g, b, a] = color.map(f64::from);
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("xen clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Count only; nothing is encoded.
    fn draw_elements(&mut self, _mode: PrimitiveMode, _count: u32, index_type: IndexType, offset: usize) {
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
        let started = self.timer_started.take()?;
        let _ = self.device.poll(wgpu::Maintain::Wait);
        Some(started.elapsed())
    }

    fn check_error(&mut self) -> Option<DeviceError> {
        if let Some(message) = self.validation.lock().take() {
            self.raise(DeviceError::Backend(message));
        }
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
