use std::collections::HashMap;
use std::iter;
use std::sync::Mutex;

use wgpu::{Adapter, Buffer, BufferDescriptor, BufferUsages, Color, CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features, Limits, LoadOp, Operations, Queue, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor, StoreOp, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension};

use crate::error::{GraphicsError, Result};
use crate::gpu::{DepthTextureDesc, DepthViewDimension, DeviceFactory, GraphicsContext, GraphicsDevice, Size, TextureInfo, Viewport};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth16Unorm;

/// A view over a whole (possibly array) texture, plus one view per array
/// layer. Render passes can only target a single layer without multiview, so
/// clears go through the layer views.
#[derive(Clone, Debug)]
pub struct WgpuView {
    view: TextureView,
    layer_views: Box<[TextureView]>,
}

impl WgpuView {
    fn new(texture: &Texture, dimension: TextureViewDimension) -> Self {
        let view = texture.create_view(&TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        });

        let layer_views = (0..texture.depth_or_array_layers()).map(|layer| {
            texture.create_view(&TextureViewDescriptor {
                dimension: Some(TextureViewDimension::D2),
                base_array_layer: layer,
                array_layer_count: Some(1),
                ..Default::default()
            })
        }).collect();

        Self {
            view,
            layer_views,
        }
    }

    pub fn get_view(&self) -> &TextureView {
        &self.view
    }

    pub fn get_layer_views(&self) -> &[TextureView] {
        &self.layer_views
    }
}

#[derive(Clone)]
pub struct WgpuDevice {
    device: Device,
    queue: Queue,
}

impl WgpuDevice {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
        }
    }

    pub fn get_device(&self) -> &Device {
        &self.device
    }

    pub fn get_queue(&self) -> &Queue {
        &self.queue
    }

    fn check_size(&self, resource: &'static str, size: Size) -> Result<()> {
        let max = self.device.limits().max_texture_dimension_2d;

        if size.width > max || size.height > max {
            return Err(GraphicsError::ResourceCreation {
                resource,
                reason: format!("{}x{} exceeds device limit {}", size.width, size.height, max),
            });
        }

        Ok(())
    }
}

impl GraphicsDevice for WgpuDevice {
    type Context = WgpuContext;
    type Format = TextureFormat;
    type Texture = Texture;
    type RenderTargetView = WgpuView;
    type DepthStencilView = WgpuView;
    type Buffer = Buffer;

    fn get_texture_info(&self, texture: &Texture) -> TextureInfo<TextureFormat> {
        TextureInfo {
            format: texture.format(),
            size: Size::new(texture.width(), texture.height()),
            array_size: texture.depth_or_array_layers(),
        }
    }

    fn create_render_target_view(&self, texture: &Texture) -> Result<WgpuView> {
        if !texture.usage().contains(TextureUsages::RENDER_ATTACHMENT) {
            return Err(GraphicsError::ResourceCreation {
                resource: "render target view",
                reason: "back buffer is not renderable".to_string(),
            });
        }

        let dimension = if texture.depth_or_array_layers() > 1 {
            TextureViewDimension::D2Array
        } else {
            TextureViewDimension::D2
        };

        Ok(WgpuView::new(texture, dimension))
    }

    fn create_depth_texture(&self, desc: &DepthTextureDesc) -> Result<Texture> {
        self.check_size("depth texture", desc.size)?;

        Ok(self.device.create_texture(&TextureDescriptor {
            label: Some("depth"),
            size: Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: desc.array_size,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        }))
    }

    fn create_depth_stencil_view(&self, texture: &Texture, dimension: DepthViewDimension) -> Result<WgpuView> {
        let dimension = match dimension {
            DepthViewDimension::Texture2D => TextureViewDimension::D2,
            DepthViewDimension::Texture2DArray => TextureViewDimension::D2Array,
        };

        Ok(WgpuView::new(texture, dimension))
    }

    fn create_constant_buffer(&self, size: u64) -> Result<Buffer> {
        Ok(self.device.create_buffer(&BufferDescriptor {
            label: Some("view_projection"),
            size,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }
}

/// wgpu has no immediate context. Clears and uploads are submitted to the
/// queue right away, pipeline bindings are recorded so the scene renderer can
/// pick them up when it encodes its own render pass.
pub struct WgpuContext {
    device: Device,
    queue: Queue,
    state_mutex: Mutex<ContextState>,
}

#[derive(Default)]
struct ContextState {
    rtv_opt: Option<WgpuView>,
    dsv_opt: Option<WgpuView>,
    viewport_opt: Option<Viewport>,
    vertex_constant_buffers: HashMap<u32, Buffer>,
}

impl WgpuContext {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            state_mutex: Mutex::new(ContextState::default()),
        }
    }

    pub fn get_device(&self) -> &Device {
        &self.device
    }

    pub fn get_queue(&self) -> &Queue {
        &self.queue
    }

    pub fn get_render_targets(&self) -> (Option<WgpuView>, Option<WgpuView>) {
        let state = self.state_mutex.lock().unwrap();
        (state.rtv_opt.clone(), state.dsv_opt.clone())
    }

    pub fn get_viewport(&self) -> Option<Viewport> {
        self.state_mutex.lock().unwrap().viewport_opt
    }

    pub fn get_vertex_constant_buffer(&self, slot: u32) -> Option<Buffer> {
        self.state_mutex.lock().unwrap().vertex_constant_buffers.get(&slot).cloned()
    }
}

impl GraphicsContext<WgpuDevice> for WgpuContext {
    fn set_render_targets(&self, rtv: Option<&WgpuView>, dsv: Option<&WgpuView>) {
        let mut state = self.state_mutex.lock().unwrap();
        state.rtv_opt = rtv.cloned();
        state.dsv_opt = dsv.cloned();
    }

    fn clear_render_target_view(&self, rtv: &WgpuView, color: [f32; 4]) {
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: None,
        });

        let color = Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };

        for view in rtv.get_layer_views() {
            let _render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(color),
                        store: StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
        }

        self.queue.submit([encoder.finish()]);
    }

    fn clear_depth_stencil_view(&self, dsv: &WgpuView, depth: f32, _stencil: u8) {
        // DEPTH_FORMAT has no stencil aspect, so there is nothing to clear there.

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: None,
        });

        for view in dsv.get_layer_views() {
            let _render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(depth),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
        }

        self.queue.submit([encoder.finish()]);
    }

    fn update_buffer(&self, buffer: &Buffer, data: &[u8]) {
        self.queue.write_buffer(buffer, 0, data);
    }

    fn set_viewport(&self, viewport: &Viewport) {
        self.state_mutex.lock().unwrap().viewport_opt = Some(*viewport);
    }

    fn set_vertex_constant_buffer(&self, slot: u32, buffer: &Buffer) {
        self.state_mutex.lock().unwrap().vertex_constant_buffers.insert(slot, buffer.clone());
    }

    fn flush(&self) {
        self.queue.submit(iter::empty());
    }
}

/// Creates devices on a fixed adapter. Also used to recreate them after the
/// device got lost.
pub struct WgpuDeviceFactory {
    adapter: Adapter,
    features: Features,
    limits: Limits,
}

impl WgpuDeviceFactory {
    pub fn new(adapter: &Adapter, features: Features, limits: Limits) -> Self {
        Self {
            adapter: adapter.clone(),
            features,
            limits,
        }
    }

    pub fn get_adapter(&self) -> &Adapter {
        &self.adapter
    }
}

impl DeviceFactory<WgpuDevice> for WgpuDeviceFactory {
    fn create_device(&self) -> Result<(WgpuDevice, WgpuContext)> {
        let device_desc = DeviceDescriptor {
            required_features: self.features,
            required_limits: self.limits.clone(),
            ..Default::default()
        };

        let (device, queue) = pollster::block_on(self.adapter.request_device(&device_desc)).map_err(|e| GraphicsError::DeviceCreation(e.to_string()))?;

        Ok((WgpuDevice::new(&device, &queue), WgpuContext::new(&device, &queue)))
    }
}
