use std::fmt::Debug;
use std::mem;

use bytemuck::{Pod, Zeroable};
use cfg_if::cfg_if;

use crate::error::Result;

cfg_if! {
    if #[cfg(feature = "wgpu")] {
        mod wgpubackend;
        pub use wgpubackend::{DEPTH_FORMAT, WgpuContext, WgpuDevice, WgpuDeviceFactory, WgpuView};
    }
}

pub const MAX_EYES: usize = 2;

pub type ViewMat = [[f32; 4]; 4];

// Keep in-sync with the shader side: array<mat4x4<f32>, 2>, one matrix per eye.
// Each matrix is stored transposed, shaders multiply row vectors on the left.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewProjectionBuffer {
    pub view_projection: [ViewMat; MAX_EYES],
}

const _: () = assert!(mem::size_of::<ViewProjectionBuffer>() % 16 == 0); // Constant buffers must be 16-byte aligned.

impl ViewProjectionBuffer {
    pub fn get_size(eye_count: usize) -> u64 {
        assert!(eye_count > 0 && eye_count <= MAX_EYES);
        (mem::size_of::<ViewMat>() * eye_count) as u64
    }

    pub fn as_bytes(&self, eye_count: usize) -> &[u8] {
        bytemuck::cast_slice(&self.view_projection[..eye_count])
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width as f32, size.height as f32)
    }
}

/// Description of an existing texture, as reported by the device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureInfo<F> {
    pub format: F,
    pub size: Size,
    pub array_size: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthTextureDesc {
    pub size: Size,
    pub array_size: u32, // One slice per eye.
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DepthViewDimension {
    Texture2D,
    Texture2DArray,
}

/// GPU device capability. The session never creates one itself, it is handed
/// over by a [`DeviceFactory`].
///
/// Handles are cheap to clone. `Texture` equality is identity: two handles
/// compare equal iff they refer to the same GPU resource.
pub trait GraphicsDevice: Send + Sync + Sized {
    type Context: GraphicsContext<Self>;
    type Format: Copy + Debug + PartialEq + Send + Sync;
    type Texture: Clone + PartialEq + Send + Sync;
    type RenderTargetView: Clone + Send + Sync;
    type DepthStencilView: Clone + Send + Sync;
    type Buffer: Clone + Send + Sync;

    fn get_texture_info(&self, texture: &Self::Texture) -> TextureInfo<Self::Format>;
    fn create_render_target_view(&self, texture: &Self::Texture) -> Result<Self::RenderTargetView>;
    fn create_depth_texture(&self, desc: &DepthTextureDesc) -> Result<Self::Texture>;
    fn create_depth_stencil_view(&self, texture: &Self::Texture, dimension: DepthViewDimension) -> Result<Self::DepthStencilView>;
    fn create_constant_buffer(&self, size: u64) -> Result<Self::Buffer>;
}

/// Immediate context of a device. Only the render thread issues commands
/// through it, but the camera-removed path may release resources from the
/// notification thread while holding the camera table lock.
pub trait GraphicsContext<D: GraphicsDevice>: Send + Sync {
    fn set_render_targets(&self, rtv: Option<&D::RenderTargetView>, dsv: Option<&D::DepthStencilView>);
    fn clear_render_target_view(&self, rtv: &D::RenderTargetView, color: [f32; 4]);
    fn clear_depth_stencil_view(&self, dsv: &D::DepthStencilView, depth: f32, stencil: u8);
    fn update_buffer(&self, buffer: &D::Buffer, data: &[u8]);
    fn set_viewport(&self, viewport: &Viewport);
    fn set_vertex_constant_buffer(&self, slot: u32, buffer: &D::Buffer);
    fn flush(&self);

    // Best-effort reclaim of driver memory on suspend.
    fn trim(&self) {
        self.flush();
    }
}

pub trait DeviceFactory<D: GraphicsDevice>: Send + Sync {
    fn create_device(&self) -> Result<(D, D::Context)>;
}
