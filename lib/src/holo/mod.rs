use cgmath::{Matrix, Matrix4};

use crate::error::Result;
use crate::gpu::{GraphicsDevice, Size, Viewport, ViewMat};

mod camera;
pub use camera::CameraResource;

mod session;
pub use session::GraphicsSession;

mod table;
pub use table::{CameraMap, CameraResourceTable};

pub type CameraId = u32;

/// A pair of per-eye transforms, as the platform hands them out. Mono
/// cameras carry the same matrix in both slots.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StereoTransform {
    pub left: Matrix4<f32>,
    pub right: Matrix4<f32>,
}

impl StereoTransform {
    pub fn new(left: Matrix4<f32>, right: Matrix4<f32>) -> Self {
        Self {
            left,
            right,
        }
    }

    pub fn mono(m: Matrix4<f32>) -> Self {
        Self::new(m, m)
    }

    /// Combines projection (self) and view per eye, result is stored
    /// transposed for upload.
    pub fn view_projection(&self, view: &StereoTransform) -> [ViewMat; 2] {
        [
            (self.left * view.left).transpose().into(),
            (self.right * view.right).transpose().into(),
        ]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentResult {
    Success,
    DeviceRemoved,
}

/// Optional platform features, queried once when the space is attached.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub can_get_display_for_camera: bool,
    pub can_commit_depth_buffer: bool,
}

/// Platform-side handle of an attached display camera.
pub trait HoloCamera: Clone + Send + Sync {
    fn get_id(&self) -> CameraId;
    fn is_stereo(&self) -> bool;
    fn get_render_target_size(&self) -> Size;
    fn is_display_opaque(&self) -> bool;
}

/// Predicted pose of one camera for the current frame.
pub trait HoloCameraPose<S> {
    fn get_camera_id(&self) -> CameraId;
    fn get_viewport(&self) -> Viewport;
    fn get_projection_transform(&self) -> StereoTransform;

    /// None if the pose can't be expressed in the given coordinate system,
    /// usually because positional tracking is not active this frame.
    fn try_get_view_transform(&self, coordinate_system: &S) -> Option<StereoTransform>;
}

pub trait RenderingParameters<D: GraphicsDevice> {
    fn get_back_buffer(&self) -> Result<D::Texture>;
    fn commit_depth_buffer(&self, depth: &D::Texture) -> Result<()>;
}

pub trait HoloFrame<D: GraphicsDevice> {
    type CoordinateSystem;
    type Pose: HoloCameraPose<Self::CoordinateSystem>;
    type Parameters: RenderingParameters<D>;

    fn update_current_prediction(&mut self);
    fn get_camera_poses(&self) -> &[Self::Pose];
    fn get_rendering_parameters(&self, pose: &Self::Pose) -> Self::Parameters;
    fn present(self) -> PresentResult;
}

pub trait HoloSpace<D: GraphicsDevice> {
    type Camera: HoloCamera;
    type CoordinateSystem;
    type Frame: HoloFrame<D, CoordinateSystem = Self::CoordinateSystem>;

    fn set_device(&self, device: &D);
    fn get_capabilities(&self) -> Capabilities;
    fn create_next_frame(&self) -> Self::Frame;
}

/// Receives camera attach/detach notifications. May be called from any
/// thread, concurrently with the frame loop.
pub trait CameraObserver<C: HoloCamera> {
    fn on_camera_added(&self, camera: C);
    fn on_camera_removed(&self, camera: &C);
}

/// What the scene renderer gets for a camera whose view-projection buffer
/// has just been attached.
pub struct SceneTarget<'a, D: GraphicsDevice> {
    pub camera_id: CameraId,
    pub is_stereo: bool,
    pub viewport: Viewport,
    pub format: Option<D::Format>,
    pub render_target_view: &'a D::RenderTargetView,
    pub depth_stencil_view: &'a D::DepthStencilView,
    pub view_projection_buffer: &'a D::Buffer,
}
