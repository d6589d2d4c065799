use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cgmath::{Angle, Deg, Matrix4, Point3, Quaternion, Rad, Rotation3, Vector3};
use wgpu::{CompositeAlphaMode, Device, DeviceLostReason, PresentMode, Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture, Texture, TextureFormat, TextureUsages};

use rsholo_lib::GraphicsError;
use rsholo_lib::gpu::{Size, Viewport, WgpuDevice};
use rsholo_lib::holo::{CameraId, Capabilities, HoloCamera, HoloCameraPose, HoloFrame, HoloSpace, PresentResult, RenderingParameters, StereoTransform};

const FOVY: Deg<f32> = Deg(45.0);
const NEAR_Z: f32 = 0.1;
const FAR_Z: f32 = 100.0;
const ROT_SPEED: f32 = 50.0; // [deg/s]
const MOVE_SPEED: f32 = 2.0; // [m/s]

/// The window, seen as a single mono display camera.
#[derive(Clone)]
pub struct DesktopCamera {
    id: CameraId,
    size: Arc<Mutex<Size>>,
}

impl DesktopCamera {
    pub fn new(id: CameraId, width: u32, height: u32) -> Self {
        Self {
            id,
            size: Arc::new(Mutex::new(Size::new(width, height))),
        }
    }

    fn resize(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = Size::new(width, height);
    }
}

impl HoloCamera for DesktopCamera {
    fn get_id(&self) -> CameraId {
        self.id
    }

    fn is_stereo(&self) -> bool {
        false
    }

    fn get_render_target_size(&self) -> Size {
        *self.size.lock().unwrap()
    }

    fn is_display_opaque(&self) -> bool {
        true
    }
}

/// The world as seen by the simulator. There is only one reference frame.
pub struct Stage;

/// Where the simulated head is and whether it is being tracked.
#[derive(Copy, Clone)]
pub struct Head {
    pub pos: Vector3<f32>,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    pub tracking: bool,
}

/// Requested head motion, every axis in -1.0..=1.0.
#[derive(Copy, Clone, Default)]
pub struct Motion {
    pub forward: f32,
    pub left: f32,
    pub tilt: f32,
    pub turn: f32,
}

impl Head {
    pub fn new(pos: Vector3<f32>) -> Self {
        Self {
            pos,
            yaw: Deg(0.0),
            pitch: Deg(0.0),
            tracking: true,
        }
    }

    /// +y at zero yaw and pitch, z is up.
    pub fn get_dir(&self) -> Vector3<f32> {
        Quaternion::from_angle_z(self.yaw) * Quaternion::from_angle_x(self.pitch) * Vector3::unit_y()
    }

    /// Walking stays on the floor plane, pitch doesn't change altitude.
    pub fn step(&mut self, motion: Motion, delta_t: f32) {
        self.yaw += Deg(ROT_SPEED * delta_t * motion.turn);
        self.pitch += Deg(ROT_SPEED * delta_t * motion.tilt);

        let forward = Quaternion::from_angle_z(self.yaw) * Vector3::unit_y();
        let left = Vector3::unit_z().cross(forward);

        self.pos += MOVE_SPEED * delta_t * (motion.forward * forward + motion.left * left);
    }
}

pub struct DesktopPose {
    camera_id: CameraId,
    viewport: Viewport,
    projection: StereoTransform,
    view_opt: Option<StereoTransform>,
}

impl DesktopPose {
    fn new(camera: &DesktopCamera, head: &Head) -> Self {
        let size = camera.get_render_target_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;

        let view_opt = if head.tracking {
            let cam_m = Matrix4::look_to_rh(Point3::new(head.pos.x, head.pos.y, head.pos.z), head.get_dir(), Vector3::unit_z()); // my -> rh
            Some(StereoTransform::mono(cam_m))
        } else {
            None
        };

        Self {
            camera_id: camera.get_id(),
            viewport: Viewport::from_size(size),
            projection: StereoTransform::mono(perspective(aspect, FOVY, NEAR_Z, FAR_Z)),
            view_opt,
        }
    }
}

impl HoloCameraPose<Stage> for DesktopPose {
    fn get_camera_id(&self) -> CameraId {
        self.camera_id
    }

    fn get_viewport(&self) -> Viewport {
        self.viewport
    }

    fn get_projection_transform(&self) -> StereoTransform {
        self.projection
    }

    fn try_get_view_transform(&self, _coordinate_system: &Stage) -> Option<StereoTransform> {
        self.view_opt
    }
}

pub struct DesktopParams {
    back_buffer_opt: Option<Texture>,
}

impl RenderingParameters<WgpuDevice> for DesktopParams {
    fn get_back_buffer(&self) -> rsholo_lib::Result<Texture> {
        self.back_buffer_opt.clone().ok_or_else(|| GraphicsError::BackBufferUnavailable("surface texture not acquired".to_string()))
    }

    fn commit_depth_buffer(&self, _depth: &Texture) -> rsholo_lib::Result<()> {
        Err(GraphicsError::DepthCommit("a window has no image stabilization".to_string()))
    }
}

pub struct DesktopFrame {
    camera_opt: Option<DesktopCamera>,
    poses: Vec<DesktopPose>,
    head: Arc<Mutex<Head>>,
    surface_texture_opt: Option<SurfaceTexture>,
    lost: Arc<AtomicBool>,
}

impl HoloFrame<WgpuDevice> for DesktopFrame {
    type CoordinateSystem = Stage;
    type Pose = DesktopPose;
    type Parameters = DesktopParams;

    fn update_current_prediction(&mut self) {
        // Input may have moved the head since the frame was created.

        if let Some(camera) = &self.camera_opt {
            let head = *self.head.lock().unwrap();
            self.poses = vec![DesktopPose::new(camera, &head)];
        }
    }

    fn get_camera_poses(&self) -> &[DesktopPose] {
        &self.poses
    }

    fn get_rendering_parameters(&self, _pose: &DesktopPose) -> DesktopParams {
        DesktopParams {
            back_buffer_opt: self.surface_texture_opt.as_ref().map(|surface_texture| surface_texture.texture.clone()),
        }
    }

    fn present(self) -> PresentResult {
        if self.lost.swap(false, Ordering::Relaxed) {
            return PresentResult::DeviceRemoved;
        }

        if let Some(surface_texture) = self.surface_texture_opt {
            surface_texture.present();
        }

        PresentResult::Success
    }
}

/// Holographic space simulated on top of a window surface.
pub struct DesktopSpace {
    surface: Surface<'static>,
    head: Arc<Mutex<Head>>,
    lost: Arc<AtomicBool>,
    attached: Arc<AtomicBool>,
    inner_mutex: Mutex<Inner>,
}

struct Inner {
    device_opt: Option<Device>,
    surface_config: SurfaceConfiguration,
    camera: DesktopCamera,
}

impl DesktopSpace {
    pub fn new(surface: Surface<'static>, color_format: TextureFormat, camera: DesktopCamera, head: Head) -> Self {
        let size = camera.get_render_target_size();

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: color_format,
            width: size.width,
            height: size.height,
            present_mode: PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: CompositeAlphaMode::Opaque,
            view_formats: vec![],
        };

        Self {
            surface,
            head: Arc::new(Mutex::new(head)),
            lost: Arc::new(AtomicBool::new(false)),
            attached: Arc::new(AtomicBool::new(true)),
            inner_mutex: Mutex::new(Inner {
                device_opt: None,
                surface_config,
                camera,
            }),
        }
    }

    pub fn get_camera(&self) -> DesktopCamera {
        self.inner_mutex.lock().unwrap().camera.clone()
    }

    pub fn get_head(&self) -> Head {
        *self.head.lock().unwrap()
    }

    pub fn set_head(&self, head: Head) {
        *self.head.lock().unwrap() = head;
    }

    /// Cleared while the camera is detached, so frames stop predicting it.
    pub fn get_attached(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.attached)
    }

    pub fn simulate_device_lost(&self) {
        self.lost.store(true, Ordering::Relaxed);
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner_mutex.lock().unwrap();

        inner.camera.resize(width, height);
        inner.surface_config.width = width;
        inner.surface_config.height = height;

        Self::configure(&self.surface, &inner);
    }

    fn configure(surface: &Surface, inner: &Inner) {
        let surface_config = &inner.surface_config;

        if surface_config.width == 0 || surface_config.height == 0 {
            return;
        }

        if let Some(device) = &inner.device_opt {
            surface.configure(device, surface_config);
        }
    }
}

impl HoloSpace<WgpuDevice> for DesktopSpace {
    type Camera = DesktopCamera;
    type CoordinateSystem = Stage;
    type Frame = DesktopFrame;

    fn set_device(&self, device: &WgpuDevice) {
        let device = device.get_device().clone();

        let lost = Arc::clone(&self.lost);
        device.set_device_lost_callback(move |reason, message| {
            // Destroyed is reported for our own drop of the old device as well.
            if matches!(reason, DeviceLostReason::Unknown) {
                log::error!("device lost: {}", message);
                lost.store(true, Ordering::Relaxed);
            }
        });

        let mut inner = self.inner_mutex.lock().unwrap();
        inner.device_opt = Some(device);
        Self::configure(&self.surface, &inner);
    }

    fn get_capabilities(&self) -> Capabilities {
        Capabilities {
            can_get_display_for_camera: true,
            can_commit_depth_buffer: false,
        }
    }

    fn create_next_frame(&self) -> DesktopFrame {
        let inner = self.inner_mutex.lock().unwrap();

        let surface_texture_opt = match inner.device_opt {
            Some(_) => match self.surface.get_current_texture() {
                Ok(surface_texture) => Some(surface_texture),
                Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                    Self::configure(&self.surface, &inner);
                    None
                },
                Err(e) => {
                    log::warn!("unable to acquire surface texture: {}", e);
                    None
                },
            },
            None => None,
        };

        // No back buffer, no prediction: the frame is skipped.

        let camera_opt = if surface_texture_opt.is_some() && self.attached.load(Ordering::Relaxed) {
            Some(inner.camera.clone())
        } else {
            None
        };

        let head = self.get_head();
        let poses = camera_opt.iter().map(|camera| DesktopPose::new(camera, &head)).collect();

        DesktopFrame {
            camera_opt,
            poses,
            head: Arc::clone(&self.head),
            surface_texture_opt,
            lost: Arc::clone(&self.lost),
        }
    }
}

fn perspective<A: Into<Rad<f32>>>(aspect: f32, fovy: A, near: f32, far: f32) -> Matrix4<f32> {
    // Calculate projection matrix suitable for wgpu NDC: (-1, -1, 0) ... (1, 1, 1).
    // Taken from nalgebra-glm->perspective_rh_zo.

    let tan_half_fovy = (fovy.into() / 2.0).tan();

    Matrix4::new(
        1.0 / (aspect * tan_half_fovy), 0.0, 0.0, 0.0,
        0.0, 1.0 / tan_half_fovy, 0.0, 0.0,
        0.0, 0.0, far / (near - far), -1.0,
        0.0, 0.0, -(far * near) / (far - near), 0.0
    )
}
