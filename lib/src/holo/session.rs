use std::sync::{Mutex, RwLock, RwLockReadGuard};

use crate::config::GraphicsConfig;
use crate::error::Result;
use crate::gpu::{DeviceFactory, GraphicsContext, GraphicsDevice};
use crate::holo::{CameraObserver, CameraResourceTable, Capabilities, HoloCamera, HoloCameraPose, HoloFrame, HoloSpace, PresentResult, RenderingParameters, SceneTarget};
use crate::util::FrameStats;

struct Gpu<D: GraphicsDevice> {
    device: D,
    context: D::Context,
}

/// Everything a holographic app needs to present stereo frames: the shared
/// device and immediate context, the camera table, platform capabilities and
/// frame statistics.
///
/// Lock order is gpu, then camera table. The gpu lock is only taken for
/// writing while the device is being recreated.
pub struct GraphicsSession<D: GraphicsDevice, C: HoloCamera> {
    factory: Box<dyn DeviceFactory<D>>,
    gpu: RwLock<Gpu<D>>,
    table: CameraResourceTable<D, C>,
    capabilities: Mutex<Capabilities>,
    config: GraphicsConfig,
    stats: FrameStats,
}

impl<D: GraphicsDevice, C: HoloCamera> GraphicsSession<D, C> {
    pub fn new(factory: Box<dyn DeviceFactory<D>>, config: GraphicsConfig) -> Result<Self> {
        let (device, context) = factory.create_device()?;
        log::info!("graphics device created");

        Ok(Self {
            factory,
            gpu: RwLock::new(Gpu {
                device,
                context,
            }),
            table: CameraResourceTable::new(),
            capabilities: Mutex::new(Capabilities::default()),
            config,
            stats: FrameStats::new(),
        })
    }

    /// Hands the device over to the holographic space and caches what the
    /// platform is able to do.
    pub fn attach_space<S: HoloSpace<D, Camera = C>>(&self, space: &S) {
        let gpu = self.read_gpu();
        space.set_device(&gpu.device);

        let capabilities = space.get_capabilities();
        log::info!("holographic space attached: {:?}", capabilities);
        *self.capabilities.lock().unwrap() = capabilities;
    }

    pub fn add_camera(&self, camera: C) {
        let id = camera.get_id();
        let gpu = self.read_gpu();

        if self.table.insert(camera, &gpu.context) {
            // Same id attached twice without a removal in between.
            log::warn!("camera {} re-added, previous resources released", id);
        }

        log::info!("camera {} added", id);
    }

    pub fn remove_camera(&self, camera: &C) {
        let id = camera.get_id();
        let gpu = self.read_gpu();

        if self.table.remove(id, &gpu.context) {
            log::info!("camera {} removed", id);
        }
    }

    /// Back buffers can change from frame to frame. Validates each camera of
    /// the prediction and recreates views and depth buffers as needed.
    pub fn ensure_camera_resources<F: HoloFrame<D>>(&self, frame: &F) -> Result<()> {
        let gpu = self.read_gpu();

        self.table.with_lock(|cameras| {
            for pose in frame.get_camera_poses() {
                let id = pose.get_camera_id();

                match cameras.get_mut(&id) {
                    Some(camera_res) => {
                        let params = frame.get_rendering_parameters(pose);
                        camera_res.create_resources(&gpu.device, &params)?;
                    },
                    None => log::warn!("camera {} is predicted but not attached", id),
                }
            }

            Ok(())
        })
    }

    /// Renders every predicted camera. Returns true if there was at least one
    /// camera to render into, in which case the frame should be presented,
    /// even if no camera had a usable pose.
    pub fn render<F: HoloFrame<D>, R: FnMut(&D::Context, &SceneTarget<D>)>(&self, frame: &mut F, coordinate_system: Option<&F::CoordinateSystem>, mut render_scene: R) -> Result<bool> {
        // Up-to-date predictions enhance image stabilization and hologram positioning.
        frame.update_current_prediction();
        let frame = &*frame;

        let gpu = self.read_gpu();
        let context = &gpu.context;
        let capabilities = self.get_capabilities();
        let config = &self.config;
        let commit_depth = capabilities.can_commit_depth_buffer && config.commit_depth_buffer;

        self.table.with_lock(|cameras| {
            let mut rendered = false;

            for pose in frame.get_camera_poses() {
                let id = pose.get_camera_id();

                let camera_res = match cameras.get_mut(&id) {
                    Some(camera_res) => camera_res,
                    None => continue, // Already reported by ensure_camera_resources().
                };

                rendered = true;

                let (rtv, dsv) = match (camera_res.get_render_target_view(), camera_res.get_depth_stencil_view()) {
                    (Some(rtv), Some(dsv)) => (rtv.clone(), dsv.clone()),
                    _ => continue,
                };

                context.set_render_targets(Some(&rtv), Some(&dsv));

                let opaque = capabilities.can_get_display_for_camera && camera_res.get_camera().is_display_opaque();
                context.clear_render_target_view(&rtv, config.get_clear_color(opaque));
                context.clear_depth_stencil_view(&dsv, config.depth_clear_value, config.stencil_clear_value);

                if let Some(coordinate_system) = coordinate_system {
                    camera_res.update_view_projection(Some(context), pose, coordinate_system);
                }

                // Only render world-locked content when positional tracking is active.
                if !camera_res.attach_view_projection(Some(context), config.view_projection_slot) {
                    continue;
                }

                if let Some(buffer) = camera_res.get_view_projection_buffer() {
                    let target = SceneTarget {
                        camera_id: id,
                        is_stereo: camera_res.is_stereo(),
                        viewport: *camera_res.get_viewport(),
                        format: camera_res.get_pixel_format(),
                        render_target_view: &rtv,
                        depth_stencil_view: &dsv,
                        view_projection_buffer: buffer,
                    };

                    render_scene(context, &target);
                }

                if commit_depth {
                    // The system reads the depth buffer back to stabilize the image per-pixel.
                    if let Some(depth) = camera_res.get_depth_stencil_texture() {
                        frame.get_rendering_parameters(pose).commit_depth_buffer(depth)?;
                    }
                }
            }

            Ok(rendered)
        })
    }

    /// Presents the frame outside of any table lock. A removed device is
    /// recreated right away, see [`handle_device_lost`](Self::handle_device_lost).
    pub fn present<S: HoloSpace<D, Camera = C>>(&self, frame: S::Frame, space: &S) -> Result<PresentResult> {
        let result = frame.present();
        self.stats.tick();

        if result == PresentResult::DeviceRemoved {
            log::warn!("graphics device removed during present");
            self.handle_device_lost(space)?;
        }

        Ok(result)
    }

    /// Recreates device and context and attaches them to the space. Every
    /// camera stays in the table with its GPU resources released, the next
    /// resource-ensure pass rebuilds them.
    pub fn handle_device_lost<S: HoloSpace<D, Camera = C>>(&self, space: &S) -> Result<()> {
        let mut gpu = self.gpu.write().unwrap();

        let camera_count = self.table.with_lock(|cameras| {
            for camera_res in cameras.values_mut() {
                camera_res.release_resources(&gpu.context);
            }

            cameras.len()
        });

        let (device, context) = self.factory.create_device()?;
        *gpu = Gpu {
            device,
            context,
        };

        space.set_device(&gpu.device);
        *self.capabilities.lock().unwrap() = space.get_capabilities();

        log::info!("graphics device recreated, {} camera(s) pending rebuild", camera_count);

        Ok(())
    }

    pub fn trim(&self) {
        self.read_gpu().context.trim();
    }

    /// Releases and forgets every camera.
    pub fn shutdown(&self) {
        let gpu = self.read_gpu();

        self.table.with_lock(|cameras| {
            for (_, mut camera_res) in cameras.drain() {
                camera_res.release_resources(&gpu.context);
            }
        });
    }

    /// Scoped access to the current device and context, e.g. to create
    /// application resources on startup.
    pub fn with_device<R, F: FnOnce(&D, &D::Context) -> R>(&self, f: F) -> R {
        let gpu = self.read_gpu();
        f(&gpu.device, &gpu.context)
    }

    pub fn get_table(&self) -> &CameraResourceTable<D, C> {
        &self.table
    }

    pub fn get_capabilities(&self) -> Capabilities {
        *self.capabilities.lock().unwrap()
    }

    pub fn get_config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn get_stats(&self) -> &FrameStats {
        &self.stats
    }

    fn read_gpu(&self) -> RwLockReadGuard<'_, Gpu<D>> {
        self.gpu.read().unwrap()
    }
}

impl<D: GraphicsDevice, C: HoloCamera> CameraObserver<C> for GraphicsSession<D, C> {
    fn on_camera_added(&self, camera: C) {
        self.add_camera(camera);
    }

    fn on_camera_removed(&self, camera: &C) {
        self.remove_camera(camera);
    }
}
