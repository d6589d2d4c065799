use bytemuck::Zeroable;

use crate::error::{GraphicsError, Result};
use crate::gpu::{DepthTextureDesc, DepthViewDimension, GraphicsContext, GraphicsDevice, Size, ViewProjectionBuffer, Viewport};
use crate::holo::{CameraId, HoloCamera, HoloCameraPose, RenderingParameters};

/// GPU presentation resources and the per-frame view-projection state of one
/// (possibly stereo) camera.
///
/// The back buffer is owned by the platform. We only cache it to detect
/// when the platform moves on to another buffer of its swap chain.
pub struct CameraResource<D: GraphicsDevice, C: HoloCamera> {
    camera: C,
    is_stereo: bool,
    render_target_size: Size,
    viewport: Viewport,
    format: Option<D::Format>,
    back_buffer: Option<D::Texture>,
    render_target_view: Option<D::RenderTargetView>,
    depth_stencil: Option<D::Texture>,
    depth_stencil_view: Option<D::DepthStencilView>,
    view_projection_buffer: Option<D::Buffer>,
    view_projection: ViewProjectionBuffer, // Last computed value, CPU side.
    frame_pending: bool,
}

impl<D: GraphicsDevice, C: HoloCamera> CameraResource<D, C> {
    pub fn new(camera: C) -> Self {
        let is_stereo = camera.is_stereo();
        let render_target_size = camera.get_render_target_size();

        Self {
            camera,
            is_stereo,
            render_target_size,
            viewport: Viewport::from_size(render_target_size),
            format: None,
            back_buffer: None,
            render_target_view: None,
            depth_stencil: None,
            depth_stencil_view: None,
            view_projection_buffer: None,
            view_projection: ViewProjectionBuffer::zeroed(),
            frame_pending: false,
        }
    }

    pub fn create_resources<P: RenderingParameters<D>>(&mut self, device: &D, params: &P) -> Result<()> {
        let back_buffer = params.get_back_buffer()?;

        // The back buffer can change every frame, as the system moves to the
        // next buffer in the swap chain.

        if self.back_buffer.as_ref() != Some(&back_buffer) {
            let info = device.get_texture_info(&back_buffer);
            if info.array_size < self.get_eye_count() as u32 {
                return Err(GraphicsError::BackBufferUnavailable(format!("camera {} needs {} layers, back buffer has {}", self.get_id(), self.get_eye_count(), info.array_size)));
            }

            let render_target_view = device.create_render_target_view(&back_buffer)?;

            self.back_buffer = Some(back_buffer);
            self.render_target_view = Some(render_target_view);
            self.format = Some(info.format);

            let size = info.size;
            if size != self.render_target_size {
                log::debug!("camera {}: render target resized to {}x{}", self.get_id(), size.width, size.height);

                self.render_target_size = size;
                self.depth_stencil_view = None; // A new depth stencil view is also needed.
            }
        }

        if self.depth_stencil_view.is_none() {
            let size = self.render_target_size;
            if size.width == 0 || size.height == 0 {
                return Err(GraphicsError::InvalidSize {
                    width: size.width,
                    height: size.height,
                });
            }

            let desc = DepthTextureDesc {
                size,
                array_size: self.get_eye_count() as u32,
            };
            let dimension = if self.is_stereo {
                DepthViewDimension::Texture2DArray
            } else {
                DepthViewDimension::Texture2D
            };

            let depth_stencil = device.create_depth_texture(&desc)?;
            let depth_stencil_view = device.create_depth_stencil_view(&depth_stencil, dimension)?;

            log::debug!("camera {}: depth buffer {}x{}x{} created", self.get_id(), size.width, size.height, desc.array_size);

            self.depth_stencil = Some(depth_stencil);
            self.depth_stencil_view = Some(depth_stencil_view);
        }

        if self.view_projection_buffer.is_none() {
            let buffer = device.create_constant_buffer(ViewProjectionBuffer::get_size(self.get_eye_count()))?;
            self.view_projection_buffer = Some(buffer);
        }

        Ok(())
    }

    pub fn release_resources(&mut self, context: &D::Context) {
        self.back_buffer = None;
        self.render_target_view = None;
        self.depth_stencil = None;
        self.depth_stencil_view = None;
        self.view_projection_buffer = None;
        self.format = None;
        self.frame_pending = false;

        // Make sure the system doesn't hold on the back buffer: unbind it
        // from the pipeline, then flush.

        context.set_render_targets(None, None);
        context.flush();
    }

    pub fn update_view_projection<S, P: HoloCameraPose<S>>(&mut self, context: Option<&D::Context>, pose: &P, coordinate_system: &S) {
        // The system may change the viewport every frame.
        self.viewport = pose.get_viewport();

        let projection = pose.get_projection_transform();
        let view_opt = pose.try_get_view_transform(coordinate_system);

        if let Some(view) = &view_opt {
            self.view_projection.view_projection = projection.view_projection(view);
        }

        let eye_count = self.get_eye_count();

        match (context, &self.view_projection_buffer, view_opt) {
            (Some(context), Some(buffer), Some(_)) => {
                context.update_buffer(buffer, self.view_projection.as_bytes(eye_count));
                self.frame_pending = true;
            },
            _ => {
                // Resources not there yet or no tracking, nothing to render for this camera.
                self.frame_pending = false;
            },
        }
    }

    pub fn attach_view_projection(&mut self, context: Option<&D::Context>, slot: u32) -> bool {
        let (context, buffer) = match (context, &self.view_projection_buffer) {
            (Some(context), Some(buffer)) if self.frame_pending => (context, buffer),
            _ => return false,
        };

        context.set_viewport(&self.viewport);
        context.set_vertex_constant_buffer(slot, buffer);
        self.frame_pending = false;

        true
    }

    pub fn get_id(&self) -> CameraId {
        self.camera.get_id()
    }

    pub fn get_camera(&self) -> &C {
        &self.camera
    }

    pub fn is_stereo(&self) -> bool {
        self.is_stereo
    }

    pub fn get_eye_count(&self) -> usize {
        if self.is_stereo { 2 } else { 1 }
    }

    pub fn is_frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn get_render_target_size(&self) -> Size {
        self.render_target_size
    }

    pub fn get_viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn get_pixel_format(&self) -> Option<D::Format> {
        self.format
    }

    pub fn get_back_buffer(&self) -> Option<&D::Texture> {
        self.back_buffer.as_ref()
    }

    pub fn get_render_target_view(&self) -> Option<&D::RenderTargetView> {
        self.render_target_view.as_ref()
    }

    pub fn get_depth_stencil_texture(&self) -> Option<&D::Texture> {
        self.depth_stencil.as_ref()
    }

    pub fn get_depth_stencil_view(&self) -> Option<&D::DepthStencilView> {
        self.depth_stencil_view.as_ref()
    }

    pub fn get_view_projection_buffer(&self) -> Option<&D::Buffer> {
        self.view_projection_buffer.as_ref()
    }

    pub fn get_view_projection(&self) -> &ViewProjectionBuffer {
        &self.view_projection
    }
}
