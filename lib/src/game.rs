use std::sync::Arc;

use crate::error::Result;
use crate::gpu::GraphicsDevice;
use crate::holo::{GraphicsSession, HoloSpace, PresentResult, SceneTarget};

/// The embedding application. Everything here is called on the render thread.
pub trait GameApp<D: GraphicsDevice> {
    /// Runs once the device exists, so GPU state can be created.
    fn startup(&mut self, device: &D, context: &D::Context);
    fn cleanup(&mut self);

    /// Runs after a lost device has been recreated. Whatever startup() built
    /// belongs to the old device, by default it is torn down and built again.
    fn device_restored(&mut self, device: &D, context: &D::Context) {
        self.cleanup();
        self.startup(device, context);
    }

    fn suspend(&mut self) {
    }

    fn resume(&mut self) {
    }

    fn is_done(&self) -> bool {
        false
    }

    fn update(&mut self, delta_t: f32); // [s]

    /// Called once per camera per frame, after its view-projection buffer has
    /// been attached. Render targets are bound and cleared already.
    fn render_scene(&mut self, context: &D::Context, target: &SceneTarget<D>);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Locatability {
    Unavailable,
    PositionalTrackingActivating,
    OrientationOnly,
    PositionalTrackingInhibited,
    PositionalTrackingActive,
}

/// Sequences a holographic frame: predict, ensure camera resources, update,
/// render, present.
pub struct GameCore<D: GraphicsDevice, S: HoloSpace<D>> {
    session: Arc<GraphicsSession<D, S::Camera>>,
    space: S,
    reference_opt: Option<S::CoordinateSystem>,
}

impl<D: GraphicsDevice, S: HoloSpace<D>> GameCore<D, S> {
    pub fn new(session: GraphicsSession<D, S::Camera>, space: S) -> Self {
        session.attach_space(&space);

        Self {
            session: Arc::new(session),
            space,
            reference_opt: None,
        }
    }

    /// The session doubles as the camera observer, hand a clone of it to the
    /// platform's camera added/removed notifications.
    pub fn get_session(&self) -> &Arc<GraphicsSession<D, S::Camera>> {
        &self.session
    }

    pub fn get_space(&self) -> &S {
        &self.space
    }

    pub fn load<A: GameApp<D>>(&self, app: &mut A) {
        self.session.with_device(|device, context| app.startup(device, context));
    }

    /// Returns false once the app is done.
    pub fn update_application<A: GameApp<D>>(&mut self, app: &mut A) -> Result<bool> {
        let delta_t = self.session.get_stats().get_frame_time();
        app.update(delta_t);

        // The frame carries a prediction of where the cameras will be when
        // it is presented.

        let mut frame = self.space.create_next_frame();
        self.session.ensure_camera_resources(&frame)?;

        let rendered = self.session.render(&mut frame, self.reference_opt.as_ref(), |context, target| app.render_scene(context, target))?;
        if rendered && self.session.present(frame, &self.space)? == PresentResult::DeviceRemoved {
            log::info!("restoring application resources");
            self.session.with_device(|device, context| app.device_restored(device, context));
        }

        Ok(!app.is_done())
    }

    pub fn suspend<A: GameApp<D>>(&self, app: &mut A) {
        self.session.trim();
        app.suspend();
    }

    pub fn resume<A: GameApp<D>>(&self, app: &mut A) {
        app.resume();
    }

    pub fn terminate<A: GameApp<D>>(&self, app: &mut A) {
        app.cleanup();
        self.session.shutdown();
    }

    /// Replaces the stationary reference frame, e.g. when the default
    /// locator changes. Without one, nothing world-locked gets rendered.
    pub fn set_reference_frame(&mut self, reference_opt: Option<S::CoordinateSystem>) {
        self.reference_opt = reference_opt;
    }

    pub fn has_reference_frame(&self) -> bool {
        self.reference_opt.is_some()
    }

    pub fn on_locatability_changed(&self, locatability: Locatability) {
        match locatability {
            Locatability::Unavailable => log::warn!("positional tracking is unavailable, holograms can't be rendered"),
            Locatability::PositionalTrackingActive => log::info!("positional tracking is active"),
            other => log::info!("positional tracking: {:?}", other),
        }
    }
}
