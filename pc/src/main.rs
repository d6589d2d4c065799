use std::collections::HashSet;
use std::env;
use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use cgmath::Vector3;
use pollster::FutureExt;
use wgpu::{Instance, RequestAdapterOptions, SurfaceTarget};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

mod cube;
use cube::CubeApp;

mod space;
use space::{DesktopCamera, DesktopSpace, Head, Motion, Stage};

use rsholo_lib::{APP_NAME, GameCore, GraphicsConfig};
use rsholo_lib::game::Locatability;
use rsholo_lib::gpu::{WgpuDevice, WgpuDeviceFactory};
use rsholo_lib::holo::{CameraObserver, GraphicsSession};

const CONFIG_ENV: &str = "RSHOLO_CONFIG";
const MIN_SIZE: PhysicalSize<u32> = PhysicalSize { width: 800, height: 600 };
const CAMERA_ID: u32 = 1;
const DEFAULT_POS: Vector3<f32> = Vector3::new(0.0, -3.0, 1.5);
const REATTACH_DELAY: Duration = Duration::from_secs(1);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

struct App {
    config_opt: Option<GraphicsConfig>,
    data: Option<AppData>,
}

struct AppData {
    window: Arc<Window>,
    core: GameCore<WgpuDevice, DesktopSpace>,
    cube: CubeApp,
    keys: HashSet<KeyCode>,
    prev_ts_opt: Option<Instant>,
    stats_ts: Instant,
    active: bool,
}

impl App {
    fn new(config: GraphicsConfig) -> Self {
        Self {
            config_opt: Some(config),
            data: None,
        }
    }
}

impl AppData {
    fn new(window: Arc<Window>, config: GraphicsConfig) -> Self {
        let instance = Instance::new(&Default::default());
        let surface = instance.create_surface(SurfaceTarget::from(Arc::clone(&window))).expect("Unable to create render surface");

        let adapter_opt = RequestAdapterOptions {
            power_preference: Default::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        };
        let adapter = instance.request_adapter(&adapter_opt).block_on().expect("Unable to request adapter");

        let surface_caps = surface.get_capabilities(&adapter);
        let color_format = *surface_caps.formats.iter().find(|format| format.is_srgb()).expect("Missing sRGB texture format");

        let factory = WgpuDeviceFactory::new(&adapter, Default::default(), Default::default());
        let view_projection_slot = config.view_projection_slot;
        let session = GraphicsSession::new(Box::new(factory), config).expect("Unable to create graphics session");

        // The window is the one and only camera, attached from the start.

        let size = window.inner_size();
        let camera = DesktopCamera::new(CAMERA_ID, size.width, size.height);

        let space = DesktopSpace::new(surface, color_format, camera.clone(), Head::new(DEFAULT_POS));

        let mut core = GameCore::new(session, space);
        core.get_session().on_camera_added(camera);
        core.set_reference_frame(Some(Stage));

        let mut cube = CubeApp::new(view_projection_slot);
        core.load(&mut cube);

        Self {
            window,
            core,
            cube,
            keys: HashSet::new(),
            prev_ts_opt: None,
            stats_ts: Instant::now(),
            active: true,
        }
    }

    fn toggle_tracking(&self) {
        let space = self.core.get_space();

        let mut head = space.get_head();
        head.tracking = !head.tracking;
        space.set_head(head);

        let locatability = if head.tracking {
            Locatability::PositionalTrackingActive
        } else {
            Locatability::Unavailable
        };
        self.core.on_locatability_changed(locatability);
    }

    fn reattach_camera(&self) {
        // Simulate the platform detaching and re-attaching the display, the
        // notifications arrive on their own thread.

        let session = Arc::clone(self.core.get_session());
        let space = self.core.get_space();
        let camera = space.get_camera();
        let attached = space.get_attached();

        thread::spawn(move || {
            attached.store(false, Ordering::Relaxed);
            session.on_camera_removed(&camera);

            thread::sleep(REATTACH_DELAY);

            session.on_camera_added(camera);
            attached.store(true, Ordering::Relaxed);
        });
    }

    fn handle_input(&mut self, ts: Instant) {
        let space = self.core.get_space();
        let mut head = space.get_head();

        if self.keys.contains(&KeyCode::KeyR) {
            head = Head {
                tracking: head.tracking,
                ..Head::new(DEFAULT_POS)
            };
        } else if let Some(prev_ts) = self.prev_ts_opt {
            head.step(get_motion(&self.keys), ts.duration_since(prev_ts).as_secs_f32());
        }

        space.set_head(head);
        self.prev_ts_opt = Some(ts);
    }

    fn log_stats(&mut self, ts: Instant) {
        if ts.duration_since(self.stats_ts) < STATS_INTERVAL {
            return;
        }

        self.stats_ts = ts;

        let stats = self.core.get_session().get_stats();
        log::info!("frames: {}, fps: {:.1}, cameras: {}", stats.get_frame_count(), stats.get_frame_rate(), self.core.get_session().get_table().len());
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.data.is_none() {
            // From https://docs.rs/winit/latest/winit/application/trait.ApplicationHandler.html#tymethod.resumed :
            // "It's recommended that applications should only initialize their graphics context and create a window after they have received their first Resumed event."

            let window_attrs = Window::default_attributes()
                .with_title(APP_NAME)
                .with_min_inner_size(MIN_SIZE);

            let window = Arc::new(event_loop.create_window(window_attrs).expect("Unable to create window"));
            let config = self.config_opt.take().unwrap();

            self.data = Some(AppData::new(window, config));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let data = match &mut self.data {
            Some(data) => data,
            None => return,
        };

        let size = data.window.inner_size();

        match event {
            WindowEvent::Resized(_) => {
                if size.width == 0 || size.height == 0 {
                    data.core.suspend(&mut data.cube);
                    data.keys.clear();
                    data.prev_ts_opt = None;
                    data.active = false;
                } else {
                    data.core.get_space().resize(size.width, size.height);

                    if !data.active {
                        data.core.resume(&mut data.cube);
                        data.active = true;
                        data.window.request_redraw();
                    }
                }
            },
            WindowEvent::RedrawRequested => {
                let ts: Instant = Instant::now();
                data.handle_input(ts);

                if !data.active {
                    return;
                }

                data.window.request_redraw();

                match data.core.update_application(&mut data.cube) {
                    Ok(true) => (),
                    Ok(false) => event_loop.exit(),
                    Err(e) => log::error!("frame failed: {}", e),
                }

                data.log_stats(ts);
            },
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.repeat {
                    let pressed = match event.state {
                        ElementState::Pressed => true,
                        ElementState::Released => false,
                    };

                    if let PhysicalKey::Code(key) = event.physical_key {
                        if pressed {
                            match key {
                                KeyCode::KeyT => data.toggle_tracking(),
                                KeyCode::KeyC => data.reattach_camera(),
                                KeyCode::KeyL => data.core.get_space().simulate_device_lost(),
                                _ => (),
                            }

                            data.keys.insert(key);
                        } else {
                            data.keys.remove(&key);
                        }
                    }
                }
            },
            WindowEvent::CloseRequested => {
                data.core.terminate(&mut data.cube);
                event_loop.exit();
            },
            _ => (),
        }
    }
}

fn get_motion(keys: &HashSet<KeyCode>) -> Motion {
    let axis = |plus: KeyCode, minus: KeyCode| keys.contains(&plus) as i32 as f32 - keys.contains(&minus) as i32 as f32;

    Motion {
        forward: axis(KeyCode::KeyW, KeyCode::KeyS),
        left: axis(KeyCode::KeyA, KeyCode::KeyD),
        tilt: axis(KeyCode::ArrowUp, KeyCode::ArrowDown),
        turn: axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
    }
}

fn load_config() -> GraphicsConfig {
    match env::var(CONFIG_ENV) {
        Ok(path) => {
            let file = File::open(&path).expect("Unable to open config");
            let config = GraphicsConfig::load(file).expect("Unable to load config");
            log::info!("config loaded from {}", path);
            config
        },
        Err(_) => GraphicsConfig::default(),
    }
}

fn main() {
    env_logger::init();

    let mut app = App::new(load_config());

    let event_loop = EventLoop::new().expect("Unable to create event loop");
    event_loop.run_app(&mut app).expect("Unable to run event loop");
}
