use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use tracing::{error, info, warn};
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use artoys::assets::{AssetSource, BuiltinAssets, GltfAssets, WithFallback};
use artoys::config::AppConfig;
use artoys::controller::{CameraController, InputEvent, InputState};
use artoys::host::{FrameExecutor, SimFrame, SimulatedXr};
use artoys::logging;
use artoys::model::Camera;
use artoys::shell::{DemoRegistry, HostShell};
use artoys::tasks::{DemoId, TaskEnv};
use artoys::view::render::EguiFrame;
use artoys::view::ui::{self, UiView};
use artoys::view::{gpu_init, GpuContext, Renderer};

/// Device eye height when the app starts.
const START_HEIGHT: f32 = 1.4;

struct App {
    window: Arc<Window>,
    renderer: Renderer,

    // egui
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,

    // Simulated AR host
    sim: Rc<SimulatedXr>,
    exec: FrameExecutor,
    shell: HostShell<SimulatedXr>,

    // The simulated device the user walks around with
    camera: Camera,
    input_state: InputState,
    camera_controller: CameraController,

    started: Instant,
    last_frame_time: Instant,
}

/// Map a key to the name the input layer uses (DOM `KeyboardEvent.key` style).
fn key_name(code: KeyCode) -> Option<&'static str> {
    Some(match code {
        KeyCode::KeyW => "w",
        KeyCode::KeyA => "a",
        KeyCode::KeyS => "s",
        KeyCode::KeyD => "d",
        KeyCode::Space => " ",
        KeyCode::ShiftLeft | KeyCode::ShiftRight => "Shift",
        _ => return None,
    })
}

impl App {
    async fn new(window: Arc<Window>, config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let size = window.inner_size();

        // Initialize wgpu
        let instance = gpu_init::instance();
        let surface = instance.create_surface(window.clone())?;
        let gpu = GpuContext::new_native(&instance, surface, size.width, size.height).await?;

        let assets: Rc<dyn AssetSource> = Rc::new(WithFallback {
            primary: GltfAssets::new(&config.asset_dir),
            fallback: BuiltinAssets,
        });
        let renderer = Renderer::new(gpu, Rc::clone(&assets));

        let sim = Rc::new(SimulatedXr::new(config.sim_latency).with_floor(config.sim_floor));
        let exec = FrameExecutor::new();
        let env = TaskEnv { backend: Rc::clone(&sim), spawner: exec.spawner(), assets };
        let mut shell = HostShell::new(env, DemoRegistry::standard())?;
        if let Some(id) = config.demo {
            // a failed launch leaves the selector up with the error shown
            let _ = shell.launch(id);
        }

        let mut camera = Camera::new(size.width, size.height);
        camera.eye = Vec3::new(0.0, config.sim_floor + START_HEIGHT, 0.5);
        camera.set_look_at(Vec3::new(0.0, config.sim_floor, -1.5));

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(egui_ctx.clone(), egui::ViewportId::ROOT, &window, None, None, None);

        let now = Instant::now();
        Ok(Self {
            window,
            renderer,
            egui_state,
            egui_ctx,
            sim,
            exec,
            shell,
            camera,
            input_state: InputState::new(),
            camera_controller: CameraController::new(),
            started: now,
            last_frame_time: now,
        })
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        // First let egui process the event
        if self.egui_state.on_window_event(self.window.as_ref(), event).consumed {
            return true;
        }

        match event {
            WindowEvent::KeyboardInput { event: KeyEvent { state, physical_key, .. }, .. } => {
                let PhysicalKey::Code(code) = physical_key else {
                    return false;
                };
                if *code == KeyCode::Escape && *state == ElementState::Pressed {
                    self.shell.close();
                    return true;
                }
                let Some(key) = key_name(*code) else {
                    return false;
                };
                let event = match state {
                    ElementState::Pressed => InputEvent::KeyDown(key.to_string()),
                    ElementState::Released => InputEvent::KeyUp(key.to_string()),
                };
                self.input_state.process_event(&event);
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => self.input_state.process_event(&InputEvent::Tap),
                    // hold the right button to look around
                    (MouseButton::Right, ElementState::Pressed) => self.set_look(true),
                    (MouseButton::Right, ElementState::Released) => self.set_look(false),
                    _ => return false,
                }
                true
            }
            WindowEvent::Focused(false) => {
                self.input_state.process_event(&InputEvent::FocusLost);
                self.set_look(false);
                true
            }
            _ => false,
        }
    }

    fn set_look(&mut self, locked: bool) {
        if locked {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                warn!("cursor grab unavailable: {e}");
            }
        } else {
            let _ = self.window.set_cursor_grab(CursorGrabMode::None);
        }
        self.window.set_cursor_visible(!locked);
        self.input_state.process_event(&InputEvent::PointerLockChanged { locked });
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size.width, new_size.height);
            self.camera.set_aspect(new_size.width, new_size.height);
        }
    }

    fn update(&mut self, dt: f32) {
        let (dx, dy) = self.input_state.consume_look();
        self.camera_controller.apply_look(&mut self.camera, dx, dy);
        self.camera_controller.update_movement(&mut self.camera, &self.input_state.pressed_keys, dt);
        if self.input_state.take_tap() {
            self.shell.select();
        }

        self.sim.advance_frame();
        self.exec.run_until_stalled();
    }

    fn render(&mut self) {
        let frame = SimFrame { viewer: self.camera.pose(), projection: Some(self.camera.projection()) };
        let time = self.started.elapsed().as_secs_f64();
        self.shell.frame(time, Some(&frame), &mut self.renderer);

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let elements = self.shell.mount().elements();
        let demos: Vec<DemoId> = self.shell.demos().collect();
        let view = UiView {
            demos: &demos,
            active: self.shell.active(),
            elements: &elements,
            ar: self.shell.ar_state(),
            status: self.shell.status(),
        };
        let (output, actions) = ui::build_ui(&self.egui_ctx, raw_input, &view);
        self.egui_state.handle_platform_output(&self.window, output.platform_output);

        let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);
        self.renderer.finish_frame(EguiFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        });

        for action in actions {
            self.shell.handle(action);
        }
        // session requests issued from the UI start resolving right away
        self.exec.run_until_stalled();
    }
}

fn main() {
    logging::init();
    let config = AppConfig::from_env();
    info!(?config, "starting");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("cannot create event loop: {e}");
            std::process::exit(1);
        }
    };
    let (width, height) = config.window;
    let window_attributes = Window::default_attributes()
        .with_title("artoys - simulated AR")
        .with_inner_size(winit::dpi::LogicalSize::new(width, height));
    #[allow(deprecated)]
    let window = match event_loop.create_window(window_attributes) {
        Ok(window) => Arc::new(window),
        Err(e) => {
            error!("cannot create window: {e}");
            std::process::exit(1);
        }
    };

    let mut app = match pollster::block_on(App::new(window, &config)) {
        Ok(app) => app,
        Err(e) => {
            error!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    #[allow(deprecated)]
    let result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
            if !app.input(event) {
                match event {
                    WindowEvent::CloseRequested => {
                        app.shell.close();
                        elwt.exit();
                    }
                    WindowEvent::Resized(physical_size) => app.resize(*physical_size),
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = (now - app.last_frame_time).as_secs_f32();
                        app.last_frame_time = now;

                        app.update(dt);
                        app.render();
                    }
                    _ => {}
                }
            }
        }
        Event::DeviceEvent { event: DeviceEvent::MouseMotion { delta }, .. } => {
            app.input_state.process_event(&InputEvent::MouseMove { dx: delta.0 as f32, dy: delta.1 as f32 });
        }
        Event::AboutToWait => app.window.request_redraw(),
        _ => {}
    });
    if let Err(e) = result {
        error!("event loop error: {e}");
    }
}
