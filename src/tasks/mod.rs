//! Demo modules and the init/cleanup lifecycle they share.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use tracing::{debug, info, warn};

use crate::assets::AssetSource;
use crate::controller::frame_loop::material_binding;
use crate::controller::{animate, toggle_for, AnimationParams, ArSessionController, OverlayPolicy};
use crate::error::{AssetError, TaskError};
use crate::host::{
    acquire_resources, Control, ControlId, ControlPanel, ControlValue, Element, FrameTick, MountPoint, SessionEvent,
    Spawner, WeakMountPoint, XrBackend,
};
use crate::model::{Camera, ConfigurationState, ObjectRegistry, SceneLights, ToggleRules};
use crate::view::SceneView;

pub mod model_viewer;
pub mod planets;
pub mod shapes;
pub mod torus;

pub use model_viewer::ModelViewer;
pub use planets::Planets;
pub use shapes::Shapes;
pub use torus::TorusDemo;

/// The closed set of demos the shell can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoId {
    Shapes,
    ModelViewer,
    Torus,
    Planets,
}

impl DemoId {
    pub const ALL: [DemoId; 4] = [DemoId::Shapes, DemoId::ModelViewer, DemoId::Torus, DemoId::Planets];

    pub fn key(self) -> &'static str {
        match self {
            DemoId::Shapes => "shapes",
            DemoId::ModelViewer => "model-viewer",
            DemoId::Torus => "torus",
            DemoId::Planets => "planets",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DemoId::Shapes => "Shapes",
            DemoId::ModelViewer => "Model Viewer",
            DemoId::Torus => "Torus",
            DemoId::Planets => "Planets",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

impl fmt::Display for DemoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A demo as the host shell sees it.
pub trait TaskModule<B: XrBackend> {
    fn id(&self) -> DemoId;

    /// Build all demo state and mount it. On error nothing stays mounted.
    fn init(&mut self, mount: &MountPoint<B>, on_back: Rc<dyn Fn()>) -> Result<(), TaskError>;

    /// Stop the animation loop, release tracking resources, empty the mount point.
    fn cleanup(&mut self);

    /// Message for the user, e.g. why tracking could not start.
    fn status(&self) -> Option<String> {
        None
    }
}

/// What distinguishes one demo from another; the lifecycle is shared.
pub trait Demo: 'static {
    fn id(&self) -> DemoId;

    fn build(&self, assets: &dyn AssetSource) -> Result<ObjectRegistry, AssetError>;

    fn config(&self) -> ConfigurationState;

    fn rules(&self) -> ToggleRules;

    fn params(&self) -> AnimationParams;

    fn lights(&self) -> SceneLights;

    fn overlay(&self) -> OverlayPolicy {
        OverlayPolicy::ArOnly
    }

    /// Panel controls, labelled from the current configuration.
    fn controls(&self, config: &ConfigurationState) -> Vec<Control>;

    /// Demo-specific scene tweaks after the shared animation step.
    fn after_animate(&self, _registry: &ObjectRegistry, _lights: &mut SceneLights) {}
}

/// Services a task needs from its host.
pub struct TaskEnv<B: XrBackend> {
    pub backend: Rc<B>,
    pub spawner: Spawner,
    pub assets: Rc<dyn AssetSource>,
}

impl<B: XrBackend> Clone for TaskEnv<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
            spawner: Rc::clone(&self.spawner),
            assets: Rc::clone(&self.assets),
        }
    }
}

struct TaskState<B: XrBackend> {
    config: ConfigurationState,
    rules: ToggleRules,
    registry: ObjectRegistry,
    lights: SceneLights,
    params: AnimationParams,
    controller: ArSessionController<B>,
    camera: Camera,
    /// Host time of the first frame; animation time counts from here.
    epoch: Option<f64>,
}

type SharedState<B> = Rc<RefCell<TaskState<B>>>;

/// A hit-test placement demo driven by the shared AR lifecycle.
pub struct ArTask<B: XrBackend, D: Demo> {
    demo: Rc<D>,
    env: TaskEnv<B>,
    state: Option<SharedState<B>>,
    mount: Option<MountPoint<B>>,
}

impl<B: XrBackend, D: Demo> ArTask<B, D> {
    pub fn new(demo: D, env: TaskEnv<B>) -> Self {
        Self { demo: Rc::new(demo), env, state: None, mount: None }
    }

    pub fn config(&self) -> Option<ConfigurationState> {
        self.state.as_ref().map(|s| s.borrow().config.clone())
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    fn panel(demo: &D, config: &ConfigurationState, visible: bool) -> ControlPanel {
        ControlPanel { title: demo.id().label().to_string(), controls: demo.controls(config), visible }
    }

    fn control_listener(
        demo: Rc<D>,
        state: SharedState<B>,
        mount: WeakMountPoint<B>,
        on_back: Rc<dyn Fn()>,
    ) -> Box<dyn FnMut(ControlId, ControlValue)> {
        Box::new(move |id, value| {
            if id == ControlId::Back {
                on_back();
                return;
            }
            let panel = {
                let mut guard = state.borrow_mut();
                let s = &mut *guard;
                // only controls on this demo's panel have a target
                if !demo.controls(&s.config).iter().any(|c| c.id == id) {
                    debug!(?id, demo = %demo.id(), "control not offered by this demo");
                    return;
                }
                let Some(toggle) = toggle_for(id, value, &s.rules) else {
                    return;
                };
                if !s.config.apply(toggle, &s.rules) {
                    return;
                }
                debug!(?toggle, "configuration changed");
                Self::panel(&demo, &s.config, s.controller.overlay_visible())
            };
            if let Some(mount) = mount.upgrade() {
                mount.set_panel(panel);
            }
        })
    }

    fn session_listener(
        env: TaskEnv<B>,
        state: SharedState<B>,
        mount: WeakMountPoint<B>,
    ) -> Box<dyn FnMut(SessionEvent)> {
        Box::new(move |event| {
            let overlay = {
                let mut guard = state.borrow_mut();
                let s = &mut *guard;
                match event {
                    SessionEvent::Start => {
                        let ticket = s.controller.begin_session();
                        let backend = Rc::clone(&env.backend);
                        let weak = Rc::downgrade(&state);
                        let acquisition: LocalBoxFuture<'static, ()> = Box::pin(async move {
                            let result = acquire_resources(&*backend).await;
                            match weak.upgrade() {
                                Some(state) => {
                                    state.borrow_mut().controller.resources_ready(ticket, result);
                                }
                                None => {
                                    debug!("task gone before tracking resolved");
                                    if let Ok(resources) = result {
                                        resources.release(&backend);
                                    }
                                }
                            }
                        });
                        (env.spawner)(acquisition);
                    }
                    SessionEvent::Select => {
                        let selected = s.config.selected;
                        s.controller.select(&mut s.registry, selected);
                    }
                    SessionEvent::End => s.controller.end_session(&mut s.registry),
                }
                s.controller.overlay_visible()
            };
            if let Some(mount) = mount.upgrade() {
                mount.set_panel_visible(overlay);
            }
        })
    }

    fn animation_loop(demo: Rc<D>, state: SharedState<B>) -> Box<dyn FnMut(&mut FrameTick<'_, B>)> {
        Box::new(move |tick| {
            let mut guard = state.borrow_mut();
            let s = &mut *guard;
            let t0 = *s.epoch.get_or_insert(tick.time);
            let t = (tick.time - t0) as f32;

            s.controller.update_frame(tick.xr_frame);
            s.camera.follow(s.controller.viewer_pose());
            animate(t, &s.config, s.controller.placement(), &mut s.registry, &mut s.lights, &s.params);
            demo.after_animate(&s.registry, &mut s.lights);

            let reticle = s.controller.reticle();
            let scene = SceneView {
                objects: s.registry.objects(),
                reticle: reticle.visible.then_some(reticle.transform),
                lights: &s.lights,
            };
            tick.surface.render(&scene, &s.camera);
        })
    }
}

impl<B: XrBackend, D: Demo> TaskModule<B> for ArTask<B, D> {
    fn id(&self) -> DemoId {
        self.demo.id()
    }

    fn init(&mut self, mount: &MountPoint<B>, on_back: Rc<dyn Fn()>) -> Result<(), TaskError> {
        if self.state.is_some() {
            return Err(TaskError::AlreadyInitialized);
        }
        // the only fallible step, done before anything touches the mount point
        let registry = self.demo.build(&*self.env.assets)?;

        let config = self.demo.config();
        let controller = ArSessionController::new(Rc::clone(&self.env.backend), self.demo.overlay());
        let panel = Self::panel(&self.demo, &config, controller.overlay_visible());
        let state = Rc::new(RefCell::new(TaskState {
            registry: registry.with_binding(material_binding(&config)),
            rules: self.demo.rules(),
            lights: self.demo.lights(),
            params: self.demo.params(),
            camera: Camera::new(1280, 720),
            config,
            controller,
            epoch: None,
        }));

        mount.append(Element::BackButton);
        mount.append(Element::ArButton);
        mount.append(Element::Panel(panel));
        mount.append(Element::Surface);

        let weak = mount.downgrade();
        mount.set_control_listener(Self::control_listener(
            Rc::clone(&self.demo),
            Rc::clone(&state),
            weak.clone(),
            on_back,
        ));
        mount.set_session_listener(Self::session_listener(self.env.clone(), Rc::clone(&state), weak));
        mount.set_animation_loop(Self::animation_loop(Rc::clone(&self.demo), Rc::clone(&state)));

        self.state = Some(state);
        self.mount = Some(mount.clone());
        info!(demo = %self.demo.id(), "demo initialized");
        Ok(())
    }

    fn cleanup(&mut self) {
        let Some(mount) = self.mount.take() else {
            debug!(demo = %self.demo.id(), "cleanup without init");
            return;
        };
        // no frame may run against a half torn-down task
        mount.clear_animation_loop();
        mount.remove_listeners();
        if let Some(state) = self.state.take() {
            match state.try_borrow_mut() {
                Ok(mut s) => {
                    s.controller.teardown();
                    s.registry.hide_all();
                }
                // the controller releases its resources when the last holder drops the state
                Err(_) => warn!("task state busy during cleanup, deferring teardown"),
            }
        }
        mount.clear();
        info!(demo = %self.demo.id(), "demo cleaned up");
    }

    fn status(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        let s = state.borrow();
        s.controller.last_error().map(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{BuiltinAssets, TextureImage};
    use crate::host::{FrameExecutor, SimulatedXr};
    use crate::model::{ModelTemplate, TextureRef};
    use crate::view::RecordingSurface;
    use std::cell::Cell;

    struct NoAssets;

    impl AssetSource for NoAssets {
        fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
            Err(AssetError::NotFound(id.into()))
        }

        fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
            Err(AssetError::NotFound(texture.0.clone()))
        }
    }

    fn env(sim: &Rc<SimulatedXr>, exec: &FrameExecutor, assets: Rc<dyn AssetSource>) -> TaskEnv<SimulatedXr> {
        TaskEnv { backend: Rc::clone(sim), spawner: exec.spawner(), assets }
    }

    #[test]
    fn test_demo_keys_round_trip() {
        for id in DemoId::ALL {
            assert_eq!(DemoId::from_key(id.key()), Some(id));
        }
        assert_eq!(DemoId::from_key("asteroids"), None);
    }

    #[test]
    fn test_init_twice_is_rejected() {
        let sim = Rc::new(SimulatedXr::new(0));
        let exec = FrameExecutor::new();
        let mut task = ArTask::new(TorusDemo, env(&sim, &exec, Rc::new(BuiltinAssets)));
        let mount = MountPoint::new();
        task.init(&mount, Rc::new(|| {})).unwrap();
        assert!(matches!(task.init(&mount, Rc::new(|| {})), Err(TaskError::AlreadyInitialized)));
        task.cleanup();
        assert!(mount.is_empty());
    }

    #[test]
    fn test_asset_failure_mounts_nothing() {
        let sim = Rc::new(SimulatedXr::new(0));
        let exec = FrameExecutor::new();
        let mut task = ArTask::new(Planets, env(&sim, &exec, Rc::new(NoAssets)));
        let mount = MountPoint::new();
        let err = task.init(&mount, Rc::new(|| {})).err().unwrap();
        assert!(matches!(err, TaskError::Asset(AssetError::NotFound(_))));
        assert!(mount.is_empty());
        assert!(!task.is_running());
    }

    #[test]
    fn test_back_button_only_signals() {
        let sim = Rc::new(SimulatedXr::new(0));
        let exec = FrameExecutor::new();
        let mut task = ArTask::new(Shapes, env(&sim, &exec, Rc::new(BuiltinAssets)));
        let mount = MountPoint::new();
        let pressed = Rc::new(Cell::new(0));
        let p = Rc::clone(&pressed);
        task.init(&mount, Rc::new(move || p.set(p.get() + 1))).unwrap();

        mount.dispatch_control(ControlId::Back, ControlValue::Click);
        assert_eq!(pressed.get(), 1);
        assert!(mount.has_animation_loop());
        task.cleanup();
    }

    #[test]
    fn test_toggle_relabels_panel() {
        let sim = Rc::new(SimulatedXr::new(0));
        let exec = FrameExecutor::new();
        let mut task = ArTask::new(TorusDemo, env(&sim, &exec, Rc::new(BuiltinAssets)));
        let mount = MountPoint::new();
        task.init(&mount, Rc::new(|| {})).unwrap();

        let label = |m: &MountPoint<SimulatedXr>| {
            m.panel().and_then(|p| p.controls.into_iter().find(|c| c.id == ControlId::Rotation)).map(|c| c.label)
        };
        assert_eq!(label(&mount).as_deref(), Some("Rotation: OFF"));
        mount.dispatch_control(ControlId::Rotation, ControlValue::Click);
        assert_eq!(label(&mount).as_deref(), Some("Rotation: ON"));
        assert_eq!(task.config().map(|c| c.rotation), Some(true));
        task.cleanup();
    }

    #[test]
    fn test_cleanup_while_state_borrowed_still_releases_source() {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut exec = FrameExecutor::new();
        let mut task = ArTask::new(TorusDemo, env(&sim, &exec, Rc::new(BuiltinAssets)));
        let mount = MountPoint::new();
        task.init(&mount, Rc::new(|| {})).unwrap();
        mount.dispatch_session(SessionEvent::Start);
        exec.run_until_stalled();
        assert_eq!(sim.live_sources(), 1);

        let held = Rc::clone(task.state.as_ref().unwrap());
        let borrow = held.borrow();
        task.cleanup();
        assert!(mount.is_empty());
        assert_eq!(sim.live_sources(), 1);

        drop(borrow);
        drop(held);
        assert_eq!(sim.live_sources(), 0);
        assert_eq!(sim.released_sources(), 1);
    }

    #[test]
    fn test_acquisition_after_cleanup_is_released() {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut exec = FrameExecutor::new();
        let mut task = ArTask::new(TorusDemo, env(&sim, &exec, Rc::new(BuiltinAssets)));
        let mount = MountPoint::new();
        task.init(&mount, Rc::new(|| {})).unwrap();

        mount.dispatch_session(SessionEvent::Start);
        task.cleanup();
        exec.run_until_stalled();
        assert_eq!(sim.live_sources(), 0);
        assert_eq!(sim.released_sources(), 1);

        let mut surface = RecordingSurface::default();
        let mut tick = FrameTick { time: 0.0, xr_frame: None, surface: &mut surface };
        assert!(!mount.run_frame(&mut tick));
        assert!(surface.frames.is_empty());
    }
}
