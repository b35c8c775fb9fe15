//! The host shell: runs one demo at a time in a shared mount point and
//! connects it to the AR host and the UI.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use tracing::{debug, info, warn};

use crate::error::{ShellError, XrError};
use crate::host::{ControlId, ControlValue, FrameTick, MountPoint, SessionEvent, SessionFeatures, XrBackend};
use crate::tasks::{ArTask, Demo, DemoId, ModelViewer, Planets, Shapes, TaskEnv, TaskModule, TorusDemo};
use crate::view::ui::UiAction;
use crate::view::RenderSurface;

pub type TaskConstructor<B> = fn(TaskEnv<B>) -> Box<dyn TaskModule<B>>;

fn construct<B: XrBackend, D: Demo + Default>(env: TaskEnv<B>) -> Box<dyn TaskModule<B>> {
    Box::new(ArTask::new(D::default(), env))
}

/// Closed mapping from demo identifiers to their constructors.
pub struct DemoRegistry<B: XrBackend> {
    entries: Vec<(DemoId, TaskConstructor<B>)>,
}

impl<B: XrBackend> Default for DemoRegistry<B> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<B: XrBackend> DemoRegistry<B> {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Every demo this crate ships.
    pub fn standard() -> Self {
        Self::empty()
            .register(DemoId::Shapes, construct::<B, Shapes>)
            .register(DemoId::ModelViewer, construct::<B, ModelViewer>)
            .register(DemoId::Torus, construct::<B, TorusDemo>)
            .register(DemoId::Planets, construct::<B, Planets>)
    }

    /// Add or replace the constructor for `id`.
    pub fn register(mut self, id: DemoId, constructor: TaskConstructor<B>) -> Self {
        self.entries.retain(|(known, _)| *known != id);
        self.entries.push((id, constructor));
        self
    }

    /// Every known demo must have a constructor.
    pub fn validate(&self) -> Result<(), ShellError> {
        match DemoId::ALL.into_iter().find(|id| self.constructor(*id).is_none()) {
            Some(id) => Err(ShellError::MissingConstructor(id)),
            None => Ok(()),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = DemoId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn resolve(&self, key: &str) -> Result<DemoId, ShellError> {
        DemoId::from_key(key)
            .filter(|id| self.constructor(*id).is_some())
            .ok_or_else(|| ShellError::UnknownDemo(key.to_string()))
    }

    fn constructor(&self, id: DemoId) -> Option<TaskConstructor<B>> {
        self.entries.iter().find(|(known, _)| *known == id).map(|(_, c)| *c)
    }
}

/// Outcomes of asynchronous host requests, drained once per frame.
#[derive(Debug)]
enum ShellEvent {
    SessionStarted,
    SessionFailed(XrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArState {
    Off,
    Requesting,
    Running,
}

pub struct HostShell<B: XrBackend> {
    env: TaskEnv<B>,
    registry: DemoRegistry<B>,
    mount: MountPoint<B>,
    active: Option<Box<dyn TaskModule<B>>>,
    back_requested: Rc<Cell<bool>>,
    events: Rc<RefCell<VecDeque<ShellEvent>>>,
    ar: ArState,
    /// Bumped whenever a pending session request must be ignored.
    request_epoch: Rc<Cell<u64>>,
    status: Option<String>,
}

impl<B: XrBackend> HostShell<B> {
    pub fn new(env: TaskEnv<B>, registry: DemoRegistry<B>) -> Result<Self, ShellError> {
        registry.validate()?;
        Ok(Self {
            env,
            registry,
            mount: MountPoint::new(),
            active: None,
            back_requested: Rc::new(Cell::new(false)),
            events: Rc::new(RefCell::new(VecDeque::new())),
            ar: ArState::Off,
            request_epoch: Rc::new(Cell::new(0)),
            status: None,
        })
    }

    pub fn mount(&self) -> &MountPoint<B> {
        &self.mount
    }

    pub fn demos(&self) -> impl Iterator<Item = DemoId> + '_ {
        self.registry.ids()
    }

    pub fn active(&self) -> Option<DemoId> {
        self.active.as_ref().map(|t| t.id())
    }

    pub fn ar_state(&self) -> ArState {
        self.ar
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn launch_key(&mut self, key: &str) -> Result<(), ShellError> {
        let id = self.registry.resolve(key)?;
        self.launch(id)
    }

    /// Stop the current demo (if any) and start `id` in the same mount point.
    pub fn launch(&mut self, id: DemoId) -> Result<(), ShellError> {
        self.close();
        let constructor = self.registry.constructor(id).ok_or(ShellError::MissingConstructor(id))?;
        let mut task = constructor(self.env.clone());

        let flag = Rc::clone(&self.back_requested);
        let on_back: Rc<dyn Fn()> = Rc::new(move || flag.set(true));
        if let Err(source) = task.init(&self.mount, on_back) {
            warn!(demo = %id, "demo failed to start: {source}");
            self.mount.clear();
            let err = ShellError::Launch { id, source };
            self.status = Some(err.to_string());
            return Err(err);
        }
        self.status = None;
        self.active = Some(task);
        info!(demo = %id, "demo launched");
        Ok(())
    }

    /// Leave the current demo: clean it up, then end any AR session.
    pub fn close(&mut self) {
        self.back_requested.set(false);
        let Some(mut task) = self.active.take() else {
            return;
        };
        task.cleanup();
        if !self.mount.is_empty() {
            warn!(demo = %task.id(), "mount point not empty after cleanup, clearing");
            self.mount.clear();
        }
        self.stop_session();
        info!(demo = %task.id(), "demo closed");
    }

    /// The AR button: start a session, or end the running one.
    pub fn toggle_ar(&mut self) {
        match self.ar {
            ArState::Off => self.request_ar(),
            ArState::Requesting => debug!("AR session request already pending"),
            ArState::Running => self.end_ar(),
        }
    }

    pub fn request_ar(&mut self) {
        if self.active.is_none() || self.ar != ArState::Off {
            return;
        }
        self.ar = ArState::Requesting;
        self.status = None;
        let backend = Rc::clone(&self.env.backend);
        let events = Rc::clone(&self.events);
        let epoch = Rc::clone(&self.request_epoch);
        let issued = epoch.get();
        let request: LocalBoxFuture<'static, ()> = Box::pin(async move {
            let result = backend.request_session(&SessionFeatures::hit_test_with_overlay()).await;
            if epoch.get() != issued {
                if result.is_ok() {
                    backend.end_session();
                }
                return;
            }
            events.borrow_mut().push_back(match result {
                Ok(()) => ShellEvent::SessionStarted,
                Err(e) => ShellEvent::SessionFailed(e),
            });
        });
        (self.env.spawner)(request);
    }

    /// End the AR session from the UI.
    pub fn end_ar(&mut self) {
        if self.ar == ArState::Running {
            self.env.backend.end_session();
        }
        self.session_ended();
    }

    /// The host reports that the session is over.
    pub fn session_ended(&mut self) {
        self.request_epoch.set(self.request_epoch.get() + 1);
        if self.ar == ArState::Running {
            self.mount.dispatch_session(SessionEvent::End);
        }
        self.ar = ArState::Off;
        self.after_dispatch();
    }

    /// The user's select gesture.
    pub fn select(&mut self) {
        if self.ar == ArState::Running {
            self.mount.dispatch_session(SessionEvent::Select);
            self.after_dispatch();
        }
    }

    pub fn control(&mut self, id: ControlId, value: ControlValue) {
        self.mount.dispatch_control(id, value);
        self.after_dispatch();
    }

    /// Apply one action collected from the UI pass.
    pub fn handle(&mut self, action: UiAction) {
        match action {
            UiAction::Launch(id) => {
                // failure is already logged and shown as status
                let _ = self.launch(id);
            }
            UiAction::Back => self.close(),
            UiAction::ToggleAr => self.toggle_ar(),
            UiAction::Control(id, value) => self.control(id, value),
        }
    }

    /// One host frame: apply finished host requests, then run the demo's loop.
    pub fn frame(&mut self, time: f64, xr_frame: Option<&B::Frame>, surface: &mut dyn RenderSurface) {
        let pending: Vec<ShellEvent> = self.events.borrow_mut().drain(..).collect();
        for event in pending {
            match event {
                ShellEvent::SessionStarted if self.ar == ArState::Requesting => {
                    self.ar = ArState::Running;
                    self.mount.dispatch_session(SessionEvent::Start);
                }
                ShellEvent::SessionStarted => debug!("session started after request was abandoned"),
                ShellEvent::SessionFailed(e) => {
                    warn!("AR unavailable: {e}");
                    self.status = Some(e.to_string());
                    self.ar = ArState::Off;
                }
            }
        }

        let xr_frame = if self.ar == ArState::Running { xr_frame } else { None };
        let mut tick = FrameTick { time, xr_frame, surface };
        self.mount.run_frame(&mut tick);

        if let Some(status) = self.active.as_ref().and_then(|t| t.status()) {
            self.status = Some(status);
        }
        self.after_dispatch();
    }

    /// Cleanup requested by the demo's back button runs only once the
    /// dispatch that triggered it has returned.
    fn after_dispatch(&mut self) {
        if self.back_requested.get() {
            debug!("back requested");
            self.close();
        }
    }

    fn stop_session(&mut self) {
        self.request_epoch.set(self.request_epoch.get() + 1);
        if self.ar == ArState::Running {
            self.env.backend.end_session();
        }
        self.ar = ArState::Off;
    }
}

impl<B: XrBackend> Drop for HostShell<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;
    use crate::host::{FrameExecutor, SimulatedXr};
    use crate::view::RecordingSurface;

    fn shell() -> (Rc<SimulatedXr>, FrameExecutor, HostShell<SimulatedXr>) {
        let sim = Rc::new(SimulatedXr::new(0));
        let exec = FrameExecutor::new();
        let env = TaskEnv { backend: Rc::clone(&sim), spawner: exec.spawner(), assets: Rc::new(BuiltinAssets) };
        let shell = HostShell::new(env, DemoRegistry::standard()).unwrap();
        (sim, exec, shell)
    }

    #[test]
    fn test_incomplete_registry_is_rejected() {
        let registry: DemoRegistry<SimulatedXr> =
            DemoRegistry::empty().register(DemoId::Torus, construct::<SimulatedXr, TorusDemo>);
        assert!(matches!(registry.validate(), Err(ShellError::MissingConstructor(DemoId::Shapes))));
        assert!(matches!(registry.resolve("planets"), Err(ShellError::UnknownDemo(_))));
        assert_eq!(registry.resolve("torus").ok(), Some(DemoId::Torus));
    }

    #[test]
    fn test_switching_demos_reuses_mount() {
        let (_sim, _exec, mut shell) = shell();
        shell.launch(DemoId::Shapes).unwrap();
        let first = shell.mount().elements().len();
        shell.launch_key("planets").unwrap();
        assert_eq!(shell.active(), Some(DemoId::Planets));
        assert_eq!(shell.mount().elements().len(), first);
        assert!(matches!(shell.launch_key("asteroids"), Err(ShellError::UnknownDemo(_))));
    }

    #[test]
    fn test_back_cleans_up_after_dispatch() {
        let (_sim, _exec, mut shell) = shell();
        shell.launch(DemoId::Torus).unwrap();
        shell.control(ControlId::Back, ControlValue::Click);
        assert_eq!(shell.active(), None);
        assert!(shell.mount().is_empty());
    }

    #[test]
    fn test_unavailable_ar_surfaces_status() {
        let (sim, mut exec, mut shell) = shell();
        sim.set_unavailable("no camera");
        shell.launch(DemoId::Torus).unwrap();
        shell.toggle_ar();
        exec.run_until_stalled();
        let mut surface = RecordingSurface::default();
        shell.frame(0.0, None, &mut surface);
        assert_eq!(shell.ar_state(), ArState::Off);
        assert!(shell.status().is_some_and(|s| s.contains("no camera")));
        assert!(shell.active().is_some());
    }

    #[test]
    fn test_leaving_demo_ends_session() {
        let (sim, mut exec, mut shell) = shell();
        shell.launch(DemoId::Shapes).unwrap();
        shell.toggle_ar();
        exec.run_until_stalled();
        let mut surface = RecordingSurface::default();
        shell.frame(0.0, None, &mut surface);
        assert_eq!(shell.ar_state(), ArState::Running);
        assert!(sim.session_active());

        shell.close();
        assert!(!sim.session_active());
        assert_eq!(shell.ar_state(), ArState::Off);
    }
}
