//! The container a demo mounts its UI, surface and callbacks into.
//!
//! Callbacks are taken out of their slot while they run, so a callback may
//! freely re-enter the mount point (update the panel, clear itself). A slot
//! that was cleared or replaced during the call is not restored.
use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::{SessionEvent, XrBackend};
use crate::model::Color;
use crate::view::RenderSurface;

/// Identity of a control; one per configuration field plus the back button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Back,
    Shape,
    Rotation,
    Speed,
    Pulse,
    Emissive,
    Texture,
    Flicker,
    Jump,
    Scale,
    Color,
    Material,
    AmbientLight,
    Light,
    LightKind,
    LightIntensity,
    LightColor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Button,
    Slider { value: f32, range: RangeInclusive<f32>, step: f32 },
    Color(Color),
    Select { options: Vec<String>, selected: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: ControlId,
    pub label: String,
    pub kind: ControlKind,
}

impl Control {
    pub fn button(id: ControlId, label: impl Into<String>) -> Self {
        Self { id, label: label.into(), kind: ControlKind::Button }
    }

    /// A button whose label shows an on/off state, e.g. "Rotation: ON".
    pub fn toggle(id: ControlId, name: &str, on: bool) -> Self {
        Self::button(id, format!("{name}: {}", if on { "ON" } else { "OFF" }))
    }

    pub fn slider(id: ControlId, label: impl Into<String>, value: f32, range: RangeInclusive<f32>, step: f32) -> Self {
        Self { id, label: label.into(), kind: ControlKind::Slider { value, range, step } }
    }

    pub fn color(id: ControlId, label: impl Into<String>, value: Color) -> Self {
        Self { id, label: label.into(), kind: ControlKind::Color(value) }
    }

    pub fn select<S: Into<String>>(
        id: ControlId,
        label: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        selected: usize,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            kind: ControlKind::Select { options: options.into_iter().map(Into::into).collect(), selected },
        }
    }
}

/// What a control reports when the user operates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Click,
    Number(f32),
    Color(Color),
    Choice(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub title: String,
    pub controls: Vec<Control>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    BackButton,
    /// Starts (or ends) the AR session.
    ArButton,
    Panel(ControlPanel),
    /// The drawable the animation loop renders into.
    Surface,
}

/// Per-frame input handed to the registered animation loop.
pub struct FrameTick<'a, B: XrBackend> {
    /// Seconds since the host started.
    pub time: f64,
    /// The AR frame, present only while a session is running.
    pub xr_frame: Option<&'a B::Frame>,
    pub surface: &'a mut dyn RenderSurface,
}

pub type FrameCallback<B> = Box<dyn FnMut(&mut FrameTick<'_, B>)>;
pub type SessionListener = Box<dyn FnMut(SessionEvent)>;
pub type ControlListener = Box<dyn FnMut(ControlId, ControlValue)>;

struct Slot<T> {
    callback: Option<T>,
    installed: bool,
    epoch: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { callback: None, installed: false, epoch: 0 }
    }
}

impl<T> Slot<T> {
    fn set(&mut self, callback: T) {
        self.epoch += 1;
        self.callback = Some(callback);
        self.installed = true;
    }

    fn clear(&mut self) {
        self.epoch += 1;
        self.callback = None;
        self.installed = false;
    }

    fn take(&mut self) -> Option<(T, u64)> {
        self.callback.take().map(|cb| (cb, self.epoch))
    }

    fn restore(&mut self, callback: T, epoch: u64) {
        if self.epoch == epoch {
            self.callback = Some(callback);
        }
    }
}

struct MountState<B: XrBackend> {
    elements: Vec<Element>,
    animation: Slot<FrameCallback<B>>,
    session: Slot<SessionListener>,
    control: Slot<ControlListener>,
}

pub struct MountPoint<B: XrBackend> {
    inner: Rc<RefCell<MountState<B>>>,
}

impl<B: XrBackend> Clone for MountPoint<B> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

/// Non-owning handle, for callbacks that live inside the mount point.
pub struct WeakMountPoint<B: XrBackend> {
    inner: Weak<RefCell<MountState<B>>>,
}

impl<B: XrBackend> Clone for WeakMountPoint<B> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

impl<B: XrBackend> WeakMountPoint<B> {
    pub fn upgrade(&self) -> Option<MountPoint<B>> {
        self.inner.upgrade().map(|inner| MountPoint { inner })
    }
}

impl<B: XrBackend> Default for MountPoint<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: XrBackend> MountPoint<B> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MountState {
                elements: Vec::new(),
                animation: Slot::default(),
                session: Slot::default(),
                control: Slot::default(),
            })),
        }
    }

    pub fn downgrade(&self) -> WeakMountPoint<B> {
        WeakMountPoint { inner: Rc::downgrade(&self.inner) }
    }

    pub fn append(&self, element: Element) {
        self.inner.borrow_mut().elements.push(element);
    }

    pub fn elements(&self) -> Vec<Element> {
        self.inner.borrow().elements.clone()
    }

    pub fn panel(&self) -> Option<ControlPanel> {
        self.inner.borrow().elements.iter().find_map(|e| match e {
            Element::Panel(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// Replace the mounted panel; does nothing if no panel is mounted.
    pub fn set_panel(&self, panel: ControlPanel) {
        let mut state = self.inner.borrow_mut();
        if let Some(Element::Panel(p)) = state.elements.iter_mut().find(|e| matches!(e, Element::Panel(_))) {
            *p = panel;
        }
    }

    pub fn set_panel_visible(&self, visible: bool) {
        let mut state = self.inner.borrow_mut();
        for element in state.elements.iter_mut() {
            if let Element::Panel(p) = element {
                p.visible = visible;
            }
        }
    }

    pub fn set_animation_loop(&self, callback: FrameCallback<B>) {
        self.inner.borrow_mut().animation.set(callback);
    }

    pub fn clear_animation_loop(&self) {
        self.inner.borrow_mut().animation.clear();
    }

    pub fn set_session_listener(&self, listener: SessionListener) {
        self.inner.borrow_mut().session.set(listener);
    }

    pub fn set_control_listener(&self, listener: ControlListener) {
        self.inner.borrow_mut().control.set(listener);
    }

    pub fn remove_listeners(&self) {
        let mut state = self.inner.borrow_mut();
        state.session.clear();
        state.control.clear();
    }

    pub fn has_animation_loop(&self) -> bool {
        self.inner.borrow().animation.installed
    }

    pub fn listener_count(&self) -> usize {
        let state = self.inner.borrow();
        usize::from(state.session.installed) + usize::from(state.control.installed)
    }

    /// Drop every element and callback.
    pub fn clear(&self) {
        let mut state = self.inner.borrow_mut();
        state.animation.clear();
        state.session.clear();
        state.control.clear();
        state.elements.clear();
    }

    pub fn is_empty(&self) -> bool {
        let state = self.inner.borrow();
        state.elements.is_empty() && !state.animation.installed && !state.session.installed && !state.control.installed
    }

    fn with_slot<T, R>(
        &self,
        select: impl Fn(&mut MountState<B>) -> &mut Slot<T>,
        call: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let (mut callback, epoch) = select(&mut *self.inner.borrow_mut()).take()?;
        let result = call(&mut callback);
        select(&mut *self.inner.borrow_mut()).restore(callback, epoch);
        Some(result)
    }

    /// Run the animation loop once. Returns `false` if none is registered.
    pub fn run_frame(&self, tick: &mut FrameTick<'_, B>) -> bool {
        self.with_slot(|s| &mut s.animation, |cb| cb(tick)).is_some()
    }

    pub fn dispatch_session(&self, event: SessionEvent) -> bool {
        let handled = self.with_slot(|s| &mut s.session, |cb| cb(event)).is_some();
        if !handled {
            debug!(?event, "session event without listener");
        }
        handled
    }

    pub fn dispatch_control(&self, id: ControlId, value: ControlValue) -> bool {
        let handled = self.with_slot(|s| &mut s.control, |cb| cb(id, value)).is_some();
        if !handled {
            debug!(?id, "control event without listener");
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SimulatedXr;
    use crate::view::RecordingSurface;
    use std::cell::Cell;

    type Mount = MountPoint<SimulatedXr>;

    fn tick(surface: &mut RecordingSurface) -> FrameTick<'_, SimulatedXr> {
        FrameTick { time: 0.0, xr_frame: None, surface }
    }

    #[test]
    fn test_clear_restores_empty_state() {
        let mount = Mount::new();
        mount.append(Element::Surface);
        mount.set_animation_loop(Box::new(|_| {}));
        mount.set_session_listener(Box::new(|_| {}));
        mount.set_control_listener(Box::new(|_, _| {}));
        assert_eq!(mount.listener_count(), 2);
        assert!(!mount.is_empty());

        mount.clear();
        assert!(mount.is_empty());
        assert_eq!(mount.listener_count(), 0);
        assert!(!mount.has_animation_loop());
    }

    #[test]
    fn test_callback_clearing_itself_is_not_restored() {
        let mount = Mount::new();
        let calls = Rc::new(Cell::new(0));
        {
            let weak = mount.downgrade();
            let calls = Rc::clone(&calls);
            mount.set_animation_loop(Box::new(move |_| {
                calls.set(calls.get() + 1);
                if let Some(m) = weak.upgrade() {
                    m.clear_animation_loop();
                }
            }));
        }
        let mut surface = RecordingSurface::default();
        assert!(mount.run_frame(&mut tick(&mut surface)));
        assert!(!mount.run_frame(&mut tick(&mut surface)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_listener_can_update_panel() {
        let mount = Mount::new();
        mount.append(Element::Panel(ControlPanel { title: "t".into(), controls: vec![], visible: false }));
        let weak = mount.downgrade();
        mount.set_control_listener(Box::new(move |id, _| {
            if let Some(m) = weak.upgrade() {
                m.set_panel(ControlPanel {
                    title: "t".into(),
                    controls: vec![Control::toggle(id, "Rotation", true)],
                    visible: true,
                });
            }
        }));
        assert!(mount.dispatch_control(ControlId::Rotation, ControlValue::Click));
        let panel = mount.panel().unwrap();
        assert_eq!(panel.controls[0].label, "Rotation: ON");
        assert!(mount.dispatch_control(ControlId::Rotation, ControlValue::Click));
    }
}
