//! The AR host capability consumed by the demos, and the container they mount into.
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use glam::Mat4;
use tracing::debug;

use crate::error::XrError;
use crate::model::ViewerPose;

pub mod executor;
pub mod mount;
pub mod sim;
#[cfg(target_arch = "wasm32")]
pub mod webxr;

pub use executor::FrameExecutor;
pub use mount::{
    Control, ControlId, ControlKind, ControlListener, ControlPanel, ControlValue, Element, FrameCallback, FrameTick,
    MountPoint, SessionListener, WeakMountPoint,
};
pub use sim::{SimFrame, SimulatedXr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    /// Tracks the device itself; hit-test rays originate here.
    Viewer,
    /// World-locked space poses are reported in.
    Local,
}

impl ReferenceSpaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceSpaceKind::Viewer => "viewer",
            ReferenceSpaceKind::Local => "local",
        }
    }
}

impl fmt::Display for ReferenceSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Features an AR session is requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFeatures {
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
}

impl SessionFeatures {
    pub fn hit_test_with_overlay() -> Self {
        Self {
            required: vec!["hit-test"],
            optional: vec!["dom-overlay"],
        }
    }
}

/// Lifecycle events of an AR session delivered to the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    End,
    /// The user's selection gesture (screen tap / trigger).
    Select,
}

/// An asynchronous provider of spatial tracking.
///
/// Handles are opaque to the demos; only the AR session controller holds them.
pub trait XrBackend: 'static {
    type Space: 'static;
    type HitTestSource: 'static;
    type Frame;

    fn request_session(&self, features: &SessionFeatures) -> impl Future<Output = Result<(), XrError>>;

    fn request_reference_space(&self, kind: ReferenceSpaceKind) -> impl Future<Output = Result<Self::Space, XrError>>;

    fn request_hit_test_source(&self, space: &Self::Space) -> impl Future<Output = Result<Self::HitTestSource, XrError>>;

    /// Poses (in `space`) of this frame's hit-test results, nearest first.
    fn hit_test(&self, frame: &Self::Frame, source: &Self::HitTestSource, space: &Self::Space) -> Vec<Mat4>;

    fn viewer_pose(&self, _frame: &Self::Frame, _space: &Self::Space) -> Option<ViewerPose> {
        None
    }

    /// Stop a hit-test source; the handle is unusable afterwards.
    fn release_hit_test_source(&self, source: Self::HitTestSource);

    fn end_session(&self);
}

/// Tracking handles acquired at session start.
pub struct SessionResources<B: XrBackend> {
    pub hit_test_source: B::HitTestSource,
    pub local_space: B::Space,
}

impl<B: XrBackend> SessionResources<B> {
    pub fn release(self, backend: &B) {
        backend.release_hit_test_source(self.hit_test_source);
    }
}

/// Viewer space, then a hit-test source bound to it, then the local space.
/// A source obtained before a later step fails is released, not leaked.
pub async fn acquire_resources<B: XrBackend>(backend: &B) -> Result<SessionResources<B>, XrError> {
    let viewer = backend.request_reference_space(ReferenceSpaceKind::Viewer).await?;
    let hit_test_source = backend.request_hit_test_source(&viewer).await?;
    match backend.request_reference_space(ReferenceSpaceKind::Local).await {
        Ok(local_space) => Ok(SessionResources { hit_test_source, local_space }),
        Err(e) => {
            debug!("local space rejected, releasing hit-test source");
            backend.release_hit_test_source(hit_test_source);
            Err(e)
        }
    }
}

/// Runs detached futures on the host's event loop.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;
