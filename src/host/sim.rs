//! Deterministic stand-in for a device AR runtime.
//!
//! The "room" is an infinite floor at a configurable height. Hit tests cast the
//! viewer's forward ray onto it. Every acquisition step resolves only after
//! the host has advanced a configurable number of frames.
use std::cell::RefCell;
use std::collections::HashSet;

use futures::channel::oneshot;
use glam::{Mat4, Vec3};
use tracing::{debug, info};

use super::{ReferenceSpaceKind, SessionFeatures, XrBackend};
use crate::error::XrError;
use crate::model::camera::ray_plane;
use crate::model::ViewerPose;

const MAX_HIT_DISTANCE: f32 = 10.0;

#[derive(Debug)]
pub struct SimSpace {
    pub kind: ReferenceSpaceKind,
}

#[derive(Debug)]
pub struct SimHitTestSource {
    id: u32,
}

/// What the simulated device sees this frame.
#[derive(Debug, Clone, Copy)]
pub struct SimFrame {
    /// Device-to-world transform.
    pub viewer: Mat4,
    pub projection: Option<Mat4>,
}

#[derive(Default)]
struct SimState {
    frame: u64,
    waiters: Vec<(u64, oneshot::Sender<()>)>,
    next_source: u32,
    live_sources: HashSet<u32>,
    released: usize,
    requested_spaces: Vec<ReferenceSpaceKind>,
    failing_spaces: HashSet<ReferenceSpaceKind>,
    fail_source: bool,
    unavailable: Option<String>,
    session_active: bool,
    surface_hidden: bool,
}

pub struct SimulatedXr {
    latency_frames: u64,
    floor_height: f32,
    state: RefCell<SimState>,
}

impl SimulatedXr {
    pub fn new(latency_frames: u32) -> Self {
        Self {
            latency_frames: latency_frames as u64,
            floor_height: 0.0,
            state: RefCell::new(SimState::default()),
        }
    }

    pub fn with_floor(mut self, height: f32) -> Self {
        self.floor_height = height;
        self
    }

    /// Advance the simulated clock by one frame, resolving due requests.
    pub fn advance_frame(&self) {
        let due: Vec<oneshot::Sender<()>> = {
            let mut state = self.state.borrow_mut();
            state.frame += 1;
            let now = state.frame;
            let (ready, waiting): (Vec<_>, Vec<_>) = state.waiters.drain(..).partition(|(at, _)| *at <= now);
            state.waiters = waiting;
            ready.into_iter().map(|(_, tx)| tx).collect()
        };
        for tx in due {
            let _ = tx.send(());
        }
    }

    async fn latency(&self) {
        if self.latency_frames == 0 {
            return;
        }
        let rx = {
            let mut state = self.state.borrow_mut();
            let (tx, rx) = oneshot::channel();
            let due = state.frame + self.latency_frames;
            state.waiters.push((due, tx));
            rx
        };
        // a dropped sender means the simulator itself went away
        let _ = rx.await;
    }

    pub fn fail_space(&self, kind: ReferenceSpaceKind) {
        self.state.borrow_mut().failing_spaces.insert(kind);
    }

    pub fn fail_hit_test_source(&self) {
        self.state.borrow_mut().fail_source = true;
    }

    pub fn set_unavailable(&self, reason: impl Into<String>) {
        self.state.borrow_mut().unavailable = Some(reason.into());
    }

    /// Hide the floor, so hit tests come back empty.
    pub fn set_surface_hidden(&self, hidden: bool) {
        self.state.borrow_mut().surface_hidden = hidden;
    }

    pub fn session_active(&self) -> bool {
        self.state.borrow().session_active
    }

    pub fn pending_requests(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    pub fn live_sources(&self) -> usize {
        self.state.borrow().live_sources.len()
    }

    pub fn released_sources(&self) -> usize {
        self.state.borrow().released
    }

    pub fn requested_spaces(&self) -> Vec<ReferenceSpaceKind> {
        self.state.borrow().requested_spaces.clone()
    }

    pub fn frame_for(&self, viewer: Mat4) -> SimFrame {
        SimFrame { viewer, projection: None }
    }
}

impl XrBackend for SimulatedXr {
    type Space = SimSpace;
    type HitTestSource = SimHitTestSource;
    type Frame = SimFrame;

    async fn request_session(&self, features: &SessionFeatures) -> Result<(), XrError> {
        self.latency().await;
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.unavailable.clone() {
            return Err(XrError::Unavailable(reason));
        }
        if let Some(missing) = features.required.iter().find(|f| **f != "hit-test") {
            return Err(XrError::UnsupportedFeature(missing));
        }
        state.session_active = true;
        info!("simulated AR session started");
        Ok(())
    }

    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> Result<SimSpace, XrError> {
        self.latency().await;
        let mut state = self.state.borrow_mut();
        state.requested_spaces.push(kind);
        if state.failing_spaces.contains(&kind) {
            return Err(XrError::ReferenceSpace(kind));
        }
        Ok(SimSpace { kind })
    }

    async fn request_hit_test_source(&self, space: &SimSpace) -> Result<SimHitTestSource, XrError> {
        self.latency().await;
        let mut state = self.state.borrow_mut();
        if state.fail_source || space.kind != ReferenceSpaceKind::Viewer {
            return Err(XrError::HitTestSource(format!("cannot bind to {} space", space.kind)));
        }
        let id = state.next_source;
        state.next_source += 1;
        state.live_sources.insert(id);
        Ok(SimHitTestSource { id })
    }

    fn hit_test(&self, frame: &SimFrame, source: &SimHitTestSource, _space: &SimSpace) -> Vec<Mat4> {
        let state = self.state.borrow();
        if state.surface_hidden || !state.live_sources.contains(&source.id) {
            return Vec::new();
        }
        let origin = frame.viewer.transform_point3(Vec3::ZERO);
        let dir = frame.viewer.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
        ray_plane(origin, dir, self.floor_height, MAX_HIT_DISTANCE)
            .map(|p| vec![Mat4::from_translation(p)])
            .unwrap_or_default()
    }

    fn viewer_pose(&self, frame: &SimFrame, _space: &SimSpace) -> Option<ViewerPose> {
        Some(ViewerPose { transform: frame.viewer, projection: frame.projection })
    }

    fn release_hit_test_source(&self, source: SimHitTestSource) {
        let mut state = self.state.borrow_mut();
        if state.live_sources.remove(&source.id) {
            state.released += 1;
            debug!(id = source.id, "hit-test source released");
        }
    }

    fn end_session(&self) {
        self.state.borrow_mut().session_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;
    use std::rc::Rc;

    fn looking_down(from: Vec3, at: Vec3) -> Mat4 {
        Mat4::look_at_rh(from, at, Vec3::Y).inverse()
    }

    #[test]
    fn test_requests_wait_for_frames() {
        let sim = Rc::new(SimulatedXr::new(2));
        let done = Rc::new(Cell::new(false));
        let mut pool = LocalPool::new();
        {
            let sim = Rc::clone(&sim);
            let done = Rc::clone(&done);
            pool.spawner()
                .spawn_local(async move {
                    sim.request_reference_space(ReferenceSpaceKind::Viewer).await.unwrap();
                    done.set(true);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert!(!done.get());
        sim.advance_frame();
        pool.run_until_stalled();
        assert!(!done.get());
        sim.advance_frame();
        pool.run_until_stalled();
        assert!(done.get());
    }

    #[test]
    fn test_hit_test_projects_onto_floor() {
        let sim = SimulatedXr::new(0);
        let space = SimSpace { kind: ReferenceSpaceKind::Local };
        let source = futures::executor::block_on(sim.request_hit_test_source(&SimSpace { kind: ReferenceSpaceKind::Viewer }))
            .unwrap();
        let frame = sim.frame_for(looking_down(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, -1.0)));

        let hits = sim.hit_test(&frame, &source, &space);
        assert_eq!(hits.len(), 1);
        let p = hits[0].transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-4));

        sim.set_surface_hidden(true);
        assert!(sim.hit_test(&frame, &source, &space).is_empty());

        sim.set_surface_hidden(false);
        sim.release_hit_test_source(source);
        assert_eq!(sim.released_sources(), 1);
    }

    #[test]
    fn test_unavailable_session() {
        let sim = SimulatedXr::new(0);
        sim.set_unavailable("no camera");
        let res = futures::executor::block_on(sim.request_session(&SessionFeatures::hit_test_with_overlay()));
        assert_eq!(res, Err(XrError::Unavailable("no camera".into())));
        assert!(!sim.session_active());
    }
}
