//! AR placement state machine.
//!
//! Phases: `Idle -> Acquiring -> Tracking -> Placed`, with session end
//! returning to `Idle` from anywhere. Every session start bumps a
//! generation counter; acquisition results carry the generation they were
//! started under, and anything that resolves for an older generation is
//! released instead of installed.
use std::rc::Rc;

use glam::{Mat4, Vec3};
use tracing::{debug, info, warn};

use crate::error::XrError;
use crate::host::{SessionResources, XrBackend};
use crate::model::{ObjectRegistry, ViewerPose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    Unplaced,
    Placed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Tracking,
    Placed,
}

/// Identifies one acquisition; stale tickets are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReticleState {
    pub visible: bool,
    pub transform: Mat4,
}

impl Default for ReticleState {
    fn default() -> Self {
        Self { visible: false, transform: Mat4::IDENTITY }
    }
}

impl ReticleState {
    pub fn position(&self) -> Vec3 {
        self.transform.transform_point3(Vec3::ZERO)
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// Whether the overlay panel only exists while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPolicy {
    ArOnly,
    Persistent,
}

pub struct ArSessionController<B: XrBackend> {
    backend: Rc<B>,
    phase: SessionPhase,
    generation: u64,
    resources: Option<SessionResources<B>>,
    reticle: ReticleState,
    placement: PlacementState,
    overlay: OverlayPolicy,
    overlay_visible: bool,
    viewer: Option<ViewerPose>,
    last_error: Option<XrError>,
}

impl<B: XrBackend> ArSessionController<B> {
    pub fn new(backend: Rc<B>, overlay: OverlayPolicy) -> Self {
        Self {
            backend,
            phase: SessionPhase::Idle,
            generation: 0,
            resources: None,
            reticle: ReticleState::default(),
            placement: PlacementState::Unplaced,
            overlay,
            overlay_visible: overlay == OverlayPolicy::Persistent,
            viewer: None,
            last_error: None,
        }
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn placement(&self) -> PlacementState {
        self.placement
    }

    pub fn reticle(&self) -> &ReticleState {
        &self.reticle
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn viewer_pose(&self) -> Option<ViewerPose> {
        self.viewer
    }

    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    pub fn last_error(&self) -> Option<&XrError> {
        self.last_error.as_ref()
    }

    /// Session start: enter `Acquiring` and hand out the ticket the
    /// acquisition result must be delivered with.
    pub fn begin_session(&mut self) -> AcquireTicket {
        // a start without an end in between still starts from scratch
        self.release_resources();
        self.generation += 1;
        self.phase = SessionPhase::Acquiring;
        self.placement = PlacementState::Unplaced;
        self.reticle.hide();
        self.viewer = None;
        self.last_error = None;
        self.overlay_visible = true;
        info!(generation = self.generation, "AR session started, acquiring tracking resources");
        AcquireTicket(self.generation)
    }

    /// Deliver the outcome of an acquisition. Returns whether it was installed.
    pub fn resources_ready(&mut self, ticket: AcquireTicket, result: Result<SessionResources<B>, XrError>) -> bool {
        let current = self.phase == SessionPhase::Acquiring && ticket.0 == self.generation;
        match result {
            Ok(resources) if current => {
                self.resources = Some(resources);
                self.phase = SessionPhase::Tracking;
                info!("tracking resources resolved");
                true
            }
            Ok(resources) => {
                debug!(ticket = ticket.0, generation = self.generation, "stale acquisition, releasing");
                resources.release(&self.backend);
                false
            }
            Err(e) if current => {
                warn!("tracking resource acquisition failed: {e}");
                self.phase = SessionPhase::Idle;
                self.reticle.hide();
                self.last_error = Some(e);
                false
            }
            Err(e) => {
                debug!("stale acquisition failed: {e}");
                false
            }
        }
    }

    /// Per-frame hit test. Recomputes the reticle from scratch every frame
    /// until placement; does nothing while resources are missing.
    pub fn update_frame(&mut self, frame: Option<&B::Frame>) {
        let (Some(frame), Some(resources)) = (frame, self.resources.as_ref()) else {
            self.reticle.hide();
            self.viewer = None;
            return;
        };
        self.viewer = self.backend.viewer_pose(frame, &resources.local_space);
        if self.placement == PlacementState::Placed {
            return;
        }
        let hits = self.backend.hit_test(frame, &resources.hit_test_source, &resources.local_space);
        match hits.first() {
            Some(pose) => {
                self.reticle.visible = true;
                self.reticle.transform = *pose;
            }
            None => self.reticle.hide(),
        }
    }

    /// The user's select gesture. Commits placement at most once per session.
    pub fn select(&mut self, registry: &mut ObjectRegistry, selected: Option<usize>) -> bool {
        if self.phase != SessionPhase::Tracking || self.placement != PlacementState::Unplaced || !self.reticle.visible {
            debug!(phase = ?self.phase, "select ignored");
            return false;
        }
        let anchor = self.reticle.position();
        registry.place_at(anchor, selected);
        self.placement = PlacementState::Placed;
        self.phase = SessionPhase::Placed;
        self.reticle.hide();
        info!(x = anchor.x, y = anchor.y, z = anchor.z, "objects placed");
        true
    }

    /// Session end; valid from every phase.
    pub fn end_session(&mut self, registry: &mut ObjectRegistry) {
        self.generation += 1;
        self.release_resources();
        self.reticle.hide();
        registry.hide_all();
        self.placement = PlacementState::Unplaced;
        self.phase = SessionPhase::Idle;
        self.viewer = None;
        self.overlay_visible = self.overlay == OverlayPolicy::Persistent;
        info!("AR session ended");
    }

    /// Drop everything held for the backend; used when the owning task goes away.
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.release_resources();
        self.reticle.hide();
        self.phase = SessionPhase::Idle;
        self.viewer = None;
    }

    fn release_resources(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.release(&self.backend);
            debug!("tracking resources released");
        }
    }
}

impl<B: XrBackend> Drop for ArSessionController<B> {
    fn drop(&mut self) {
        self.release_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{acquire_resources, ReferenceSpaceKind, SimFrame, SimulatedXr};
    use crate::model::{Color, MaterialDescriptor, PlaceableObject, Primitive, SelectionMode};
    use futures::executor::block_on;

    fn registry() -> ObjectRegistry {
        let ball = |n: &str| PlaceableObject::primitive(n, Primitive::Sphere { radius: 0.1 }, MaterialDescriptor::standard(Color::WHITE));
        ObjectRegistry::new(SelectionMode::Group)
            .with(ball("a"), Vec3::new(-0.6, 0.0, 0.0))
            .with(ball("b"), Vec3::ZERO)
    }

    /// Device at `eye` looking at `target` on the floor.
    fn frame(eye: Vec3, target: Vec3) -> SimFrame {
        SimFrame { viewer: Mat4::look_at_rh(eye, target, Vec3::Y).inverse(), projection: None }
    }

    fn tracking() -> (Rc<SimulatedXr>, ArSessionController<SimulatedXr>) {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        let ticket = ctl.begin_session();
        let res = block_on(acquire_resources(&*sim));
        assert!(ctl.resources_ready(ticket, res));
        (sim, ctl)
    }

    #[test]
    fn test_frames_during_acquisition_keep_reticle_hidden() {
        let sim = Rc::new(SimulatedXr::new(3));
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        ctl.begin_session();
        for _ in 0..5 {
            ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
            assert!(!ctl.reticle().visible);
        }
        assert_eq!(ctl.phase(), SessionPhase::Acquiring);
        assert!(ctl.overlay_visible());
    }

    #[test]
    fn test_placement_commits_once() {
        let (_sim, mut ctl) = tracking();
        let mut reg = registry();

        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
        assert!(ctl.reticle().visible);
        assert!(ctl.select(&mut reg, None));
        assert_eq!(ctl.placement(), PlacementState::Placed);
        assert!(!ctl.reticle().visible);
        let placed: Vec<Vec3> = reg.objects().iter().map(|o| o.transform.position).collect();
        assert!(placed[0].abs_diff_eq(Vec3::new(-0.6, 0.0, -1.0), 1e-4));
        assert!(placed[1].abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-4));

        // reticle stays hidden and a second gesture elsewhere changes nothing
        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(2.0, 0.0, -2.0))));
        assert!(!ctl.reticle().visible);
        assert!(!ctl.select(&mut reg, None));
        let again: Vec<Vec3> = reg.objects().iter().map(|o| o.transform.position).collect();
        assert_eq!(placed, again);
    }

    #[test]
    fn test_select_without_reticle_is_noop() {
        let (sim, mut ctl) = tracking();
        let mut reg = registry();
        sim.set_surface_hidden(true);
        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
        assert!(!ctl.reticle().visible);
        assert!(!ctl.select(&mut reg, None));
        assert!(!reg.any_visible());
    }

    #[test]
    fn test_end_resets_from_every_phase() {
        let mut reg = registry();

        // idle
        let sim = Rc::new(SimulatedXr::new(0));
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        ctl.end_session(&mut reg);
        assert_eq!(ctl.phase(), SessionPhase::Idle);

        // acquiring
        ctl.begin_session();
        ctl.end_session(&mut reg);
        assert_eq!(ctl.placement(), PlacementState::Unplaced);
        assert!(!ctl.overlay_visible());

        // placed
        let (sim, mut ctl) = tracking();
        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
        ctl.select(&mut reg, None);
        assert!(reg.any_visible());
        ctl.end_session(&mut reg);
        assert_eq!(ctl.placement(), PlacementState::Unplaced);
        assert!(!reg.any_visible());
        assert!(!ctl.has_resources());
        assert_eq!(sim.live_sources(), 0);
    }

    #[test]
    fn test_stale_acquisition_is_released() {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        let mut reg = registry();
        let ticket = ctl.begin_session();
        ctl.end_session(&mut reg);

        let res = block_on(acquire_resources(&*sim));
        assert_eq!(sim.live_sources(), 1);
        assert!(!ctl.resources_ready(ticket, res));
        assert_eq!(sim.live_sources(), 0);
        assert!(!ctl.has_resources());
        assert_eq!(ctl.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_restart_invalidates_previous_ticket() {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        let first = ctl.begin_session();
        let second = ctl.begin_session();
        assert!(!ctl.resources_ready(first, block_on(acquire_resources(&*sim))));
        assert!(ctl.resources_ready(second, block_on(acquire_resources(&*sim))));
        assert_eq!(sim.live_sources(), 1);
    }

    #[test]
    fn test_acquisition_failure_falls_back_to_idle() {
        let sim = Rc::new(SimulatedXr::new(0));
        sim.fail_space(ReferenceSpaceKind::Local);
        let mut ctl = ArSessionController::new(Rc::clone(&sim), OverlayPolicy::ArOnly);
        let ticket = ctl.begin_session();
        assert!(!ctl.resources_ready(ticket, block_on(acquire_resources(&*sim))));
        assert_eq!(ctl.phase(), SessionPhase::Idle);
        assert!(ctl.last_error().is_some());

        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
        assert!(!ctl.reticle().visible);
    }

    #[test]
    fn test_select_after_teardown_is_noop() {
        let (sim, mut ctl) = tracking();
        let mut reg = registry();
        ctl.update_frame(Some(&frame(Vec3::Y, Vec3::new(0.0, 0.0, -1.0))));
        ctl.teardown();
        assert_eq!(sim.live_sources(), 0);
        assert!(!ctl.select(&mut reg, None));
        assert!(!reg.any_visible());
    }

    struct TwoHits;

    impl XrBackend for TwoHits {
        type Space = ();
        type HitTestSource = ();
        type Frame = ();

        async fn request_session(&self, _: &crate::host::SessionFeatures) -> Result<(), XrError> {
            Ok(())
        }

        async fn request_reference_space(&self, _: ReferenceSpaceKind) -> Result<(), XrError> {
            Ok(())
        }

        async fn request_hit_test_source(&self, _: &()) -> Result<(), XrError> {
            Ok(())
        }

        fn hit_test(&self, _: &(), _: &(), _: &()) -> Vec<Mat4> {
            vec![Mat4::from_translation(Vec3::X), Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))]
        }

        fn release_hit_test_source(&self, _: ()) {}

        fn end_session(&self) {}
    }

    #[test]
    fn test_only_first_hit_is_used() {
        let backend = Rc::new(TwoHits);
        let mut ctl = ArSessionController::new(Rc::clone(&backend), OverlayPolicy::ArOnly);
        let ticket = ctl.begin_session();
        assert!(ctl.resources_ready(ticket, block_on(acquire_resources(&*backend))));
        ctl.update_frame(Some(&()));
        assert!(ctl.reticle().position().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_persistent_overlay_survives_session_end() {
        let sim = Rc::new(SimulatedXr::new(0));
        let mut ctl = ArSessionController::new(sim, OverlayPolicy::Persistent);
        let mut reg = registry();
        assert!(ctl.overlay_visible());
        ctl.begin_session();
        ctl.end_session(&mut reg);
        assert!(ctl.overlay_visible());
    }
}
