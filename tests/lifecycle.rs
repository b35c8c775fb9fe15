//! Whole-app runs against the simulated AR device: launch a demo, start a
//! session, place, change settings and leave, checking what gets drawn.
use std::rc::Rc;

use glam::{Mat4, Vec3};

use artoys::assets::{AssetSource, BuiltinAssets, TextureImage};
use artoys::error::{AssetError, ShellError};
use artoys::host::{ControlId, ControlValue, Element, FrameExecutor, SimulatedXr};
use artoys::model::{Color, ModelTemplate, TextureRef};
use artoys::shell::{ArState, DemoRegistry, HostShell};
use artoys::tasks::{DemoId, TaskEnv};
use artoys::view::{RecordedFrame, RecordingSurface};

const EPS: f32 = 1e-4;

/// Device 1.5 m above the floor looking at a point 1.5 m ahead.
fn looking_at(target: Vec3) -> Mat4 {
    Mat4::look_at_rh(Vec3::new(0.0, 1.5, 0.0), target, Vec3::Y).inverse()
}

struct Harness {
    sim: Rc<SimulatedXr>,
    exec: FrameExecutor,
    shell: HostShell<SimulatedXr>,
    surface: RecordingSurface,
    viewer: Mat4,
    time: f64,
}

impl Harness {
    fn new(latency: u32) -> Self {
        Self::with_assets(latency, Rc::new(BuiltinAssets))
    }

    fn with_assets(latency: u32, assets: Rc<dyn AssetSource>) -> Self {
        let sim = Rc::new(SimulatedXr::new(latency));
        let exec = FrameExecutor::new();
        let env = TaskEnv { backend: Rc::clone(&sim), spawner: exec.spawner(), assets };
        let shell = HostShell::new(env, DemoRegistry::standard()).unwrap();
        Self {
            sim,
            exec,
            shell,
            surface: RecordingSurface::default(),
            viewer: looking_at(Vec3::new(0.0, 0.0, -1.5)),
            time: 0.0,
        }
    }

    fn step(&mut self) {
        self.sim.advance_frame();
        self.exec.run_until_stalled();
        let frame = self.sim.frame_for(self.viewer);
        self.shell.frame(self.time, Some(&frame), &mut self.surface);
        self.time += 1.0 / 60.0;
    }

    /// Request a session and run until the reticle shows.
    fn start_ar(&mut self) {
        self.shell.toggle_ar();
        for _ in 0..10 {
            self.step();
            if self.last().reticle.is_some() {
                return;
            }
        }
        panic!("reticle never appeared");
    }

    fn last(&self) -> &RecordedFrame {
        self.surface.last().expect("no frame drawn")
    }

    fn frames(&self) -> usize {
        self.surface.frames.len()
    }

    fn panel_visible(&self) -> bool {
        self.shell.mount().panel().is_some_and(|p| p.visible)
    }
}

#[test]
fn test_group_placed_at_reticle_with_offsets() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Planets).unwrap();
    h.start_ar();

    let reticle = h.last().reticle.unwrap().w_axis.truncate();
    assert!((reticle - Vec3::new(0.0, 0.0, -1.5)).length() < EPS);
    assert!(h.last().objects.is_empty());

    h.shell.select();
    h.step();

    let frame = h.last();
    assert_eq!(frame.reticle, None);
    let names: Vec<&str> = frame.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["earth", "saturn", "sun"]);
    for (i, obj) in frame.objects.iter().enumerate() {
        let expected = reticle + Vec3::new((i as f32 - 1.0) * 0.6, 0.0, 0.0);
        assert!((obj.transform.position - expected).length() < EPS, "{} at {:?}", obj.name, obj.transform.position);
    }
}

#[test]
fn test_second_select_does_not_move_objects() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Torus).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    let placed = h.last().objects[0].transform.position;

    h.viewer = looking_at(Vec3::new(1.0, 0.0, -1.0));
    h.step();
    h.shell.select();
    h.step();

    assert_eq!(h.last().objects.len(), 1);
    assert!((h.last().objects[0].transform.position - placed).length() < EPS);
    assert_eq!(h.last().reticle, None);
}

#[test]
fn test_single_mode_shows_selected_shape_only() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Shapes).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    assert_eq!(h.last().objects.len(), 1);
    assert_eq!(h.last().objects[0].name, "torus");
    let anchor = h.last().objects[0].transform.position;

    h.shell.control(ControlId::Shape, ControlValue::Choice(2));
    h.step();
    assert_eq!(h.last().objects.len(), 1);
    assert_eq!(h.last().objects[0].name, "cone");
    assert!((h.last().objects[0].transform.position - anchor).length() < EPS);
}

#[test]
fn test_no_frames_after_leaving_demo() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::ModelViewer).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    assert_eq!(h.sim.live_sources(), 1);

    h.shell.control(ControlId::Back, ControlValue::Click);
    assert_eq!(h.shell.active(), None);
    assert!(h.shell.mount().is_empty());
    assert_eq!(h.shell.mount().listener_count(), 0);
    assert!(!h.shell.mount().has_animation_loop());
    assert_eq!(h.sim.live_sources(), 0);
    assert!(!h.sim.session_active());

    let drawn = h.frames();
    h.step();
    h.step();
    assert_eq!(h.frames(), drawn);
    assert_eq!(h.shell.ar_state(), ArState::Off);
}

#[test]
fn test_controls_missing_from_panel_change_nothing() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Shapes).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    let before = h.last().objects[0].clone();
    let panel = h.shell.mount().panel();

    // shapes keep their own colors and have no size slider
    h.shell.control(ControlId::Color, ControlValue::Color(Color::GREEN));
    h.shell.control(ControlId::Scale, ControlValue::Number(1.8));
    h.step();

    let after = &h.last().objects[0];
    assert_eq!(after.materials, before.materials);
    assert_eq!(after.transform.scale, before.transform.scale);
    assert_eq!(h.shell.mount().panel(), panel);

    // the same events still reach a demo that offers them
    h.shell.launch(DemoId::Torus).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    h.shell.control(ControlId::Scale, ControlValue::Number(1.8));
    h.step();
    assert!((h.last().objects[0].transform.scale.x - 1.8).abs() < EPS);
}

struct MissingSaturn;

impl AssetSource for MissingSaturn {
    fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
        if id == "saturn.glb" {
            return Err(AssetError::Load { id: id.into(), reason: "truncated buffer".into() });
        }
        BuiltinAssets.model(id)
    }

    fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
        BuiltinAssets.texture(texture)
    }
}

#[test]
fn test_asset_failure_leaves_nothing_mounted() {
    let mut h = Harness::with_assets(0, Rc::new(MissingSaturn));
    let err = h.shell.launch(DemoId::Planets).err().unwrap();
    assert!(matches!(err, ShellError::Launch { id: DemoId::Planets, .. }));
    assert_eq!(h.shell.active(), None);
    assert!(h.shell.mount().is_empty());
    assert!(h.shell.status().is_some_and(|s| s.contains("saturn.glb")));

    h.step();
    assert_eq!(h.frames(), 0);

    // the other demos are unaffected
    h.shell.launch(DemoId::Torus).unwrap();
    assert_eq!(h.shell.status(), None);
    h.step();
    assert_eq!(h.frames(), 1);
}

#[test]
fn test_session_end_while_acquiring_releases_late_source() {
    let mut h = Harness::new(3);
    h.shell.launch(DemoId::Torus).unwrap();
    h.shell.toggle_ar();
    while h.shell.ar_state() != ArState::Running {
        h.step();
    }
    assert!(h.panel_visible());

    h.shell.end_ar();
    assert!(!h.panel_visible());
    for _ in 0..12 {
        h.step();
    }
    assert_eq!(h.sim.pending_requests(), 0);
    assert_eq!(h.sim.live_sources(), 0);
    assert_eq!(h.sim.released_sources(), 1);
    assert_eq!(h.last().reticle, None);
    assert!(h.last().objects.is_empty());
}

#[test]
fn test_session_end_while_tracking_and_placed() {
    for place in [false, true] {
        let mut h = Harness::new(0);
        h.shell.launch(DemoId::Shapes).unwrap();
        h.start_ar();
        if place {
            h.shell.select();
            h.step();
            assert_eq!(h.last().objects.len(), 1);
        }

        h.shell.end_ar();
        h.step();
        assert_eq!(h.sim.live_sources(), 0);
        assert!(!h.sim.session_active());
        assert_eq!(h.last().reticle, None);
        assert!(h.last().objects.is_empty());

        // a fresh session starts unplaced
        h.start_ar();
        assert!(h.last().objects.is_empty());
        h.shell.select();
        h.step();
        assert_eq!(h.last().objects.len(), 1);
    }
}

#[test]
fn test_persistent_panel_survives_session_end() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Planets).unwrap();
    assert!(h.panel_visible());
    h.start_ar();
    h.shell.end_ar();
    assert!(h.panel_visible());
}

#[test]
fn test_material_round_trip_restores_model_materials() {
    let mut h = Harness::new(0);
    h.shell.launch(DemoId::Planets).unwrap();
    h.start_ar();
    h.shell.select();
    h.step();
    let original: Vec<_> = h.last().objects.iter().map(|o| o.materials.clone()).collect();

    h.shell.control(ControlId::Material, ControlValue::Choice(1));
    h.step();
    for (obj, before) in h.last().objects.iter().zip(&original) {
        assert_ne!(&obj.materials, before, "{} kept its materials", obj.name);
        assert_eq!(obj.materials.len(), before.len());
    }

    h.shell.control(ControlId::Material, ControlValue::Choice(0));
    h.step();
    let restored: Vec<_> = h.last().objects.iter().map(|o| o.materials.clone()).collect();
    assert_eq!(restored, original);
}

#[test]
fn test_mount_layout_per_demo() {
    let mut h = Harness::new(0);
    for id in DemoId::ALL {
        h.shell.launch(id).unwrap();
        let elements = h.shell.mount().elements();
        assert!(matches!(
            elements.as_slice(),
            [Element::BackButton, Element::ArButton, Element::Panel(_), Element::Surface]
        ));
        assert_eq!(h.shell.mount().listener_count(), 2);
    }
}
