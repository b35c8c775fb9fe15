// VIEW: Rendering and graphics
pub mod gpu_init;
pub mod mesh;
pub mod render;
pub mod ui;

use glam::Mat4;

use crate::model::{Camera, PlaceableObject, SceneLights, Transform};

pub use gpu_init::GpuContext;
pub use render::Renderer;

/// Everything drawn in one frame.
pub struct SceneView<'a> {
    pub objects: &'a [PlaceableObject],
    /// Reticle pose, `None` while hidden.
    pub reticle: Option<Mat4>,
    pub lights: &'a SceneLights,
}

impl SceneView<'_> {
    pub fn visible_objects(&self) -> impl Iterator<Item = &PlaceableObject> {
        self.objects.iter().filter(|o| o.visible)
    }
}

/// The drawable a demo's animation loop hands its scene to.
pub trait RenderSurface {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera);
}

/// One object as it was submitted for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedObject {
    pub name: String,
    pub transform: Transform,
    pub materials: Vec<crate::model::MaterialDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub objects: Vec<RecordedObject>,
    pub reticle: Option<Mat4>,
    pub lights: SceneLights,
    pub view: Mat4,
}

/// Headless surface that keeps what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub frames: Vec<RecordedFrame>,
}

impl RecordingSurface {
    pub fn last(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl RenderSurface for RecordingSurface {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera) {
        self.frames.push(RecordedFrame {
            objects: scene
                .visible_objects()
                .map(|o| RecordedObject {
                    name: o.name.clone(),
                    transform: o.transform,
                    materials: o.materials().to_vec(),
                })
                .collect(),
            reticle: scene.reticle,
            lights: *scene.lights,
            view: camera.view(),
        });
    }
}
