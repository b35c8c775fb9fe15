//! Pick one of three primitives, place it, then play with its look.
use glam::Vec3;

use super::{Demo, DemoId};
use crate::assets::AssetSource;
use crate::controller::{AnimationParams, Spin, Wave};
use crate::error::AssetError;
use crate::host::{Control, ControlId};
use crate::model::{
    Color, ConfigurationState, MaterialDescriptor, ObjectRegistry, PlaceableObject, Primitive, SceneLights,
    SelectionMode, Speed, TextureRef, ToggleRules,
};

const SHAPES: [&str; 3] = ["Torus", "Sphere", "Cone"];

#[derive(Debug, Default, Clone, Copy)]
pub struct Shapes;

impl Demo for Shapes {
    fn id(&self) -> DemoId {
        DemoId::Shapes
    }

    fn build(&self, _assets: &dyn AssetSource) -> Result<ObjectRegistry, AssetError> {
        let shape = |name: &str, primitive, color| {
            PlaceableObject::primitive(name, primitive, MaterialDescriptor::standard(color))
        };
        Ok(ObjectRegistry::new(SelectionMode::Single)
            .with(shape("torus", Primitive::Torus { radius: 0.2, tube: 0.05 }, Color::ORANGE), Vec3::ZERO)
            .with(shape("sphere", Primitive::Sphere { radius: 0.15 }, Color::SKY_BLUE), Vec3::ZERO)
            .with(shape("cone", Primitive::Cone { radius: 0.15, height: 0.3 }, Color::HOT_PINK), Vec3::ZERO))
    }

    fn config(&self) -> ConfigurationState {
        ConfigurationState { rotation: true, selected: Some(0), ..Default::default() }
    }

    fn rules(&self) -> ToggleRules {
        ToggleRules { selectable: SHAPES.len(), ..Default::default() }
    }

    fn params(&self) -> AnimationParams {
        AnimationParams {
            spin: Spin::Step { x: 0.005, y: 0.01 },
            pulse: Some(Wave { amplitude: 0.1, omega: 4.0 }),
            flicker: Some(Wave { amplitude: 0.8, omega: 10.0 }),
            texture: Some(TextureRef("texture.jpg".into())),
            ..Default::default()
        }
    }

    fn lights(&self) -> SceneLights {
        SceneLights::hemisphere(0xffffff, 0xbbbbff)
    }

    fn controls(&self, config: &ConfigurationState) -> Vec<Control> {
        let speed = match config.speed {
            Speed::Normal => "Speed: Normal",
            Speed::Fast => "Speed: Fast",
        };
        vec![
            Control::select(ControlId::Shape, "Shape", SHAPES, config.selected.unwrap_or(0)),
            Control::toggle(ControlId::Rotation, "Rotation", config.rotation),
            Control::toggle(ControlId::Emissive, "Emit", config.emissive),
            Control::toggle(ControlId::Texture, "Textures", config.texture),
            Control::toggle(ControlId::Pulse, "Pulse", config.pulse),
            Control::button(ControlId::Speed, speed),
            Control::toggle(ControlId::Flicker, "Effect", config.flicker),
        ]
    }
}
