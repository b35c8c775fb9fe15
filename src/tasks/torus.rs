//! A single torus with a color picker, size slider and three materials.
use glam::Vec3;

use super::{Demo, DemoId};
use crate::assets::AssetSource;
use crate::controller::{AnimationParams, Spin, Wave};
use crate::error::AssetError;
use crate::host::{Control, ControlId};
use crate::model::{
    Color, ConfigurationState, MaterialDescriptor, MaterialVariant, ObjectRegistry, PlaceableObject, Primitive,
    SceneLights, SelectionMode, ToggleRules,
};

const MATERIALS: &[MaterialVariant] =
    &[MaterialVariant::Standard, MaterialVariant::Emissive, MaterialVariant::Transparent];

#[derive(Debug, Default, Clone, Copy)]
pub struct TorusDemo;

impl Demo for TorusDemo {
    fn id(&self) -> DemoId {
        DemoId::Torus
    }

    fn build(&self, _assets: &dyn AssetSource) -> Result<ObjectRegistry, AssetError> {
        let torus = PlaceableObject::primitive(
            "torus",
            Primitive::Torus { radius: 0.2, tube: 0.05 },
            MaterialDescriptor::standard(Color::RED),
        );
        Ok(ObjectRegistry::new(SelectionMode::Group).with(torus, Vec3::ZERO))
    }

    fn config(&self) -> ConfigurationState {
        ConfigurationState { color: Some(Color::RED), ..Default::default() }
    }

    fn rules(&self) -> ToggleRules {
        ToggleRules { materials: MATERIALS, scale: 0.3..=2.0, ..Default::default() }
    }

    fn params(&self) -> AnimationParams {
        AnimationParams {
            spin: Spin::Step { x: 0.0, y: 0.01 },
            pulse: Some(Wave { amplitude: 0.1, omega: 5.0 }),
            ..Default::default()
        }
    }

    fn lights(&self) -> SceneLights {
        SceneLights::hemisphere(0xffffff, 0xbbbbff)
    }

    fn controls(&self, config: &ConfigurationState) -> Vec<Control> {
        let selected = MATERIALS.iter().position(|m| *m == config.material).unwrap_or(0);
        vec![
            Control::color(ControlId::Color, "Color", config.color.unwrap_or(Color::RED)),
            Control::toggle(ControlId::Rotation, "Rotation", config.rotation),
            Control::slider(ControlId::Scale, format!("Size: {:.1}", config.scale), config.scale, 0.3..=2.0, 0.1),
            Control::toggle(ControlId::Pulse, "Pulse", config.pulse),
            Control::select(ControlId::Material, "Material", MATERIALS.iter().map(|m| m.label()), selected),
        ]
    }
}
