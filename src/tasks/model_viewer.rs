//! A loaded glTF model with its own light and an alternative material.
use glam::Vec3;

use super::{Demo, DemoId};
use crate::assets::AssetSource;
use crate::controller::{AnimationParams, Spin};
use crate::error::AssetError;
use crate::host::{Control, ControlId};
use crate::model::{
    ConfigurationState, LightKind, LightSettings, MaterialVariant, ObjectRegistry, PlaceableObject, SceneLights,
    SelectionMode, ToggleRules,
};

const MODEL: &str = "Kids_Cycle.glb";
const MATERIALS: &[MaterialVariant] = &[MaterialVariant::Original, MaterialVariant::Alternative];
/// Where the model light sits relative to the model.
const LIGHT_OFFSET: Vec3 = Vec3::new(0.0, 0.5, 0.5);

#[derive(Debug, Default, Clone, Copy)]
pub struct ModelViewer;

impl Demo for ModelViewer {
    fn id(&self) -> DemoId {
        DemoId::ModelViewer
    }

    fn build(&self, assets: &dyn AssetSource) -> Result<ObjectRegistry, AssetError> {
        let model = PlaceableObject::model("bicycle", assets.model(MODEL)?);
        Ok(ObjectRegistry::new(SelectionMode::Group).with(model, Vec3::ZERO))
    }

    fn config(&self) -> ConfigurationState {
        ConfigurationState {
            rotation: true,
            material: MaterialVariant::Original,
            light: LightSettings { kind: LightKind::Point, ..Default::default() },
            ..Default::default()
        }
    }

    fn rules(&self) -> ToggleRules {
        ToggleRules { materials: MATERIALS, intensity: 0.0..=5.0, ..Default::default() }
    }

    fn params(&self) -> AnimationParams {
        AnimationParams { spin: Spin::Absolute { y_rate: 0.5 }, ambient_configurable: true, ..Default::default() }
    }

    fn lights(&self) -> SceneLights {
        SceneLights::hemisphere(0xffffff, 0x444444).with_key(LightKind::Point, LIGHT_OFFSET)
    }

    fn controls(&self, config: &ConfigurationState) -> Vec<Control> {
        let kind = LightKind::ALL.iter().position(|k| *k == config.light.kind).unwrap_or(0);
        let material = MATERIALS.iter().position(|m| *m == config.material).unwrap_or(0);
        vec![
            Control::toggle(ControlId::Rotation, "Rotation", config.rotation),
            Control::toggle(ControlId::AmbientLight, "Scene Light", config.ambient_light),
            Control::toggle(ControlId::Light, "Model Light", config.light.enabled),
            Control::select(ControlId::LightKind, "Light Type", LightKind::ALL.iter().map(|k| k.label()), kind),
            Control::slider(ControlId::LightIntensity, "Intensity", config.light.intensity, 0.0..=5.0, 0.1),
            Control::color(ControlId::LightColor, "Light Color", config.light.color),
            Control::select(ControlId::Material, "Material", MATERIALS.iter().map(|m| m.label()), material),
        ]
    }

    /// The model light travels with the model.
    fn after_animate(&self, registry: &ObjectRegistry, lights: &mut SceneLights) {
        if let (Some(model), Some(key)) = (registry.get(0), lights.key.as_mut()) {
            key.position = model.transform.position + LIGHT_OFFSET;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;

    #[test]
    fn test_light_follows_model() {
        let mut reg = ModelViewer.build(&BuiltinAssets).unwrap();
        reg.place_at(Vec3::new(1.0, 0.0, -2.0), None);
        let mut lights = ModelViewer.lights();
        ModelViewer.after_animate(&reg, &mut lights);
        assert_eq!(lights.key.map(|k| k.position), Some(Vec3::new(1.0, 0.5, -1.5)));
    }

    #[test]
    fn test_model_keeps_its_own_materials_by_default() {
        let reg = ModelViewer.build(&BuiltinAssets).unwrap();
        let obj = &reg.objects()[0];
        assert!(obj.materials().len() > 1);
        assert_eq!(obj.materials(), obj.base_materials());
        assert_eq!(ModelViewer.config().material, MaterialVariant::Original);
    }
}
