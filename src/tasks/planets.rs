//! Earth, Saturn and the Sun placed side by side.
use glam::Vec3;

use super::{Demo, DemoId};
use crate::assets::AssetSource;
use crate::controller::{AnimationParams, OverlayPolicy, Spin, Wave};
use crate::error::AssetError;
use crate::host::{Control, ControlId};
use crate::model::{
    ConfigurationState, LightKind, LightSettings, MaterialVariant, ObjectRegistry, PlaceableObject, SceneLights,
    SelectionMode, ToggleRules,
};

const MATERIALS: &[MaterialVariant] = &[
    MaterialVariant::Realistic,
    MaterialVariant::Gold,
    MaterialVariant::Glass,
    MaterialVariant::Chrome,
    MaterialVariant::Glow,
];

/// Asset, display name and base scale of each planet, left to right.
const PLANETS: [(&str, &str, f32); 3] = [
    ("earth.glb", "earth", 1.0 / 10.0),
    ("saturn.glb", "saturn", 1.0 / 1000.0),
    ("sun.glb", "sun", 1.0 / 100.0),
];
const SPACING: f32 = 0.6;

#[derive(Debug, Default, Clone, Copy)]
pub struct Planets;

impl Demo for Planets {
    fn id(&self) -> DemoId {
        DemoId::Planets
    }

    fn build(&self, assets: &dyn AssetSource) -> Result<ObjectRegistry, AssetError> {
        let mut registry = ObjectRegistry::new(SelectionMode::Group);
        for (i, (asset, name, scale)) in PLANETS.into_iter().enumerate() {
            let planet = PlaceableObject::model(name, assets.model(asset)?).with_base_scale(scale);
            registry = registry.with(planet, Vec3::new((i as f32 - 1.0) * SPACING, 0.0, 0.0));
        }
        Ok(registry)
    }

    fn config(&self) -> ConfigurationState {
        ConfigurationState {
            material: MaterialVariant::Realistic,
            light: LightSettings { kind: LightKind::Directional, ..Default::default() },
            ..Default::default()
        }
    }

    fn rules(&self) -> ToggleRules {
        ToggleRules { materials: MATERIALS, intensity: 0.0..=5.0, ..Default::default() }
    }

    fn params(&self) -> AnimationParams {
        AnimationParams {
            spin: Spin::Step { x: 0.0, y: 0.005 },
            jump: Some(Wave { amplitude: 0.2, omega: 3.0 }),
            ..Default::default()
        }
    }

    fn lights(&self) -> SceneLights {
        SceneLights::hemisphere(0xffffff, 0x444444)
            .without_ambient()
            .with_key(LightKind::Directional, Vec3::new(1.0, 2.0, 1.0))
    }

    fn overlay(&self) -> OverlayPolicy {
        OverlayPolicy::Persistent
    }

    fn controls(&self, config: &ConfigurationState) -> Vec<Control> {
        let material = MATERIALS.iter().position(|m| *m == config.material).unwrap_or(0);
        vec![
            Control::toggle(ControlId::Rotation, "Rotation", config.rotation),
            Control::toggle(ControlId::Jump, "Jump", config.jump),
            Control::toggle(ControlId::Light, "Directional Light", config.light.enabled),
            Control::color(ControlId::LightColor, "Light Color", config.light.color),
            Control::slider(ControlId::LightIntensity, "Light Intensity", config.light.intensity, 0.0..=5.0, 0.1),
            Control::select(ControlId::Material, "Material", MATERIALS.iter().map(|m| m.label()), material),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;

    #[test]
    fn test_planets_sit_side_by_side() {
        let mut reg = Planets.build(&BuiltinAssets).unwrap();
        let anchor = Vec3::new(0.5, 0.0, -1.5);
        reg.place_at(anchor, None);
        for (i, obj) in reg.objects().iter().enumerate() {
            assert!(obj.visible);
            let expected = anchor + Vec3::new((i as f32 - 1.0) * 0.6, 0.0, 0.0);
            assert!(obj.transform.position.abs_diff_eq(expected, 1e-6));
        }
        assert_eq!(reg.objects()[1].base_scale, 0.001);
    }

    #[test]
    fn test_starts_still_with_rotation_off() {
        let config = Planets.config();
        assert!(!config.rotation);
        let rotation = Planets.controls(&config).into_iter().find(|c| c.id == ControlId::Rotation).map(|c| c.label);
        assert_eq!(rotation.as_deref(), Some("Rotation: OFF"));
    }

    #[test]
    fn test_only_key_light_lights_the_scene() {
        let lights = Planets.lights();
        assert!(!lights.ambient.visible);
        assert_eq!(lights.key.map(|k| k.kind), Some(LightKind::Directional));
    }
}
