use glam::Vec3;

use super::configuration::{ConfigurationState, LightKind};
use super::material::Color;

/// Sky/ground gradient light applied to everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub visible: bool,
    pub sky: Color,
    pub ground: Color,
    pub intensity: f32,
}

/// The single directional/point/spot light of a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLight {
    pub visible: bool,
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    /// Light position; directional lights shine from here towards the origin.
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLights {
    pub ambient: HemisphereLight,
    pub key: Option<KeyLight>,
}

impl SceneLights {
    pub fn hemisphere(sky: u32, ground: u32) -> Self {
        Self {
            ambient: HemisphereLight {
                visible: true,
                sky: Color::from_hex(sky),
                ground: Color::from_hex(ground),
                intensity: 1.0,
            },
            key: None,
        }
    }

    pub fn with_key(mut self, kind: LightKind, position: Vec3) -> Self {
        self.key = Some(KeyLight {
            visible: true,
            kind,
            color: Color::WHITE,
            intensity: 1.0,
            position,
        });
        self
    }

    pub fn without_ambient(mut self) -> Self {
        self.ambient.visible = false;
        self
    }

    /// Copy the configured light values; takes effect on the current frame.
    pub fn sync(&mut self, config: &ConfigurationState, ambient_configurable: bool) {
        if ambient_configurable {
            self.ambient.visible = config.ambient_light;
        }
        if let Some(key) = self.key.as_mut() {
            key.visible = config.light.enabled;
            key.kind = config.light.kind;
            key.color = config.light.color;
            key.intensity = config.light.intensity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::configuration::{Toggle, ToggleRules};

    #[test]
    fn test_sync_copies_key_light_without_interpolation() {
        let mut lights = SceneLights::hemisphere(0xffffff, 0x444444).with_key(LightKind::Point, Vec3::Y);
        let mut cfg = ConfigurationState::default();
        let rules = ToggleRules::default();
        cfg.apply(Toggle::LightIntensity(3.5), &rules);
        cfg.apply(Toggle::LightKind(LightKind::Directional), &rules);
        cfg.apply(Toggle::AmbientLight, &rules);

        lights.sync(&cfg, true);
        let key = lights.key.unwrap();
        assert_eq!(key.intensity, 3.5);
        assert_eq!(key.kind, LightKind::Directional);
        assert!(!lights.ambient.visible);
    }

    #[test]
    fn test_fixed_ambient_ignores_toggle() {
        let mut lights = SceneLights::hemisphere(0xffffff, 0xbbbbff);
        let cfg = ConfigurationState { ambient_light: false, ..Default::default() };
        lights.sync(&cfg, false);
        assert!(lights.ambient.visible);
    }
}
