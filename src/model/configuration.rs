use std::ops::RangeInclusive;

use tracing::debug;

use super::material::{Color, MaterialVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    #[default]
    Normal,
    Fast,
}

impl Speed {
    pub fn multiplier(self) -> f32 {
        match self {
            Speed::Normal => 1.0,
            Speed::Fast => 2.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Speed::Normal => Speed::Fast,
            Speed::Fast => Speed::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    #[default]
    Point,
    Spot,
    Directional,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [LightKind::Point, LightKind::Spot, LightKind::Directional];

    pub fn key(self) -> &'static str {
        match self {
            LightKind::Point => "point",
            LightKind::Spot => "spot",
            LightKind::Directional => "directional",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LightKind::Point => "Point Light",
            LightKind::Spot => "Spot Light",
            LightKind::Directional => "Directional Light",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// The user-adjustable key light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    pub enabled: bool,
    pub kind: LightKind,
    pub intensity: f32,
    pub color: Color,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: LightKind::Point,
            intensity: 1.0,
            color: Color::WHITE,
        }
    }
}

/// Every UI-adjustable value of a demo. UI handlers write it through
/// [`ConfigurationState::apply`]; the animation loop only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationState {
    pub rotation: bool,
    pub speed: Speed,
    pub pulse: bool,
    /// Uniform scale picked by the size slider, before pulsing.
    pub scale: f32,
    pub material: MaterialVariant,
    /// Picked surface color; `None` keeps each object's own color.
    pub color: Option<Color>,
    pub emissive: bool,
    pub texture: bool,
    pub flicker: bool,
    pub jump: bool,
    pub ambient_light: bool,
    pub light: LightSettings,
    /// Shown object of single-select demos.
    pub selected: Option<usize>,
}

impl Default for ConfigurationState {
    fn default() -> Self {
        Self {
            rotation: false,
            speed: Speed::Normal,
            pulse: false,
            scale: 1.0,
            material: MaterialVariant::Standard,
            color: None,
            emissive: false,
            texture: false,
            flicker: false,
            jump: false,
            ambient_light: true,
            light: LightSettings::default(),
            selected: None,
        }
    }
}

/// A single UI-originated change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Toggle {
    Rotation,
    Speed,
    Pulse,
    Emissive,
    Texture,
    Flicker,
    Jump,
    AmbientLight,
    Light,
    Scale(f32),
    Material(MaterialVariant),
    Color(Color),
    LightKind(LightKind),
    LightIntensity(f32),
    LightColor(Color),
    Select(usize),
}

/// Per-demo limits on which toggles may take effect.
#[derive(Debug, Clone)]
pub struct ToggleRules {
    pub materials: &'static [MaterialVariant],
    pub scale: RangeInclusive<f32>,
    pub intensity: RangeInclusive<f32>,
    pub selectable: usize,
}

impl Default for ToggleRules {
    fn default() -> Self {
        Self {
            materials: &[MaterialVariant::Standard],
            scale: 0.3..=2.0,
            intensity: 0.0..=5.0,
            selectable: 0,
        }
    }
}

impl ConfigurationState {
    /// Apply one toggle. Returns `false` and leaves the state untouched when
    /// the toggle targets something this demo does not have.
    pub fn apply(&mut self, toggle: Toggle, rules: &ToggleRules) -> bool {
        match toggle {
            Toggle::Rotation => self.rotation = !self.rotation,
            Toggle::Speed => self.speed = self.speed.toggled(),
            Toggle::Pulse => self.pulse = !self.pulse,
            Toggle::Emissive => self.emissive = !self.emissive,
            Toggle::Texture => self.texture = !self.texture,
            Toggle::Flicker => self.flicker = !self.flicker,
            Toggle::Jump => self.jump = !self.jump,
            Toggle::AmbientLight => self.ambient_light = !self.ambient_light,
            Toggle::Light => self.light.enabled = !self.light.enabled,
            Toggle::Scale(v) => match clamp_finite(v, &rules.scale) {
                Some(v) => self.scale = v,
                None => return reject(toggle),
            },
            Toggle::Material(variant) => {
                if !rules.materials.contains(&variant) {
                    return reject(toggle);
                }
                self.material = variant;
            }
            Toggle::Color(color) => self.color = Some(color),
            Toggle::LightKind(kind) => self.light.kind = kind,
            Toggle::LightIntensity(v) => match clamp_finite(v, &rules.intensity) {
                Some(v) => self.light.intensity = v,
                None => return reject(toggle),
            },
            Toggle::LightColor(color) => self.light.color = color,
            Toggle::Select(index) => {
                if index >= rules.selectable {
                    return reject(toggle);
                }
                self.selected = Some(index);
            }
        }
        true
    }
}

fn clamp_finite(v: f32, range: &RangeInclusive<f32>) -> Option<f32> {
    v.is_finite().then(|| v.clamp(*range.start(), *range.end()))
}

fn reject(toggle: Toggle) -> bool {
    debug!(?toggle, "toggle has no target in this demo, ignored");
    false
}
