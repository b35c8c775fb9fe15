use glam::Vec3;

use crate::controller::session::PlacementState;
use crate::model::{ConfigurationState, MaterialBinding, ObjectRegistry, SceneLights, TextureRef};

/// How the rotation toggle moves objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spin {
    /// Per-frame increment in radians, scaled by the speed multiplier.
    Step { x: f32, y: f32 },
    /// Yaw as a function of elapsed time: `y = rate * t`.
    Absolute { y_rate: f32 },
}

/// `amplitude * sin(omega * t)` shaped effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    pub amplitude: f32,
    pub omega: f32,
}

/// Per-demo constants of the animation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationParams {
    pub spin: Spin,
    pub pulse: Option<Wave>,
    /// Emissive intensity flicker; `amplitude` is the peak intensity.
    pub flicker: Option<Wave>,
    /// Vertical hop above the placed position.
    pub jump: Option<Wave>,
    pub texture: Option<TextureRef>,
    /// Whether the hemisphere light follows the ambient toggle.
    pub ambient_configurable: bool,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            spin: Spin::Step { x: 0.0, y: 0.01 },
            pulse: None,
            flicker: None,
            jump: None,
            texture: None,
            ambient_configurable: false,
        }
    }
}

pub fn material_binding(config: &ConfigurationState) -> MaterialBinding {
    MaterialBinding {
        variant: config.material,
        color: config.color,
        emissive: config.emissive,
        texture: config.texture,
        flicker: config.flicker,
    }
}

/// Uniform scale with pulsing applied: `base + amplitude * sin(omega * t)`.
pub fn pulse_scale(base: f32, pulse: Option<Wave>, t: f32) -> f32 {
    match pulse {
        Some(w) => base + w.amplitude * (w.omega * t).sin(),
        None => base,
    }
}

pub fn flicker_intensity(wave: Wave, t: f32) -> f32 {
    wave.amplitude * (0.5 + 0.5 * (wave.omega * t).sin())
}

pub fn jump_offset(wave: Wave, t: f32) -> f32 {
    wave.amplitude * (wave.omega * t).sin().abs()
}

/// Advance the scene by one frame.
///
/// Reads the configuration and placement only; writes transforms, material
/// bindings and lights. Work is linear in the (fixed) object count.
pub fn animate(
    t: f32,
    config: &ConfigurationState,
    placement: PlacementState,
    registry: &mut ObjectRegistry,
    lights: &mut SceneLights,
    params: &AnimationParams,
) {
    lights.sync(config, params.ambient_configurable);
    registry.rebind(material_binding(config), params.texture.as_ref());

    let placed = placement == PlacementState::Placed;
    if placed {
        registry.show_placed(config.selected);
    }

    let pulse = params.pulse.filter(|_| config.pulse);
    let scale = pulse_scale(config.scale, pulse, t);
    let flicker = params.flicker.filter(|_| config.flicker).map(|w| flicker_intensity(w, t));
    let jump = params.jump.filter(|_| config.jump).map(|w| jump_offset(w, t)).unwrap_or(0.0);
    let step = config.speed.multiplier();

    for (obj, home) in registry.placed_mut() {
        if config.rotation {
            match params.spin {
                Spin::Step { x, y } => {
                    obj.transform.rotation.x += x * step;
                    obj.transform.rotation.y += y * step;
                }
                Spin::Absolute { y_rate } => obj.transform.rotation.y = y_rate * t,
            }
        }

        obj.transform.scale = Vec3::splat(scale * obj.base_scale);

        if placed {
            obj.transform.position.y = home.y + jump;
        }

        if let Some(intensity) = flicker {
            obj.set_emissive_intensity(intensity);
        }
    }
}
