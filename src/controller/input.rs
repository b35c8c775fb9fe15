/// Platform-agnostic input handling: panel controls and simulated-device navigation
use std::collections::HashSet;

use tracing::debug;

use crate::host::{ControlId, ControlValue};
use crate::model::{LightKind, Toggle, ToggleRules};

/// Translate a panel event into a configuration toggle.
///
/// `None` for events that carry no toggle (the back button) or whose value
/// does not fit the control.
pub fn toggle_for(id: ControlId, value: ControlValue, rules: &ToggleRules) -> Option<Toggle> {
    let toggle = match (id, value) {
        (ControlId::Rotation, ControlValue::Click) => Toggle::Rotation,
        (ControlId::Speed, ControlValue::Click) => Toggle::Speed,
        (ControlId::Pulse, ControlValue::Click) => Toggle::Pulse,
        (ControlId::Emissive, ControlValue::Click) => Toggle::Emissive,
        (ControlId::Texture, ControlValue::Click) => Toggle::Texture,
        (ControlId::Flicker, ControlValue::Click) => Toggle::Flicker,
        (ControlId::Jump, ControlValue::Click) => Toggle::Jump,
        (ControlId::AmbientLight, ControlValue::Click) => Toggle::AmbientLight,
        (ControlId::Light, ControlValue::Click) => Toggle::Light,
        (ControlId::Shape, ControlValue::Choice(i)) => Toggle::Select(i),
        (ControlId::Scale, ControlValue::Number(v)) => Toggle::Scale(v),
        (ControlId::LightIntensity, ControlValue::Number(v)) => Toggle::LightIntensity(v),
        (ControlId::Color, ControlValue::Color(c)) => Toggle::Color(c),
        (ControlId::LightColor, ControlValue::Color(c)) => Toggle::LightColor(c),
        (ControlId::Material, ControlValue::Choice(i)) => Toggle::Material(*rules.materials.get(i)?),
        (ControlId::LightKind, ControlValue::Choice(i)) => Toggle::LightKind(*LightKind::ALL.get(i)?),
        (ControlId::Back, _) => return None,
        (id, value) => {
            debug!(?id, ?value, "control value does not match control");
            return None;
        }
    };
    Some(toggle)
}

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    MouseMove { dx: f32, dy: f32 },
    /// Primary button / screen tap on the viewport (not on the panel).
    Tap,
    FocusLost,
    PointerLockChanged { locked: bool },
}

/// Input driving the simulated device: held keys, look deltas and taps.
#[derive(Debug, Default)]
pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub look_delta: (f32, f32),
    pub pointer_locked: bool,
    tap_pending: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(key.as_str());
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.pointer_locked {
                    self.look_delta.0 += dx;
                    self.look_delta.1 += dy;
                }
            }
            InputEvent::Tap => self.tap_pending = true,
            InputEvent::FocusLost => self.clear_keys(),
            InputEvent::PointerLockChanged { locked } => self.pointer_locked = *locked,
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn consume_look(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }

    /// A tap becomes the AR select gesture; each tap is reported once.
    pub fn take_tap(&mut self) -> bool {
        std::mem::take(&mut self.tap_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, MaterialVariant};

    #[test]
    fn test_choice_maps_through_demo_material_set() {
        let rules = ToggleRules {
            materials: &[MaterialVariant::Realistic, MaterialVariant::Gold],
            ..Default::default()
        };
        assert_eq!(
            toggle_for(ControlId::Material, ControlValue::Choice(1), &rules),
            Some(Toggle::Material(MaterialVariant::Gold))
        );
        assert_eq!(toggle_for(ControlId::Material, ControlValue::Choice(7), &rules), None);
    }

    #[test]
    fn test_mismatched_values_are_dropped() {
        let rules = ToggleRules::default();
        assert_eq!(toggle_for(ControlId::Rotation, ControlValue::Number(1.0), &rules), None);
        assert_eq!(toggle_for(ControlId::Back, ControlValue::Click, &rules), None);
        assert_eq!(
            toggle_for(ControlId::LightColor, ControlValue::Color(Color::RED), &rules),
            Some(Toggle::LightColor(Color::RED))
        );
        assert_eq!(
            toggle_for(ControlId::LightKind, ControlValue::Choice(2), &rules),
            Some(Toggle::LightKind(LightKind::Directional))
        );
    }

    #[test]
    fn test_look_only_while_locked_and_tap_once() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::MouseMove { dx: 3.0, dy: 1.0 });
        assert_eq!(input.consume_look(), (0.0, 0.0));
        input.process_event(&InputEvent::PointerLockChanged { locked: true });
        input.process_event(&InputEvent::MouseMove { dx: 3.0, dy: 1.0 });
        assert_eq!(input.consume_look(), (3.0, 1.0));

        input.process_event(&InputEvent::Tap);
        assert!(input.take_tap());
        assert!(!input.take_tap());
    }

    #[test]
    fn test_focus_loss_clears_keys() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::KeyDown("w".into()));
        assert!(input.is_key_pressed("w"));
        input.process_event(&InputEvent::FocusLost);
        assert!(!input.is_key_pressed("w"));
    }
}
