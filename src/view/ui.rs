use egui::Context;

use crate::host::{Control, ControlId, ControlKind, ControlPanel, ControlValue, Element};
use crate::model::Color;
use crate::shell::ArState;
use crate::tasks::DemoId;

/// What the shell has to show this frame.
pub struct UiView<'a> {
    pub demos: &'a [DemoId],
    pub active: Option<DemoId>,
    /// Elements of the mount point, in insertion order.
    pub elements: &'a [Element],
    pub ar: ArState,
    pub status: Option<&'a str>,
}

/// User input collected while drawing, applied by the caller after the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Launch(DemoId),
    Back,
    ToggleAr,
    Control(ControlId, ControlValue),
}

/// Run one egui pass and return its output together with the actions taken.
pub fn build_ui(ctx: &Context, raw_input: egui::RawInput, view: &UiView<'_>) -> (egui::FullOutput, Vec<UiAction>) {
    let mut actions = Vec::new();
    let output = ctx.run(raw_input, |ctx| {
        actions = draw_ui(ctx, view);
    });
    (output, actions)
}

pub fn draw_ui(ctx: &Context, view: &UiView<'_>) -> Vec<UiAction> {
    let mut actions = Vec::new();

    let Some(active) = view.active else {
        draw_selector(ctx, view.demos, view.status, &mut actions);
        return actions;
    };

    for element in view.elements {
        match element {
            Element::BackButton => draw_back(ctx, &mut actions),
            Element::ArButton => draw_ar_button(ctx, view.ar, &mut actions),
            Element::Panel(panel) if panel.visible => draw_panel(ctx, active, panel, &mut actions),
            Element::Panel(_) | Element::Surface => {}
        }
    }

    egui::Area::new(egui::Id::new("status"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -8.0])
        .show(ctx, |ui| {
            if let Some(status) = view.status {
                ui.colored_label(egui::Color32::LIGHT_RED, status);
            } else if view.ar == ArState::Running {
                ui.label(egui::RichText::new("Point at a surface and tap to place").small());
            }
        });

    actions
}

fn draw_selector(ctx: &Context, demos: &[DemoId], status: Option<&str>, actions: &mut Vec<UiAction>) {
    egui::Window::new("AR Demos")
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            for &id in demos {
                if ui.button(id.label()).clicked() {
                    actions.push(UiAction::Launch(id));
                }
            }
            if let Some(status) = status {
                ui.separator();
                ui.colored_label(egui::Color32::LIGHT_RED, status);
            }
        });
}

fn draw_back(ctx: &Context, actions: &mut Vec<UiAction>) {
    egui::Area::new(egui::Id::new("back"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .show(ctx, |ui| {
            if ui.button("← Back").clicked() {
                actions.push(UiAction::Back);
            }
        });
}

fn draw_ar_button(ctx: &Context, ar: ArState, actions: &mut Vec<UiAction>) {
    let label = match ar {
        ArState::Off => "Start AR",
        ArState::Requesting => "Starting…",
        ArState::Running => "Stop AR",
    };
    egui::Area::new(egui::Id::new("ar_button"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -32.0])
        .show(ctx, |ui| {
            let button = ui.add_enabled(ar != ArState::Requesting, egui::Button::new(label));
            if button.clicked() {
                actions.push(UiAction::ToggleAr);
            }
        });
}

fn draw_panel(ctx: &Context, demo: DemoId, panel: &ControlPanel, actions: &mut Vec<UiAction>) {
    egui::Window::new(&panel.title)
        .id(egui::Id::new(("panel", demo.key())))
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            for control in &panel.controls {
                if let Some(value) = draw_control(ui, control) {
                    actions.push(UiAction::Control(control.id, value));
                }
            }
        });
}

fn draw_control(ui: &mut egui::Ui, control: &Control) -> Option<ControlValue> {
    match &control.kind {
        ControlKind::Button => ui.button(&control.label).clicked().then_some(ControlValue::Click),
        ControlKind::Slider { value, range, step } => {
            let mut v = *value;
            let slider = egui::Slider::new(&mut v, range.clone()).step_by(*step as f64).text(&control.label);
            ui.add(slider).changed().then_some(ControlValue::Number(v))
        }
        ControlKind::Color(color) => {
            let mut rgb = color.to_srgb8();
            let changed = ui
                .horizontal(|ui| {
                    let changed = ui.color_edit_button_srgb(&mut rgb).changed();
                    ui.label(&control.label);
                    changed
                })
                .inner;
            changed.then(|| ControlValue::Color(Color::from_srgb8(rgb)))
        }
        ControlKind::Select { options, selected } => {
            let mut choice = *selected;
            let current = options.get(choice).map(String::as_str).unwrap_or_default();
            egui::ComboBox::from_label(&control.label).selected_text(current).show_ui(ui, |ui| {
                for (i, option) in options.iter().enumerate() {
                    ui.selectable_value(&mut choice, i, option);
                }
            });
            (choice != *selected).then_some(ControlValue::Choice(choice))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_frame_produces_no_actions() {
        let ctx = Context::default();
        let panel = ControlPanel {
            title: "Torus".into(),
            controls: vec![
                Control::toggle(ControlId::Rotation, "Rotation", true),
                Control::slider(ControlId::Scale, "Size: 1.0", 1.0, 0.3..=2.0, 0.1),
                Control::color(ControlId::Color, "Color", Color::RED),
                Control::select(ControlId::Material, "Material", ["Standard", "Emissive"], 0),
            ],
            visible: true,
        };
        let elements = [Element::BackButton, Element::ArButton, Element::Panel(panel), Element::Surface];
        let view = UiView {
            demos: &DemoId::ALL,
            active: Some(DemoId::Torus),
            elements: &elements,
            ar: ArState::Off,
            status: Some("AR not supported"),
        };

        for _ in 0..2 {
            let (_, actions) = build_ui(&ctx, egui::RawInput::default(), &view);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn test_selector_shown_without_active_demo() {
        let ctx = Context::default();
        let view = UiView { demos: &DemoId::ALL, active: None, elements: &[], ar: ArState::Off, status: None };
        let (_, actions) = build_ui(&ctx, egui::RawInput::default(), &view);
        assert!(actions.is_empty());
    }
}
