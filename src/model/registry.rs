use glam::Vec3;

use super::material::{Color, MaterialInputs, MaterialVariant, TextureRef};
use super::object::PlaceableObject;

/// The configuration inputs the current object materials were resolved from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialBinding {
    pub variant: MaterialVariant,
    pub color: Option<Color>,
    pub emissive: bool,
    pub texture: bool,
    /// Flicker overwrites emissive intensity, so leaving it must rebind.
    pub flicker: bool,
}

/// How the registry decides which objects are shown once placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Exactly one object (the configured selection) is shown.
    Single,
    /// The whole fixed group is shown.
    Group,
}

/// The fixed set of placeable objects of one demo.
///
/// Objects are added at construction time only; afterwards only their
/// fields change.
#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    mode: SelectionMode,
    objects: Vec<PlaceableObject>,
    offsets: Vec<Vec3>,
    /// World position each object was placed at (anchor + offset).
    homes: Vec<Vec3>,
    binding: Option<MaterialBinding>,
}

impl ObjectRegistry {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            objects: Vec::new(),
            offsets: Vec::new(),
            homes: Vec::new(),
            binding: None,
        }
    }

    pub fn with(mut self, object: PlaceableObject, offset: Vec3) -> Self {
        self.objects.push(object);
        self.offsets.push(offset);
        self.homes.push(Vec3::ZERO);
        self
    }

    /// Declare that the objects' current materials already match `binding`.
    pub fn with_binding(mut self, binding: MaterialBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn binding(&self) -> Option<&MaterialBinding> {
        self.binding.as_ref()
    }

    /// Resolve every object's materials for `binding` unless they already are.
    pub fn rebind(&mut self, binding: MaterialBinding, texture: Option<&TextureRef>) -> bool {
        if self.binding == Some(binding) {
            return false;
        }
        let inputs = MaterialInputs {
            color: binding.color,
            texture: texture.filter(|_| binding.texture),
            emissive: binding.emissive,
        };
        for obj in self.objects.iter_mut() {
            obj.bind_material(binding.variant, &inputs);
        }
        self.binding = Some(binding);
        true
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[PlaceableObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut PlaceableObject> {
        self.objects.iter_mut()
    }

    /// Iterate objects together with the position they were placed at.
    pub fn placed_mut(&mut self) -> impl Iterator<Item = (&mut PlaceableObject, Vec3)> {
        self.objects.iter_mut().zip(self.homes.iter().copied())
    }

    pub fn get(&self, index: usize) -> Option<&PlaceableObject> {
        self.objects.get(index)
    }

    pub fn offset(&self, index: usize) -> Option<Vec3> {
        self.offsets.get(index).copied()
    }

    /// Whether object `index` should be visible after placement.
    pub fn is_shown(&self, index: usize, selected: Option<usize>) -> bool {
        match self.mode {
            SelectionMode::Group => index < self.objects.len(),
            SelectionMode::Single => selected == Some(index),
        }
    }

    /// Move every object to `anchor` plus its fixed offset and reveal the shown ones.
    pub fn place_at(&mut self, anchor: Vec3, selected: Option<usize>) {
        for i in 0..self.objects.len() {
            let home = anchor + self.offsets[i];
            self.homes[i] = home;
            self.objects[i].transform.position = home;
        }
        self.show_placed(selected);
    }

    /// Re-evaluate visibility of placed objects after the selection changed.
    pub fn show_placed(&mut self, selected: Option<usize>) {
        for i in 0..self.objects.len() {
            let shown = self.is_shown(i, selected);
            self.objects[i].visible = shown;
        }
    }

    pub fn hide_all(&mut self) {
        for obj in self.objects.iter_mut() {
            obj.visible = false;
        }
    }

    pub fn any_visible(&self) -> bool {
        self.objects.iter().any(|o| o.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::geometry::Primitive;
    use crate::model::material::MaterialDescriptor;

    fn ball(name: &str) -> PlaceableObject {
        PlaceableObject::primitive(name, Primitive::Sphere { radius: 0.1 }, MaterialDescriptor::standard(Color::WHITE))
    }

    #[test]
    fn test_group_placement_applies_offsets() {
        let mut reg = ObjectRegistry::new(SelectionMode::Group)
            .with(ball("a"), Vec3::new(-0.6, 0.0, 0.0))
            .with(ball("b"), Vec3::ZERO)
            .with(ball("c"), Vec3::new(0.6, 0.0, 0.0));
        reg.place_at(Vec3::new(1.0, 0.0, -2.0), None);

        let xs: Vec<f32> = reg.objects().iter().map(|o| o.transform.position.x).collect();
        assert!((xs[0] - 0.4).abs() < 1e-6);
        assert!((xs[1] - 1.0).abs() < 1e-6);
        assert!((xs[2] - 1.6).abs() < 1e-6);
        assert!(reg.objects().iter().all(|o| o.visible));
    }

    #[test]
    fn test_single_mode_shows_only_selection() {
        let mut reg = ObjectRegistry::new(SelectionMode::Single)
            .with(ball("torus"), Vec3::ZERO)
            .with(ball("sphere"), Vec3::ZERO);
        reg.place_at(Vec3::ONE, Some(1));
        assert!(!reg.objects()[0].visible);
        assert!(reg.objects()[1].visible);

        reg.place_at(Vec3::ONE, None);
        assert!(!reg.any_visible());
    }

    #[test]
    fn test_rebind_only_on_change() {
        let binding = MaterialBinding {
            variant: MaterialVariant::Standard,
            color: None,
            emissive: false,
            texture: false,
            flicker: false,
        };
        let mut reg = ObjectRegistry::new(SelectionMode::Group).with(ball("a"), Vec3::ZERO).with_binding(binding);
        assert!(!reg.rebind(binding, None));

        let tex = TextureRef("texture.jpg".into());
        let textured = MaterialBinding { texture: true, ..binding };
        assert!(reg.rebind(textured, Some(&tex)));
        assert_eq!(reg.objects()[0].materials()[0].texture, Some(tex.clone()));

        assert!(reg.rebind(binding, Some(&tex)));
        assert_eq!(reg.objects()[0].materials()[0], MaterialDescriptor::standard(Color::WHITE));
    }

    #[test]
    fn test_hide_all() {
        let mut reg = ObjectRegistry::new(SelectionMode::Group).with(ball("a"), Vec3::ZERO);
        reg.place_at(Vec3::ZERO, None);
        reg.hide_all();
        assert!(!reg.any_visible());
    }
}
