use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::geometry::{MeshData, Primitive};
use super::material::{MaterialDescriptor, MaterialInputs, MaterialVariant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rot = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rot, self.position)
    }

    pub fn set_uniform_scale(&mut self, s: f32) {
        self.scale = Vec3::splat(s);
    }
}

/// One mesh of a loaded model together with the material it shipped with.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub mesh: MeshData,
    pub material: MaterialDescriptor,
}

/// A resolved asset, shared between every object built from it.
#[derive(Debug, Clone)]
pub struct ModelTemplate {
    pub id: String,
    pub parts: Vec<ModelPart>,
}

#[derive(Debug, Clone)]
pub enum Geometry {
    Primitive(Primitive),
    Model(Rc<ModelTemplate>),
}

impl Geometry {
    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Primitive(_) => 1,
            Geometry::Model(t) => t.parts.len(),
        }
    }
}

/// A named entity the user can place into the world.
///
/// `materials` always has one entry per mesh part and is replaced as a whole.
#[derive(Debug, Clone)]
pub struct PlaceableObject {
    pub name: String,
    pub geometry: Geometry,
    base_materials: Vec<MaterialDescriptor>,
    materials: Vec<MaterialDescriptor>,
    pub transform: Transform,
    /// Asset-specific scale factor the configured scale is multiplied with.
    pub base_scale: f32,
    pub visible: bool,
}

impl PlaceableObject {
    pub fn primitive(name: impl Into<String>, primitive: Primitive, material: MaterialDescriptor) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::Primitive(primitive),
            base_materials: vec![material.clone()],
            materials: vec![material],
            transform: Transform::default(),
            base_scale: 1.0,
            visible: false,
        }
    }

    pub fn model(name: impl Into<String>, template: Rc<ModelTemplate>) -> Self {
        let base: Vec<MaterialDescriptor> = template.parts.iter().map(|p| p.material.clone()).collect();
        Self {
            name: name.into(),
            geometry: Geometry::Model(template),
            materials: base.clone(),
            base_materials: base,
            transform: Transform::default(),
            base_scale: 1.0,
            visible: false,
        }
    }

    pub fn with_base_scale(mut self, s: f32) -> Self {
        self.base_scale = s;
        self.transform.set_uniform_scale(s);
        self
    }

    pub fn base_materials(&self) -> &[MaterialDescriptor] {
        &self.base_materials
    }

    pub fn materials(&self) -> &[MaterialDescriptor] {
        &self.materials
    }

    /// Rebind every part to `variant`, swapping the whole material list at once.
    pub fn bind_material(&mut self, variant: MaterialVariant, inputs: &MaterialInputs<'_>) {
        let next: Vec<MaterialDescriptor> = self
            .base_materials
            .iter()
            .map(|base| variant.resolve(base, inputs))
            .collect();
        self.materials = next;
    }

    /// Set the emissive intensity of all current parts (frame effects).
    pub fn set_emissive_intensity(&mut self, intensity: f32) {
        for m in self.materials.iter_mut() {
            m.emissive_intensity = intensity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::material::Color;

    #[test]
    fn test_transform_matrix_places_origin_at_position() {
        let t = Transform { position: Vec3::new(1.0, 2.0, 3.0), ..Default::default() };
        let p = t.matrix().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn test_model_keeps_one_material_per_part() {
        let template = Rc::new(ModelTemplate {
            id: "bike.glb".into(),
            parts: vec![
                ModelPart { mesh: MeshData::default(), material: MaterialDescriptor::standard(Color::RED) },
                ModelPart { mesh: MeshData::default(), material: MaterialDescriptor::standard(Color::GREEN) },
            ],
        });
        let mut obj = PlaceableObject::model("bike", template);
        obj.bind_material(MaterialVariant::Alternative, &MaterialInputs::default());
        assert_eq!(obj.materials().len(), 2);
        assert!(obj.materials().iter().all(|m| m.transparent));

        obj.bind_material(MaterialVariant::Original, &MaterialInputs::default());
        assert_eq!(obj.materials(), obj.base_materials());
    }
}
