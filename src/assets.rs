//! Resolving demo asset identifiers into model templates and texture images.
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::error::AssetError;
use crate::model::geometry::{cone, ring, sphere, torus};
use crate::model::{Color, MaterialDescriptor, MeshData, ModelPart, ModelTemplate, TextureRef};

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub trait AssetSource {
    fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError>;

    fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError>;
}

/// Ask `primary` first and fall back only for assets it does not have.
pub struct WithFallback<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: AssetSource, F: AssetSource> AssetSource for WithFallback<P, F> {
    fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
        match self.primary.model(id) {
            Err(AssetError::NotFound(_)) => {
                tracing::info!(id, "model not on disk, using built-in stand-in");
                self.fallback.model(id)
            }
            other => other,
        }
    }

    fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
        match self.primary.texture(texture) {
            Err(AssetError::NotFound(_)) => self.fallback.texture(texture),
            other => other,
        }
    }
}

/// Procedural stand-ins for the demo assets, sized like the originals so
/// that the per-model base scales still apply.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinAssets;

impl BuiltinAssets {
    fn part(mesh: MeshData, material: MaterialDescriptor) -> ModelPart {
        ModelPart { mesh, material }
    }

    fn bicycle() -> Vec<ModelPart> {
        let tire = MaterialDescriptor::standard(Color::from_hex(0x222222)).with_metal(0.0, 0.8);
        let frame = MaterialDescriptor::standard(Color::from_hex(0x2e86de)).with_metal(0.6, 0.4);
        let seat = MaterialDescriptor::standard(Color::from_hex(0x8b4513));
        let wheel = |x: f32| {
            torus(0.09, 0.015, 12, 32).transformed(Mat4::from_translation(Vec3::new(x, 0.1, 0.0)))
        };
        let bar = |from: Vec3, to: Vec3| {
            let dir = to - from;
            let len = dir.length();
            let rot = glam::Quat::from_rotation_arc(Vec3::Y, dir / len);
            cone(0.012, len, 8).transformed(Mat4::from_rotation_translation(rot, (from + to) * 0.5))
        };
        vec![
            Self::part(wheel(-0.16), tire.clone()),
            Self::part(wheel(0.16), tire),
            Self::part(bar(Vec3::new(-0.16, 0.1, 0.0), Vec3::new(0.0, 0.24, 0.0)), frame.clone()),
            Self::part(bar(Vec3::new(0.16, 0.1, 0.0), Vec3::new(0.0, 0.24, 0.0)), frame.clone()),
            Self::part(bar(Vec3::new(0.12, 0.1, 0.0), Vec3::new(0.12, 0.32, 0.0)), frame),
            Self::part(sphere(0.03, 8, 12).transformed(Mat4::from_translation(Vec3::new(-0.02, 0.27, 0.0))), seat),
        ]
    }
}

impl AssetSource for BuiltinAssets {
    fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
        let parts = match id {
            "Kids_Cycle.glb" => Self::bicycle(),
            // planet radii are in model units before their base scale
            "earth.glb" => vec![Self::part(
                sphere(1.0, 24, 32),
                MaterialDescriptor::standard(Color::from_hex(0x2a6fdb)).with_metal(0.0, 0.7),
            )],
            "saturn.glb" => vec![
                Self::part(sphere(100.0, 24, 32), MaterialDescriptor::standard(Color::from_hex(0xd8b56a))),
                Self::part(
                    ring(130.0, 220.0, 48).transformed(Mat4::from_rotation_z(0.4)),
                    MaterialDescriptor::standard(Color::from_hex(0xc9b28a)).with_opacity(0.8),
                ),
            ],
            "sun.glb" => vec![Self::part(
                sphere(10.0, 24, 32),
                MaterialDescriptor::standard(Color::from_hex(0xffcc33)).with_emissive(Color::from_hex(0xff9900), 1.0),
            )],
            _ => return Err(AssetError::NotFound(id.to_string())),
        };
        Ok(Rc::new(ModelTemplate { id: id.to_string(), parts }))
    }

    fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
        if texture.0 != "texture.jpg" {
            return Err(AssetError::NotFound(texture.0.clone()));
        }
        Ok(checkerboard(64, 8))
    }
}

fn checkerboard(size: u32, cells: u32) -> TextureImage {
    let cell = (size / cells).max(1);
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x / cell + y / cell) % 2 == 0 { 235 } else { 60 };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
    }
    TextureImage { width: size, height: size, rgba }
}

#[cfg(not(target_arch = "wasm32"))]
pub use gltf_assets::GltfAssets;

#[cfg(not(target_arch = "wasm32"))]
mod gltf_assets {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use tracing::{debug, warn};

    use super::*;

    /// `.glb`/`.gltf` models and image files from a directory on disk.
    pub struct GltfAssets {
        dir: PathBuf,
        models: RefCell<HashMap<String, Rc<ModelTemplate>>>,
        /// Images embedded in loaded models, keyed `"<model>#<image index>"`.
        images: RefCell<HashMap<TextureRef, TextureImage>>,
    }

    impl GltfAssets {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self {
                dir: dir.into(),
                models: RefCell::new(HashMap::new()),
                images: RefCell::new(HashMap::new()),
            }
        }

        fn path(&self, id: &str) -> Result<PathBuf, AssetError> {
            let path = self.dir.join(id);
            if path.is_file() {
                Ok(path)
            } else {
                Err(AssetError::NotFound(id.to_string()))
            }
        }

        fn load(&self, id: &str, path: &Path) -> Result<ModelTemplate, AssetError> {
            let load_err = |reason: String| AssetError::Load { id: id.to_string(), reason };
            let (document, buffers, images) = gltf::import(path).map_err(|e| load_err(e.to_string()))?;

            let scene = document
                .default_scene()
                .or_else(|| document.scenes().next())
                .ok_or_else(|| AssetError::Empty(id.to_string()))?;

            let mut parts = Vec::new();
            for node in scene.nodes() {
                collect_node(&node, Mat4::IDENTITY, &buffers, id, &mut parts);
            }
            if parts.is_empty() {
                return Err(AssetError::Empty(id.to_string()));
            }

            let mut cache = self.images.borrow_mut();
            for (i, image) in images.iter().enumerate() {
                match to_rgba(image) {
                    Some(img) => {
                        cache.insert(TextureRef(format!("{id}#{i}")), img);
                    }
                    None => warn!(id, image = i, format = ?image.format, "unsupported embedded image format"),
                }
            }

            debug!(id, parts = parts.len(), "model loaded");
            Ok(ModelTemplate { id: id.to_string(), parts })
        }
    }

    fn collect_node(
        node: &gltf::Node<'_>,
        parent: Mat4,
        buffers: &[gltf::buffer::Data],
        id: &str,
        parts: &mut Vec<ModelPart>,
    ) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| &d.0[..]));
                let Some(positions) = reader.read_positions() else {
                    continue;
                };
                let positions: Vec<[f32; 3]> = positions.collect();
                let normals = reader
                    .read_normals()
                    .map(|n| n.collect())
                    .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
                let uvs = reader
                    .read_tex_coords(0)
                    .map(|t| t.into_f32().collect())
                    .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
                let indices = reader
                    .read_indices()
                    .map(|i| i.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let mesh = MeshData { positions, normals, uvs, indices }.transformed(world);
                parts.push(ModelPart { mesh, material: material_of(&primitive.material(), id) });
            }
        }
        for child in node.children() {
            collect_node(&child, world, buffers, id, parts);
        }
    }

    fn material_of(material: &gltf::Material<'_>, id: &str) -> MaterialDescriptor {
        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let [er, eg, eb] = material.emissive_factor();
        let mut m = MaterialDescriptor::standard(Color { r, g, b })
            .with_metal(pbr.metallic_factor(), pbr.roughness_factor())
            .with_emissive(Color { r: er, g: eg, b: eb }, 1.0);
        if material.alpha_mode() == gltf::material::AlphaMode::Blend {
            m = m.with_opacity(a);
        }
        if let Some(info) = pbr.base_color_texture() {
            m = m.with_texture(TextureRef(format!("{id}#{}", info.texture().source().index())));
        }
        m
    }

    fn to_rgba(image: &gltf::image::Data) -> Option<TextureImage> {
        use gltf::image::Format;
        let rgba = match image.format {
            Format::R8G8B8A8 => image.pixels.clone(),
            Format::R8G8B8 => image.pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
            Format::R8 => image.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            _ => return None,
        };
        Some(TextureImage { width: image.width, height: image.height, rgba })
    }

    impl AssetSource for GltfAssets {
        fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
            if let Some(cached) = self.models.borrow().get(id) {
                return Ok(Rc::clone(cached));
            }
            let path = self.path(id)?;
            let template = Rc::new(self.load(id, &path)?);
            self.models.borrow_mut().insert(id.to_string(), Rc::clone(&template));
            Ok(template)
        }

        fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
            if let Some(img) = self.images.borrow().get(texture) {
                return Ok(img.clone());
            }
            let path = self.path(&texture.0)?;
            let img = image::open(&path)
                .map_err(|e| AssetError::Load { id: texture.0.clone(), reason: e.to_string() })?
                .to_rgba8();
            Ok(TextureImage { width: img.width(), height: img.height(), rgba: img.into_raw() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl AssetSource for Nothing {
        fn model(&self, id: &str) -> Result<Rc<ModelTemplate>, AssetError> {
            Err(AssetError::NotFound(id.into()))
        }

        fn texture(&self, texture: &TextureRef) -> Result<TextureImage, AssetError> {
            Err(AssetError::NotFound(texture.0.clone()))
        }
    }

    #[test]
    fn test_builtin_models_have_parts() {
        for id in ["Kids_Cycle.glb", "earth.glb", "saturn.glb", "sun.glb"] {
            let model = BuiltinAssets.model(id).unwrap();
            assert!(!model.parts.is_empty());
            assert!(model.parts.iter().all(|p| !p.mesh.is_empty()));
        }
        assert!(matches!(BuiltinAssets.model("pluto.glb"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_fallback_only_on_not_found() {
        let chain = WithFallback { primary: Nothing, fallback: BuiltinAssets };
        assert!(chain.model("earth.glb").is_ok());
        let tex = chain.texture(&TextureRef("texture.jpg".into())).unwrap();
        assert_eq!(tex.rgba.len(), (tex.width * tex.height * 4) as usize);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_missing_file_is_not_found() {
        let assets = GltfAssets::new("/nonexistent-artoys-assets");
        assert!(matches!(assets.model("earth.glb"), Err(AssetError::NotFound(_))));
    }
}
