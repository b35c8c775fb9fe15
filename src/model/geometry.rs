/// CPU-side triangle meshes for the primitive shapes the demos place.
use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};

/// Indexed triangle mesh, positions and normals in object space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push(&mut self, p: Vec3, n: Vec3, uv: [f32; 2]) {
        self.positions.push(p.to_array());
        self.normals.push(n.normalize_or_zero().to_array());
        self.uvs.push(uv);
    }

    /// Connect a `(rows + 1) x (cols + 1)` vertex grid into quads.
    fn stitch_grid(&mut self, base: u32, rows: u32, cols: u32) {
        for r in 0..rows {
            for c in 0..cols {
                let a = base + r * (cols + 1) + c;
                let b = a + cols + 1;
                self.indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
            }
        }
    }

    /// Bake a transform into the vertex data.
    pub fn transformed(mut self, m: Mat4) -> Self {
        let normal_m = m.inverse().transpose();
        for p in self.positions.iter_mut() {
            *p = m.transform_point3(Vec3::from(*p)).to_array();
        }
        for n in self.normals.iter_mut() {
            *n = normal_m.transform_vector3(Vec3::from(*n)).normalize_or_zero().to_array();
        }
        self
    }
}

/// Parametric description of a placeable shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Torus { radius: f32, tube: f32 },
    Sphere { radius: f32 },
    Cone { radius: f32, height: f32 },
    /// Flat annulus lying in the XZ plane.
    Ring { inner: f32, outer: f32 },
}

impl Primitive {
    pub fn mesh(&self) -> MeshData {
        match *self {
            Primitive::Torus { radius, tube } => torus(radius, tube, 16, 100),
            Primitive::Sphere { radius } => sphere(radius, 32, 32),
            Primitive::Cone { radius, height } => cone(radius, height, 32),
            Primitive::Ring { inner, outer } => ring(inner, outer, 32),
        }
    }
}

pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for j in 0..=radial_segments {
        let v = j as f32 / radial_segments as f32 * TAU;
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * TAU;
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            let p = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            mesh.push(
                p,
                p - center,
                [i as f32 / tubular_segments as f32, j as f32 / radial_segments as f32],
            );
        }
    }
    mesh.stitch_grid(0, radial_segments, tubular_segments);
    mesh
}

pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * TAU;
            let n = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
            mesh.push(n * radius, n, [u, 1.0 - v]);
        }
    }
    mesh.stitch_grid(0, height_segments, width_segments);
    mesh
}

/// Cone centered on its half height, apex pointing +Y.
pub fn cone(radius: f32, height: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height / 2.0;
    let slope = radius / height;

    // mantle: apex row + rim row
    for row in 0..=1u32 {
        let r = radius * row as f32;
        let y = half - height * row as f32;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let a = u * TAU;
            let (sin, cos) = a.sin_cos();
            mesh.push(Vec3::new(r * sin, y, r * cos), Vec3::new(sin, slope, cos), [u, 1.0 - row as f32]);
        }
    }
    mesh.stitch_grid(0, 1, segments);

    // base cap
    let center = mesh.positions.len() as u32;
    mesh.push(Vec3::new(0.0, -half, 0.0), Vec3::NEG_Y, [0.5, 0.5]);
    for s in 0..=segments {
        let a = s as f32 / segments as f32 * TAU;
        let (sin, cos) = a.sin_cos();
        mesh.push(Vec3::new(radius * sin, -half, radius * cos), Vec3::NEG_Y, [0.5 + 0.5 * cos, 0.5 + 0.5 * sin]);
    }
    for s in 0..segments {
        mesh.indices.extend_from_slice(&[center, center + s + 2, center + s + 1]);
    }
    mesh
}

/// Flat ring facing +Y, used as the placement reticle.
pub fn ring(inner: f32, outer: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for row in 0..=1u32 {
        let r = if row == 0 { inner } else { outer };
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let a = u * TAU;
            mesh.push(Vec3::new(r * a.cos(), 0.0, -r * a.sin()), Vec3::Y, [u, row as f32]);
        }
    }
    mesh.stitch_grid(0, 1, segments);
    mesh
}
