//! `wgpu` implementation of the render surface: lit object meshes, the
//! placement reticle and the egui overlay on top.
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::gpu_init::GpuContext;
use super::mesh::{self, MeshBuffer, Vertex};
use super::{RenderSurface, SceneView};
use crate::assets::{AssetSource, TextureImage};
use crate::model::geometry::ring;
use crate::model::{Camera, Color, Geometry, MaterialDescriptor, SceneLights, TextureRef};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Stand-in for the camera feed behind the virtual content.
const BACKGROUND: wgpu::Color = wgpu::Color { r: 0.08, g: 0.09, b: 0.11, a: 1.0 };
const RETICLE_COLOR: Color = Color::GREEN;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub sky: [f32; 4],
    pub ground: [f32; 4],
    pub light_pos: [f32; 4],
    pub light_color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub emissive: [f32; 4],
    pub params: [f32; 4],
}

fn linear(c: Color) -> [f32; 3] {
    let f = |v: f32| {
        if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    [f(c.r), f(c.g), f(c.b)]
}

impl FrameUniform {
    pub fn new(camera: &Camera, lights: &SceneLights) -> Self {
        let eye = camera.view().inverse().transform_point3(Vec3::ZERO);
        let [sr, sg, sb] = linear(lights.ambient.sky);
        let [gr, gg, gb] = linear(lights.ambient.ground);
        let ambient = if lights.ambient.visible { lights.ambient.intensity } else { 0.0 };
        let (light_pos, light_color) = match lights.key {
            Some(key) if key.visible => {
                let [r, g, b] = linear(key.color);
                let kind = match key.kind {
                    crate::model::LightKind::Point => 0.0,
                    crate::model::LightKind::Spot => 1.0,
                    crate::model::LightKind::Directional => 2.0,
                };
                (key.position.extend(kind).to_array(), [r, g, b, key.intensity])
            }
            _ => ([0.0, 1.0, 0.0, 2.0], [0.0; 4]),
        };
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_pos: eye.extend(1.0).to_array(),
            sky: [sr, sg, sb, ambient],
            ground: [gr, gg, gb, 0.0],
            light_pos,
            light_color,
        }
    }
}

impl ObjectUniform {
    pub fn new(model: Mat4, material: &MaterialDescriptor) -> Self {
        let [r, g, b] = linear(material.color);
        let [er, eg, eb] = linear(material.emissive);
        Self {
            model: model.to_cols_array_2d(),
            normal: model.inverse().transpose().to_cols_array_2d(),
            color: [r, g, b, if material.transparent { material.opacity } else { 1.0 }],
            emissive: [er, eg, eb, material.emissive_intensity],
            params: [material.metalness, material.roughness, 0.0, 0.0],
        }
    }

    pub fn unlit(model: Mat4, color: Color) -> Self {
        let [r, g, b] = linear(color);
        Self {
            model: model.to_cols_array_2d(),
            normal: Mat4::IDENTITY.to_cols_array_2d(),
            color: [r, g, b, 1.0],
            emissive: [0.0; 4],
            params: [0.0, 1.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MeshKey {
    Primitive(String),
    Part(String, usize),
    Reticle,
}

struct Draw {
    mesh: MeshKey,
    texture: Option<TextureRef>,
    uniform: ObjectUniform,
    /// View-space depth, for back-to-front sorting of transparent parts.
    depth: f32,
    transparent: bool,
}

/// Collect the draw list for one frame, opaque draws first.
fn collect_draws(scene: &SceneView<'_>, view: Mat4) -> Vec<Draw> {
    let mut draws = Vec::new();
    for obj in scene.visible_objects() {
        let model = obj.transform.matrix();
        let depth = -view.transform_point3(obj.transform.position).z;
        let materials = obj.materials();
        match &obj.geometry {
            Geometry::Primitive(p) => {
                if let Some(m) = materials.first() {
                    draws.push(Draw {
                        mesh: MeshKey::Primitive(format!("{p:?}")),
                        texture: m.texture.clone(),
                        uniform: ObjectUniform::new(model, m),
                        depth,
                        transparent: m.transparent,
                    });
                }
            }
            Geometry::Model(t) => {
                for (i, m) in materials.iter().enumerate().take(t.parts.len()) {
                    draws.push(Draw {
                        mesh: MeshKey::Part(t.id.clone(), i),
                        texture: m.texture.clone(),
                        uniform: ObjectUniform::new(model, m),
                        depth,
                        transparent: m.transparent,
                    });
                }
            }
        }
    }
    if let Some(pose) = scene.reticle {
        draws.push(Draw {
            mesh: MeshKey::Reticle,
            texture: None,
            uniform: ObjectUniform::unlit(pose, RETICLE_COLOR),
            depth: 0.0,
            transparent: false,
        });
    }
    // stable: opaque keep submission order, transparent go far to near
    draws.sort_by(|a, b| match (a.transparent, b.transparent) {
        (false, false) => std::cmp::Ordering::Equal,
        (false, true) => std::cmp::Ordering::Less,
        (true, false) => std::cmp::Ordering::Greater,
        (true, true) => b.depth.total_cmp(&a.depth),
    });
    draws
}

/// egui output to composite over the scene.
pub struct EguiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

struct PendingFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

pub struct Renderer {
    gpu: GpuContext,
    assets: Rc<dyn AssetSource>,
    depth_view: wgpu::TextureView,

    opaque_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,

    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    object_layout: wgpu::BindGroupLayout,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_stride: u64,
    object_capacity: u64,

    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,
    textures: HashMap<TextureRef, wgpu::BindGroup>,

    meshes: HashMap<MeshKey, MeshBuffer>,
    models: HashMap<String, Rc<crate::model::ModelTemplate>>,

    egui_renderer: egui_wgpu::Renderer,
    pending: Option<PendingFrame>,
    clear: wgpu::Color,
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, dynamic: bool, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

fn create_object_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    depth_write: bool,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if depth_write { "opaque_pipeline" } else { "transparent_pipeline" }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // rings and glTF parts are not closed
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

impl Renderer {
    pub fn new(gpu: GpuContext, assets: Rc<dyn AssetSource>) -> Self {
        let device = gpu.device.as_ref();
        let object_size = std::mem::size_of::<ObjectUniform>() as u64;
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let object_stride = object_size.div_ceil(align) * align;
        let object_capacity = 64;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bgl"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                false,
                std::mem::size_of::<FrameUniform>() as u64,
            )],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object_bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, true, object_size)],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bg"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: frame_buffer.as_entire_binding() }],
        });

        let (object_buffer, object_bind_group) =
            Self::create_object_buffer(device, &object_layout, object_stride, object_capacity);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("base_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white_image = TextureImage { width: 1, height: 1, rgba: vec![255; 4] };
        let white = Self::create_texture_bind_group(&gpu, &texture_layout, &sampler, "white", &white_image);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("object_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/object.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("object_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &object_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let opaque_pipeline = create_object_pipeline(device, &pipeline_layout, &shader, gpu.format, true);
        let transparent_pipeline = create_object_pipeline(device, &pipeline_layout, &shader, gpu.format, false);

        let depth_view = create_depth_view(device, gpu.config.width, gpu.config.height);
        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        let mut meshes = HashMap::new();
        meshes.insert(MeshKey::Reticle, mesh::upload(device, "reticle", &ring(0.07, 0.1, 32)));

        Self {
            assets,
            depth_view,
            opaque_pipeline,
            transparent_pipeline,
            frame_buffer,
            frame_bind_group,
            object_layout,
            object_buffer,
            object_bind_group,
            object_stride,
            object_capacity,
            texture_layout,
            sampler,
            white,
            textures: HashMap::new(),
            meshes,
            models: HashMap::new(),
            egui_renderer,
            pending: None,
            clear: BACKGROUND,
            gpu,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.gpu.config.width, self.gpu.config.height)
    }

    /// Clear to transparent so a camera feed behind the canvas shows through.
    pub fn set_passthrough(&mut self, on: bool) {
        self.clear = if on { wgpu::Color::TRANSPARENT } else { BACKGROUND };
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.depth_view = create_depth_view(&self.gpu.device, width, height);
    }

    fn create_object_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object_uniforms"),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object_bg"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_texture_bind_group(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        image: &TextureImage,
    ) -> wgpu::BindGroup {
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: image.width, height: image.height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &image.rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        })
    }

    /// Upload meshes and textures the scene needs and has not used before.
    fn prepare(&mut self, scene: &SceneView<'_>, draws: &[Draw]) {
        for obj in scene.visible_objects() {
            match &obj.geometry {
                Geometry::Primitive(p) => {
                    let key = MeshKey::Primitive(format!("{p:?}"));
                    if !self.meshes.contains_key(&key) {
                        let buffer = mesh::upload(&self.gpu.device, &obj.name, &p.mesh());
                        self.meshes.insert(key, buffer);
                    }
                }
                Geometry::Model(t) => {
                    if self.models.contains_key(&t.id) {
                        continue;
                    }
                    for (i, part) in t.parts.iter().enumerate() {
                        let buffer = mesh::upload(&self.gpu.device, &t.id, &part.mesh);
                        self.meshes.insert(MeshKey::Part(t.id.clone(), i), buffer);
                    }
                    self.models.insert(t.id.clone(), Rc::clone(t));
                    debug!(model = %t.id, parts = t.parts.len(), "model uploaded");
                }
            }
        }

        for tex in draws.iter().filter_map(|d| d.texture.as_ref()) {
            if self.textures.contains_key(tex) {
                continue;
            }
            let bind_group = match self.assets.texture(tex) {
                Ok(image) => {
                    Self::create_texture_bind_group(&self.gpu, &self.texture_layout, &self.sampler, &tex.0, &image)
                }
                Err(e) => {
                    warn!("texture unavailable, drawing untextured: {e}");
                    self.white.clone()
                }
            };
            self.textures.insert(tex.clone(), bind_group);
        }

        if draws.len() as u64 > self.object_capacity {
            self.object_capacity = (draws.len() as u64).next_power_of_two();
            let (buffer, bind_group) = Self::create_object_buffer(
                &self.gpu.device,
                &self.object_layout,
                self.object_stride,
                self.object_capacity,
            );
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
        }
    }

    fn acquire(&mut self) -> Option<PendingFrame> {
        let texture = match self.gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost, reconfiguring");
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                return None;
            }
            Err(e) => {
                warn!("cannot acquire frame: {e}");
                return None;
            }
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(PendingFrame { texture, view })
    }

    fn draw_scene(&mut self, scene: &SceneView<'_>, camera: &Camera) {
        let draws = collect_draws(scene, camera.view());
        self.prepare(scene, &draws);

        let queue = Arc::clone(&self.gpu.queue);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&FrameUniform::new(camera, scene.lights)));
        let stride = self.object_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len()];
        for (i, draw) in draws.iter().enumerate() {
            let src = bytemuck::bytes_of(&draw.uniform);
            bytes[i * stride..i * stride + src.len()].copy_from_slice(src);
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.object_buffer, 0, &bytes);
        }

        let Some(frame) = self.pending.take().or_else(|| self.acquire()) else {
            return;
        };
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scene_encoder"),
        });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear), store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_bind_group(0, &self.frame_bind_group, &[]);
            let mut transparent = false;
            rp.set_pipeline(&self.opaque_pipeline);
            for (i, draw) in draws.iter().enumerate() {
                let Some(mesh) = self.meshes.get(&draw.mesh) else {
                    continue;
                };
                if draw.transparent && !transparent {
                    rp.set_pipeline(&self.transparent_pipeline);
                    transparent = true;
                }
                let texture = draw.texture.as_ref().and_then(|t| self.textures.get(t)).unwrap_or(&self.white);
                rp.set_bind_group(1, &self.object_bind_group, &[(i * stride) as u32]);
                rp.set_bind_group(2, texture, &[]);
                rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rp.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        self.pending = Some(frame);
    }

    /// Composite the UI and present. Clears the frame if no scene was drawn.
    pub fn finish_frame(&mut self, ui: EguiFrame) {
        let frame = match self.pending.take() {
            Some(frame) => Some((frame, wgpu::LoadOp::Load)),
            None => {
                let clear = self.clear;
                self.acquire().map(|f| (f, wgpu::LoadOp::Clear(clear)))
            }
        };

        for (id, delta) in &ui.textures_delta.set {
            self.egui_renderer.update_texture(&self.gpu.device, &self.gpu.queue, *id, delta);
        }

        if let Some((frame, load)) = frame {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.gpu.config.width, self.gpu.config.height],
                pixels_per_point: ui.pixels_per_point,
            };
            let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
            self.egui_renderer.update_buffers(
                &self.gpu.device,
                &self.gpu.queue,
                &mut encoder,
                &ui.primitives,
                &screen_descriptor,
            );
            {
                let egui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_render_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        resolve_target: None,
                        ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.egui_renderer.render(&mut egui_pass.forget_lifetime(), &ui.primitives, &screen_descriptor);
            }
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
            frame.texture.present();
        }

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

impl RenderSurface for Renderer {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera) {
        let (w, h) = self.size();
        let mut camera = camera.clone();
        camera.set_aspect(w, h);
        self.draw_scene(scene, &camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaterialDescriptor, PlaceableObject, Primitive};

    #[test]
    fn test_transparent_draws_come_last_far_to_near() {
        let ball = |name: &str, z: f32, opacity: Option<f32>| {
            let mut m = MaterialDescriptor::standard(Color::WHITE);
            if let Some(o) = opacity {
                m = m.with_opacity(o);
            }
            let mut obj = PlaceableObject::primitive(name, Primitive::Sphere { radius: 0.1 }, m);
            obj.transform.position = Vec3::new(0.0, 0.0, z);
            obj.visible = true;
            obj
        };
        let objects = vec![ball("near", -1.0, Some(0.5)), ball("solid", -3.0, None), ball("far", -5.0, Some(0.5))];
        let lights = SceneLights::hemisphere(0xffffff, 0xbbbbff);
        let scene = SceneView { objects: &objects, reticle: Some(Mat4::IDENTITY), lights: &lights };

        let draws = collect_draws(&scene, Mat4::IDENTITY);
        let order: Vec<bool> = draws.iter().map(|d| d.transparent).collect();
        assert_eq!(order, vec![false, false, true, true]);
        assert!(draws[2].depth > draws[3].depth);
        assert!(matches!(draws[1].mesh, MeshKey::Reticle));
    }

    #[test]
    fn test_srgb_to_linear_endpoints() {
        assert_eq!(linear(Color::BLACK), [0.0; 3]);
        let [r, g, b] = linear(Color::WHITE);
        assert!((r - 1.0).abs() < 1e-6 && (g - 1.0).abs() < 1e-6 && (b - 1.0).abs() < 1e-6);
    }
}
