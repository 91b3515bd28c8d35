//! `wgpu` backend.
//!
//! Buffers and textures live in arenas keyed by the handles the scene layer
//! holds. Draws are immediate-mode on the scene side (set `mvp`, draw, repeat),
//! so they are recorded here and turned into one render pass by
//! [`WgpuGpu::encode`]: every recorded `mvp` goes into a dynamic uniform buffer
//! and each draw binds its own slice of it.

use std::{collections::HashMap, num::NonZeroU32};

use anyhow::Context;
use wgpu::util::DeviceExt;

use crate::config::Topology;

use super::{BufferId, BufferKind, DrawCall, DrawSubmitter, GpuResources, TextureData, TextureId};

/// Bind group the shader declares its `mvp` uniform at.
pub const MVP_LOCATION: u32 = 0;
const TEXTURE_GROUP: u32 = 1;
const MVP_SIZE: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const UV_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];

#[derive(Clone, Debug)]
pub struct WgpuConfig {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub topology: Topology,
    pub clear_colour: wgpu::Color,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            topology: Topology::TriangleList,
            // Light sky blue.
            clear_colour: wgpu::Color {
                r: 135.0 / 255.0,
                g: 206.0 / 255.0,
                b: 250.0 / 255.0,
                a: 1.0,
            },
        }
    }
}

/// Pixel rectangle of the target a pass draws into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct PendingDraw {
    location: u32,
    mvp: [[f32; 4]; 4],
    call: DrawCall,
}

pub struct WgpuGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: WgpuConfig,
    next_id: u32,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    textures: HashMap<TextureId, GpuTexture>,
    texture_layout: wgpu::BindGroupLayout,
    mvp_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    untextured: GpuTexture,
    pipeline: wgpu::RenderPipeline,
    mvp_stride: u64,
    mvp_capacity: u64,
    mvp_buffer: wgpu::Buffer,
    mvp_bind_group: wgpu::BindGroup,
    fallback_attributes: wgpu::Buffer,
    current_mvp: Option<(u32, [[f32; 4]; 4])>,
    pending: Vec<PendingDraw>,
}

impl WgpuGpu {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: WgpuConfig) -> Self {
        let mvp_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mvp_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(MVP_SIZE),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("diffuse_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("diffuse sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let mvp_stride = MVP_SIZE.div_ceil(alignment) * alignment;
        let mvp_capacity = 64;
        let (mvp_buffer, mvp_bind_group) = create_mvp_storage(&device, &mvp_layout, mvp_stride, mvp_capacity);

        let pipeline = create_scene_pipeline(&device, &config, &mvp_layout, &texture_layout);

        let white = TextureData {
            width: 1,
            height: 1,
            levels: vec![image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]))],
        };
        let untextured = upload_texture(&device, &queue, &texture_layout, &sampler, "untextured", &white);

        let fallback_attributes = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fallback Attribute Buffer"),
            size: 12 * 1024,
            usage: wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            config,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_layout,
            mvp_layout,
            sampler,
            untextured,
            pipeline,
            mvp_stride,
            mvp_capacity,
            mvp_buffer,
            mvp_bind_group,
            fallback_attributes,
            current_mvp: None,
            pending: Vec::new(),
        }
    }

    /// Creates a device without any surface, for offscreen rendering.
    pub fn headless(config: WgpuConfig) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;
        let (device, queue) = futures::executor::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("holo-ngin headless device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .context("requesting device")?;
        Ok(Self::new(device, queue, config))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn config(&self) -> &WgpuConfig {
        &self.config
    }

    /// Draws recorded since the last [`Self::encode`].
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    fn next(&mut self) -> NonZeroU32 {
        let id = NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN);
        self.next_id += 1;
        id
    }

    fn ensure_mvp_capacity(&mut self, draws: u64) {
        if draws <= self.mvp_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        log::debug!("Growing mvp storage to {capacity} draws");
        let (buffer, bind_group) = create_mvp_storage(&self.device, &self.mvp_layout, self.mvp_stride, capacity);
        self.mvp_buffer = buffer;
        self.mvp_bind_group = bind_group;
        self.mvp_capacity = capacity;
    }

    fn ensure_fallback_attributes(&mut self, vertex_count: u32) {
        // Normals are the widest optional attribute (3 floats).
        let needed = vertex_count as u64 * 12;
        if needed <= self.fallback_attributes.size() {
            return;
        }
        self.fallback_attributes = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fallback Attribute Buffer"),
            size: needed.next_power_of_two(),
            usage: wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });
    }

    /**
     * Encodes every draw recorded since the last call into one render pass.
     *
     * The `mvp`s are copied into the uniform buffer by the encoder itself, right before the
     * pass, so several calls can share one encoder and each pass sees its own matrices.
     * `clear` decides whether the targets are cleared first and `viewport` restricts the pass
     * to part of the target: side by side stereo encodes the left eye with `clear` and the left
     * half, then the right eye without `clear` and the right half.
     */
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: Option<&wgpu::TextureView>,
        clear: bool,
        viewport: Option<Viewport>,
    ) {
        let pending = std::mem::take(&mut self.pending);
        self.ensure_mvp_capacity(pending.len() as u64);
        let widest = pending
            .iter()
            .filter(|d| d.call.normals.is_none() || d.call.uvs.is_none())
            .map(|d| d.call.vertex_count)
            .max()
            .unwrap_or(0);
        self.ensure_fallback_attributes(widest);

        let mut uniforms = vec![0u8; (pending.len() as u64 * self.mvp_stride) as usize];
        for (i, draw) in pending.iter().enumerate() {
            let start = i * self.mvp_stride as usize;
            uniforms[start..start + MVP_SIZE as usize].copy_from_slice(bytemuck::cast_slice(&draw.mvp));
        }
        if !uniforms.is_empty() {
            let staging = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("MVP Staging Buffer"),
                contents: &uniforms,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
            encoder.copy_buffer_to_buffer(&staging, 0, &self.mvp_buffer, 0, uniforms.len() as u64);
        }

        let (color_load, depth_load) = if clear {
            (wgpu::LoadOp::Clear(self.config.clear_colour), wgpu::LoadOp::Clear(1.0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        if let Some(Viewport { x, y, width, height }) = viewport {
            render_pass.set_viewport(x, y, width, height, 0.0, 1.0);
        }

        for (i, draw) in pending.iter().enumerate() {
            let call = &draw.call;
            if draw.location != MVP_LOCATION {
                log::warn!("mvp set at location {} but the shader reads it from {}", draw.location, MVP_LOCATION);
            }
            if call.topology != self.config.topology {
                log::warn!("Draw uses {:?} but the pipeline was built for {:?}", call.topology, self.config.topology);
            }
            let (Some(positions), Some(indices)) = (self.buffers.get(&call.positions), self.buffers.get(&call.indices))
            else {
                log::warn!("Skipping draw of released buffers {:?}/{:?}", call.positions, call.indices);
                continue;
            };
            let normals = call.normals.and_then(|id| self.buffers.get(&id)).unwrap_or(&self.fallback_attributes);
            let uvs = call.uvs.and_then(|id| self.buffers.get(&id)).unwrap_or(&self.fallback_attributes);
            let texture = call
                .texture
                .and_then(|id| self.textures.get(&id))
                .unwrap_or(&self.untextured);

            let offset = (i as u64 * self.mvp_stride) as wgpu::DynamicOffset;
            render_pass.set_bind_group(MVP_LOCATION, &self.mvp_bind_group, &[offset]);
            render_pass.set_bind_group(TEXTURE_GROUP, &texture.bind_group, &[]);
            render_pass.set_vertex_buffer(0, positions.slice(..));
            render_pass.set_vertex_buffer(1, normals.slice(..));
            render_pass.set_vertex_buffer(2, uvs.slice(..));
            render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..call.index_count, 0, 0..1);
        }
    }

    /// Encodes and submits the recorded draws in a command buffer of their own.
    pub fn submit(
        &mut self,
        color: &wgpu::TextureView,
        depth: Option<&wgpu::TextureView>,
        clear: bool,
        viewport: Option<Viewport>,
    ) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });
        self.encode(&mut encoder, color, depth, clear, viewport);
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GpuResources for WgpuGpu {
    fn create_buffer(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BufferId {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        let id = BufferId(self.next());
        self.buffers.insert(id, buffer);
        id
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> TextureId {
        let texture = upload_texture(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            label,
            data,
        );
        let id = TextureId(self.next());
        self.textures.insert(id, texture);
        id
    }

    fn release_buffer(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.remove(&id) {
            buffer.destroy();
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.texture.destroy();
        }
    }
}

impl DrawSubmitter for WgpuGpu {
    fn set_mvp(&mut self, location: u32, mvp: [[f32; 4]; 4]) {
        self.current_mvp = Some((location, mvp));
    }

    fn draw_indexed(&mut self, call: DrawCall) {
        let Some((location, mvp)) = self.current_mvp else {
            log::warn!("Draw issued before any mvp was set, skipping");
            return;
        };
        self.pending.push(PendingDraw { location, mvp, call });
    }
}

fn create_mvp_storage(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("MVP Buffer"),
        size: stride * capacity,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("mvp_bind_group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(MVP_SIZE),
            }),
        }],
    });
    (buffer, bind_group)
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    label: &str,
    data: &TextureData,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: data.width.max(1),
        height: data.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: data.levels.len().max(1) as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, rgba) in data.levels.iter().enumerate() {
        let (width, height) = rgba.dimensions();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    GpuTexture { texture, bind_group }
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    config: &WgpuConfig,
    mvp_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: &[mvp_layout, texture_layout],
        push_constant_ranges: &[],
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scene Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("scene_shader.wgsl").into()),
    });

    let vertex_layouts = [
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &NORMAL_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &UV_ATTRIBUTES,
        },
    ];
    let topology = config.topology.pipeline_topology();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Scene Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: (topology == wgpu::PrimitiveTopology::TriangleStrip)
                .then_some(wgpu::IndexFormat::Uint32),
            front_face: wgpu::FrontFace::Ccw,
            // Winding is whatever the source file provides.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: config.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
