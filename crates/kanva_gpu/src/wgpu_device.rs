//! wgpu realization of [`GpuDevice`].
//!
//! Renders headless into a persistent RGBA8 target with a combined
//! depth-stencil buffer. wgpu bakes blend, depth, stencil, and color-mask
//! state into pipelines, so the dynamic state the trait exposes is
//! resolved through a pipeline cache keyed on that state per program.

use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::device::{
    BlendConfig, BlendFactor, BlendOp, DeviceError, GpuDevice, ProgramDesc, ProgramId,
    StencilMode, TextureFormat, TextureId, UniformKind, UniformValue,
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

struct Program {
    desc: ProgramDesc,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_shadow: Vec<u8>,
    offsets: FxHashMap<&'static str, (usize, UniformKind)>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    width: u32,
    height: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: u32,
    blend: BlendConfig,
    depth_test: bool,
    stencil: StencilMode,
    color_mask: bool,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    programs: Vec<Program>,
    textures: FxHashMap<u32, TextureEntry>,
    next_texture: u32,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    blend: BlendConfig,
    depth_test: bool,
    stencil: StencilMode,
    color_mask: bool,
}

impl WgpuDevice {
    /// Brings up a headless device on any available adapter.
    pub fn new(width: u32, height: u32) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or(DeviceError::AdapterUnavailable)?;
        tracing::info!(adapter = ?adapter.get_info().name, "gpu adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("kanva device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::DeviceRequest(e.to_string()))?;

        let (target, target_view) = Self::create_target(&device, width, height);
        let depth_view = Self::create_depth(&device, width, height);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kanva sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            device,
            queue,
            target,
            target_view,
            depth_view,
            sampler,
            width,
            height,
            programs: Vec::new(),
            textures: FxHashMap::default(),
            next_texture: 0,
            pipelines: FxHashMap::default(),
            blend: BlendConfig::premultiplied_over(),
            depth_test: false,
            stencil: StencilMode::Disabled,
            color_mask: true,
        })
    }

    fn create_target(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kanva target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        (target, view)
    }

    fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kanva depth-stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        depth.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// The render target, for embedding the canvas in a larger frame.
    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    fn uniform_layout(decls: &[crate::device::UniformDecl]) -> (usize, FxHashMap<&'static str, (usize, UniformKind)>) {
        let mut offsets = FxHashMap::default();
        let mut cursor = 0usize;
        for decl in decls {
            let (align, size) = match decl.kind {
                UniformKind::F32 => (4, 4),
                UniformKind::Vec2 => (8, 8),
                UniformKind::Vec4 => (16, 16),
                UniformKind::Mat3 => (16, 48),
            };
            cursor = (cursor + align - 1) / align * align;
            offsets.insert(decl.name, (cursor, decl.kind));
            cursor += size;
        }
        let total = (cursor + 15) / 16 * 16;
        (total.max(16), offsets)
    }

    fn write_uniform(shadow: &mut [u8], offset: usize, value: &UniformValue) {
        match value {
            UniformValue::F32(v) => {
                shadow[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(v));
            }
            UniformValue::Vec2(v) => {
                shadow[offset..offset + 8].copy_from_slice(bytemuck::cast_slice(v));
            }
            UniformValue::Vec4(v) => {
                shadow[offset..offset + 16].copy_from_slice(bytemuck::cast_slice(v));
            }
            UniformValue::Mat3(v) => {
                // Each mat3 column pads out to a vec4 slot.
                for col in 0..3 {
                    let dst = offset + col * 16;
                    shadow[dst..dst + 12]
                        .copy_from_slice(bytemuck::cast_slice(&v[col * 3..col * 3 + 3]));
                }
            }
        }
    }

    fn wgpu_blend(config: BlendConfig) -> wgpu::BlendState {
        let factor = |f: BlendFactor| match f {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        };
        let op = |o: BlendOp| match o {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        };
        wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: factor(config.color_src),
                dst_factor: factor(config.color_dst),
                operation: op(config.color_op),
            },
            alpha: wgpu::BlendComponent {
                src_factor: factor(config.alpha_src),
                dst_factor: factor(config.alpha_dst),
                operation: op(config.alpha_op),
            },
        }
    }

    fn stencil_face(mode: StencilMode) -> wgpu::StencilFaceState {
        match mode {
            StencilMode::Disabled => wgpu::StencilFaceState::IGNORE,
            StencilMode::WriteReplace => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Replace,
            },
            StencilMode::WriteInvert => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Invert,
            },
            StencilMode::TestEqualOne => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
        }
    }

    fn pipeline_for(&mut self, key: PipelineKey) -> &wgpu::RenderPipeline {
        let program = &self.programs[key.program as usize];
        let device = &self.device;
        self.pipelines.entry(key).or_insert_with(|| {
            let stride = program.desc.floats_per_instance as u64 * 4;
            let attributes: Vec<wgpu::VertexAttribute> = (0..program.desc.floats_per_instance / 4)
                .map(|i| wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: i as u64 * 16,
                    shader_location: i,
                })
                .collect();
            let (write_stencil, read_stencil) = match key.stencil {
                StencilMode::Disabled => (0, 0),
                StencilMode::WriteReplace | StencilMode::WriteInvert => (0xff, 0),
                StencilMode::TestEqualOne => (0, 0xff),
            };
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.desc.label),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: stride,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(Self::wgpu_blend(key.blend)),
                        write_mask: if key.color_mask {
                            wgpu::ColorWrites::ALL
                        } else {
                            wgpu::ColorWrites::empty()
                        },
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: key.depth_test,
                    depth_compare: if key.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState {
                        front: Self::stencil_face(key.stencil),
                        back: Self::stencil_face(key.stencil),
                        read_mask: read_stencil,
                        write_mask: write_stencil,
                    },
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn clear_pass(
        &mut self,
        color: Option<wgpu::Color>,
        depth: bool,
        stencil: bool,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("clear") });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match color {
                            Some(c) => wgpu::LoadOp::Clear(c),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: if stencil {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    fn upload_texture(&self, entry: &TextureEntry, data: &[u8]) {
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(entry.width * entry.format.bytes_per_pixel()),
                rows_per_image: Some(entry.height),
            },
            wgpu::Extent3d {
                width: entry.width,
                height: entry.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl GpuDevice for WgpuDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader.into()),
            });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        if desc.texture_slots > 0 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float {
                        filterable: desc.texture_filtering,
                    },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            if desc.texture_filtering {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }
        }
        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.label),
                    entries: &entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let (size, offsets) = Self::uniform_layout(desc.uniforms);
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Program {
            desc: *desc,
            module,
            bind_group_layout,
            pipeline_layout,
            uniform_buffer,
            uniform_shadow: vec![0; size],
            offsets,
        });
        Ok(id)
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), DeviceError> {
        let prog = &mut self.programs[program.0 as usize];
        let (offset, kind) = *prog.offsets.get(name).ok_or_else(|| {
            DeviceError::UnknownUniform {
                program: prog.desc.label,
                name: name.to_owned(),
            }
        })?;
        let matches = matches!(
            (&value, kind),
            (UniformValue::F32(_), UniformKind::F32)
                | (UniformValue::Vec2(_), UniformKind::Vec2)
                | (UniformValue::Vec4(_), UniformKind::Vec4)
                | (UniformValue::Mat3(_), UniformKind::Mat3)
        );
        if !matches {
            return Err(DeviceError::UniformShape {
                name: name.to_owned(),
            });
        }
        Self::write_uniform(&mut prog.uniform_shadow, offset, &value);
        self.queue
            .write_buffer(&prog.uniform_buffer, 0, &prog.uniform_shadow);
        Ok(())
    }

    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureId, DeviceError> {
        let expected = (width * height * format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(DeviceError::BadTextureData {
                got: data.len(),
                expected,
            });
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kanva image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::texture_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let entry = TextureEntry {
            texture,
            view,
            format,
            width,
            height,
        };
        self.upload_texture(&entry, data);
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id.0, entry);
        Ok(id)
    }

    fn update_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), DeviceError> {
        let entry = self
            .textures
            .get(&texture.0)
            .ok_or(DeviceError::UnknownTexture)?;
        let expected = (entry.width * entry.height * entry.format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(DeviceError::BadTextureData {
                got: data.len(),
                expected,
            });
        }
        self.upload_texture(entry, data);
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture.0);
    }

    fn set_blend(&mut self, blend: BlendConfig) {
        self.blend = blend;
    }

    fn set_color_mask(&mut self, enabled: bool) {
        self.color_mask = enabled;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_stencil(&mut self, mode: StencilMode) {
        self.stencil = mode;
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.clear_pass(
            Some(wgpu::Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            }),
            false,
            false,
        );
    }

    fn clear_depth(&mut self) {
        self.clear_pass(None, true, false);
    }

    fn clear_stencil(&mut self) {
        self.clear_pass(None, false, true);
    }

    fn viewport(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        let (target, view) = Self::create_target(&self.device, width, height);
        self.target = target;
        self.target_view = view;
        self.depth_view = Self::create_depth(&self.device, width, height);
    }

    fn draw_instanced(
        &mut self,
        program: ProgramId,
        texture: Option<TextureId>,
        data: &[f32],
        instances: u32,
    ) -> Result<(), DeviceError> {
        let stride = self.programs[program.0 as usize].desc.floats_per_instance;
        if data.len() != (stride * instances) as usize {
            return Err(DeviceError::BadInstanceStream {
                len: data.len(),
                stride,
            });
        }
        if instances == 0 {
            return Ok(());
        }

        let key = PipelineKey {
            program: program.0,
            blend: self.blend,
            depth_test: self.depth_test,
            stencil: self.stencil,
            color_mask: self.color_mask,
        };
        self.pipeline_for(key);

        // Stream buffer lives for this one draw.
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kanva instances"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let prog = &self.programs[program.0 as usize];
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: prog.uniform_buffer.as_entire_binding(),
        }];
        if prog.desc.texture_slots > 0 {
            let entry = texture
                .and_then(|t| self.textures.get(&t.0))
                .ok_or(DeviceError::UnknownTexture)?;
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&entry.view),
            });
            if prog.desc.texture_filtering {
                entries.push(wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                });
            }
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(prog.desc.label),
            layout: &prog.bind_group_layout,
            entries: &entries,
        });

        let pipeline = &self.pipelines[&key];
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(prog.desc.label),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(prog.desc.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_stencil_reference(1);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..4, 0..instances);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError> {
        let bytes_per_row = (width * 4 + 255) / 256 * 256;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kanva readback"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| DeviceError::Readback(e.to_string()))?
            .map_err(|e| DeviceError::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            out.extend_from_slice(&mapped[start..start + (width * 4) as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(out)
    }
}
