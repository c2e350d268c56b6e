//! wgpu backend.
//!
//! Composed programs become render pipelines (cached by composition key). Attribute
//! buffers are storage buffers read by vertex pulling. A program's `draw` validates
//! and snapshots its bindings into a bind group and queues the draw; queued draws
//! are replayed in order by [`WgpuEngine::render_queued`] inside one render pass.

use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Mat4;

use crate::buffer::{
    create_linear_sampler, create_storage_buffer, create_uniform_buffer, map_and_copy,
    pad_to_storage, read_buffer, unpad_from_storage, upload_texture,
};
use crate::color_maps::ColorMapRegistry;
use crate::engine::{
    next_buffer_id, AttributeBuffer, Engine, EngineCounters, EngineStats, ProgramBindings,
    ShaderProgram,
};
use crate::error::{RenderError, RenderResult};
use crate::materials::MaterialRegistry;
use crate::shader::{ComposedProgram, ShaderRegistry};
use crate::types::RenderDataType;

/// Color target format of all pipelines.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Depth target format of all pipelines.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct DrawCommand {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: wgpu::BindGroup,
    vertex_count: u32,
    instance_count: u32,
}

/// Device state shared by the engine, its buffers and its programs.
struct WgpuShared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    counters: Arc<EngineCounters>,
    draw_queue: Mutex<Vec<DrawCommand>>,
    sampler: wgpu::Sampler,
}

struct WgpuBufferState {
    buffer: Arc<wgpu::Buffer>,
    len: usize,
}

/// A storage buffer on the device.
pub struct WgpuAttributeBuffer {
    id: u64,
    label: String,
    data_type: RenderDataType,
    shared: Arc<WgpuShared>,
    state: Mutex<WgpuBufferState>,
}

impl WgpuAttributeBuffer {
    fn new(shared: Arc<WgpuShared>, data_type: RenderDataType, label: &str) -> Self {
        let buffer = create_storage_buffer(&shared.device, &[], Some(label));
        shared.counters.record_buffer_created();
        Self {
            id: next_buffer_id(),
            label: label.to_string(),
            data_type,
            shared,
            state: Mutex::new(WgpuBufferState {
                buffer: Arc::new(buffer),
                len: 0,
            }),
        }
    }

    /// Current device buffer. Replaced when a write outgrows it.
    pub fn raw(&self) -> Arc<wgpu::Buffer> {
        Arc::clone(&lock(&self.state).buffer)
    }
}

impl AttributeBuffer for WgpuAttributeBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn data_type(&self) -> RenderDataType {
        self.data_type
    }

    fn len(&self) -> usize {
        lock(&self.state).len
    }

    fn write_bytes(&self, bytes: &[u8], len: usize) {
        let padded = pad_to_storage(bytes, self.data_type, len);
        let mut state = lock(&self.state);
        if padded.len() as u64 > state.buffer.size() {
            state.buffer = Arc::new(create_storage_buffer(
                &self.shared.device,
                &padded,
                Some(&self.label),
            ));
        } else if !padded.is_empty() {
            self.shared.queue.write_buffer(&state.buffer, 0, &padded);
        }
        state.len = len;
        self.shared.counters.record_upload();
    }

    fn read_bytes(&self) -> RenderResult<Vec<u8>> {
        let (buffer, len) = {
            let state = lock(&self.state);
            (Arc::clone(&state.buffer), state.len)
        };
        self.shared.counters.record_readback();
        let size = (len * self.data_type.storage_stride()) as u64;
        let bytes = read_buffer(&self.shared.device, &self.shared.queue, &buffer, size)?;
        Ok(unpad_from_storage(&bytes, self.data_type, len))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A composed program backed by a render pipeline.
pub struct WgpuProgram {
    bindings: ProgramBindings,
    shared: Arc<WgpuShared>,
    pipeline: Arc<wgpu::RenderPipeline>,
    layout: Arc<wgpu::BindGroupLayout>,
    texture_views: HashMap<String, wgpu::TextureView>,
    uploaded_generation: Option<u64>,
}

impl WgpuProgram {
    fn sync_textures(&mut self) {
        let generation = self.bindings.texture_generation();
        if self.uploaded_generation == Some(generation) {
            return;
        }
        self.texture_views.clear();
        for spec in &self.bindings.composed().textures {
            if let Some(data) = self.bindings.texture(&spec.name) {
                let texture =
                    upload_texture(&self.shared.device, &self.shared.queue, &spec.name, data);
                self.texture_views.insert(
                    spec.name.clone(),
                    texture.create_view(&wgpu::TextureViewDescriptor::default()),
                );
            }
        }
        self.uploaded_generation = Some(generation);
    }
}

impl ShaderProgram for WgpuProgram {
    fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut ProgramBindings {
        &mut self.bindings
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw(&mut self) -> RenderResult<()> {
        let instances = self.bindings.validate_for_draw()?;
        if instances == 0 {
            return Ok(());
        }
        self.sync_textures();

        let composed = self.bindings.composed();
        let uniform_buffer = create_uniform_buffer(
            &self.shared.device,
            &self.bindings.pack_uniforms(),
            Some(&composed.program_name),
        );

        let mut storage = Vec::with_capacity(composed.attributes.len());
        for spec in &composed.attributes {
            let bound = self
                .bindings
                .attribute(&spec.name)
                .ok_or_else(|| RenderError::MissingBinding {
                    program: composed.program_name.clone(),
                    kind: "attribute",
                    name: spec.name.clone(),
                })?;
            let buffer = bound
                .as_any()
                .downcast_ref::<WgpuAttributeBuffer>()
                .ok_or_else(|| RenderError::ForeignBuffer(bound.label().to_string()))?;
            storage.push(buffer.raw());
        }

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        let mut binding = 1;
        for buffer in &storage {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
            binding += 1;
        }
        for spec in &composed.textures {
            let view = self
                .texture_views
                .get(&spec.name)
                .ok_or_else(|| RenderError::MissingBinding {
                    program: composed.program_name.clone(),
                    kind: "texture",
                    name: spec.name.clone(),
                })?;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(&self.shared.sampler),
            });
            binding += 2;
        }

        let bind_group = self
            .shared
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&composed.program_name),
                layout: &self.layout,
                entries: &entries,
            });

        lock(&self.shared.draw_queue).push(DrawCommand {
            pipeline: Arc::clone(&self.pipeline),
            bind_group,
            vertex_count: composed.vertices_per_instance,
            instance_count: instances as u32,
        });
        self.shared.counters.record_draw();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CachedPipeline {
    pipeline: Arc<wgpu::RenderPipeline>,
    layout: Arc<wgpu::BindGroupLayout>,
}

/// Engine rendering through wgpu.
pub struct WgpuEngine {
    shared: Arc<WgpuShared>,
    shader_registry: ShaderRegistry,
    materials: MaterialRegistry,
    color_maps: ColorMapRegistry,
    pipelines: HashMap<String, CachedPipeline>,
    view: Mat4,
    projection: Mat4,
    exposure: f32,
}

impl WgpuEngine {
    /// Creates an engine on an existing device.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = create_linear_sampler(&device);
        Self {
            shared: Arc::new(WgpuShared {
                device,
                queue,
                counters: EngineCounters::shared(),
                draw_queue: Mutex::new(Vec::new()),
                sampler,
            }),
            shader_registry: ShaderRegistry::new(),
            materials: MaterialRegistry::new(),
            color_maps: ColorMapRegistry::new(),
            pipelines: HashMap::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            exposure: 1.0,
        }
    }

    /// Creates a headless engine on the best available adapter.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("polyviz device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!("wgpu engine on {}", adapter.get_info().name);
        Ok(Self::from_device(device, queue))
    }

    /// Blocking version of [`Self::new_headless`].
    pub fn new_headless_blocking() -> RenderResult<Self> {
        pollster::block_on(Self::new_headless())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.shared.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.shared.queue
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    /// Number of draws waiting for [`Self::render_queued`].
    pub fn queued_draws(&self) -> usize {
        lock(&self.shared.draw_queue).len()
    }

    fn pipeline_for(&mut self, composed: &ComposedProgram) -> &CachedPipeline {
        let device = &self.shared.device;
        self.pipelines
            .entry(composed.key.clone())
            .or_insert_with(|| create_pipeline(device, composed))
    }

    /// Replays and clears queued draws into one render pass.
    pub fn render_queued(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        clear: Option<wgpu::Color>,
    ) {
        let commands = std::mem::take(&mut *lock(&self.shared.draw_queue));
        let (color_load, depth_load) = match clear {
            Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Structure Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        for command in &commands {
            render_pass.set_pipeline(&command.pipeline);
            render_pass.set_bind_group(0, &command.bind_group, &[]);
            render_pass.draw(0..command.vertex_count, 0..command.instance_count);
        }
    }

    /// Renders queued draws into an offscreen target and returns RGBA pixels.
    pub fn render_offscreen(
        &self,
        width: u32,
        height: u32,
        background: glam::Vec3,
    ) -> RenderResult<Vec<f32>> {
        let device = &self.shared.device;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("offscreen encoder"),
        });
        self.render_queued(
            &mut encoder,
            &color_view,
            &depth_view,
            Some(wgpu::Color {
                r: f64::from(background.x),
                g: f64::from(background.y),
                b: f64::from(background.z),
                a: 1.0,
            }),
        );

        // 4 channels * 2 bytes per f16, rows aligned for the copy
        let row_bytes = width * 8;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let bytes_per_row = row_bytes.div_ceil(align) * align;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen readback"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            size,
        );
        self.shared.queue.submit(std::iter::once(encoder.finish()));

        let data = map_and_copy(device, &staging)?;
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            let end = start + row_bytes as usize;
            pixels.extend(
                data[start..end]
                    .chunks_exact(2)
                    .map(|c| half::f16::from_le_bytes([c[0], c[1]]).to_f32()),
            );
        }
        Ok(pixels)
    }
}

fn create_pipeline(device: &wgpu::Device, composed: &ComposedProgram) -> CachedPipeline {
    let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    let uniform_size = composed.uniform_layout().size as u64;

    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: stages,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(uniform_size),
        },
        count: None,
    }];
    let mut binding = 1;
    for _ in &composed.attributes {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: stages,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        binding += 1;
    }
    for _ in &composed.textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        binding += 2;
    }

    let label = composed.key.as_str();
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(composed.full_source().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    log::debug!("compiled pipeline {label}");
    CachedPipeline {
        pipeline: Arc::new(pipeline),
        layout: Arc::new(bind_group_layout),
    }
}

impl Engine for WgpuEngine {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn shader_registry(&self) -> &ShaderRegistry {
        &self.shader_registry
    }

    fn shader_registry_mut(&mut self) -> &mut ShaderRegistry {
        &mut self.shader_registry
    }

    fn request_shader(
        &mut self,
        program: &str,
        rules: &[String],
    ) -> RenderResult<Box<dyn ShaderProgram>> {
        let composed = self.shader_registry.compose(program, rules)?;
        self.shared.counters.record_program_request();
        let cached = self.pipeline_for(&composed);
        let (pipeline, layout) = (Arc::clone(&cached.pipeline), Arc::clone(&cached.layout));
        Ok(Box::new(WgpuProgram {
            bindings: ProgramBindings::new(composed),
            shared: Arc::clone(&self.shared),
            pipeline,
            layout,
            texture_views: HashMap::new(),
            uploaded_generation: None,
        }))
    }

    fn generate_attribute_buffer(
        &mut self,
        data_type: RenderDataType,
        label: &str,
    ) -> Arc<dyn AttributeBuffer> {
        Arc::new(WgpuAttributeBuffer::new(
            Arc::clone(&self.shared),
            data_type,
            label,
        ))
    }

    fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    fn materials_mut(&mut self) -> &mut MaterialRegistry {
        &mut self.materials
    }

    fn color_maps(&self) -> &ColorMapRegistry {
        &self.color_maps
    }

    fn color_maps_mut(&mut self) -> &mut ColorMapRegistry {
        &mut self.color_maps
    }

    fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn exposure(&self) -> f32 {
        self.exposure
    }

    fn stats(&self) -> EngineStats {
        self.shared
            .counters
            .snapshot(self.shader_registry.compose_count())
    }
}
