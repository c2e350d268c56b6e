//! The rendering engine interface.
//!
//! Structures and quantities talk to the GPU only through these traits:
//! - [`Engine`] composes programs and creates attribute buffers
//! - [`ShaderProgram`] is a composed program with its bindings
//! - [`AttributeBuffer`] is a device-side array of one element type
//!
//! Program bindings are validated on the host against the composed declarations,
//! so binding mistakes surface as [`RenderError`]s on every backend.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Mat4;

use crate::color_maps::{ColorMap, ColorMapRegistry};
use crate::error::{RenderError, RenderResult};
use crate::materials::MaterialRegistry;
use crate::shader::{ComposedProgram, ShaderRegistry};
use crate::types::{BufferElement, RenderDataType, TextureData, UniformValue};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique id for a new buffer.
pub fn next_buffer_id() -> u64 {
    NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)
}

/// A device-side array of elements of one [`RenderDataType`].
pub trait AttributeBuffer: Send + Sync {
    /// Process-unique id, stable for the lifetime of the buffer.
    fn id(&self) -> u64;

    fn label(&self) -> &str;

    fn data_type(&self) -> RenderDataType;

    /// Number of elements currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the contents with `len` tightly packed host elements.
    fn write_bytes(&self, bytes: &[u8], len: usize);

    /// Reads the contents back as tightly packed host elements.
    fn read_bytes(&self) -> RenderResult<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn AttributeBuffer {
    fn check_type<T: BufferElement>(&self) -> RenderResult<()> {
        if self.data_type() == T::DATA_TYPE {
            Ok(())
        } else {
            Err(RenderError::AttributeTypeMismatch {
                name: self.label().to_string(),
                expected: self.data_type(),
                actual: T::DATA_TYPE,
            })
        }
    }

    /// Uploads typed data.
    pub fn write<T: BufferElement>(&self, data: &[T]) -> RenderResult<()> {
        self.check_type::<T>()?;
        self.write_bytes(bytemuck::cast_slice(data), data.len());
        Ok(())
    }

    /// Reads typed data back.
    pub fn read<T: BufferElement>(&self) -> RenderResult<Vec<T>> {
        self.check_type::<T>()?;
        let bytes = self.read_bytes()?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

/// Uniform, attribute and texture values bound to one composed program.
pub struct ProgramBindings {
    composed: Arc<ComposedProgram>,
    uniforms: HashMap<String, UniformValue>,
    attributes: HashMap<String, Arc<dyn AttributeBuffer>>,
    textures: HashMap<String, Arc<TextureData>>,
    texture_generation: u64,
}

impl ProgramBindings {
    pub fn new(composed: Arc<ComposedProgram>) -> Self {
        Self {
            composed,
            uniforms: HashMap::new(),
            attributes: HashMap::new(),
            textures: HashMap::new(),
            texture_generation: 0,
        }
    }

    pub fn composed(&self) -> &ComposedProgram {
        &self.composed
    }

    pub fn composed_arc(&self) -> &Arc<ComposedProgram> {
        &self.composed
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> RenderResult<()> {
        let spec = self
            .composed
            .uniform(name)
            .ok_or_else(|| RenderError::UnknownUniform {
                program: self.composed.program_name.clone(),
                name: name.to_string(),
            })?;
        if spec.data_type != value.data_type() {
            return Err(RenderError::UniformTypeMismatch {
                name: name.to_string(),
                expected: spec.data_type,
                actual: value.data_type(),
            });
        }
        self.uniforms.insert(name.to_string(), value);
        Ok(())
    }

    pub fn set_attribute(
        &mut self,
        name: &str,
        buffer: Arc<dyn AttributeBuffer>,
    ) -> RenderResult<()> {
        let spec = self
            .composed
            .attribute(name)
            .ok_or_else(|| RenderError::UnknownAttribute {
                program: self.composed.program_name.clone(),
                name: name.to_string(),
            })?;
        if spec.data_type != buffer.data_type() {
            return Err(RenderError::AttributeTypeMismatch {
                name: name.to_string(),
                expected: spec.data_type,
                actual: buffer.data_type(),
            });
        }
        self.attributes.insert(name.to_string(), buffer);
        Ok(())
    }

    pub fn set_texture(&mut self, name: &str, texture: Arc<TextureData>) -> RenderResult<()> {
        if self.composed.texture(name).is_none() {
            return Err(RenderError::UnknownTexture {
                program: self.composed.program_name.clone(),
                name: name.to_string(),
            });
        }
        self.textures.insert(name.to_string(), texture);
        self.texture_generation += 1;
        Ok(())
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<dyn AttributeBuffer>> {
        self.attributes.get(name)
    }

    pub fn texture(&self, name: &str) -> Option<&Arc<TextureData>> {
        self.textures.get(name)
    }

    /// Bumped on every texture change so backends know when to re-upload.
    pub fn texture_generation(&self) -> u64 {
        self.texture_generation
    }

    /// Checks that every declaration is bound and that all attributes have the
    /// same length. Returns the instance count.
    pub fn validate_for_draw(&self) -> RenderResult<usize> {
        let program = &self.composed.program_name;
        let missing = |kind: &'static str, name: &str| RenderError::MissingBinding {
            program: program.clone(),
            kind,
            name: name.to_string(),
        };

        for spec in &self.composed.uniforms {
            if !self.uniforms.contains_key(&spec.name) {
                return Err(missing("uniform", &spec.name));
            }
        }
        for spec in &self.composed.textures {
            if !self.textures.contains_key(&spec.name) {
                return Err(missing("texture", &spec.name));
            }
        }

        let mut count = None;
        for spec in &self.composed.attributes {
            let buffer = self
                .attributes
                .get(&spec.name)
                .ok_or_else(|| missing("attribute", &spec.name))?;
            match count {
                None => count = Some(buffer.len()),
                Some(expected) if expected != buffer.len() => {
                    return Err(RenderError::AttributeLengthMismatch {
                        name: spec.name.clone(),
                        expected,
                        actual: buffer.len(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(count.unwrap_or(1))
    }

    /// Uniform values packed into the program's uniform block layout.
    pub fn pack_uniforms(&self) -> Vec<u8> {
        let layout = self.composed.uniform_layout();
        let mut bytes = vec![0u8; layout.size];
        for slot in &layout.slots {
            if let Some(value) = self.uniforms.get(&slot.name) {
                let raw = value.to_bytes();
                bytes[slot.offset..slot.offset + raw.len()].copy_from_slice(&raw);
            }
        }
        bytes
    }
}

/// A composed program owned by a quantity or structure.
pub trait ShaderProgram: Send + Sync {
    fn bindings(&self) -> &ProgramBindings;

    fn bindings_mut(&mut self) -> &mut ProgramBindings;

    /// Draws all instances with the current bindings.
    fn draw(&mut self) -> RenderResult<()>;

    fn as_any(&self) -> &dyn Any;

    fn composed(&self) -> &ComposedProgram {
        self.bindings().composed()
    }

    fn program_name(&self) -> &str {
        &self.composed().program_name
    }

    fn rules(&self) -> &[String] {
        &self.composed().rules
    }

    fn has_uniform(&self, name: &str) -> bool {
        self.composed().uniform(name).is_some()
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.composed().attribute(name).is_some()
    }

    fn has_texture(&self, name: &str) -> bool {
        self.composed().texture(name).is_some()
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> RenderResult<()> {
        self.bindings_mut().set_uniform(name, value)
    }

    fn set_attribute(&mut self, name: &str, buffer: Arc<dyn AttributeBuffer>) -> RenderResult<()> {
        self.bindings_mut().set_attribute(name, buffer)
    }

    fn set_texture(&mut self, name: &str, texture: Arc<TextureData>) -> RenderResult<()> {
        self.bindings_mut().set_texture(name, texture)
    }

    /// Binds a color map as a 1D lookup texture.
    fn set_texture_from_colormap(&mut self, name: &str, color_map: &ColorMap) -> RenderResult<()> {
        self.set_texture(name, Arc::new(color_map.texture_data()))
    }

    fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.bindings().uniform(name)
    }

    fn attribute(&self, name: &str) -> Option<Arc<dyn AttributeBuffer>> {
        self.bindings().attribute(name).cloned()
    }

    fn texture(&self, name: &str) -> Option<Arc<TextureData>> {
        self.bindings().texture(name).cloned()
    }
}

/// Work counters shared between an engine and the objects it hands out.
#[derive(Debug, Default)]
pub struct EngineCounters {
    programs_requested: AtomicU64,
    buffers_created: AtomicU64,
    buffer_uploads: AtomicU64,
    buffer_readbacks: AtomicU64,
    draw_calls: AtomicU64,
}

impl EngineCounters {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_program_request(&self) {
        self.programs_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buffer_created(&self) {
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self) {
        self.buffer_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_readback(&self) {
        self.buffer_readbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw(&self) {
        self.draw_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot; `programs_compiled` comes from the shader registry.
    pub fn snapshot(&self, programs_compiled: u64) -> EngineStats {
        EngineStats {
            programs_requested: self.programs_requested.load(Ordering::Relaxed),
            programs_compiled,
            buffers_created: self.buffers_created.load(Ordering::Relaxed),
            buffer_uploads: self.buffer_uploads.load(Ordering::Relaxed),
            buffer_readbacks: self.buffer_readbacks.load(Ordering::Relaxed),
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
        }
    }
}

/// Work done by an engine since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Programs handed out, cache hits included.
    pub programs_requested: u64,
    /// Distinct compositions performed.
    pub programs_compiled: u64,
    pub buffers_created: u64,
    pub buffer_uploads: u64,
    pub buffer_readbacks: u64,
    pub draw_calls: u64,
}

impl EngineStats {
    /// Work done between `earlier` and `self`.
    #[must_use]
    pub fn since(&self, earlier: &EngineStats) -> EngineStats {
        EngineStats {
            programs_requested: self.programs_requested - earlier.programs_requested,
            programs_compiled: self.programs_compiled - earlier.programs_compiled,
            buffers_created: self.buffers_created - earlier.buffers_created,
            buffer_uploads: self.buffer_uploads - earlier.buffer_uploads,
            buffer_readbacks: self.buffer_readbacks - earlier.buffer_readbacks,
            draw_calls: self.draw_calls - earlier.draw_calls,
        }
    }
}

/// A rendering backend.
pub trait Engine {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    fn shader_registry(&self) -> &ShaderRegistry;

    fn shader_registry_mut(&mut self) -> &mut ShaderRegistry;

    /// Composes `program` with `rules` and returns a new program instance.
    fn request_shader(
        &mut self,
        program: &str,
        rules: &[String],
    ) -> RenderResult<Box<dyn ShaderProgram>>;

    /// Creates an empty device buffer.
    fn generate_attribute_buffer(
        &mut self,
        data_type: RenderDataType,
        label: &str,
    ) -> Arc<dyn AttributeBuffer>;

    fn materials(&self) -> &MaterialRegistry;

    fn materials_mut(&mut self) -> &mut MaterialRegistry;

    fn color_maps(&self) -> &ColorMapRegistry;

    fn color_maps_mut(&mut self) -> &mut ColorMapRegistry;

    fn set_camera(&mut self, view: Mat4, projection: Mat4);

    fn view_matrix(&self) -> Mat4;

    fn projection_matrix(&self) -> Mat4;

    fn exposure(&self) -> f32 {
        1.0
    }

    fn stats(&self) -> EngineStats;

    fn color_map(&self, name: &str) -> RenderResult<&ColorMap> {
        self.color_maps()
            .get(name)
            .ok_or_else(|| RenderError::UnknownColorMap(name.to_string()))
    }

    /// Appends the lighting rule for `material`.
    fn add_material_rules(
        &self,
        material: &str,
        mut rules: Vec<String>,
    ) -> RenderResult<Vec<String>> {
        let mat = self
            .materials()
            .get(material)
            .ok_or_else(|| RenderError::UnknownMaterial(material.to_string()))?;
        rules.push(if mat.is_flat {
            "LIGHT_PASSTHRU".to_string()
        } else {
            "LIGHT_MATCAP".to_string()
        });
        Ok(rules)
    }

    /// Binds the matcap textures of `material` if the program samples them.
    fn set_material(&self, program: &mut dyn ShaderProgram, material: &str) -> RenderResult<()> {
        if !program.has_texture("t_mat_r") {
            return Ok(());
        }
        let matcap = self
            .materials()
            .matcap(material)
            .ok_or_else(|| RenderError::UnknownMaterial(material.to_string()))?;
        program.set_texture("t_mat_r", Arc::clone(&matcap.r))?;
        program.set_texture("t_mat_g", Arc::clone(&matcap.g))?;
        program.set_texture("t_mat_b", Arc::clone(&matcap.b))?;
        program.set_texture("t_mat_k", Arc::clone(&matcap.k))?;
        Ok(())
    }

    /// Per-frame lighting uniforms.
    fn set_material_uniforms(&self, program: &mut dyn ShaderProgram) -> RenderResult<()> {
        if program.has_uniform("u_exposure") {
            program.set_uniform("u_exposure", UniformValue::Float(self.exposure()))?;
        }
        Ok(())
    }
}
