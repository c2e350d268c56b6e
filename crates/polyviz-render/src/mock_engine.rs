//! Headless engine without a GPU.
//!
//! Buffers live in host memory, programs are composed but not compiled, and draws
//! only validate bindings. Every operation is counted in [`EngineStats`], which
//! makes this engine the backbone of the test suites.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Mat4;

use crate::color_maps::ColorMapRegistry;
use crate::engine::{
    next_buffer_id, AttributeBuffer, Engine, EngineCounters, EngineStats, ProgramBindings,
    ShaderProgram,
};
use crate::error::RenderResult;
use crate::materials::MaterialRegistry;
use crate::shader::{ComposedProgram, ShaderRegistry};
use crate::types::RenderDataType;

#[derive(Debug, Default)]
struct MockBufferState {
    bytes: Vec<u8>,
    len: usize,
}

/// An attribute buffer stored in host memory.
pub struct MockAttributeBuffer {
    id: u64,
    label: String,
    data_type: RenderDataType,
    state: Mutex<MockBufferState>,
    counters: Arc<EngineCounters>,
}

impl MockAttributeBuffer {
    pub fn new(data_type: RenderDataType, label: &str, counters: Arc<EngineCounters>) -> Self {
        counters.record_buffer_created();
        Self {
            id: next_buffer_id(),
            label: label.to_string(),
            data_type,
            state: Mutex::new(MockBufferState::default()),
            counters,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockBufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttributeBuffer for MockAttributeBuffer {
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
        self.state().len
    }

    fn write_bytes(&self, bytes: &[u8], len: usize) {
        let mut state = self.state();
        state.bytes.clear();
        state.bytes.extend_from_slice(bytes);
        state.len = len;
        self.counters.record_upload();
    }

    fn read_bytes(&self) -> RenderResult<Vec<u8>> {
        self.counters.record_readback();
        Ok(self.state().bytes.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A composed program that validates its bindings on draw.
pub struct MockShaderProgram {
    bindings: ProgramBindings,
    counters: Arc<EngineCounters>,
    draw_count: u64,
    last_instance_count: Option<usize>,
}

impl MockShaderProgram {
    pub fn new(composed: Arc<ComposedProgram>, counters: Arc<EngineCounters>) -> Self {
        Self {
            bindings: ProgramBindings::new(composed),
            counters,
            draw_count: 0,
            last_instance_count: None,
        }
    }

    /// Number of successful draws of this program.
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// Instance count of the most recent successful draw.
    pub fn last_instance_count(&self) -> Option<usize> {
        self.last_instance_count
    }
}

impl ShaderProgram for MockShaderProgram {
    fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut ProgramBindings {
        &mut self.bindings
    }

    fn draw(&mut self) -> RenderResult<()> {
        let instances = self.bindings.validate_for_draw()?;
        self.counters.record_draw();
        self.draw_count += 1;
        self.last_instance_count = Some(instances);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Headless engine that records work instead of doing it.
pub struct MockEngine {
    shader_registry: ShaderRegistry,
    materials: MaterialRegistry,
    color_maps: ColorMapRegistry,
    counters: Arc<EngineCounters>,
    view: Mat4,
    projection: Mat4,
    exposure: f32,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            shader_registry: ShaderRegistry::new(),
            materials: MaterialRegistry::new(),
            color_maps: ColorMapRegistry::new(),
            counters: EngineCounters::shared(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            exposure: 1.0,
        }
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }
}

impl Engine for MockEngine {
    fn backend_name(&self) -> &'static str {
        "mock"
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
        self.counters.record_program_request();
        Ok(Box::new(MockShaderProgram::new(
            composed,
            Arc::clone(&self.counters),
        )))
    }

    fn generate_attribute_buffer(
        &mut self,
        data_type: RenderDataType,
        label: &str,
    ) -> Arc<dyn AttributeBuffer> {
        Arc::new(MockAttributeBuffer::new(
            data_type,
            label,
            Arc::clone(&self.counters),
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
        self.counters.snapshot(self.shader_registry.compose_count())
    }
}
