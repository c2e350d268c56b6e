//! Rendering layer for polyviz.
//!
//! This crate provides:
//! - Managed attribute buffers that keep host and device copies in sync
//! - Shader programs composed from named rules (WGSL templates with insertion tags)
//! - The [`Engine`] interface with a headless [`MockEngine`] and a wgpu backend
//! - Material and color map systems

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Element counts and texture sizes are far below the lossy ranges
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
pub mod color_maps;
pub mod engine;
pub mod error;
pub mod managed_buffer;
pub mod materials;
pub mod mock_engine;
pub mod program_cache;
pub mod rules;
pub mod shader;
pub mod types;
pub mod wgpu_engine;

pub use color_maps::{ColorMap, ColorMapRegistry};
pub use engine::{AttributeBuffer, Engine, EngineStats, ProgramBindings, ShaderProgram};
pub use error::{RenderError, RenderResult};
pub use managed_buffer::ManagedBuffer;
pub use materials::{Material, MaterialRegistry};
pub use mock_engine::{MockEngine, MockShaderProgram};
pub use program_cache::{ProgramCache, ProgramState};
pub use rules::ShaderRule;
pub use shader::{
    ComposedProgram, ProgramTemplate, ShaderRegistry, RAYCAST_CYLINDER, RAYCAST_SPHERE,
    RAYCAST_VECTOR,
};
pub use types::{BufferElement, RenderDataType, TextureData, UniformValue};
pub use wgpu_engine::WgpuEngine;
