//! Rendering error types.

use thiserror::Error;

use crate::types::RenderDataType;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No program template registered under this name.
    #[error("no shader program with name [{0}] registered")]
    UnknownShaderProgram(String),

    /// No shader rule registered under this name.
    #[error("no shader replacement rule with name [{0}] registered")]
    UnknownShaderRule(String),

    /// The same rule appears twice in one request.
    #[error("shader rule [{rule}] requested more than once for program [{program}]")]
    DuplicateShaderRule { program: String, rule: String },

    /// Two rules declare the same name with different types.
    #[error("conflicting declarations of [{name}]: {existing:?} vs {requested:?}")]
    ConflictingDeclaration {
        name: String,
        existing: RenderDataType,
        requested: RenderDataType,
    },

    /// The program does not declare this attribute.
    #[error("program [{program}] has no attribute [{name}]")]
    UnknownAttribute { program: String, name: String },

    /// The program does not declare this uniform.
    #[error("program [{program}] has no uniform [{name}]")]
    UnknownUniform { program: String, name: String },

    /// The program does not declare this texture.
    #[error("program [{program}] has no texture [{name}]")]
    UnknownTexture { program: String, name: String },

    /// A uniform was set with a value of the wrong type.
    #[error("uniform [{name}] expects {expected:?}, got {actual:?}")]
    UniformTypeMismatch {
        name: String,
        expected: RenderDataType,
        actual: RenderDataType,
    },

    /// An attribute buffer has the wrong element type.
    #[error("attribute [{name}] expects {expected:?}, got {actual:?}")]
    AttributeTypeMismatch {
        name: String,
        expected: RenderDataType,
        actual: RenderDataType,
    },

    /// A declared binding was never set before drawing.
    #[error("program [{program}] drawn without {kind} [{name}] set")]
    MissingBinding {
        program: String,
        kind: &'static str,
        name: String,
    },

    /// Attributes of one program have different element counts.
    #[error("attribute [{name}] has {actual} elements, expected {expected}")]
    AttributeLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Reading a buffer whose host copy is stale and which has no device copy.
    #[error("buffer [{0}] read before any data was populated")]
    BufferNotPopulated(String),

    /// An index points outside the buffer it indexes.
    #[error("index {index} out of range for buffer [{buffer}] of length {len}")]
    IndexOutOfRange {
        buffer: String,
        index: usize,
        len: usize,
    },

    /// No color map registered under this name.
    #[error("no color map with name [{0}] registered")]
    UnknownColorMap(String),

    /// No material registered under this name.
    #[error("no material with name [{0}] registered")]
    UnknownMaterial(String),

    /// Failed to load a material image.
    #[error("material load error: {0}")]
    MaterialLoad(String),

    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// A buffer created by another engine was bound to a program.
    #[error("buffer [{0}] belongs to a different engine")]
    ForeignBuffer(String),

    /// Mapping a buffer for readback failed.
    #[error("buffer readback failed: {0}")]
    ReadbackFailed(String),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for polyviz_core::PolyvizError {
    fn from(err: RenderError) -> Self {
        Self::RenderError(err.to_string())
    }
}
