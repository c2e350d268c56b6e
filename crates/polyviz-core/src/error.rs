//! Error types for polyviz.

use thiserror::Error;

/// The main error type for polyviz operations.
#[derive(Error, Debug)]
pub enum PolyvizError {
    /// A structure with the given name already exists.
    #[error("structure '{0}' already exists")]
    StructureExists(String),

    /// A structure with the given name was not found.
    #[error("structure '{0}' not found")]
    StructureNotFound(String),

    /// A quantity with the given name was not found.
    #[error("quantity '{0}' not found on structure '{1}'")]
    QuantityNotFound(String, String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// An edge references a node that does not exist.
    #[error("edge {edge} references node {node}, but the network has {n_nodes} nodes")]
    InvalidEdge {
        edge: usize,
        node: u32,
        n_nodes: usize,
    },

    /// Rendering error, including shader composition and buffer state errors.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for polyviz operations.
pub type Result<T> = std::result::Result<T, PolyvizError>;
