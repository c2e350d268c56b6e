//! polyviz: curve network quantity rendering.
//!
//! Register curve networks on a [`Viewer`], attach scalar, color or vector data to
//! their nodes or edges, and draw frames through an [`Engine`]. Shader programs are
//! composed from named rules and built lazily; attribute data lives in
//! [`ManagedBuffer`]s that upload to the device only after they change.
//!
//! # Quick Start
//!
//! ```
//! use polyviz::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut viewer = Viewer::headless();
//!     let nodes = vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)];
//!     let network = viewer.register_curve_network_line("path", nodes)?;
//!     network
//!         .add_edge_scalar_quantity("length", vec![1.0, 1.0], DataType::Standard)?
//!         .set_enabled(true);
//!
//!     viewer.fit_camera(16.0 / 9.0);
//!     assert_eq!(viewer.draw_frame(), 0);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - A **structure** is a geometric object in the scene. Here that is a [`CurveNetwork`].
//! - A **quantity** is data associated with a structure. Enabling a scalar or color
//!   quantity replaces the structure's base color; vector quantities draw on top.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod viewer;

pub use viewer::Viewer;

// Re-export core types
pub use polyviz_core::{
    DataType, IsolineStyle, Options, PersistentCache, PolyvizError, Quantity, QuantityKind,
    Registry, Result, ScaledValue, Structure, ViewerState,
};
pub use polyviz_core::{Mat4, Vec2, Vec3, Vec4};

// Re-export render types
pub use polyviz_render::{
    ColorMap, Engine, EngineStats, ManagedBuffer, Material, MockEngine, ProgramState,
    RenderError, RenderResult, ShaderProgram, ShaderRule, WgpuEngine,
};

// Re-export structures
pub use polyviz_structures::{
    CurveEdgeColorQuantity, CurveEdgeScalarQuantity, CurveEdgeVectorQuantity, CurveNetwork,
    CurveNetworkQuantity, CurveNodeColorQuantity, CurveNodeScalarQuantity,
    CurveNodeVectorQuantity, VectorType,
};

/// Initializes `env_logger` at the default verbosity.
///
/// `RUST_LOG` overrides the level. Calling this more than once is harmless.
pub fn init_logging() {
    init_logging_with(&Options::default());
}

/// Initializes `env_logger`, using `options.verbosity` when `RUST_LOG` is unset.
pub fn init_logging_with(options: &Options) {
    let env = env_logger::Env::default().default_filter_or(options.verbosity.as_str());
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::info!("polyviz logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        init_logging_with(&Options {
            verbosity: "debug".to_string(),
            ..Options::default()
        });
    }
}
