//! Core abstractions for polyviz.
//!
//! This crate provides the fundamental traits and types used throughout polyviz:
//! - [`Structure`] trait for geometric objects (curve networks)
//! - [`Quantity`] trait for data associated with structures (scalars, vectors, colors)
//! - The persistent value cache used to remember visualization settings by name
//! - Configuration options and the injected [`ViewerState`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Field names like default_colormap are descriptive
#![allow(clippy::struct_field_names)]

pub mod error;
pub mod options;
pub mod persistent;
pub mod quantity;
pub mod registry;
pub mod scaled_value;
pub mod state;
pub mod structure;

pub use error::{PolyvizError, Result};
pub use options::Options;
pub use persistent::{Persistable, PersistentCache, PersistentValue, SharedPersistentCache};
pub use quantity::{DataType, IsolineStyle, Quantity, QuantityKind};
pub use registry::Registry;
pub use scaled_value::ScaledValue;
pub use state::ViewerState;
pub use structure::Structure;

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
