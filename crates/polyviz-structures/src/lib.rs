//! Structure implementations for polyviz.
//!
//! This crate provides:
//! - [`CurveNetwork`], a set of nodes joined by edges, drawn as spheres and cylinders
//! - Six quantity variants: scalar, color and vector data on nodes or edges
//! - The value stores those quantities compose ([`ScalarQuantity`], [`ColorQuantity`],
//!   [`VectorQuantity`])
//! - The edge to node reduction used to show edge data on nodes

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod color_quantity;
pub mod curve_network;
pub mod reduction;
pub mod scalar_quantity;
pub mod vector_quantity;

pub use color_quantity::ColorQuantity;
pub use curve_network::{
    CurveEdgeColorQuantity, CurveEdgeScalarQuantity, CurveEdgeVectorQuantity, CurveNetwork,
    CurveNetworkGeometry, CurveNetworkQuantity, CurveNodeColorQuantity, CurveNodeScalarQuantity,
    CurveNodeVectorQuantity,
};
pub use scalar_quantity::ScalarQuantity;
pub use vector_quantity::{VectorQuantity, VectorType};
