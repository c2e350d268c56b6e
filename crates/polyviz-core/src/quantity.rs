//! Quantity trait and related types.
//!
//! A [`Quantity`] represents data associated with a structure, such as scalar values,
//! vector fields, or colors.

use std::any::Any;

use serde::{Deserialize, Serialize};

/// The kind of quantity (for categorization and UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityKind {
    /// Scalar values (single float per element).
    Scalar,
    /// Vector values (Vec3 per element).
    Vector,
    /// Color values (RGB per element).
    Color,
    /// Other/custom quantity type.
    Other,
}

impl QuantityKind {
    /// Dominant quantities replace the base color of their structure, so at
    /// most one of them is shown at a time.
    pub fn is_dominant(self) -> bool {
        matches!(self, Self::Scalar | Self::Color)
    }
}

/// How the values of a scalar quantity are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Ordinary continuous data.
    #[default]
    Standard,
    /// Continuous data symmetric about zero.
    Symmetric,
    /// Non-negative continuous data such as lengths.
    Magnitude,
    /// Integer labels without an order.
    Categorical,
}

impl DataType {
    /// Returns true for label-valued data.
    pub fn is_categorical(self) -> bool {
        self == Self::Categorical
    }

    /// Returns true for the continuous kinds.
    pub fn is_continuous(self) -> bool {
        !self.is_categorical()
    }

    /// Short name used in UI labels.
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Symmetric => "symmetric",
            Self::Magnitude => "magnitude",
            Self::Categorical => "categorical",
        }
    }
}

/// How isolines are drawn over a scalar colormap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IsolineStyle {
    /// Alternating darkened stripes.
    #[default]
    Stripe,
    /// Thin contour lines.
    Contour,
}

impl IsolineStyle {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Contour => "contour",
        }
    }
}

/// Data associated with a structure that can be visualized.
///
/// Quantities are attached to structures and represent data like:
/// - Scalar fields (temperature, labels, etc.)
/// - Vector fields (velocity, tangents, etc.)
/// - Colors
pub trait Quantity: Any + Send + Sync {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the name of this quantity.
    fn name(&self) -> &str;

    /// Returns the name of the parent structure.
    fn structure_name(&self) -> &str;

    /// Returns the kind of this quantity.
    fn kind(&self) -> QuantityKind;

    /// Returns whether this quantity is currently enabled/visible.
    fn is_enabled(&self) -> bool;

    /// Sets the enabled state of this quantity.
    fn set_enabled(&mut self, enabled: bool);

    /// Drops built GPU programs; data buffers are kept.
    fn refresh(&mut self);

    /// Returns the number of data elements.
    fn data_size(&self) -> usize;

    /// Display name, e.g. `"temperature (node scalar)"`.
    fn nice_name(&self) -> String {
        self.name().to_string()
    }
}
