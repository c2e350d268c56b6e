//! Lengths that are either absolute or relative to a structure's length scale.

use serde::{Deserialize, Serialize};

/// A length that may be expressed relative to some reference scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledValue {
    value: f32,
    relative: bool,
}

impl ScaledValue {
    /// A value multiplied by the reference scale when resolved.
    pub fn relative(value: f32) -> Self {
        Self {
            value,
            relative: true,
        }
    }

    /// A value used as is.
    pub fn absolute(value: f32) -> Self {
        Self {
            value,
            relative: false,
        }
    }

    pub fn new(value: f32, relative: bool) -> Self {
        Self { value, relative }
    }

    /// Resolves against a reference scale.
    pub fn get(&self, reference_scale: f32) -> f32 {
        if self.relative {
            self.value * reference_scale
        } else {
            self.value
        }
    }

    /// The stored value, before scaling.
    pub fn raw(&self) -> f32 {
        self.value
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }
}

impl Default for ScaledValue {
    fn default() -> Self {
        Self::relative(1.0)
    }
}
