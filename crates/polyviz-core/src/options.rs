//! Configuration options for polyviz.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::quantity::DataType;

/// Viewer-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Log filter used by `init_logging` when `RUST_LOG` is unset.
    pub verbosity: String,

    /// Colormap for standard scalar data.
    pub default_colormap: String,

    /// Colormap for symmetric scalar data.
    pub default_symmetric_colormap: String,

    /// Colormap for magnitude scalar data.
    pub default_magnitude_colormap: String,

    /// Colormap for categorical scalar data.
    pub default_categorical_colormap: String,

    /// Material assigned to new structures.
    pub default_material: String,

    /// Curve radius, relative to the structure length scale.
    pub default_radius: f32,

    /// Base color of new curve networks.
    pub default_curve_color: Vec3,

    /// Background color.
    pub background_color: Vec3,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
            default_colormap: "viridis".to_string(),
            default_symmetric_colormap: "coolwarm".to_string(),
            default_magnitude_colormap: "blues".to_string(),
            default_categorical_colormap: "hsv".to_string(),
            default_material: "clay".to_string(),
            default_radius: 0.005,
            default_curve_color: Vec3::new(0.2, 0.5, 0.8),
            background_color: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Options {
    /// The default colormap for a scalar data type.
    pub fn colormap_for(&self, data_type: DataType) -> &str {
        match data_type {
            DataType::Standard => &self.default_colormap,
            DataType::Symmetric => &self.default_symmetric_colormap,
            DataType::Magnitude => &self.default_magnitude_colormap,
            DataType::Categorical => &self.default_categorical_colormap,
        }
    }

    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
