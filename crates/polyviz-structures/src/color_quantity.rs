//! Per-element RGB colors.

use glam::Vec3;
use polyviz_core::{PolyvizError, Result};
use polyviz_render::{ManagedBuffer, RenderResult};

/// Color values shared by every color quantity type.
#[derive(Debug)]
pub struct ColorQuantity {
    colors: ManagedBuffer<Vec3>,
}

impl ColorQuantity {
    pub fn new(prefix: &str, colors: Vec<Vec3>) -> Self {
        Self {
            colors: ManagedBuffer::new(format!("{prefix}colors"), colors),
        }
    }

    pub fn colors(&self) -> &ManagedBuffer<Vec3> {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut ManagedBuffer<Vec3> {
        &mut self.colors
    }

    /// Appends the rule that shades with a per-fragment color.
    pub fn add_color_rules(&self, mut rules: Vec<String>) -> Vec<String> {
        rules.push("SHADE_COLOR".to_string());
        rules
    }

    pub fn get_value(&mut self, index: usize) -> RenderResult<Vec3> {
        self.colors.get_value(index)
    }

    /// Replaces the colors. The count must not change.
    pub fn update_data(&mut self, colors: Vec<Vec3>) -> Result<()> {
        if colors.len() != self.colors.len() {
            return Err(PolyvizError::SizeMismatch {
                expected: self.colors.len(),
                actual: colors.len(),
            });
        }
        self.colors.set_data(colors);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_store() {
        let mut c = ColorQuantity::new("q#", vec![Vec3::X, Vec3::Y]);
        assert_eq!(c.add_color_rules(vec!["A".into()]), vec!["A", "SHADE_COLOR"]);
        assert_eq!(c.get_value(1).unwrap(), Vec3::Y);
        assert!(c.update_data(vec![Vec3::Z]).is_err());

        let version = c.colors().version();
        c.update_data(vec![Vec3::Z, Vec3::Z]).unwrap();
        assert!(c.colors().version() > version);
        assert_eq!(c.get_value(0).unwrap(), Vec3::Z);
    }
}
