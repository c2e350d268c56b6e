//! Per-element vectors drawn as arrows.

use glam::Vec3;
use polyviz_core::{PersistentValue, PolyvizError, Result, ScaledValue, ViewerState};
use polyviz_render::{ManagedBuffer, RenderResult, ShaderProgram};
use polyviz_ui::VectorUiState;

/// How vector lengths are scaled when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorType {
    /// Normalized so the longest vector has the length multiplier's length.
    #[default]
    Standard,
    /// Drawn at their true length.
    Ambient,
}

fn max_length(vectors: &[Vec3]) -> f32 {
    vectors
        .iter()
        .map(|v| v.length())
        .filter(|l| l.is_finite())
        .fold(0.0, f32::max)
}

/// Vectors with their length, radius and color settings.
pub struct VectorQuantity {
    vectors: ManagedBuffer<Vec3>,
    vector_type: VectorType,
    length_mult: PersistentValue<ScaledValue>,
    radius: PersistentValue<ScaledValue>,
    color: PersistentValue<Vec3>,
    max_length: f32,
}

impl VectorQuantity {
    pub fn new(
        state: &ViewerState,
        prefix: &str,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Self {
        let cache = &state.persistent;
        let max_length = max_length(&vectors);
        Self {
            vectors: ManagedBuffer::new(format!("{prefix}vectors"), vectors),
            vector_type,
            length_mult: PersistentValue::new(
                cache,
                format!("{prefix}vectorLengthMult"),
                ScaledValue::relative(0.02),
            ),
            radius: PersistentValue::new(
                cache,
                format!("{prefix}vectorRadius"),
                ScaledValue::relative(0.0025),
            ),
            color: PersistentValue::new(
                cache,
                format!("{prefix}vectorColor"),
                Vec3::new(0.1, 0.1, 0.8),
            ),
            max_length,
        }
    }

    pub fn vectors(&self) -> &ManagedBuffer<Vec3> {
        &self.vectors
    }

    pub fn vectors_mut(&mut self) -> &mut ManagedBuffer<Vec3> {
        &mut self.vectors
    }

    pub fn vector_type(&self) -> VectorType {
        self.vector_type
    }

    /// Length of the longest vector.
    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    /// Appends the rule that shades arrows with the uniform color.
    pub fn add_vector_rules(&self, mut rules: Vec<String>) -> Vec<String> {
        rules.push("SHADE_BASECOLOR".to_string());
        rules
    }

    /// Multiplier applied to every vector before drawing.
    pub fn resolved_length_mult(&self, length_scale: f32) -> f32 {
        match self.vector_type {
            VectorType::Ambient => 1.0,
            VectorType::Standard => {
                let mult = self.length_mult.value().get(length_scale);
                if self.max_length > 0.0 {
                    mult / self.max_length
                } else {
                    mult
                }
            }
        }
    }

    pub fn set_vector_uniforms(
        &self,
        program: &mut dyn ShaderProgram,
        length_scale: f32,
    ) -> RenderResult<()> {
        program.set_uniform("u_lengthMult", self.resolved_length_mult(length_scale).into())?;
        program.set_uniform("u_radius", self.radius.value().get(length_scale).into())?;
        program.set_uniform("u_baseColor", self.color.value().into())?;
        Ok(())
    }

    pub fn get_value(&mut self, index: usize) -> RenderResult<Vec3> {
        self.vectors.get_value(index)
    }

    /// Replaces the vectors. The count must not change.
    pub fn update_data(&mut self, vectors: Vec<Vec3>) -> Result<()> {
        if vectors.len() != self.vectors.len() {
            return Err(PolyvizError::SizeMismatch {
                expected: self.vectors.len(),
                actual: vectors.len(),
            });
        }
        self.max_length = max_length(&vectors);
        self.vectors.set_data(vectors);
        Ok(())
    }

    pub fn length_mult(&self) -> ScaledValue {
        self.length_mult.value()
    }

    pub fn set_length_mult(&mut self, length: f32, is_relative: bool) {
        self.length_mult.set(ScaledValue::new(length, is_relative));
    }

    pub fn radius(&self) -> ScaledValue {
        self.radius.value()
    }

    pub fn set_radius(&mut self, radius: f32, is_relative: bool) {
        self.radius.set(ScaledValue::new(radius, is_relative));
    }

    pub fn color(&self) -> Vec3 {
        self.color.value()
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color.set(color);
    }

    pub fn to_ui_state(&self) -> VectorUiState {
        VectorUiState {
            length: self.length_mult.value().raw(),
            radius: self.radius.value().raw(),
            color: self.color.value().to_array(),
        }
    }

    pub fn apply_ui_state(&mut self, ui_state: &VectorUiState) {
        let length = self.length_mult.value();
        if ui_state.length != length.raw() {
            self.set_length_mult(ui_state.length, length.is_relative());
        }
        let radius = self.radius.value();
        if ui_state.radius != radius.raw() {
            self.set_radius(ui_state.radius, radius.is_relative());
        }
        let color = Vec3::from_array(ui_state.color);
        if color != self.color.value() {
            self.set_color(color);
        }
    }
}

impl std::fmt::Debug for VectorQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorQuantity")
            .field("vectors", &self.vectors)
            .field("vector_type", &self.vector_type)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(vectors: Vec<Vec3>, vector_type: VectorType) -> VectorQuantity {
        VectorQuantity::new(&ViewerState::default(), "v#", vectors, vector_type)
    }

    #[test]
    fn test_standard_vectors_are_normalized() {
        let v = store(vec![Vec3::X * 2.0, Vec3::Y * 4.0], VectorType::Standard);
        assert_eq!(v.max_length(), 4.0);
        // 0.02 * 10 / 4
        assert!((v.resolved_length_mult(10.0) - 0.05).abs() < 1e-6);

        let a = store(vec![Vec3::X * 2.0], VectorType::Ambient);
        assert_eq!(a.resolved_length_mult(10.0), 1.0);
    }

    #[test]
    fn test_update_recomputes_max_length() {
        let mut v = store(vec![Vec3::X], VectorType::Standard);
        v.update_data(vec![Vec3::Z * 3.0]).unwrap();
        assert_eq!(v.max_length(), 3.0);
        assert!(v.update_data(vec![]).is_err());
    }

    #[test]
    fn test_ui_state_keeps_relative_flag() {
        let mut v = store(vec![Vec3::X], VectorType::Standard);
        let mut ui = v.to_ui_state();
        ui.length = 0.1;
        ui.color = [1.0, 0.0, 0.0];
        v.apply_ui_state(&ui);
        assert_eq!(v.length_mult(), ScaledValue::relative(0.1));
        assert_eq!(v.color(), Vec3::X);
        assert_eq!(v.to_ui_state(), ui);
    }
}
