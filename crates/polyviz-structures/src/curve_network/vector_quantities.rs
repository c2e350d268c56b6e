//! Vector quantities drawn from curve network nodes or edge midpoints.

use egui::Ui;
use glam::Vec3;
use polyviz_core::{QuantityKind, Result};
use polyviz_render::{Engine, ProgramState, RenderResult, ShaderProgram, RAYCAST_VECTOR};
use polyviz_ui::{build_vector_quantity_ui, InfoRow};

use super::geometry::CurveNetworkGeometry;
use super::quantity::{impl_curve_network_quantity, CurveNetworkQuantity, QuantityBase};
use crate::vector_quantity::{VectorQuantity, VectorType};

/// Where the arrows of a vector quantity start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorBase {
    Nodes,
    EdgeCenters,
}

fn create_vector_program(
    vectors: &VectorQuantity,
    parent: &CurveNetworkGeometry,
    engine: &mut dyn Engine,
) -> RenderResult<Vec<Box<dyn ShaderProgram>>> {
    let material = parent.material().to_string();
    let rules = engine.add_material_rules(&material, vectors.add_vector_rules(Vec::new()))?;
    let mut program = engine.request_shader(RAYCAST_VECTOR, &rules)?;
    engine.set_material(program.as_mut(), &material)?;
    Ok(vec![program])
}

fn draw_vectors(
    base: &mut QuantityBase,
    vectors: &mut VectorQuantity,
    origin: VectorBase,
    parent: &mut CurveNetworkGeometry,
    engine: &mut dyn Engine,
) -> RenderResult<()> {
    if !base.is_enabled() {
        return Ok(());
    }
    base.programs
        .ensure_built(|| create_vector_program(vectors, parent, engine))?;

    let length_scale = parent.length_scale();
    for program in base.programs.programs_mut() {
        let program = program.as_mut();
        parent.set_structure_uniforms(program, engine)?;
        match origin {
            VectorBase::Nodes => {
                parent.fill_node_position_buffer(program, "a_vector_base", engine)?;
            }
            VectorBase::EdgeCenters => {
                parent.fill_edge_center_buffer(program, "a_vector_base", engine)?;
            }
        }
        program.set_attribute(
            "a_vector",
            vectors.vectors_mut().get_render_attribute_buffer(engine)?,
        )?;
        vectors.set_vector_uniforms(program, length_scale)?;
        engine.set_material_uniforms(program)?;
    }
    base.programs.draw_all()
}

fn build_vector_ui(base: &mut QuantityBase, vectors: &mut VectorQuantity, ui: &mut Ui) -> bool {
    let mut enabled = base.is_enabled();
    let mut ui_state = vectors.to_ui_state();
    let changed = build_vector_quantity_ui(ui, &base.name, &mut enabled, &mut ui_state);
    if changed {
        if enabled != base.is_enabled() {
            base.enabled.set(enabled);
        }
        vectors.apply_ui_state(&ui_state);
    }
    changed
}

/// A vector per node, drawn from the node position.
pub struct CurveNodeVectorQuantity {
    base: QuantityBase,
    vectors: VectorQuantity,
}

impl CurveNodeVectorQuantity {
    pub fn new(
        parent: &CurveNetworkGeometry,
        name: &str,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Self {
        let prefix = parent.quantity_prefix(name);
        Self {
            base: QuantityBase::new(parent, name),
            vectors: VectorQuantity::new(parent.state(), &prefix, vectors, vector_type),
        }
    }

    pub fn vectors(&self) -> &VectorQuantity {
        &self.vectors
    }

    /// Length, radius and color settings.
    pub fn vectors_mut(&mut self) -> &mut VectorQuantity {
        &mut self.vectors
    }

    pub fn update_data(&mut self, vectors: Vec<Vec3>) -> Result<()> {
        self.vectors.update_data(vectors)
    }
}

impl_curve_network_quantity!(
    CurveNodeVectorQuantity,
    QuantityKind::Vector,
    "node vector",
    |q| q.vectors.vectors().len()
);

impl CurveNetworkQuantity for CurveNodeVectorQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        draw_vectors(
            &mut self.base,
            &mut self.vectors,
            VectorBase::Nodes,
            parent,
            engine,
        )
    }

    fn node_info(&mut self, node: usize) -> RenderResult<Option<InfoRow>> {
        let vector = self.vectors.get_value(node)?;
        Ok(Some(InfoRow::vec3(&self.base.name, vector)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, _available_colormaps: &[&str]) -> bool {
        build_vector_ui(&mut self.base, &mut self.vectors, ui)
    }

    fn program_state(&self) -> ProgramState {
        self.base.programs.state()
    }

    fn program_build_count(&self) -> u64 {
        self.base.programs.build_count()
    }
}

/// A vector per edge, drawn from the edge midpoint.
pub struct CurveEdgeVectorQuantity {
    base: QuantityBase,
    vectors: VectorQuantity,
}

impl CurveEdgeVectorQuantity {
    pub fn new(
        parent: &CurveNetworkGeometry,
        name: &str,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Self {
        let prefix = parent.quantity_prefix(name);
        Self {
            base: QuantityBase::new(parent, name),
            vectors: VectorQuantity::new(parent.state(), &prefix, vectors, vector_type),
        }
    }

    pub fn vectors(&self) -> &VectorQuantity {
        &self.vectors
    }

    pub fn vectors_mut(&mut self) -> &mut VectorQuantity {
        &mut self.vectors
    }

    pub fn update_data(&mut self, vectors: Vec<Vec3>) -> Result<()> {
        self.vectors.update_data(vectors)
    }
}

impl_curve_network_quantity!(
    CurveEdgeVectorQuantity,
    QuantityKind::Vector,
    "edge vector",
    |q| q.vectors.vectors().len()
);

impl CurveNetworkQuantity for CurveEdgeVectorQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        draw_vectors(
            &mut self.base,
            &mut self.vectors,
            VectorBase::EdgeCenters,
            parent,
            engine,
        )
    }

    fn edge_info(&mut self, edge: usize) -> RenderResult<Option<InfoRow>> {
        let vector = self.vectors.get_value(edge)?;
        Ok(Some(InfoRow::vec3(&self.base.name, vector)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, _available_colormaps: &[&str]) -> bool {
        build_vector_ui(&mut self.base, &mut self.vectors, ui)
    }

    fn program_state(&self) -> ProgramState {
        self.base.programs.state()
    }

    fn program_build_count(&self) -> u64 {
        self.base.programs.build_count()
    }
}

#[cfg(test)]
mod tests {
    use polyviz_core::{Quantity, ViewerState};
    use polyviz_render::MockEngine;

    use super::*;

    fn path() -> CurveNetworkGeometry {
        CurveNetworkGeometry::new(
            &ViewerState::default(),
            "path",
            vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
            &[[0, 1], [1, 2]],
        )
        .unwrap()
    }

    #[test]
    fn test_edge_vectors_start_at_edge_centers() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let vectors = vec![Vec3::Y, Vec3::Y];
        let mut q = CurveEdgeVectorQuantity::new(&parent, "v", vectors, VectorType::Standard);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        let program = &q.base.programs.programs()[0];
        assert_eq!(program.program_name(), "RAYCAST_VECTOR");
        let bases = program.attribute("a_vector_base").unwrap().read::<Vec3>().unwrap();
        assert_eq!(bases, vec![Vec3::new(0.5, 0.0, 0.0), Vec3::new(1.5, 0.0, 0.0)]);
        assert_eq!(engine.stats().draw_calls, 1);
        assert_eq!(q.kind(), QuantityKind::Vector);
        assert_eq!(q.nice_name(), "v (edge vector)");
    }

    #[test]
    fn test_node_vectors_use_length_scale() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveNodeVectorQuantity::new(
            &parent,
            "v",
            vec![Vec3::Y * 2.0, Vec3::Y, Vec3::ZERO],
            VectorType::Standard,
        );
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        let program = &q.base.programs.programs()[0];
        let mult = program.uniform("u_lengthMult").unwrap().as_float().unwrap();
        // 0.02 * length scale 2 / max length 2
        assert!((mult - 0.02).abs() < 1e-6);
        assert_eq!(q.node_info(1).unwrap().unwrap().value, "<0, 1, 0>");
        assert!(q.edge_info(0).unwrap().is_none());
    }
}
