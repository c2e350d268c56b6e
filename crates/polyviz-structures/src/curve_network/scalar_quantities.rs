//! Scalar quantities on curve network nodes and edges.

use egui::Ui;
use polyviz_core::{DataType, QuantityKind, Result};
use polyviz_render::{Engine, ManagedBuffer, ProgramState, RenderResult, ShaderProgram};
use polyviz_ui::{build_scalar_quantity_ui, InfoRow};

use super::geometry::CurveNetworkGeometry;
use super::quantity::{
    draw_edge_node_programs, impl_curve_network_quantity, request_edge_node_programs,
    CurveNetworkQuantity, QuantityBase, ReductionInputs, EDGE_PROGRAM,
};
use crate::reduction;
use crate::scalar_quantity::ScalarQuantity;

fn bind_color_maps(
    scalar: &ScalarQuantity,
    programs: &mut [Box<dyn ShaderProgram>],
    engine: &dyn Engine,
) -> RenderResult<()> {
    for program in programs {
        scalar.set_color_map_texture(program.as_mut(), engine)?;
    }
    Ok(())
}

fn build_scalar_ui(
    base: &mut QuantityBase,
    scalar: &mut ScalarQuantity,
    ui: &mut Ui,
    available_colormaps: &[&str],
) -> bool {
    let mut enabled = base.is_enabled();
    let mut ui_state = scalar.to_ui_state();
    let changed =
        build_scalar_quantity_ui(ui, &base.name, &mut enabled, &mut ui_state, available_colormaps);
    if changed {
        if enabled != base.is_enabled() {
            base.enabled.set(enabled);
        }
        scalar.apply_ui_state(&ui_state);
    }
    changed
}

/// A scalar value per node, interpolated along edges.
pub struct CurveNodeScalarQuantity {
    base: QuantityBase,
    scalar: ScalarQuantity,
}

impl CurveNodeScalarQuantity {
    pub fn new(
        parent: &CurveNetworkGeometry,
        name: &str,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Self {
        let prefix = parent.quantity_prefix(name);
        Self {
            base: QuantityBase::new(parent, name),
            scalar: ScalarQuantity::new(parent.state(), &prefix, values, data_type),
        }
    }

    pub fn scalar(&self) -> &ScalarQuantity {
        &self.scalar
    }

    /// Colormap, range and isoline settings.
    pub fn scalar_mut(&mut self) -> &mut ScalarQuantity {
        &mut self.scalar
    }

    pub fn values(&self) -> &[f32] {
        self.scalar.values().data()
    }

    pub fn update_data(&mut self, values: Vec<f32>) -> Result<()> {
        self.scalar.update_data(values)
    }

    fn create_programs(
        scalar: &ScalarQuantity,
        parent: &CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<Vec<Box<dyn ShaderProgram>>> {
        // Categorical values must not be blended between endpoints
        let edge_rule = if scalar.data_type().is_categorical() {
            "CYLINDER_PROPAGATE_NEAREST_VALUE"
        } else {
            "CYLINDER_PROPAGATE_BLEND_VALUE"
        };
        let mut programs = request_edge_node_programs(
            parent,
            engine,
            edge_rule,
            "SPHERE_PROPAGATE_VALUE",
            |rules| scalar.add_scalar_rules(rules),
        )?;
        bind_color_maps(scalar, &mut programs, engine)?;
        Ok(programs)
    }
}

impl_curve_network_quantity!(
    CurveNodeScalarQuantity,
    QuantityKind::Scalar,
    "node scalar",
    |q| q.scalar.values().len()
);

impl CurveNetworkQuantity for CurveNodeScalarQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        if !self.base.is_enabled() {
            return Ok(());
        }
        if self.scalar.take_rebuild_request() {
            self.base.programs.invalidate();
        }

        let Self { base, scalar } = self;
        base.programs
            .ensure_built(|| Self::create_programs(scalar, parent, engine))?;

        draw_edge_node_programs(
            &mut base.programs,
            parent,
            engine,
            |slot, program, parent, engine| {
                let values = scalar.values_mut();
                if slot == EDGE_PROGRAM {
                    let tails = values
                        .get_indexed_render_attribute_buffer(engine, parent.edge_tail_inds_mut())?;
                    let tips = values
                        .get_indexed_render_attribute_buffer(engine, parent.edge_tip_inds_mut())?;
                    program.set_attribute("a_value_tail", tails)?;
                    program.set_attribute("a_value_tip", tips)?;
                } else {
                    program
                        .set_attribute("a_value", values.get_render_attribute_buffer(engine)?)?;
                }
                scalar.set_scalar_uniforms(program)
            },
        )
    }

    fn node_info(&mut self, node: usize) -> RenderResult<Option<InfoRow>> {
        let value = self.scalar.get_value(node)?;
        Ok(Some(InfoRow::scalar(&self.base.name, value)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, available_colormaps: &[&str]) -> bool {
        build_scalar_ui(&mut self.base, &mut self.scalar, ui, available_colormaps)
    }

    fn program_state(&self) -> ProgramState {
        self.base.programs.state()
    }

    fn program_build_count(&self) -> u64 {
        self.base.programs.build_count()
    }
}

/// A scalar value per edge. Nodes show the reduction of their incident edges.
pub struct CurveEdgeScalarQuantity {
    base: QuantityBase,
    scalar: ScalarQuantity,
    node_average_values: ManagedBuffer<f32>,
    reduced_from: Option<ReductionInputs>,
}

impl CurveEdgeScalarQuantity {
    pub fn new(
        parent: &CurveNetworkGeometry,
        name: &str,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Self {
        let prefix = parent.quantity_prefix(name);
        Self {
            base: QuantityBase::new(parent, name),
            scalar: ScalarQuantity::new(parent.state(), &prefix, values, data_type),
            node_average_values: ManagedBuffer::new(
                format!("{prefix}nodeAverageValues"),
                Vec::new(),
            ),
            reduced_from: None,
        }
    }

    pub fn scalar(&self) -> &ScalarQuantity {
        &self.scalar
    }

    pub fn scalar_mut(&mut self) -> &mut ScalarQuantity {
        &mut self.scalar
    }

    pub fn values(&self) -> &[f32] {
        self.scalar.values().data()
    }

    /// Node values as of the last reduction.
    pub fn node_average_values(&self) -> &[f32] {
        self.node_average_values.data()
    }

    /// Replaces the edge values. Node values are reduced again on the next draw.
    pub fn update_data(&mut self, values: Vec<f32>) -> Result<()> {
        self.scalar.update_data(values)
    }

    /// True if the edge values or edge indices changed since the last reduction.
    pub fn node_averages_stale(&self, parent: &CurveNetworkGeometry) -> bool {
        self.reduced_from != Some(ReductionInputs::of(self.scalar.values(), parent))
    }

    /// Reduces edge values onto nodes: the mode for categorical data, the mean
    /// otherwise.
    pub fn update_node_average_values(
        &mut self,
        parent: &mut CurveNetworkGeometry,
    ) -> RenderResult<()> {
        parent.ensure_edge_indices_populated()?;
        self.scalar.values_mut().ensure_host_buffer_populated()?;

        let n_nodes = parent.n_nodes();
        let tails = parent.edge_tail_inds();
        let tips = parent.edge_tip_inds();
        let values = self.scalar.values().data();
        let averages = if self.scalar.data_type().is_categorical() {
            reduction::node_mode(n_nodes, tails, tips, values)
        } else {
            reduction::node_mean(n_nodes, tails, tips, values)
        };

        self.node_average_values.set_data(averages);
        self.reduced_from = Some(ReductionInputs::of(self.scalar.values(), parent));
        Ok(())
    }

    fn create_programs(
        scalar: &ScalarQuantity,
        parent: &CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<Vec<Box<dyn ShaderProgram>>> {
        let mut programs = request_edge_node_programs(
            parent,
            engine,
            "CYLINDER_PROPAGATE_VALUE",
            "SPHERE_PROPAGATE_VALUE",
            |rules| scalar.add_scalar_rules(rules),
        )?;
        bind_color_maps(scalar, &mut programs, engine)?;
        Ok(programs)
    }
}

impl_curve_network_quantity!(
    CurveEdgeScalarQuantity,
    QuantityKind::Scalar,
    "edge scalar",
    |q| q.scalar.values().len()
);

impl CurveNetworkQuantity for CurveEdgeScalarQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        if !self.base.is_enabled() {
            return Ok(());
        }
        if self.scalar.take_rebuild_request() {
            self.base.programs.invalidate();
        }
        if self.node_averages_stale(parent) || !self.base.programs.is_built() {
            self.update_node_average_values(parent)?;
        }

        let Self {
            base,
            scalar,
            node_average_values,
            ..
        } = self;
        base.programs
            .ensure_built(|| Self::create_programs(scalar, parent, engine))?;

        draw_edge_node_programs(
            &mut base.programs,
            parent,
            engine,
            |slot, program, _, engine| {
                let buffer = if slot == EDGE_PROGRAM {
                    scalar.values_mut().get_render_attribute_buffer(engine)?
                } else {
                    node_average_values.get_render_attribute_buffer(engine)?
                };
                program.set_attribute("a_value", buffer)?;
                scalar.set_scalar_uniforms(program)
            },
        )
    }

    fn edge_info(&mut self, edge: usize) -> RenderResult<Option<InfoRow>> {
        let value = self.scalar.get_value(edge)?;
        Ok(Some(InfoRow::scalar(&self.base.name, value)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, available_colormaps: &[&str]) -> bool {
        build_scalar_ui(&mut self.base, &mut self.scalar, ui, available_colormaps)
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
    use glam::Vec3;
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

    fn node_scalar(parent: &CurveNetworkGeometry, values: Vec<f32>) -> CurveNodeScalarQuantity {
        let mut q = CurveNodeScalarQuantity::new(parent, "t", values, DataType::Standard);
        q.set_enabled(true);
        q
    }

    fn rules(programs: &[Box<dyn ShaderProgram>], slot: usize) -> Vec<String> {
        programs[slot].rules().to_vec()
    }

    #[test]
    fn test_node_scalar_rules() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = node_scalar(&parent, vec![0.0, 1.0, 2.0]);
        q.draw(&mut parent, &mut engine).unwrap();

        let programs = q.base.programs.programs();
        assert_eq!(programs[0].program_name(), "RAYCAST_CYLINDER");
        assert_eq!(programs[1].program_name(), "RAYCAST_SPHERE");
        assert_eq!(
            rules(programs, 0),
            vec![
                "CYLINDER_PROPAGATE_BLEND_VALUE",
                "SHADE_COLORMAP_VALUE",
                "LIGHT_MATCAP",
                "GLOBAL_FRAGMENT_FILTER"
            ]
        );
        assert_eq!(
            rules(programs, 1),
            vec![
                "SPHERE_PROPAGATE_VALUE",
                "SHADE_COLORMAP_VALUE",
                "LIGHT_MATCAP",
                "GLOBAL_FRAGMENT_FILTER"
            ]
        );
        assert_eq!(q.nice_name(), "t (node scalar)");
    }

    #[test]
    fn test_categorical_node_scalar_uses_nearest_value() {
        let mut parent = path();
        parent.set_transparency(0.5);
        let mut engine = MockEngine::new();
        let values = vec![0.0, 1.0, 1.0];
        let mut q = CurveNodeScalarQuantity::new(&parent, "label", values, DataType::Categorical);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        assert_eq!(
            rules(q.base.programs.programs(), 0),
            vec![
                "CYLINDER_PROPAGATE_NEAREST_VALUE",
                "TRANSPARENCY_STRUCTURE",
                "SHADE_CATEGORICAL_COLORMAP",
                "LIGHT_MATCAP",
                "GLOBAL_FRAGMENT_FILTER"
            ]
        );
    }

    #[test]
    fn test_node_values_are_gathered_per_edge() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = node_scalar(&parent, vec![5.0, 6.0, 7.0]);
        q.draw(&mut parent, &mut engine).unwrap();

        let edge = &q.base.programs.programs()[EDGE_PROGRAM];
        let tails = edge.attribute("a_value_tail").unwrap().read::<f32>().unwrap();
        let tips = edge.attribute("a_value_tip").unwrap().read::<f32>().unwrap();
        assert_eq!(tails, vec![5.0, 6.0]);
        assert_eq!(tips, vec![6.0, 7.0]);
        assert_eq!(q.node_info(2).unwrap().unwrap().value, "7");
        assert_eq!(engine.stats().draw_calls, 2);
    }

    #[test]
    fn test_disabled_quantity_builds_nothing() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveNodeScalarQuantity::new(&parent, "t", vec![0.0; 3], DataType::Standard);
        q.draw(&mut parent, &mut engine).unwrap();

        assert_eq!(q.program_state(), ProgramState::Uninitialized);
        assert_eq!(engine.stats().programs_requested, 0);
        assert_eq!(engine.stats().draw_calls, 0);
    }

    #[test]
    fn test_colormap_change_rebuilds_once() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = node_scalar(&parent, vec![0.0, 1.0, 2.0]);
        q.draw(&mut parent, &mut engine).unwrap();
        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.program_build_count(), 1);

        q.scalar_mut().set_color_map("coolwarm");
        q.draw(&mut parent, &mut engine).unwrap();
        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.program_build_count(), 2);
    }

    #[test]
    fn test_redraw_does_not_upload() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = node_scalar(&parent, vec![0.0, 1.0, 2.0]);
        q.draw(&mut parent, &mut engine).unwrap();

        let before = engine.stats();
        q.draw(&mut parent, &mut engine).unwrap();
        let delta = engine.stats().since(&before);
        assert_eq!(delta.buffer_uploads, 0);
        assert_eq!(delta.draw_calls, 2);

        q.update_data(vec![1.0, 1.0, 1.0]).unwrap();
        let before = engine.stats();
        q.draw(&mut parent, &mut engine).unwrap();
        // values plus both gathered views
        assert_eq!(engine.stats().since(&before).buffer_uploads, 3);
    }

    #[test]
    fn test_edge_scalar_node_averages() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeScalarQuantity::new(&parent, "w", vec![2.0, 4.0], DataType::Standard);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        assert_eq!(q.node_average_values(), &[2.0, 3.0, 4.0]);
        let programs = q.base.programs.programs();
        assert_eq!(
            rules(programs, 0),
            vec![
                "CYLINDER_PROPAGATE_VALUE",
                "SHADE_COLORMAP_VALUE",
                "LIGHT_MATCAP",
                "GLOBAL_FRAGMENT_FILTER"
            ]
        );
        let node_values = programs[1].attribute("a_value").unwrap().read::<f32>().unwrap();
        assert_eq!(node_values, vec![2.0, 3.0, 4.0]);
        assert_eq!(q.edge_info(1).unwrap().unwrap().value, "4");
        assert!(q.node_info(0).unwrap().is_none());
    }

    #[test]
    fn test_edge_scalar_update_reduces_again() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeScalarQuantity::new(&parent, "w", vec![2.0, 4.0], DataType::Standard);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        q.update_data(vec![0.0, 8.0]).unwrap();
        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.node_average_values(), &[0.0, 4.0, 8.0]);
        assert_eq!(q.program_build_count(), 1);
    }

    #[test]
    fn test_edge_scalar_in_place_edit_reduces_again() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeScalarQuantity::new(&parent, "w", vec![2.0, 4.0], DataType::Standard);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();
        assert!(!q.node_averages_stale(&parent));

        let values = q.scalar_mut().values_mut();
        values.data_mut().unwrap()[0] = 10.0;
        values.mark_host_buffer_updated();
        assert!(q.node_averages_stale(&parent));

        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.node_average_values(), &[10.0, 7.0, 4.0]);
        let node_values = q.base.programs.programs()[1]
            .attribute("a_value")
            .unwrap()
            .read::<f32>()
            .unwrap();
        assert_eq!(node_values, vec![10.0, 7.0, 4.0]);
        assert_eq!(q.program_build_count(), 1);
    }

    #[test]
    fn test_unchanged_edge_scalar_is_not_reduced_again() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeScalarQuantity::new(&parent, "w", vec![2.0, 4.0], DataType::Standard);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();
        let reduced = q.node_average_values.version();

        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.node_average_values.version(), reduced);
    }

    #[test]
    fn test_categorical_edge_scalar_takes_mode() {
        let mut parent = CurveNetworkGeometry::new(
            &ViewerState::default(),
            "star",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            &[[0, 1], [0, 2], [0, 3]],
        )
        .unwrap();
        let values = vec![3.0, 1.0, 3.0];
        let mut q = CurveEdgeScalarQuantity::new(&parent, "label", values, DataType::Categorical);
        q.update_node_average_values(&mut parent).unwrap();
        assert_eq!(q.node_average_values(), &[3.0, 3.0, 1.0, 3.0]);
    }
}
