//! Color quantities on curve network nodes and edges.

use egui::Ui;
use glam::Vec3;
use polyviz_core::{QuantityKind, Result};
use polyviz_render::{Engine, ManagedBuffer, ProgramState, RenderResult};
use polyviz_ui::{build_color_quantity_ui, InfoRow};

use super::geometry::CurveNetworkGeometry;
use super::quantity::{
    draw_edge_node_programs, impl_curve_network_quantity, request_edge_node_programs,
    CurveNetworkQuantity, QuantityBase, ReductionInputs, EDGE_PROGRAM,
};
use crate::color_quantity::ColorQuantity;
use crate::reduction;

fn build_color_ui(base: &mut QuantityBase, num_colors: usize, ui: &mut Ui) -> bool {
    let mut enabled = base.is_enabled();
    let changed = build_color_quantity_ui(ui, &base.name, &mut enabled, num_colors);
    if enabled != base.is_enabled() {
        base.enabled.set(enabled);
    }
    changed
}

/// A color per node, blended along edges.
pub struct CurveNodeColorQuantity {
    base: QuantityBase,
    colors: ColorQuantity,
}

impl CurveNodeColorQuantity {
    pub fn new(parent: &CurveNetworkGeometry, name: &str, colors: Vec<Vec3>) -> Self {
        Self {
            base: QuantityBase::new(parent, name),
            colors: ColorQuantity::new(&parent.quantity_prefix(name), colors),
        }
    }

    pub fn colors(&self) -> &[Vec3] {
        self.colors.colors().data()
    }

    pub fn update_data(&mut self, colors: Vec<Vec3>) -> Result<()> {
        self.colors.update_data(colors)
    }
}

impl_curve_network_quantity!(
    CurveNodeColorQuantity,
    QuantityKind::Color,
    "node color",
    |q| q.colors.colors().len()
);

impl CurveNetworkQuantity for CurveNodeColorQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        if !self.base.is_enabled() {
            return Ok(());
        }

        let Self { base, colors } = self;
        base.programs.ensure_built(|| {
            request_edge_node_programs(
                parent,
                engine,
                "CYLINDER_PROPAGATE_BLEND_COLOR",
                "SPHERE_PROPAGATE_COLOR",
                |rules| colors.add_color_rules(rules),
            )
        })?;

        draw_edge_node_programs(
            &mut base.programs,
            parent,
            engine,
            |slot, program, parent, engine| {
                let buffer = colors.colors_mut();
                if slot == EDGE_PROGRAM {
                    let tails = buffer
                        .get_indexed_render_attribute_buffer(engine, parent.edge_tail_inds_mut())?;
                    let tips = buffer
                        .get_indexed_render_attribute_buffer(engine, parent.edge_tip_inds_mut())?;
                    program.set_attribute("a_color_tail", tails)?;
                    program.set_attribute("a_color_tip", tips)
                } else {
                    program.set_attribute("a_color", buffer.get_render_attribute_buffer(engine)?)
                }
            },
        )
    }

    fn node_info(&mut self, node: usize) -> RenderResult<Option<InfoRow>> {
        let color = self.colors.get_value(node)?;
        Ok(Some(InfoRow::vec3(&self.base.name, color)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, _available_colormaps: &[&str]) -> bool {
        let num_colors = self.colors.colors().len();
        build_color_ui(&mut self.base, num_colors, ui)
    }

    fn program_state(&self) -> ProgramState {
        self.base.programs.state()
    }

    fn program_build_count(&self) -> u64 {
        self.base.programs.build_count()
    }
}

/// A color per edge. Nodes show the mean color of their incident edges.
pub struct CurveEdgeColorQuantity {
    base: QuantityBase,
    colors: ColorQuantity,
    node_average_colors: ManagedBuffer<Vec3>,
    reduced_from: Option<ReductionInputs>,
}

impl CurveEdgeColorQuantity {
    pub fn new(parent: &CurveNetworkGeometry, name: &str, colors: Vec<Vec3>) -> Self {
        let prefix = parent.quantity_prefix(name);
        Self {
            base: QuantityBase::new(parent, name),
            colors: ColorQuantity::new(&prefix, colors),
            node_average_colors: ManagedBuffer::new(
                format!("{prefix}nodeAverageColors"),
                Vec::new(),
            ),
            reduced_from: None,
        }
    }

    pub fn colors(&self) -> &[Vec3] {
        self.colors.colors().data()
    }

    pub fn node_average_colors(&self) -> &[Vec3] {
        self.node_average_colors.data()
    }

    /// Replaces the edge colors. Node colors are averaged again on the next draw.
    pub fn update_data(&mut self, colors: Vec<Vec3>) -> Result<()> {
        self.colors.update_data(colors)
    }

    /// True if the edge colors or edge indices changed since the last reduction.
    pub fn node_averages_stale(&self, parent: &CurveNetworkGeometry) -> bool {
        self.reduced_from != Some(ReductionInputs::of(self.colors.colors(), parent))
    }

    pub fn update_node_average_colors(
        &mut self,
        parent: &mut CurveNetworkGeometry,
    ) -> RenderResult<()> {
        parent.ensure_edge_indices_populated()?;
        self.colors.colors_mut().ensure_host_buffer_populated()?;

        let averages = reduction::node_mean(
            parent.n_nodes(),
            parent.edge_tail_inds(),
            parent.edge_tip_inds(),
            self.colors.colors().data(),
        );
        self.node_average_colors.set_data(averages);
        self.reduced_from = Some(ReductionInputs::of(self.colors.colors(), parent));
        Ok(())
    }
}

impl_curve_network_quantity!(
    CurveEdgeColorQuantity,
    QuantityKind::Color,
    "edge color",
    |q| q.colors.colors().len()
);

impl CurveNetworkQuantity for CurveEdgeColorQuantity {
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        if !self.base.is_enabled() {
            return Ok(());
        }
        if self.node_averages_stale(parent) || !self.base.programs.is_built() {
            self.update_node_average_colors(parent)?;
        }

        let Self {
            base,
            colors,
            node_average_colors,
            ..
        } = self;
        base.programs.ensure_built(|| {
            request_edge_node_programs(
                parent,
                engine,
                "CYLINDER_PROPAGATE_COLOR",
                "SPHERE_PROPAGATE_COLOR",
                |rules| colors.add_color_rules(rules),
            )
        })?;

        draw_edge_node_programs(
            &mut base.programs,
            parent,
            engine,
            |slot, program, _, engine| {
                let buffer = if slot == EDGE_PROGRAM {
                    colors.colors_mut().get_render_attribute_buffer(engine)?
                } else {
                    node_average_colors.get_render_attribute_buffer(engine)?
                };
                program.set_attribute("a_color", buffer)
            },
        )
    }

    fn edge_info(&mut self, edge: usize) -> RenderResult<Option<InfoRow>> {
        let color = self.colors.get_value(edge)?;
        Ok(Some(InfoRow::vec3(&self.base.name, color)))
    }

    fn build_custom_ui(&mut self, ui: &mut Ui, _available_colormaps: &[&str]) -> bool {
        let num_colors = self.colors.colors().len();
        build_color_ui(&mut self.base, num_colors, ui)
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
    fn test_node_colors_blend_along_edges() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveNodeColorQuantity::new(&parent, "c", vec![Vec3::X, Vec3::Y, Vec3::Z]);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        let programs = q.base.programs.programs();
        assert_eq!(
            programs[EDGE_PROGRAM].rules()[..2],
            ["CYLINDER_PROPAGATE_BLEND_COLOR", "SHADE_COLOR"]
        );
        let tips = programs[EDGE_PROGRAM]
            .attribute("a_color_tip")
            .unwrap()
            .read::<Vec3>()
            .unwrap();
        assert_eq!(tips, vec![Vec3::Y, Vec3::Z]);
        assert_eq!(q.nice_name(), "c (node color)");
        assert_eq!(q.node_info(0).unwrap().unwrap().value, "<1, 0, 0>");
    }

    #[test]
    fn test_edge_colors_are_averaged_onto_nodes() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeColorQuantity::new(&parent, "c", vec![Vec3::X, Vec3::Y]);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        assert_eq!(
            q.node_average_colors(),
            &[Vec3::X, Vec3::new(0.5, 0.5, 0.0), Vec3::Y]
        );
        let programs = q.base.programs.programs();
        assert_eq!(programs[0].rules()[0], "CYLINDER_PROPAGATE_COLOR");
        assert_eq!(programs[1].rules()[0], "SPHERE_PROPAGATE_COLOR");
        assert_eq!(engine.stats().draw_calls, 2);

        assert!(q.update_data(vec![Vec3::ZERO]).is_err());
        q.update_data(vec![Vec3::Z, Vec3::Z]).unwrap();
        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.node_average_colors(), &[Vec3::Z; 3]);
    }

    #[test]
    fn test_edge_color_in_place_edit_reduces_again() {
        let mut parent = path();
        let mut engine = MockEngine::new();
        let mut q = CurveEdgeColorQuantity::new(&parent, "c", vec![Vec3::X, Vec3::Y]);
        q.set_enabled(true);
        q.draw(&mut parent, &mut engine).unwrap();

        let colors = q.colors.colors_mut();
        colors.data_mut().unwrap()[1] = Vec3::X;
        colors.mark_host_buffer_updated();
        q.draw(&mut parent, &mut engine).unwrap();
        assert_eq!(q.node_average_colors(), &[Vec3::X; 3]);
    }
}
