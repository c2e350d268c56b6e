//! Geometry and appearance of a curve network, shared with its quantities.

use glam::{Mat4, Vec3};
use polyviz_core::{PersistentValue, PolyvizError, Result, ScaledValue, ViewerState};
use polyviz_render::{Engine, ManagedBuffer, RenderResult, ShaderProgram};

use crate::reduction;

/// Node positions, edge indices and the settings every program of the network
/// reads. Quantities receive this as their parent when drawing.
pub struct CurveNetworkGeometry {
    name: String,
    state: ViewerState,

    nodes: ManagedBuffer<Vec3>,
    edge_tail_inds: ManagedBuffer<u32>,
    edge_tip_inds: ManagedBuffer<u32>,

    // Computed geometry
    edge_centers: ManagedBuffer<Vec3>,
    node_degrees: Vec<usize>,
    object_bounds: Option<(Vec3, Vec3)>,

    transform: Mat4,

    // Visualization parameters
    color: PersistentValue<Vec3>,
    radius: PersistentValue<ScaledValue>,
    material: PersistentValue<String>,
    transparency: PersistentValue<f32>,
}

impl CurveNetworkGeometry {
    /// Validates edges and builds the geometry.
    pub fn new(
        state: &ViewerState,
        name: impl Into<String>,
        nodes: Vec<Vec3>,
        edges: &[[u32; 2]],
    ) -> Result<Self> {
        let name = name.into();
        for (edge, pair) in edges.iter().enumerate() {
            if let Some(&node) = pair.iter().find(|&&n| n as usize >= nodes.len()) {
                return Err(PolyvizError::InvalidEdge {
                    edge,
                    node,
                    n_nodes: nodes.len(),
                });
            }
        }

        let prefix = format!("CurveNetwork#{name}#");
        let cache = &state.persistent;
        let options = &state.options;
        let mut geometry = Self {
            nodes: ManagedBuffer::new(format!("{prefix}nodes"), nodes),
            edge_tail_inds: ManagedBuffer::new(
                format!("{prefix}edgeTailInds"),
                edges.iter().map(|e| e[0]).collect(),
            ),
            edge_tip_inds: ManagedBuffer::new(
                format!("{prefix}edgeTipInds"),
                edges.iter().map(|e| e[1]).collect(),
            ),
            edge_centers: ManagedBuffer::new(format!("{prefix}edgeCenters"), Vec::new()),
            node_degrees: Vec::new(),
            object_bounds: None,
            transform: Mat4::IDENTITY,
            color: PersistentValue::new(
                cache,
                format!("{prefix}color"),
                options.default_curve_color,
            ),
            radius: PersistentValue::new(
                cache,
                format!("{prefix}radius"),
                ScaledValue::relative(options.default_radius),
            ),
            material: PersistentValue::new(
                cache,
                format!("{prefix}material"),
                options.default_material.clone(),
            ),
            transparency: PersistentValue::new(cache, format!("{prefix}transparency"), 1.0),
            name,
            state: state.clone(),
        };
        geometry.recompute_geometry();
        Ok(geometry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared viewer state the network was created with.
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Key prefix for persistent settings of a quantity on this network.
    pub fn quantity_prefix(&self, quantity: &str) -> String {
        format!("CurveNetwork#{}#{quantity}#", self.name)
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edge_tail_inds.len()
    }

    pub fn nodes(&self) -> &[Vec3] {
        self.nodes.data()
    }

    pub fn edge_tail_inds(&self) -> &[u32] {
        self.edge_tail_inds.data()
    }

    pub fn edge_tip_inds(&self) -> &[u32] {
        self.edge_tip_inds.data()
    }

    pub(crate) fn edge_tail_inds_mut(&mut self) -> &mut ManagedBuffer<u32> {
        &mut self.edge_tail_inds
    }

    pub(crate) fn edge_tip_inds_mut(&mut self) -> &mut ManagedBuffer<u32> {
        &mut self.edge_tip_inds
    }

    pub(crate) fn edge_index_versions(&self) -> (u64, u64) {
        (self.edge_tail_inds.version(), self.edge_tip_inds.version())
    }

    pub fn edge_centers(&self) -> &[Vec3] {
        self.edge_centers.data()
    }

    pub fn node_degrees(&self) -> &[usize] {
        &self.node_degrees
    }

    /// Host copies of both index arrays, pulled from the device if needed.
    pub fn ensure_edge_indices_populated(&mut self) -> RenderResult<()> {
        self.edge_tail_inds.ensure_host_buffer_populated()?;
        self.edge_tip_inds.ensure_host_buffer_populated()
    }

    /// Recomputes edge centers, node degrees and bounds from the host copies.
    pub fn recompute_geometry(&mut self) {
        let nodes = self.nodes.data();
        let tails = self.edge_tail_inds.data();
        let tips = self.edge_tip_inds.data();

        let centers = tails
            .iter()
            .zip(tips)
            .map(|(&tail, &tip)| (nodes[tail as usize] + nodes[tip as usize]) * 0.5)
            .collect();
        self.node_degrees = reduction::node_degrees(nodes.len(), tails, tips);
        self.object_bounds = nodes
            .iter()
            .fold(None, |bounds: Option<(Vec3, Vec3)>, &p| match bounds {
                None => Some((p, p)),
                Some((min, max)) => Some((min.min(p), max.max(p))),
            });
        self.edge_centers.set_data(centers);
    }

    /// Replaces the node positions. The count must not change.
    pub fn update_node_positions(&mut self, nodes: Vec<Vec3>) -> Result<()> {
        if nodes.len() != self.nodes.len() {
            return Err(PolyvizError::SizeMismatch {
                expected: self.nodes.len(),
                actual: nodes.len(),
            });
        }
        self.nodes.set_data(nodes);
        self.recompute_geometry();
        Ok(())
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Axis-aligned bounds of the transformed nodes.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = self.object_bounds?;
        let corners = (0..8).map(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        });
        corners
            .map(|c| self.transform.transform_point3(c))
            .fold(None, |bounds, p| match bounds {
                None => Some((p, p)),
                Some((lo, hi)) => Some((Vec3::min(lo, p), Vec3::max(hi, p))),
            })
    }

    /// Diagonal of the bounding box, or 1 for degenerate networks.
    pub fn length_scale(&self) -> f32 {
        self.bounding_box()
            .map(|(min, max)| (max - min).length())
            .filter(|l| *l > 0.0)
            .unwrap_or(1.0)
    }

    pub fn color(&self) -> Vec3 {
        self.color.value()
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color.set(color);
    }

    /// Curve radius in world units.
    pub fn radius(&self) -> f32 {
        self.radius.value().get(self.length_scale())
    }

    pub fn radius_setting(&self) -> ScaledValue {
        self.radius.value()
    }

    pub fn set_radius(&mut self, radius: f32, is_relative: bool) {
        self.radius.set(ScaledValue::new(radius, is_relative));
    }

    pub fn material(&self) -> &str {
        self.material.get()
    }

    pub fn set_material(&mut self, material: impl Into<String>) {
        self.material.set(material.into());
    }

    pub fn transparency(&self) -> f32 {
        self.transparency.value()
    }

    pub fn set_transparency(&mut self, transparency: f32) {
        self.transparency.set(transparency.clamp(0.0, 1.0));
    }

    fn add_structure_rules(&self, mut rules: Vec<String>) -> Vec<String> {
        if self.transparency() < 1.0 {
            rules.push("TRANSPARENCY_STRUCTURE".to_string());
        }
        rules
    }

    /// Appends the structure-level rules of node (sphere) programs.
    pub fn add_curve_network_node_rules(&self, rules: Vec<String>) -> Vec<String> {
        self.add_structure_rules(rules)
    }

    /// Appends the structure-level rules of edge (cylinder) programs.
    pub fn add_curve_network_edge_rules(&self, rules: Vec<String>) -> Vec<String> {
        self.add_structure_rules(rules)
    }

    /// Binds node positions as `a_position`.
    pub fn fill_node_geometry_buffers(
        &mut self,
        program: &mut dyn ShaderProgram,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        program.set_attribute("a_position", self.nodes.get_render_attribute_buffer(engine)?)
    }

    /// Binds edge endpoint positions as `a_position_tail` and `a_position_tip`.
    pub fn fill_edge_geometry_buffers(
        &mut self,
        program: &mut dyn ShaderProgram,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        let tails = self
            .nodes
            .get_indexed_render_attribute_buffer(engine, &mut self.edge_tail_inds)?;
        let tips = self
            .nodes
            .get_indexed_render_attribute_buffer(engine, &mut self.edge_tip_inds)?;
        program.set_attribute("a_position_tail", tails)?;
        program.set_attribute("a_position_tip", tips)
    }

    /// Binds edge centers, for vectors drawn from the middle of each edge.
    pub fn fill_edge_center_buffer(
        &mut self,
        program: &mut dyn ShaderProgram,
        attribute: &str,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        program.set_attribute(attribute, self.edge_centers.get_render_attribute_buffer(engine)?)
    }

    /// Binds node positions under another attribute name.
    pub fn fill_node_position_buffer(
        &mut self,
        program: &mut dyn ShaderProgram,
        attribute: &str,
        engine: &mut dyn Engine,
    ) -> RenderResult<()> {
        program.set_attribute(attribute, self.nodes.get_render_attribute_buffer(engine)?)
    }

    pub fn set_structure_uniforms(
        &self,
        program: &mut dyn ShaderProgram,
        engine: &dyn Engine,
    ) -> RenderResult<()> {
        program.set_uniform("u_modelView", (engine.view_matrix() * self.transform).into())?;
        program.set_uniform("u_projMatrix", engine.projection_matrix().into())?;
        if program.has_uniform("u_transparency") {
            program.set_uniform("u_transparency", self.transparency().into())?;
        }
        Ok(())
    }

    pub fn set_curve_network_node_uniforms(
        &self,
        program: &mut dyn ShaderProgram,
    ) -> RenderResult<()> {
        program.set_uniform("u_pointRadius", self.radius().into())
    }

    pub fn set_curve_network_edge_uniforms(
        &self,
        program: &mut dyn ShaderProgram,
    ) -> RenderResult<()> {
        program.set_uniform("u_radius", self.radius().into())
    }
}

impl std::fmt::Debug for CurveNetworkGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveNetworkGeometry")
            .field("name", &self.name)
            .field("n_nodes", &self.n_nodes())
            .field("n_edges", &self.n_edges())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use polyviz_render::{MockEngine, RAYCAST_CYLINDER, RAYCAST_SPHERE};

    use super::*;

    fn triangle() -> CurveNetworkGeometry {
        CurveNetworkGeometry::new(
            &ViewerState::default(),
            "tri",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            &[[0, 1], [1, 2]],
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_edge_is_rejected() {
        let err = CurveNetworkGeometry::new(
            &ViewerState::default(),
            "bad",
            vec![Vec3::ZERO, Vec3::X],
            &[[0, 1], [1, 2]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PolyvizError::InvalidEdge { edge: 1, node: 2, n_nodes: 2 }
        ));
    }

    #[test]
    fn test_computed_geometry() {
        let g = triangle();
        assert_eq!(g.node_degrees(), &[1, 2, 1]);
        assert_eq!(g.edge_centers(), &[Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.0)]);
        assert_eq!(g.bounding_box(), Some((Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0))));
        assert!((g.length_scale() - 2.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_transparency_rule() {
        let mut g = triangle();
        assert!(g.add_curve_network_edge_rules(vec![]).is_empty());
        g.set_transparency(0.5);
        assert_eq!(g.add_curve_network_node_rules(vec![]), vec!["TRANSPARENCY_STRUCTURE"]);
    }

    #[test]
    fn test_edge_buffers_are_gathered_from_nodes() {
        let mut engine = MockEngine::new();
        let mut g = triangle();
        let rules = vec!["SHADE_BASECOLOR".to_string()];
        let mut edges = engine.request_shader(RAYCAST_CYLINDER, &rules).unwrap();
        g.fill_edge_geometry_buffers(edges.as_mut(), &mut engine).unwrap();

        let tails = edges.attribute("a_position_tail").unwrap().read::<Vec3>().unwrap();
        let tips = edges.attribute("a_position_tip").unwrap().read::<Vec3>().unwrap();
        assert_eq!(tails, vec![Vec3::ZERO, Vec3::X]);
        assert_eq!(tips, vec![Vec3::X, Vec3::Y]);

        let mut nodes = engine.request_shader(RAYCAST_SPHERE, &rules).unwrap();
        g.fill_node_geometry_buffers(nodes.as_mut(), &mut engine).unwrap();
        g.set_curve_network_node_uniforms(nodes.as_mut()).unwrap();
        g.set_structure_uniforms(nodes.as_mut(), &engine).unwrap();
        assert_eq!(nodes.attribute("a_position").unwrap().len(), 3);
        assert!(nodes.uniform("u_pointRadius").is_some());
    }

    #[test]
    fn test_edge_indices_stay_as_validated() {
        let mut engine = MockEngine::new();
        let mut g = triangle();
        let versions = g.edge_index_versions();
        let rules = vec!["SHADE_BASECOLOR".to_string()];
        let mut edges = engine.request_shader(RAYCAST_CYLINDER, &rules).unwrap();
        g.fill_edge_geometry_buffers(edges.as_mut(), &mut engine).unwrap();
        g.update_node_positions(vec![Vec3::ZERO, Vec3::Y, Vec3::X]).unwrap();

        assert_eq!(g.edge_index_versions(), versions);
        assert_eq!(g.edge_tail_inds(), &[0, 1]);
        assert_eq!(g.edge_tip_inds(), &[1, 2]);
    }

    #[test]
    fn test_position_update_keeps_count() {
        let mut g = triangle();
        assert!(g.update_node_positions(vec![Vec3::ZERO]).is_err());
        g.update_node_positions(vec![Vec3::ZERO, Vec3::X * 2.0, Vec3::Y])
            .unwrap();
        assert_eq!(g.edge_centers()[0], Vec3::X);
    }
}
