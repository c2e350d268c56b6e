//! Curve network structure.

mod color_quantities;
mod geometry;
mod quantity;
mod scalar_quantities;
mod vector_quantities;

use egui::Ui;
use glam::{Mat4, Vec3};
use polyviz_core::{DataType, PersistentValue, PolyvizError, Result, Structure, ViewerState};
use polyviz_render::{Engine, ProgramCache, ProgramState, RenderResult};
use polyviz_ui::{build_curve_network_ui, build_info_grid, CurveNetworkUiState, InfoRow};

use crate::vector_quantity::VectorType;

pub use color_quantities::{CurveEdgeColorQuantity, CurveNodeColorQuantity};
pub use geometry::CurveNetworkGeometry;
pub use quantity::CurveNetworkQuantity;
pub use scalar_quantities::{CurveEdgeScalarQuantity, CurveNodeScalarQuantity};
pub use vector_quantities::{CurveEdgeVectorQuantity, CurveNodeVectorQuantity};

fn check_size(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PolyvizError::SizeMismatch { expected, actual })
    }
}

/// A curve network structure (nodes connected by edges).
pub struct CurveNetwork {
    geometry: CurveNetworkGeometry,
    enabled: PersistentValue<bool>,
    quantities: Vec<Box<dyn CurveNetworkQuantity>>,

    /// Base-color programs, drawn while no dominant quantity is enabled.
    programs: ProgramCache,
}

impl CurveNetwork {
    /// Creates a new curve network from nodes and edges.
    pub fn new(
        state: &ViewerState,
        name: impl Into<String>,
        nodes: Vec<Vec3>,
        edges: &[[u32; 2]],
    ) -> Result<Self> {
        let geometry = CurveNetworkGeometry::new(state, name, nodes, edges)?;
        let enabled = PersistentValue::new(
            &state.persistent,
            format!("CurveNetwork#{}#enabled", geometry.name()),
            true,
        );
        Ok(Self {
            geometry,
            enabled,
            quantities: Vec::new(),
            programs: ProgramCache::new(),
        })
    }

    /// Creates a curve network as a connected line (0-1-2-3-...).
    pub fn new_line(
        state: &ViewerState,
        name: impl Into<String>,
        nodes: Vec<Vec3>,
    ) -> Result<Self> {
        let n = nodes.len() as u32;
        let edges: Vec<[u32; 2]> = (0..n.saturating_sub(1)).map(|i| [i, i + 1]).collect();
        Self::new(state, name, nodes, &edges)
    }

    /// Creates a curve network as a closed loop (0-1-2-...-n-0).
    pub fn new_loop(
        state: &ViewerState,
        name: impl Into<String>,
        nodes: Vec<Vec3>,
    ) -> Result<Self> {
        let n = nodes.len() as u32;
        let edges: Vec<[u32; 2]> = (0..n).map(|i| [i, (i + 1) % n]).collect();
        Self::new(state, name, nodes, &edges)
    }

    /// Creates a curve network as separate segments (0-1, 2-3, 4-5, ...).
    ///
    /// A trailing unpaired node is kept but has no edge.
    pub fn new_segments(
        state: &ViewerState,
        name: impl Into<String>,
        nodes: Vec<Vec3>,
    ) -> Result<Self> {
        let n = nodes.len() as u32;
        let edges: Vec<[u32; 2]> = (0..n / 2).map(|i| [2 * i, 2 * i + 1]).collect();
        Self::new(state, name, nodes, &edges)
    }

    pub fn name(&self) -> &str {
        self.geometry.name()
    }

    pub fn n_nodes(&self) -> usize {
        self.geometry.n_nodes()
    }

    pub fn n_edges(&self) -> usize {
        self.geometry.n_edges()
    }

    pub fn nodes(&self) -> &[Vec3] {
        self.geometry.nodes()
    }

    pub fn edge_tail_inds(&self) -> &[u32] {
        self.geometry.edge_tail_inds()
    }

    pub fn edge_tip_inds(&self) -> &[u32] {
        self.geometry.edge_tip_inds()
    }

    pub fn edge_centers(&self) -> &[Vec3] {
        self.geometry.edge_centers()
    }

    pub fn node_degrees(&self) -> &[usize] {
        self.geometry.node_degrees()
    }

    pub fn geometry(&self) -> &CurveNetworkGeometry {
        &self.geometry
    }

    pub fn color(&self) -> Vec3 {
        self.geometry.color()
    }

    pub fn set_color(&mut self, color: Vec3) -> &mut Self {
        self.geometry.set_color(color);
        self
    }

    /// Curve radius in world units.
    pub fn radius(&self) -> f32 {
        self.geometry.radius()
    }

    pub fn set_radius(&mut self, radius: f32, is_relative: bool) -> &mut Self {
        self.geometry.set_radius(radius, is_relative);
        self
    }

    pub fn material(&self) -> &str {
        self.geometry.material()
    }

    /// Sets the material. Programs are rebuilt on the next draw.
    pub fn set_material(&mut self, material: impl Into<String>) -> &mut Self {
        let material = material.into();
        if material != self.geometry.material() {
            self.geometry.set_material(material);
            self.refresh();
        }
        self
    }

    pub fn transparency(&self) -> f32 {
        self.geometry.transparency()
    }

    /// Sets the transparency in `[0, 1]`. Programs are rebuilt when the value
    /// crosses 1, since that adds or removes the transparency rule.
    pub fn set_transparency(&mut self, transparency: f32) -> &mut Self {
        let was_transparent = self.geometry.transparency() < 1.0;
        self.geometry.set_transparency(transparency);
        if was_transparent != (self.geometry.transparency() < 1.0) {
            self.refresh();
        }
        self
    }

    /// Replaces node positions. The node count must stay the same.
    pub fn update_node_positions(&mut self, nodes: Vec<Vec3>) -> Result<()> {
        self.geometry.update_node_positions(nodes)?;
        self.refresh();
        Ok(())
    }

    /// Adds a quantity, replacing any quantity with the same name.
    fn insert_quantity<Q>(&mut self, quantity: Q) -> Result<&mut Q>
    where
        Q: CurveNetworkQuantity + 'static,
    {
        let name = quantity.name().to_string();
        if let Some(index) = self.quantities.iter().position(|q| q.name() == name) {
            log::warn!(
                "replacing quantity [{name}] on curve network [{}]",
                self.geometry.name()
            );
            self.quantities.remove(index);
        }

        let enabled_dominant = quantity.is_enabled() && quantity.kind().is_dominant();
        self.quantities.push(Box::new(quantity));
        if enabled_dominant {
            self.disable_other_dominant(self.quantities.len() - 1);
        }

        let structure = self.geometry.name().to_string();
        self.quantities
            .last_mut()
            .and_then(|q| q.as_any_mut().downcast_mut::<Q>())
            .ok_or(PolyvizError::QuantityNotFound(name, structure))
    }

    /// Adds a scalar quantity defined on nodes.
    pub fn add_node_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Result<&mut CurveNodeScalarQuantity> {
        check_size(self.n_nodes(), values.len())?;
        let quantity =
            CurveNodeScalarQuantity::new(&self.geometry, &name.into(), values, data_type);
        self.insert_quantity(quantity)
    }

    /// Adds a scalar quantity defined on edges.
    pub fn add_edge_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Result<&mut CurveEdgeScalarQuantity> {
        check_size(self.n_edges(), values.len())?;
        let quantity =
            CurveEdgeScalarQuantity::new(&self.geometry, &name.into(), values, data_type);
        self.insert_quantity(quantity)
    }

    /// Adds a color quantity defined on nodes.
    pub fn add_node_color_quantity(
        &mut self,
        name: impl Into<String>,
        colors: Vec<Vec3>,
    ) -> Result<&mut CurveNodeColorQuantity> {
        check_size(self.n_nodes(), colors.len())?;
        let quantity = CurveNodeColorQuantity::new(&self.geometry, &name.into(), colors);
        self.insert_quantity(quantity)
    }

    /// Adds a color quantity defined on edges.
    pub fn add_edge_color_quantity(
        &mut self,
        name: impl Into<String>,
        colors: Vec<Vec3>,
    ) -> Result<&mut CurveEdgeColorQuantity> {
        check_size(self.n_edges(), colors.len())?;
        let quantity = CurveEdgeColorQuantity::new(&self.geometry, &name.into(), colors);
        self.insert_quantity(quantity)
    }

    /// Adds a vector quantity defined on nodes.
    pub fn add_node_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Result<&mut CurveNodeVectorQuantity> {
        check_size(self.n_nodes(), vectors.len())?;
        let quantity =
            CurveNodeVectorQuantity::new(&self.geometry, &name.into(), vectors, vector_type);
        self.insert_quantity(quantity)
    }

    /// Adds a vector quantity defined on edges, drawn from edge midpoints.
    pub fn add_edge_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Result<&mut CurveEdgeVectorQuantity> {
        check_size(self.n_edges(), vectors.len())?;
        let quantity =
            CurveEdgeVectorQuantity::new(&self.geometry, &name.into(), vectors, vector_type);
        self.insert_quantity(quantity)
    }

    /// Quantities in registration order.
    pub fn quantities(&self) -> impl Iterator<Item = &(dyn CurveNetworkQuantity + 'static)> {
        self.quantities.iter().map(AsRef::as_ref)
    }

    pub fn quantity(&self, name: &str) -> Option<&dyn CurveNetworkQuantity> {
        self.quantities
            .iter()
            .find(|q| q.name() == name)
            .map(AsRef::as_ref)
    }

    pub fn quantity_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut (dyn CurveNetworkQuantity + 'static)> {
        self.quantities
            .iter_mut()
            .find(|q| q.name() == name)
            .map(AsMut::as_mut)
    }

    /// Looks up a quantity by name and concrete type.
    pub fn get_quantity<Q: CurveNetworkQuantity + 'static>(&self, name: &str) -> Option<&Q> {
        self.quantity(name)?.as_any().downcast_ref::<Q>()
    }

    /// Looks up a quantity by name and concrete type.
    ///
    /// Enabling through the returned handle does not disable other dominant
    /// quantities; use [`Self::set_quantity_enabled`] for that.
    pub fn get_quantity_mut<Q>(&mut self, name: &str) -> Option<&mut Q>
    where
        Q: CurveNetworkQuantity + 'static,
    {
        self.quantity_mut(name)?.as_any_mut().downcast_mut::<Q>()
    }

    pub fn remove_quantity(&mut self, name: &str) -> Option<Box<dyn CurveNetworkQuantity>> {
        let index = self.quantities.iter().position(|q| q.name() == name)?;
        Some(self.quantities.remove(index))
    }

    pub fn remove_all_quantities(&mut self) {
        self.quantities.clear();
    }

    /// Enables or disables a quantity. Enabling a scalar or color quantity
    /// disables every other scalar or color quantity.
    pub fn set_quantity_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let index = self
            .quantities
            .iter()
            .position(|q| q.name() == name)
            .ok_or_else(|| {
                PolyvizError::QuantityNotFound(name.to_string(), self.name().to_string())
            })?;

        self.quantities[index].set_enabled(enabled);
        if enabled && self.quantities[index].kind().is_dominant() {
            self.disable_other_dominant(index);
        }
        Ok(())
    }

    fn disable_other_dominant(&mut self, keep: usize) {
        for (index, quantity) in self.quantities.iter_mut().enumerate() {
            if index != keep && quantity.kind().is_dominant() && quantity.is_enabled() {
                quantity.set_enabled(false);
            }
        }
    }

    /// The enabled scalar or color quantity, if any.
    pub fn dominant_quantity(&self) -> Option<&dyn CurveNetworkQuantity> {
        self.quantities()
            .find(|q| q.is_enabled() && q.kind().is_dominant())
    }

    /// State of the base-color programs.
    pub fn program_state(&self) -> ProgramState {
        self.programs.state()
    }

    /// Draws the network and its enabled quantities in registration order.
    pub fn draw(&mut self, engine: &mut dyn Engine) -> RenderResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if self.dominant_quantity().is_none() {
            self.draw_base(engine)?;
        }
        for quantity in &mut self.quantities {
            quantity.draw(&mut self.geometry, engine)?;
        }
        Ok(())
    }

    fn draw_base(&mut self, engine: &mut dyn Engine) -> RenderResult<()> {
        let geometry = &self.geometry;
        self.programs.ensure_built(|| {
            quantity::request_edge_node_programs(
                geometry,
                engine,
                "SHADE_BASECOLOR",
                "SHADE_BASECOLOR",
                |rules| rules,
            )
        })?;

        quantity::draw_edge_node_programs(
            &mut self.programs,
            &mut self.geometry,
            engine,
            |_, program, parent, _| program.set_uniform("u_baseColor", parent.color().into()),
        )
    }

    /// Info rows for a picked node: its position, then one row per quantity.
    pub fn node_info(&mut self, node: usize) -> RenderResult<Vec<InfoRow>> {
        let mut rows = Vec::new();
        if let Some(&position) = self.geometry.nodes().get(node) {
            rows.push(InfoRow::vec3("position", position));
        }
        for quantity in &mut self.quantities {
            rows.extend(quantity.node_info(node)?);
        }
        Ok(rows)
    }

    /// Info rows for a picked edge: its endpoints, then one row per quantity.
    pub fn edge_info(&mut self, edge: usize) -> RenderResult<Vec<InfoRow>> {
        let mut rows = Vec::new();
        let tail = self.geometry.edge_tail_inds().get(edge).copied();
        let tip = self.geometry.edge_tip_inds().get(edge).copied();
        if let (Some(tail), Some(tip)) = (tail, tip) {
            rows.push(InfoRow::new("nodes", format!("{tail} -> {tip}")));
        }
        for quantity in &mut self.quantities {
            rows.extend(quantity.edge_info(edge)?);
        }
        Ok(rows)
    }

    pub fn build_node_info_gui(&mut self, ui: &mut Ui, node: usize) {
        ui.label(format!("Node #{node}"));
        match self.node_info(node) {
            Ok(rows) => build_info_grid(ui, &format!("{}#node_info", self.name()), &rows),
            Err(e) => log::error!("node info of [{}]: {e}", self.name()),
        }
    }

    pub fn build_edge_info_gui(&mut self, ui: &mut Ui, edge: usize) {
        ui.label(format!("Edge #{edge}"));
        match self.edge_info(edge) {
            Ok(rows) => build_info_grid(ui, &format!("{}#edge_info", self.name()), &rows),
            Err(e) => log::error!("edge info of [{}]: {e}", self.name()),
        }
    }

    /// Builds the egui UI for this curve network and its quantities.
    pub fn build_egui_ui(
        &mut self,
        ui: &mut Ui,
        available_colormaps: &[&str],
        available_materials: &[&str],
    ) -> bool {
        let mut enabled = self.is_enabled();
        let mut changed = ui.checkbox(&mut enabled, self.name().to_string()).changed();
        if changed {
            self.set_enabled(enabled);
        }

        let mut ui_state = CurveNetworkUiState {
            color: self.color().to_array(),
            radius: self.geometry.radius_setting().raw(),
            material: self.material().to_string(),
            transparency: self.transparency(),
        };
        let name = self.name().to_string();
        if build_curve_network_ui(
            ui,
            &name,
            self.n_nodes(),
            self.n_edges(),
            &mut ui_state,
            available_materials,
        ) {
            changed = true;
            let color = Vec3::from_array(ui_state.color);
            if color != self.color() {
                self.set_color(color);
            }
            let radius = self.geometry.radius_setting();
            if ui_state.radius != radius.raw() {
                self.set_radius(ui_state.radius, radius.is_relative());
            }
            self.set_material(ui_state.material);
            self.set_transparency(ui_state.transparency);
        }

        if !self.quantities.is_empty() {
            ui.separator();
            ui.label("Quantities:");
            for index in 0..self.quantities.len() {
                let was_enabled = self.quantities[index].is_enabled();
                changed |= self.quantities[index].build_custom_ui(ui, available_colormaps);
                let quantity = &self.quantities[index];
                if !was_enabled && quantity.is_enabled() && quantity.kind().is_dominant() {
                    self.disable_other_dominant(index);
                }
            }
        }
        changed
    }
}

impl Structure for CurveNetwork {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn name(&self) -> &str {
        self.geometry.name()
    }

    fn type_name(&self) -> &'static str {
        "CurveNetwork"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.geometry.bounding_box()
    }

    fn length_scale(&self) -> f32 {
        self.geometry.length_scale()
    }

    fn transform(&self) -> Mat4 {
        self.geometry.transform()
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.geometry.set_transform(transform);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.value()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn refresh(&mut self) {
        self.programs.invalidate();
        for quantity in &mut self.quantities {
            quantity.refresh();
        }
    }
}

impl std::fmt::Debug for CurveNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveNetwork")
            .field("geometry", &self.geometry)
            .field("quantities", &self.quantities.len())
            .finish_non_exhaustive()
    }
}
