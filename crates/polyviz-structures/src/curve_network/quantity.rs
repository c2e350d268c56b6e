//! Quantity trait shared by everything drawn on a curve network.

use egui::Ui;
use polyviz_core::{PersistentValue, Quantity};
use polyviz_render::{
    BufferElement, Engine, ManagedBuffer, ProgramCache, ProgramState, RenderResult,
    ShaderProgram, RAYCAST_CYLINDER, RAYCAST_SPHERE,
};
use polyviz_ui::{build_info_grid, InfoRow};

use super::geometry::CurveNetworkGeometry;

/// Slot of the cylinder program in an edge/node program pair.
pub(crate) const EDGE_PROGRAM: usize = 0;

/// A quantity that draws itself on a curve network.
pub trait CurveNetworkQuantity: Quantity {
    /// Builds programs if needed, binds per-frame data and draws.
    ///
    /// Does nothing while the quantity is disabled.
    fn draw(
        &mut self,
        parent: &mut CurveNetworkGeometry,
        engine: &mut dyn Engine,
    ) -> RenderResult<()>;

    /// Row shown when a node is picked.
    fn node_info(&mut self, _node: usize) -> RenderResult<Option<InfoRow>> {
        Ok(None)
    }

    /// Row shown when an edge is picked.
    fn edge_info(&mut self, _edge: usize) -> RenderResult<Option<InfoRow>> {
        Ok(None)
    }

    /// Builds the quantity's controls. Returns true if anything changed.
    fn build_custom_ui(&mut self, ui: &mut Ui, available_colormaps: &[&str]) -> bool;

    fn program_state(&self) -> ProgramState;

    /// Number of times the programs were built.
    fn program_build_count(&self) -> u64;

    fn build_node_info_gui(&mut self, ui: &mut Ui, node: usize) {
        match self.node_info(node) {
            Ok(Some(row)) => {
                build_info_grid(ui, &format!("{}#node_info", self.name()), &[row]);
            }
            Ok(None) => {}
            Err(e) => log::error!("node info of {}: {e}", self.name()),
        }
    }

    fn build_edge_info_gui(&mut self, ui: &mut Ui, edge: usize) {
        match self.edge_info(edge) {
            Ok(Some(row)) => {
                build_info_grid(ui, &format!("{}#edge_info", self.name()), &[row]);
            }
            Ok(None) => {}
            Err(e) => log::error!("edge info of {}: {e}", self.name()),
        }
    }
}

/// Name, enabled flag and programs common to every curve network quantity.
pub(crate) struct QuantityBase {
    pub name: String,
    pub structure_name: String,
    pub enabled: PersistentValue<bool>,
    pub programs: ProgramCache,
}

impl QuantityBase {
    pub fn new(parent: &CurveNetworkGeometry, name: &str) -> Self {
        let enabled = PersistentValue::new(
            &parent.state().persistent,
            format!("{}enabled", parent.quantity_prefix(name)),
            false,
        );
        Self {
            name: name.to_string(),
            structure_name: parent.name().to_string(),
            enabled,
            programs: ProgramCache::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.value()
    }
}

/// Versions of the buffers a node reduction was computed from.
///
/// A reduction is current while the edge values and both index buffers still
/// have these versions, however they were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReductionInputs {
    values: u64,
    tails: u64,
    tips: u64,
}

impl ReductionInputs {
    pub fn of<T: BufferElement>(values: &ManagedBuffer<T>, parent: &CurveNetworkGeometry) -> Self {
        let (tails, tips) = parent.edge_index_versions();
        Self {
            values: values.version(),
            tails,
            tips,
        }
    }
}

/// Sets structure uniforms and geometry on an edge/node program pair, lets
/// `bind` add the quantity's own data, then draws edges before nodes.
pub(crate) fn draw_edge_node_programs<F>(
    programs: &mut ProgramCache,
    parent: &mut CurveNetworkGeometry,
    engine: &mut dyn Engine,
    mut bind: F,
) -> RenderResult<()>
where
    F: FnMut(
        usize,
        &mut dyn ShaderProgram,
        &mut CurveNetworkGeometry,
        &mut dyn Engine,
    ) -> RenderResult<()>,
{
    for (slot, program) in programs.programs_mut().iter_mut().enumerate() {
        let program = program.as_mut();
        parent.set_structure_uniforms(program, engine)?;
        if slot == EDGE_PROGRAM {
            parent.fill_edge_geometry_buffers(program, engine)?;
            parent.set_curve_network_edge_uniforms(program)?;
        } else {
            parent.fill_node_geometry_buffers(program, engine)?;
            parent.set_curve_network_node_uniforms(program)?;
        }
        bind(slot, &mut *program, &mut *parent, &mut *engine)?;
        engine.set_material_uniforms(program)?;
    }
    programs.draw_all()
}

/// Requests the cylinder and sphere programs of a quantity.
///
/// Each program starts from its propagation rule, followed by the network's
/// structure rules, the rules added by `add_rules` and the material rule.
pub(crate) fn request_edge_node_programs<F>(
    parent: &CurveNetworkGeometry,
    engine: &mut dyn Engine,
    edge_rule: &str,
    node_rule: &str,
    add_rules: F,
) -> RenderResult<Vec<Box<dyn ShaderProgram>>>
where
    F: Fn(Vec<String>) -> Vec<String>,
{
    let material = parent.material().to_string();
    let edge_rules = engine.add_material_rules(
        &material,
        add_rules(parent.add_curve_network_edge_rules(vec![edge_rule.to_string()])),
    )?;
    let node_rules = engine.add_material_rules(
        &material,
        add_rules(parent.add_curve_network_node_rules(vec![node_rule.to_string()])),
    )?;

    let mut edge = engine.request_shader(RAYCAST_CYLINDER, &edge_rules)?;
    let mut node = engine.request_shader(RAYCAST_SPHERE, &node_rules)?;
    engine.set_material(edge.as_mut(), &material)?;
    engine.set_material(node.as_mut(), &material)?;
    Ok(vec![edge, node])
}

/// Implements [`Quantity`] for a curve network quantity with a `base` field.
macro_rules! impl_curve_network_quantity {
    ($ty:ty, $kind:expr, $defined_on:literal, $size:expr) => {
        impl polyviz_core::Quantity for $ty {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }

            fn name(&self) -> &str {
                &self.base.name
            }

            fn structure_name(&self) -> &str {
                &self.base.structure_name
            }

            fn kind(&self) -> polyviz_core::QuantityKind {
                $kind
            }

            fn is_enabled(&self) -> bool {
                self.base.is_enabled()
            }

            fn set_enabled(&mut self, enabled: bool) {
                self.base.enabled.set(enabled);
            }

            fn refresh(&mut self) {
                self.base.programs.invalidate();
            }

            fn data_size(&self) -> usize {
                let size: fn(&Self) -> usize = $size;
                size(self)
            }

            fn nice_name(&self) -> String {
                format!("{} ({})", self.base.name, $defined_on)
            }
        }
    };
}

pub(crate) use impl_curve_network_quantity;
