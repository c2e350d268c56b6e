//! Structure-specific UI builders.

use egui::Ui;

use crate::build_color_edit;

/// Builds a material selector `ComboBox`. Returns true if the material changed.
pub fn build_material_selector(
    ui: &mut Ui,
    name: &str,
    material: &mut String,
    available_materials: &[&str],
) -> bool {
    let mut changed = false;
    egui::ComboBox::new(format!("{name}_material"), "Material")
        .selected_text(material.as_str())
        .show_ui(ui, |ui| {
            for &mat in available_materials {
                if ui
                    .selectable_value(material, mat.to_string(), mat)
                    .changed()
                {
                    changed = true;
                }
            }
        });
    changed
}

/// Editable options of a curve network.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveNetworkUiState {
    pub color: [f32; 3],
    /// Radius, before scaling.
    pub radius: f32,
    pub material: String,
    pub transparency: f32,
}

/// Builds UI for a curve network.
pub fn build_curve_network_ui(
    ui: &mut Ui,
    name: &str,
    num_nodes: usize,
    num_edges: usize,
    state: &mut CurveNetworkUiState,
    available_materials: &[&str],
) -> bool {
    let mut changed = false;

    ui.label(format!("{num_nodes} nodes, {num_edges} edges"));

    if build_material_selector(ui, name, &mut state.material, available_materials) {
        changed = true;
    }

    ui.separator();

    egui::Grid::new(format!("{name}_curve_network_grid"))
        .num_columns(2)
        .show(ui, |ui| {
            ui.label("Color:");
            if build_color_edit(ui, &mut state.color) {
                changed = true;
            }
            ui.end_row();

            ui.label("Radius:");
            if ui
                .add(
                    egui::DragValue::new(&mut state.radius)
                        .speed(0.0005)
                        .range(0.0001..=1.0),
                )
                .changed()
            {
                changed = true;
            }
            ui.end_row();

            ui.label("Transparency:");
            if ui
                .add(egui::Slider::new(&mut state.transparency, 0.0..=1.0))
                .changed()
            {
                changed = true;
            }
            ui.end_row();
        });

    changed
}
