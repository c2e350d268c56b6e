//! Quantity-specific UI builders.

use egui::Ui;
use polyviz_core::{DataType, IsolineStyle, ScaledValue};

/// Color button that writes `color` back only when the user picks a color.
///
/// The picker round-trips through sRGB, so an untouched color is left as it was.
pub fn build_color_edit(ui: &mut Ui, color: &mut [f32; 3]) -> bool {
    let mut edited = *color;
    let changed = ui.color_edit_button_rgb(&mut edited).changed();
    if changed {
        *color = edited;
    }
    changed
}

/// Editable options of a scalar quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarUiState {
    pub data_type: DataType,
    pub colormap: String,
    pub range_min: f32,
    pub range_max: f32,
    /// Extent of the data, used by "Reset range". Not edited.
    pub data_min: f32,
    pub data_max: f32,
    pub isolines_enabled: bool,
    pub isoline_style: IsolineStyle,
    pub isoline_period: ScaledValue,
    pub isoline_darkness: f32,
    pub contour_thickness: f32,
}

/// Builds UI for a scalar quantity. Returns true if anything changed.
///
/// Range and isoline controls are only shown for continuous data.
pub fn build_scalar_quantity_ui(
    ui: &mut Ui,
    name: &str,
    enabled: &mut bool,
    state: &mut ScalarUiState,
    available_colormaps: &[&str],
) -> bool {
    let mut changed = false;

    ui.horizontal(|ui| {
        if ui.checkbox(enabled, name).changed() {
            changed = true;
        }
        ui.label(format!("({})", state.data_type.label()));
    });

    if !*enabled {
        return changed;
    }

    ui.indent(name, |ui| {
        egui::ComboBox::from_label("Colormap")
            .selected_text(state.colormap.as_str())
            .show_ui(ui, |ui| {
                for &cmap in available_colormaps {
                    if ui
                        .selectable_value(&mut state.colormap, cmap.to_string(), cmap)
                        .changed()
                    {
                        changed = true;
                    }
                }
            });

        if state.data_type.is_categorical() {
            return;
        }

        ui.horizontal(|ui| {
            ui.label("Range:");
            let speed = f64::from((state.data_max - state.data_min).abs().max(1e-6) / 100.0);
            if ui
                .add(egui::DragValue::new(&mut state.range_min).speed(speed))
                .changed()
            {
                changed = true;
            }
            ui.label("–");
            if ui
                .add(egui::DragValue::new(&mut state.range_max).speed(speed))
                .changed()
            {
                changed = true;
            }
            if ui.button("Reset").clicked() {
                state.range_min = state.data_min;
                state.range_max = state.data_max;
                changed = true;
            }
        });

        if ui
            .checkbox(&mut state.isolines_enabled, "Isolines")
            .changed()
        {
            changed = true;
        }
        if state.isolines_enabled {
            changed |= build_isoline_options(ui, name, state);
        }
    });

    changed
}

fn build_isoline_options(ui: &mut Ui, name: &str, state: &mut ScalarUiState) -> bool {
    let mut changed = false;

    egui::Grid::new(format!("{name}_isoline_grid"))
        .num_columns(2)
        .show(ui, |ui| {
            ui.label("Style:");
            egui::ComboBox::from_id_salt(format!("{name}_isoline_style"))
                .selected_text(state.isoline_style.label())
                .show_ui(ui, |ui| {
                    for style in [IsolineStyle::Stripe, IsolineStyle::Contour] {
                        if ui
                            .selectable_value(&mut state.isoline_style, style, style.label())
                            .changed()
                        {
                            changed = true;
                        }
                    }
                });
            ui.end_row();

            ui.label("Period:");
            let mut period = state.isoline_period.raw();
            if ui
                .add(
                    egui::DragValue::new(&mut period)
                        .speed(0.001)
                        .range(0.0001..=10.0),
                )
                .changed()
            {
                state.isoline_period = ScaledValue::new(period, state.isoline_period.is_relative());
                changed = true;
            }
            ui.end_row();

            ui.label("Darkness:");
            if ui
                .add(egui::Slider::new(&mut state.isoline_darkness, 0.0..=1.0))
                .changed()
            {
                changed = true;
            }
            ui.end_row();

            if state.isoline_style == IsolineStyle::Contour {
                ui.label("Thickness:");
                if ui
                    .add(egui::Slider::new(&mut state.contour_thickness, 0.01..=0.5))
                    .changed()
                {
                    changed = true;
                }
                ui.end_row();
            }
        });

    changed
}

/// Builds UI for a color quantity.
pub fn build_color_quantity_ui(
    ui: &mut Ui,
    name: &str,
    enabled: &mut bool,
    num_colors: usize,
) -> bool {
    let mut changed = false;

    ui.horizontal(|ui| {
        if ui.checkbox(enabled, name).changed() {
            changed = true;
        }
        ui.label(format!("({num_colors} colors)"));
    });

    changed
}

/// Editable options of a vector quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorUiState {
    /// Length multiplier, before scaling.
    pub length: f32,
    /// Radius, before scaling.
    pub radius: f32,
    pub color: [f32; 3],
}

/// Builds UI for a vector quantity.
pub fn build_vector_quantity_ui(
    ui: &mut Ui,
    name: &str,
    enabled: &mut bool,
    state: &mut VectorUiState,
) -> bool {
    let mut changed = false;

    ui.horizontal(|ui| {
        if ui.checkbox(enabled, name).changed() {
            changed = true;
        }
    });

    if *enabled {
        ui.indent(name, |ui| {
            egui::Grid::new(format!("{name}_vector_grid"))
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label("Length:");
                    if ui
                        .add(
                            egui::DragValue::new(&mut state.length)
                                .speed(0.001)
                                .range(0.0001..=10.0),
                        )
                        .changed()
                    {
                        changed = true;
                    }
                    ui.end_row();

                    ui.label("Radius:");
                    if ui
                        .add(
                            egui::DragValue::new(&mut state.radius)
                                .speed(0.0001)
                                .range(0.00001..=0.1),
                        )
                        .changed()
                    {
                        changed = true;
                    }
                    ui.end_row();

                    ui.label("Color:");
                    if build_color_edit(ui, &mut state.color) {
                        changed = true;
                    }
                    ui.end_row();
                });
        });
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ui(mut build: impl FnMut(&mut Ui)) {
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| build(ui));
        });
    }

    fn scalar_state(data_type: DataType) -> ScalarUiState {
        ScalarUiState {
            data_type,
            colormap: "viridis".to_string(),
            range_min: 0.0,
            range_max: 1.0,
            data_min: 0.0,
            data_max: 1.0,
            isolines_enabled: true,
            isoline_style: IsolineStyle::Contour,
            isoline_period: ScaledValue::relative(0.02),
            isoline_darkness: 0.7,
            contour_thickness: 0.3,
        }
    }

    #[test]
    fn test_scalar_ui_without_input_changes_nothing() {
        for data_type in [DataType::Standard, DataType::Categorical] {
            let mut state = scalar_state(data_type);
            let before = state.clone();
            let mut enabled = true;
            let mut changed = true;
            run_ui(|ui| {
                changed = build_scalar_quantity_ui(
                    ui,
                    "values",
                    &mut enabled,
                    &mut state,
                    &["viridis", "blues"],
                );
            });
            assert!(!changed);
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_vector_and_color_ui_without_input() {
        let mut state = VectorUiState {
            length: 0.02,
            radius: 0.002,
            color: [0.1, 0.2, 0.3],
        };
        let before = state.clone();
        let mut enabled = true;
        let mut changed = (true, true);
        run_ui(|ui| {
            changed.0 = build_vector_quantity_ui(ui, "vecs", &mut enabled, &mut state);
            changed.1 = build_color_quantity_ui(ui, "colors", &mut enabled, 4);
        });
        assert_eq!(changed, (false, false));
        assert_eq!(state, before);
    }

    #[test]
    fn test_untouched_color_keeps_exact_value() {
        let mut color = [0.2, 0.5, 0.8];
        let mut changed = true;
        for _ in 0..3 {
            run_ui(|ui| changed = build_color_edit(ui, &mut color));
            assert!(!changed);
        }
        assert_eq!(color, [0.2, 0.5, 0.8]);
    }
}
