//! Two-column info rows shown for a selected node or edge.

use egui::Ui;
use glam::Vec3;

/// One `(name, value)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoRow {
    pub name: String,
    pub value: String,
}

impl InfoRow {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A row holding a scalar formatted with [`format_g`].
    pub fn scalar(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, format_g(f64::from(value)))
    }

    /// A row holding a vector formatted as `<x, y, z>`.
    pub fn vec3(name: impl Into<String>, value: Vec3) -> Self {
        Self::new(name, format_vec3(value))
    }
}

/// Formats like C's `%g`: six significant digits, trailing zeros removed,
/// exponent notation outside `[1e-4, 1e6)`.
pub fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Formats a vector as `<x, y, z>` with [`format_g`] components.
pub fn format_vec3(v: Vec3) -> String {
    format!(
        "<{}, {}, {}>",
        format_g(f64::from(v.x)),
        format_g(f64::from(v.y)),
        format_g(f64::from(v.z))
    )
}

/// Draws rows in a two-column grid: name on the left, value on the right.
pub fn build_info_grid(ui: &mut Ui, id: &str, rows: &[InfoRow]) {
    egui::Grid::new(id)
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for row in rows {
                ui.label(row.name.as_str());
                ui.label(row.value.as_str());
                ui.end_row();
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_g_fixed_range() {
        assert_eq!(format_g(2.0), "2");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(-2.5), "-2.5");
        assert_eq!(format_g(3.141_592_65), "3.14159");
        assert_eq!(format_g(100_000.0), "100000");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(f64::from(0.1_f32)), "0.1");
    }

    #[test]
    fn test_format_g_exponent_range() {
        assert_eq!(format_g(1e-5), "1e-05");
        assert_eq!(format_g(1_234_567.0), "1.23457e+06");
        assert_eq!(format_g(-2.5e10), "-2.5e+10");
        assert_eq!(format_g(999_999.7), "1e+06");
    }

    #[test]
    fn test_format_g_special_values() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(f64::NAN), "nan");
        assert_eq!(format_g(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_rows() {
        assert_eq!(InfoRow::scalar("t", 4.0), InfoRow::new("t", "4"));
        assert_eq!(
            InfoRow::vec3("v", Vec3::new(1.0, 0.5, -3.0)).value,
            "<1, 0.5, -3>"
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_format_g_keeps_six_digits(v in -1e12_f64..1e12) {
            let parsed: f64 = format_g(v).parse().unwrap();
            proptest::prop_assert!((parsed - v).abs() <= v.abs() * 1e-5);
        }
    }

    #[test]
    fn test_grid_renders_headless() {
        let ctx = egui::Context::default();
        let rows = vec![InfoRow::scalar("temperature", 21.5)];
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                build_info_grid(ui, "node_info", &rows);
            });
        });
    }
}
