//! Scalar values and the colormap settings used to display them.
//!
//! [`ScalarQuantity`] is shared by every scalar quantity type. It owns the value
//! buffer, contributes shading rules and uniforms to the owner's programs, and
//! remembers its visualization settings in the persistent cache.

use polyviz_core::{
    DataType, IsolineStyle, PersistentValue, PolyvizError, Result, ScaledValue, ViewerState,
};
use polyviz_render::{Engine, ManagedBuffer, RenderResult, ShaderProgram};
use polyviz_ui::ScalarUiState;

/// Min and max of the finite values, or `(0, 0)` if there are none.
pub fn data_range(values: &[f32]) -> (f32, f32) {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// Default colormap range for a data type.
pub fn default_map_range(data_type: DataType, (min, max): (f32, f32)) -> (f32, f32) {
    match data_type {
        DataType::Standard | DataType::Categorical => (min, max),
        DataType::Symmetric => {
            let m = min.abs().max(max.abs());
            (-m, m)
        }
        DataType::Magnitude => (0.0, max),
    }
}

/// Scalar values with their colormap, range and isoline settings.
pub struct ScalarQuantity {
    values: ManagedBuffer<f32>,
    data_type: DataType,
    data_range: (f32, f32),

    cmap: PersistentValue<String>,
    viz_range_min: PersistentValue<f32>,
    viz_range_max: PersistentValue<f32>,
    isolines_enabled: PersistentValue<bool>,
    isoline_style: PersistentValue<IsolineStyle>,
    isoline_period: PersistentValue<ScaledValue>,
    isoline_darkness: PersistentValue<f32>,
    isoline_contour_thickness: PersistentValue<f32>,

    rebuild_requested: bool,
}

impl ScalarQuantity {
    /// Creates the store. `prefix` namespaces the persistent settings, e.g.
    /// `"CurveNetwork#net#temperature#"`.
    pub fn new(state: &ViewerState, prefix: &str, values: Vec<f32>, data_type: DataType) -> Self {
        let cache = &state.persistent;
        let data_range = data_range(&values);
        let (range_min, range_max) = default_map_range(data_type, data_range);

        Self {
            values: ManagedBuffer::new(format!("{prefix}values"), values),
            data_type,
            data_range,
            cmap: PersistentValue::new(
                cache,
                format!("{prefix}cmap"),
                state.options.colormap_for(data_type).to_string(),
            ),
            viz_range_min: PersistentValue::new(cache, format!("{prefix}vizRangeMin"), range_min),
            viz_range_max: PersistentValue::new(cache, format!("{prefix}vizRangeMax"), range_max),
            isolines_enabled: PersistentValue::new(cache, format!("{prefix}isolinesEnabled"), false),
            isoline_style: PersistentValue::new(
                cache,
                format!("{prefix}isolineStyle"),
                IsolineStyle::Stripe,
            ),
            isoline_period: PersistentValue::new(
                cache,
                format!("{prefix}isolinePeriod"),
                ScaledValue::relative(0.02),
            ),
            isoline_darkness: PersistentValue::new(cache, format!("{prefix}isolineDarkness"), 0.7),
            isoline_contour_thickness: PersistentValue::new(
                cache,
                format!("{prefix}isolineContourThickness"),
                0.3,
            ),
            rebuild_requested: false,
        }
    }

    pub fn values(&self) -> &ManagedBuffer<f32> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ManagedBuffer<f32> {
        &mut self.values
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Reads one value, pulling the host copy first if needed.
    pub fn get_value(&mut self, index: usize) -> RenderResult<f32> {
        self.values.get_value(index)
    }

    /// Replaces the values. The count must not change.
    pub fn update_data(&mut self, values: Vec<f32>) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(PolyvizError::SizeMismatch {
                expected: self.values.len(),
                actual: values.len(),
            });
        }
        self.values.set_data(values);
        Ok(())
    }

    /// Appends the shading rules for the current settings.
    pub fn add_scalar_rules(&self, mut rules: Vec<String>) -> Vec<String> {
        if self.data_type.is_categorical() {
            rules.push("SHADE_CATEGORICAL_COLORMAP".to_string());
            return rules;
        }

        rules.push("SHADE_COLORMAP_VALUE".to_string());
        if self.isolines_enabled.value() {
            rules.push(
                match self.isoline_style.value() {
                    IsolineStyle::Stripe => "ISOLINE_STRIPE_VALUECOLOR",
                    IsolineStyle::Contour => "CONTOUR_VALUECOLOR",
                }
                .to_string(),
            );
        }
        rules
    }

    /// Sets the per-frame uniforms declared by the rules of [`Self::add_scalar_rules`].
    pub fn set_scalar_uniforms(&self, program: &mut dyn ShaderProgram) -> RenderResult<()> {
        if self.data_type.is_categorical() {
            return Ok(());
        }

        program.set_uniform("u_rangeLow", self.viz_range_min.value().into())?;
        program.set_uniform("u_rangeHigh", self.viz_range_max.value().into())?;

        if self.isolines_enabled.value() {
            program.set_uniform("u_modLen", self.isoline_period().into())?;
            program.set_uniform("u_modDarkness", self.isoline_darkness.value().into())?;
            if self.isoline_style.value() == IsolineStyle::Contour {
                program.set_uniform(
                    "u_modThickness",
                    self.isoline_contour_thickness.value().into(),
                )?;
            }
        }
        Ok(())
    }

    /// Binds the colormap texture.
    pub fn set_color_map_texture(
        &self,
        program: &mut dyn ShaderProgram,
        engine: &dyn Engine,
    ) -> RenderResult<()> {
        let color_map = engine.color_map(self.cmap.get())?;
        program.set_texture_from_colormap("t_colormap", color_map)
    }

    /// True once after a setter changed the rules or the colormap texture.
    pub fn take_rebuild_request(&mut self) -> bool {
        std::mem::take(&mut self.rebuild_requested)
    }

    pub fn color_map(&self) -> &str {
        self.cmap.get()
    }

    pub fn set_color_map(&mut self, name: impl Into<String>) {
        let name = name.into();
        if *self.cmap.get() != name {
            self.cmap.set(name);
            self.rebuild_requested = true;
        }
    }

    pub fn map_range(&self) -> (f32, f32) {
        (self.viz_range_min.value(), self.viz_range_max.value())
    }

    pub fn set_map_range(&mut self, (min, max): (f32, f32)) {
        self.viz_range_min.set(min);
        self.viz_range_max.set(max);
    }

    /// Restores the default range for the data type.
    pub fn reset_map_range(&mut self) {
        self.set_map_range(default_map_range(self.data_type, self.data_range));
    }

    /// Extent of the values at construction.
    pub fn data_range(&self) -> (f32, f32) {
        self.data_range
    }

    pub fn isolines_enabled(&self) -> bool {
        self.isolines_enabled.value()
    }

    pub fn set_isolines_enabled(&mut self, enabled: bool) {
        if self.isolines_enabled.value() != enabled {
            self.isolines_enabled.set(enabled);
            self.rebuild_requested = true;
        }
    }

    pub fn isoline_style(&self) -> IsolineStyle {
        self.isoline_style.value()
    }

    pub fn set_isoline_style(&mut self, style: IsolineStyle) {
        if self.isoline_style.value() != style {
            self.isoline_style.set(style);
            if self.isolines_enabled.value() {
                self.rebuild_requested = true;
            }
        }
    }

    /// Isoline period in data units. Relative periods scale with the data range width.
    pub fn isoline_period(&self) -> f32 {
        let width = self.data_range.1 - self.data_range.0;
        let width = if width > 0.0 { width } else { 1.0 };
        self.isoline_period.value().get(width)
    }

    pub fn set_isoline_period(&mut self, period: f32, is_relative: bool) {
        self.isoline_period.set(ScaledValue::new(period, is_relative));
    }

    pub fn isoline_darkness(&self) -> f32 {
        self.isoline_darkness.value()
    }

    pub fn set_isoline_darkness(&mut self, darkness: f32) {
        self.isoline_darkness.set(darkness);
    }

    pub fn isoline_contour_thickness(&self) -> f32 {
        self.isoline_contour_thickness.value()
    }

    pub fn set_isoline_contour_thickness(&mut self, thickness: f32) {
        self.isoline_contour_thickness.set(thickness);
    }

    pub fn to_ui_state(&self) -> ScalarUiState {
        let (range_min, range_max) = self.map_range();
        let (data_min, data_max) = default_map_range(self.data_type, self.data_range);
        ScalarUiState {
            data_type: self.data_type,
            colormap: self.cmap.get().clone(),
            range_min,
            range_max,
            data_min,
            data_max,
            isolines_enabled: self.isolines_enabled.value(),
            isoline_style: self.isoline_style.value(),
            isoline_period: self.isoline_period.value(),
            isoline_darkness: self.isoline_darkness.value(),
            contour_thickness: self.isoline_contour_thickness.value(),
        }
    }

    /// Applies edited UI state through the setters.
    pub fn apply_ui_state(&mut self, ui_state: &ScalarUiState) {
        self.set_color_map(ui_state.colormap.clone());
        if (ui_state.range_min, ui_state.range_max) != self.map_range() {
            self.set_map_range((ui_state.range_min, ui_state.range_max));
        }
        self.set_isolines_enabled(ui_state.isolines_enabled);
        self.set_isoline_style(ui_state.isoline_style);
        if ui_state.isoline_period != self.isoline_period.value() {
            self.isoline_period.set(ui_state.isoline_period);
        }
        if ui_state.isoline_darkness != self.isoline_darkness.value() {
            self.set_isoline_darkness(ui_state.isoline_darkness);
        }
        if ui_state.contour_thickness != self.isoline_contour_thickness.value() {
            self.set_isoline_contour_thickness(ui_state.contour_thickness);
        }
    }
}

impl std::fmt::Debug for ScalarQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarQuantity")
            .field("values", &self.values)
            .field("data_type", &self.data_type)
            .field("cmap", self.cmap.get())
            .field("map_range", &self.map_range())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use polyviz_render::{MockEngine, RAYCAST_SPHERE};

    use super::*;

    fn store(values: Vec<f32>, data_type: DataType) -> ScalarQuantity {
        ScalarQuantity::new(&ViewerState::default(), "test#", values, data_type)
    }

    #[test]
    fn test_defaults_follow_data_type() {
        let s = store(vec![-1.0, 3.0], DataType::Standard);
        assert_eq!(s.color_map(), "viridis");
        assert_eq!(s.map_range(), (-1.0, 3.0));

        let s = store(vec![-1.0, 3.0], DataType::Symmetric);
        assert_eq!(s.color_map(), "coolwarm");
        assert_eq!(s.map_range(), (-3.0, 3.0));

        let s = store(vec![1.0, 3.0], DataType::Magnitude);
        assert_eq!(s.color_map(), "blues");
        assert_eq!(s.map_range(), (0.0, 3.0));

        let s = store(vec![0.0, 2.0], DataType::Categorical);
        assert_eq!(s.color_map(), "hsv");
    }

    #[test]
    fn test_data_range_skips_non_finite() {
        assert_eq!(data_range(&[1.0, f32::NAN, -2.0, f32::INFINITY]), (-2.0, 1.0));
        assert_eq!(data_range(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_rules_follow_settings() {
        let mut s = store(vec![0.0, 1.0], DataType::Standard);
        assert_eq!(s.add_scalar_rules(vec![]), vec!["SHADE_COLORMAP_VALUE"]);

        s.set_isolines_enabled(true);
        assert!(s.take_rebuild_request());
        assert!(!s.take_rebuild_request());
        assert_eq!(
            s.add_scalar_rules(vec!["X".into()]),
            vec!["X", "SHADE_COLORMAP_VALUE", "ISOLINE_STRIPE_VALUECOLOR"]
        );

        s.set_isoline_style(IsolineStyle::Contour);
        assert!(s.take_rebuild_request());
        assert_eq!(
            s.add_scalar_rules(vec![]),
            vec!["SHADE_COLORMAP_VALUE", "CONTOUR_VALUECOLOR"]
        );

        let mut c = store(vec![0.0, 1.0], DataType::Categorical);
        c.set_isolines_enabled(true);
        assert_eq!(c.add_scalar_rules(vec![]), vec!["SHADE_CATEGORICAL_COLORMAP"]);
    }

    #[test]
    fn test_range_changes_do_not_rebuild() {
        let mut s = store(vec![0.0, 10.0], DataType::Standard);
        s.set_map_range((2.0, 4.0));
        assert!(!s.take_rebuild_request());
        assert_eq!(s.map_range(), (2.0, 4.0));
        s.reset_map_range();
        assert_eq!(s.map_range(), (0.0, 10.0));

        s.set_color_map("viridis");
        assert!(!s.take_rebuild_request());
        s.set_color_map("reds");
        assert!(s.take_rebuild_request());
    }

    #[test]
    fn test_relative_isoline_period() {
        let mut s = store(vec![0.0, 10.0], DataType::Standard);
        assert!((s.isoline_period() - 0.2).abs() < 1e-6);
        s.set_isoline_period(0.5, false);
        assert_eq!(s.isoline_period(), 0.5);
    }

    #[test]
    fn test_update_data_checks_size() {
        let mut s = store(vec![0.0, 1.0], DataType::Standard);
        assert!(matches!(
            s.update_data(vec![1.0]),
            Err(PolyvizError::SizeMismatch { expected: 2, actual: 1 })
        ));
        s.update_data(vec![5.0, 6.0]).unwrap();
        assert_eq!(s.get_value(1).unwrap(), 6.0);
    }

    #[test]
    fn test_settings_persist_by_name() {
        let state = ViewerState::default();
        {
            let mut s = ScalarQuantity::new(&state, "q#", vec![0.0], DataType::Standard);
            s.set_color_map("reds");
            s.set_isolines_enabled(true);
        }
        let s = ScalarQuantity::new(&state, "q#", vec![0.0], DataType::Standard);
        assert_eq!(s.color_map(), "reds");
        assert!(s.isolines_enabled());
    }

    #[test]
    fn test_ui_state_round_trip() {
        let mut s = store(vec![0.0, 1.0], DataType::Standard);
        let mut ui = s.to_ui_state();
        assert_eq!(ui.isoline_darkness, 0.7);
        assert_eq!(ui.contour_thickness, 0.3);

        s.apply_ui_state(&ui.clone());
        assert!(!s.take_rebuild_request());

        ui.colormap = "blues".to_string();
        ui.range_max = 0.5;
        ui.isolines_enabled = true;
        ui.isoline_darkness = 0.2;
        s.apply_ui_state(&ui);
        assert!(s.take_rebuild_request());
        assert_eq!(s.to_ui_state(), ui);
    }

    #[test]
    fn test_uniforms_match_rules() {
        let mut engine = MockEngine::new();
        let mut s = store(vec![0.0, 1.0], DataType::Standard);
        s.set_isolines_enabled(true);
        s.set_isoline_style(IsolineStyle::Contour);

        let rules = s.add_scalar_rules(vec!["SPHERE_PROPAGATE_VALUE".into()]);
        let mut program = engine.request_shader(RAYCAST_SPHERE, &rules).unwrap();
        s.set_scalar_uniforms(program.as_mut()).unwrap();
        s.set_color_map_texture(program.as_mut(), &engine).unwrap();

        assert_eq!(program.uniform("u_rangeHigh").and_then(|u| u.as_float()), Some(1.0));
        assert!(program.uniform("u_modThickness").is_some());
        assert!(program.texture("t_colormap").is_some());
    }
}
