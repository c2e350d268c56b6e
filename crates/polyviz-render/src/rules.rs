//! Shader replacement rules.
//!
//! A rule is a named bundle of WGSL snippets keyed by insertion tag, together with
//! the uniforms, attributes and textures those snippets need. Program templates
//! contain tags written as `${ TAG }$`. Applying a rule inserts each snippet just
//! before its tag, so later rules land after earlier ones at the same tag.
//!
//! Conventions shared by the built-in templates and rules:
//! - `GENERATE_SHADE_VALUE` defines `shadeValue: f32` or `shadeColor: vec3<f32>`
//! - `GENERATE_SHADE_COLOR` defines `var albedoColor: vec3<f32>`
//! - `GENERATE_LIT_COLOR` defines `litColor: vec3<f32>`
//! - `GENERATE_ALPHA` may scale `alphaOut`
//! - uniforms are read through `u.<name>`, attributes indexed by `instance`

use crate::types::RenderDataType;

/// A uniform declared by a template or rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSpec {
    pub name: String,
    pub data_type: RenderDataType,
}

/// A per-instance attribute declared by a template or rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub data_type: RenderDataType,
}

/// A sampled texture declared by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSpec {
    pub name: String,
    /// Logical dimension: 1 for colormaps, 2 for images. Both are stored as 2D.
    pub dimension: u32,
}

/// A named contribution to program assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderRule {
    pub name: String,
    /// `(tag, text)` pairs, applied in order.
    pub replacements: Vec<(String, String)>,
    pub uniforms: Vec<UniformSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub textures: Vec<TextureSpec>,
}

impl ShaderRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replacements: Vec::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            textures: Vec::new(),
        }
    }

    #[must_use]
    pub fn replace(mut self, tag: &str, text: &str) -> Self {
        self.replacements.push((tag.to_string(), text.to_string()));
        self
    }

    #[must_use]
    pub fn uniform(mut self, name: &str, data_type: RenderDataType) -> Self {
        self.uniforms.push(UniformSpec {
            name: name.to_string(),
            data_type,
        });
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: &str, data_type: RenderDataType) -> Self {
        self.attributes.push(AttributeSpec {
            name: name.to_string(),
            data_type,
        });
        self
    }

    #[must_use]
    pub fn texture(mut self, name: &str, dimension: u32) -> Self {
        self.textures.push(TextureSpec {
            name: name.to_string(),
            dimension,
        });
        self
    }
}

/// Formats a tag marker as it appears in template source.
pub fn tag_marker(tag: &str) -> String {
    format!("${{ {tag} }}$")
}

/// Inserts every replacement of every rule before its tag, then strips the tags.
///
/// Text for a tag that the source does not contain is dropped.
pub fn apply_shader_replacements(source: &str, rules: &[&ShaderRule]) -> String {
    let mut src = source.to_string();

    for rule in rules {
        for (tag, text) in &rule.replacements {
            let marker = tag_marker(tag);
            match src.find(&marker) {
                Some(pos) => {
                    let mut insert = String::with_capacity(text.len() + 1);
                    insert.push_str(text);
                    insert.push('\n');
                    src.insert_str(pos, &insert);
                }
                None => {
                    log::debug!("rule {} targets missing tag {tag}", rule.name);
                }
            }
        }
    }

    strip_tags(&src)
}

fn strip_tags(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("${ ") {
        match rest[start..].find(" }$") {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end + 3..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

pub const FRAG_DECLARATIONS: &str = "FRAG_DECLARATIONS";
pub const GENERATE_SHADE_VALUE: &str = "GENERATE_SHADE_VALUE";
pub const GENERATE_SHADE_COLOR: &str = "GENERATE_SHADE_COLOR";
pub const GENERATE_LIT_COLOR: &str = "GENERATE_LIT_COLOR";
pub const GENERATE_ALPHA: &str = "GENERATE_ALPHA";
pub const GLOBAL_FRAGMENT_FILTER: &str = "GLOBAL_FRAGMENT_FILTER";

use RenderDataType::{Float, Vector3Float};

/// Every rule the registries know out of the box.
pub fn builtin_rules() -> Vec<ShaderRule> {
    vec![
        // == defaults
        ShaderRule::new("GLOBAL_FRAGMENT_FILTER")
            .replace(GLOBAL_FRAGMENT_FILTER, "// no global fragment filters"),
        // == lighting
        ShaderRule::new("LIGHT_MATCAP")
            .replace(
                FRAG_DECLARATIONS,
                r"
fn lightSurfaceMat(normal: vec3<f32>, color: vec3<f32>) -> vec3<f32> {
    let uv = vec2<f32>(normal.x, -normal.y) * 0.5 + vec2<f32>(0.5, 0.5);
    let matR = textureSampleLevel(t_mat_r, t_mat_r_sampler, uv, 0.0).rgb;
    let matG = textureSampleLevel(t_mat_g, t_mat_g_sampler, uv, 0.0).rgb;
    let matB = textureSampleLevel(t_mat_b, t_mat_b_sampler, uv, 0.0).rgb;
    let matK = textureSampleLevel(t_mat_k, t_mat_k_sampler, uv, 0.0).rgb;
    return color.r * matR + color.g * matG + color.b * matB
        + (1.0 - color.r - color.g - color.b) * matK;
}",
            )
            .replace(
                GENERATE_LIT_COLOR,
                "let litColor = lightSurfaceMat(shadeNormal, albedoColor) * u.u_exposure;",
            )
            .uniform("u_exposure", Float)
            .texture("t_mat_r", 2)
            .texture("t_mat_g", 2)
            .texture("t_mat_b", 2)
            .texture("t_mat_k", 2),
        ShaderRule::new("LIGHT_PASSTHRU")
            .replace(GENERATE_LIT_COLOR, "let litColor = albedoColor * u.u_exposure;")
            .uniform("u_exposure", Float),
        // == shading
        ShaderRule::new("SHADE_BASECOLOR")
            .replace(GENERATE_SHADE_COLOR, "var albedoColor = u.u_baseColor;")
            .uniform("u_baseColor", Vector3Float),
        ShaderRule::new("SHADE_COLOR")
            .replace(GENERATE_SHADE_COLOR, "var albedoColor = shadeColor;"),
        ShaderRule::new("SHADE_COLORMAP_VALUE")
            .replace(
                GENERATE_SHADE_COLOR,
                r"
let rangeTVal = clamp((shadeValue - u.u_rangeLow) / (u.u_rangeHigh - u.u_rangeLow), 0.0, 1.0);
var albedoColor = textureSampleLevel(t_colormap, t_colormap_sampler, vec2<f32>(rangeTVal, 0.5), 0.0).rgb;",
            )
            .uniform("u_rangeLow", Float)
            .uniform("u_rangeHigh", Float)
            .texture("t_colormap", 1),
        ShaderRule::new("SHADE_CATEGORICAL_COLORMAP")
            .replace(
                FRAG_DECLARATIONS,
                r"
fn intToDistinctReal(start: f32, index: i32) -> f32 {
    let goldenRatioConjugate = 0.618033988749895;
    return fract(start + f32(index) * goldenRatioConjugate);
}",
            )
            .replace(
                GENERATE_SHADE_COLOR,
                r"
var shadeInt = i32(round(shadeValue));
var startOffset = 0.0;
if (shadeInt < 0) {
    shadeInt = -shadeInt;
    startOffset = 1.0 / 3.0;
}
let catVal = intToDistinctReal(startOffset, shadeInt);
var albedoColor = textureSampleLevel(t_colormap, t_colormap_sampler, vec2<f32>(catVal, 0.5), 0.0).rgb;",
            )
            .texture("t_colormap", 1),
        ShaderRule::new("ISOLINE_STRIPE_VALUECOLOR")
            .replace(
                GENERATE_SHADE_COLOR,
                r"
let modPeriod = 2.0 * u.u_modLen;
let modVal = shadeValue - modPeriod * floor(shadeValue / modPeriod);
if (modVal > u.u_modLen) {
    albedoColor = albedoColor * u.u_modDarkness;
}",
            )
            .uniform("u_modLen", Float)
            .uniform("u_modDarkness", Float),
        ShaderRule::new("CONTOUR_VALUECOLOR")
            .replace(
                GENERATE_SHADE_COLOR,
                r"
let gradF = vec2<f32>(dpdx(shadeValue), dpdy(shadeValue));
let contourW = 1.0 / (10.0 / u.u_modLen * u.u_modThickness * length(gradF));
let contourS = u.u_modDarkness
    * exp(-pow(abs(contourW * (fract(abs(shadeValue / u.u_modLen)) - 0.5)), 8.0));
albedoColor = albedoColor * (1.0 - contourS);",
            )
            .uniform("u_modLen", Float)
            .uniform("u_modThickness", Float)
            .uniform("u_modDarkness", Float),
        // == geometry value propagation
        ShaderRule::new("SPHERE_PROPAGATE_VALUE")
            .replace(GENERATE_SHADE_VALUE, "let shadeValue = a_value[instance];")
            .attribute("a_value", Float),
        ShaderRule::new("SPHERE_PROPAGATE_COLOR")
            .replace(GENERATE_SHADE_VALUE, "let shadeColor = a_color[instance].xyz;")
            .attribute("a_color", Vector3Float),
        ShaderRule::new("CYLINDER_PROPAGATE_VALUE")
            .replace(GENERATE_SHADE_VALUE, "let shadeValue = a_value[instance];")
            .attribute("a_value", Float),
        ShaderRule::new("CYLINDER_PROPAGATE_BLEND_VALUE")
            .replace(
                GENERATE_SHADE_VALUE,
                "let shadeValue = mix(a_value_tail[instance], a_value_tip[instance], tEdge);",
            )
            .attribute("a_value_tail", Float)
            .attribute("a_value_tip", Float),
        ShaderRule::new("CYLINDER_PROPAGATE_NEAREST_VALUE")
            .replace(
                GENERATE_SHADE_VALUE,
                "let shadeValue = select(a_value_tail[instance], a_value_tip[instance], tEdge > 0.5);",
            )
            .attribute("a_value_tail", Float)
            .attribute("a_value_tip", Float),
        ShaderRule::new("CYLINDER_PROPAGATE_COLOR")
            .replace(GENERATE_SHADE_VALUE, "let shadeColor = a_color[instance].xyz;")
            .attribute("a_color", Vector3Float),
        ShaderRule::new("CYLINDER_PROPAGATE_BLEND_COLOR")
            .replace(
                GENERATE_SHADE_VALUE,
                "let shadeColor = mix(a_color_tail[instance].xyz, a_color_tip[instance].xyz, tEdge);",
            )
            .attribute("a_color_tail", Vector3Float)
            .attribute("a_color_tip", Vector3Float),
        // == structure options
        ShaderRule::new("TRANSPARENCY_STRUCTURE")
            .replace(GENERATE_ALPHA, "alphaOut = alphaOut * u.u_transparency;")
            .uniform("u_transparency", Float),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacements_keep_rule_order_at_shared_tag() {
        let a = ShaderRule::new("A").replace("BODY", "first();");
        let b = ShaderRule::new("B").replace("BODY", "second();");
        let src = "start\n${ BODY }$\nend";

        let out = apply_shader_replacements(src, &[&a, &b]);
        let first = out.find("first();").unwrap();
        let second = out.find("second();").unwrap();
        assert!(first < second);
        assert!(!out.contains("${"));
        assert!(out.starts_with("start\n"));
        assert!(out.trim_end().ends_with("end"));
    }

    #[test]
    fn test_unused_tags_are_stripped() {
        let out = apply_shader_replacements("a ${ X }$ b ${ Y }$ c", &[]);
        assert_eq!(out, "a  b  c");
    }

    #[test]
    fn test_missing_tag_drops_text() {
        let rule = ShaderRule::new("R").replace("NOPE", "lost();");
        let out = apply_shader_replacements("${ BODY }$", &[&rule]);
        assert!(!out.contains("lost"));
    }

    #[test]
    fn test_builtin_rule_names_are_unique() {
        let rules = builtin_rules();
        let mut names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
