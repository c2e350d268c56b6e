//! Shader program composition.
//!
//! A [`ShaderRegistry`] holds program templates and [`ShaderRule`]s. Requesting a
//! program with an ordered list of rule names produces a [`ComposedProgram`]: the
//! template source with every rule's text inserted at its tags, and the union of
//! all declared uniforms, attributes and textures. Composed programs are cached by
//! program name plus rule order, so `[A, B]` and `[B, A]` are different programs.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::rules::{
    apply_shader_replacements, builtin_rules, AttributeSpec, ShaderRule, TextureSpec, UniformSpec,
};
use crate::types::RenderDataType;

/// Name of the sphere impostor program.
pub const RAYCAST_SPHERE: &str = "RAYCAST_SPHERE";
/// Name of the capped cylinder impostor program.
pub const RAYCAST_CYLINDER: &str = "RAYCAST_CYLINDER";
/// Name of the vector shaft program.
pub const RAYCAST_VECTOR: &str = "RAYCAST_VECTOR";

const COMMON_WGSL: &str = include_str!("../shaders/common.wgsl");

/// A program before any rules are applied.
#[derive(Debug, Clone)]
pub struct ProgramTemplate {
    pub name: String,
    /// WGSL body with `${ TAG }$` insertion points. Binding declarations are
    /// generated, so the body only refers to `u.<uniform>` and attribute arrays.
    pub source: String,
    pub uniforms: Vec<UniformSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub textures: Vec<TextureSpec>,
    pub vertices_per_instance: u32,
}

impl ProgramTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            textures: Vec::new(),
            vertices_per_instance: 36,
        }
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
}

/// Byte offset of one uniform inside the packed uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub data_type: RenderDataType,
    pub offset: usize,
}

/// WGSL-compatible layout of a program's `Uniforms` struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub slots: Vec<UniformSlot>,
    /// Total size, a multiple of 16 and never zero.
    pub size: usize,
}

impl UniformLayout {
    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|s| s.name == name)
    }
}

fn align_to(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// A fully assembled program, ready to be handed to an engine.
#[derive(Debug, Clone)]
pub struct ComposedProgram {
    pub program_name: String,
    /// Custom rules followed by the defaults that were appended.
    pub rules: Vec<String>,
    /// Cache key: program name plus ordered rule list.
    pub key: String,
    /// Template body after replacements, without binding declarations.
    pub source: String,
    pub uniforms: Vec<UniformSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub textures: Vec<TextureSpec>,
    pub vertices_per_instance: u32,
}

impl ComposedProgram {
    pub fn uniform(&self, name: &str) -> Option<&UniformSpec> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn texture(&self, name: &str) -> Option<&TextureSpec> {
        self.textures.iter().find(|t| t.name == name)
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r == name)
    }

    /// Packs uniforms in declaration order using WGSL uniform alignment rules.
    pub fn uniform_layout(&self) -> UniformLayout {
        let mut offset = 0;
        let mut slots = Vec::with_capacity(self.uniforms.len());
        for spec in &self.uniforms {
            offset = align_to(offset, spec.data_type.uniform_align());
            slots.push(UniformSlot {
                name: spec.name.clone(),
                data_type: spec.data_type,
                offset,
            });
            offset += spec.data_type.host_size();
        }
        UniformLayout {
            slots,
            size: align_to(offset.max(1), 16),
        }
    }

    /// Binding declarations for group 0.
    ///
    /// Binding 0 is the uniform block, followed by one read-only storage array per
    /// attribute, followed by a texture and sampler pair per texture.
    pub fn wgsl_preamble(&self) -> String {
        let mut out = String::from("struct Uniforms {\n");
        if self.uniforms.is_empty() {
            out.push_str("    _unused: vec4<f32>,\n");
        }
        for spec in &self.uniforms {
            let _ = writeln!(out, "    {}: {},", spec.name, spec.data_type.wgsl_uniform_type());
        }
        out.push_str("}\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");

        let mut binding = 1;
        for spec in &self.attributes {
            let _ = writeln!(
                out,
                "@group(0) @binding({binding}) var<storage, read> {}: array<{}>;",
                spec.name,
                spec.data_type.wgsl_storage_type()
            );
            binding += 1;
        }
        for spec in &self.textures {
            let _ = writeln!(
                out,
                "@group(0) @binding({binding}) var {}: texture_2d<f32>;",
                spec.name
            );
            let _ = writeln!(
                out,
                "@group(0) @binding({}) var {}_sampler: sampler;",
                binding + 1,
                spec.name
            );
            binding += 2;
        }
        out
    }

    /// Complete WGSL module: bindings, shared helpers and the composed body.
    pub fn full_source(&self) -> String {
        format!("{}\n{COMMON_WGSL}\n{}", self.wgsl_preamble(), self.source)
    }
}

/// Adds `spec` unless a declaration with the same name exists. A same-name
/// declaration with a different type is an error.
fn add_unique<T: Declaration + Clone>(list: &mut Vec<T>, spec: &T) -> RenderResult<()> {
    match list.iter().find(|existing| existing.name() == spec.name()) {
        Some(existing) if existing.data_type() != spec.data_type() => {
            Err(RenderError::ConflictingDeclaration {
                name: spec.name().to_string(),
                existing: existing.data_type(),
                requested: spec.data_type(),
            })
        }
        Some(_) => Ok(()),
        None => {
            list.push(spec.clone());
            Ok(())
        }
    }
}

trait Declaration {
    fn name(&self) -> &str;
    fn data_type(&self) -> RenderDataType;
}

impl Declaration for UniformSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> RenderDataType {
        self.data_type
    }
}

impl Declaration for AttributeSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> RenderDataType {
        self.data_type
    }
}

impl Declaration for TextureSpec {
    fn name(&self) -> &str {
        &self.name
    }

    // Textures are all 2D RGBA on the device.
    fn data_type(&self) -> RenderDataType {
        RenderDataType::Vector4Float
    }
}

/// Program templates, rules, and the cache of composed programs.
pub struct ShaderRegistry {
    programs: HashMap<String, ProgramTemplate>,
    rules: HashMap<String, ShaderRule>,
    default_rules: Vec<String>,
    cache: HashMap<String, Arc<ComposedProgram>>,
    compose_count: u64,
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderRegistry {
    /// Creates a registry holding the built-in programs and rules.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for template in builtin_programs() {
            registry.programs.insert(template.name.clone(), template);
        }
        for rule in builtin_rules() {
            registry.rules.insert(rule.name.clone(), rule);
        }
        registry.default_rules = vec!["GLOBAL_FRAGMENT_FILTER".to_string()];
        registry
    }

    /// Creates a registry with no programs, rules or defaults.
    pub fn empty() -> Self {
        Self {
            programs: HashMap::new(),
            rules: HashMap::new(),
            default_rules: Vec::new(),
            cache: HashMap::new(),
            compose_count: 0,
        }
    }

    /// Adds or replaces a program template. Cached compositions are dropped.
    pub fn register_program(&mut self, template: ProgramTemplate) {
        if self.programs.contains_key(&template.name) {
            log::warn!("replacing shader program {}", template.name);
        }
        self.programs.insert(template.name.clone(), template);
        self.cache.clear();
    }

    /// Adds or replaces a rule. Cached compositions are dropped.
    pub fn register_rule(&mut self, rule: ShaderRule) {
        if self.rules.contains_key(&rule.name) {
            log::warn!("replacing shader rule {}", rule.name);
        }
        self.rules.insert(rule.name.clone(), rule);
        self.cache.clear();
    }

    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> Option<&ShaderRule> {
        self.rules.get(name)
    }

    /// Rules appended to every request.
    pub fn default_rules(&self) -> &[String] {
        &self.default_rules
    }

    pub fn set_default_rules(&mut self, rules: Vec<String>) {
        self.default_rules = rules;
        self.cache.clear();
    }

    /// Number of compositions performed, cache hits excluded.
    pub fn compose_count(&self) -> u64 {
        self.compose_count
    }

    /// Number of distinct cached compositions.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache key for a program and ordered rule lists.
    pub fn program_key(program: &str, rules: &[String], defaults: &[String]) -> String {
        let mut key = format!("$PROGRAMNAME: {program}#  $RULES: ");
        for rule in rules {
            let _ = write!(key, "{rule}# ");
        }
        key.push_str("  $DEFAULTS: ");
        for rule in defaults {
            let _ = write!(key, "{rule}# ");
        }
        key
    }

    /// Composes `program` with `rule_names` in order, then the default rules.
    ///
    /// Empty names are skipped. Defaults already present in `rule_names` are not
    /// added twice.
    pub fn compose(
        &mut self,
        program: &str,
        rule_names: &[String],
    ) -> RenderResult<Arc<ComposedProgram>> {
        let template = self
            .programs
            .get(program)
            .ok_or_else(|| RenderError::UnknownShaderProgram(program.to_string()))?;

        let mut custom: Vec<String> = Vec::with_capacity(rule_names.len());
        for name in rule_names.iter().filter(|n| !n.is_empty()) {
            if custom.contains(name) {
                return Err(RenderError::DuplicateShaderRule {
                    program: program.to_string(),
                    rule: name.clone(),
                });
            }
            custom.push(name.clone());
        }
        let defaults: Vec<String> = self
            .default_rules
            .iter()
            .filter(|d| !custom.contains(d))
            .cloned()
            .collect();

        let key = Self::program_key(program, &custom, &defaults);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let mut rules: Vec<&ShaderRule> = Vec::with_capacity(custom.len() + defaults.len());
        for name in custom.iter().chain(&defaults) {
            let rule = self
                .rules
                .get(name)
                .ok_or_else(|| RenderError::UnknownShaderRule(name.clone()))?;
            rules.push(rule);
        }

        let mut uniforms = template.uniforms.clone();
        let mut attributes = template.attributes.clone();
        let mut textures = template.textures.clone();
        for rule in &rules {
            for spec in &rule.uniforms {
                add_unique(&mut uniforms, spec)?;
            }
            for spec in &rule.attributes {
                add_unique(&mut attributes, spec)?;
            }
            for spec in &rule.textures {
                add_unique(&mut textures, spec)?;
            }
        }

        let source = apply_shader_replacements(&template.source, &rules);
        let all_rules: Vec<String> = custom.into_iter().chain(defaults).collect();

        let composed = Arc::new(ComposedProgram {
            program_name: program.to_string(),
            rules: all_rules,
            key: key.clone(),
            source,
            uniforms,
            attributes,
            textures,
            vertices_per_instance: template.vertices_per_instance,
        });

        self.compose_count += 1;
        log::debug!("composed shader program {key}");
        self.cache.insert(key, Arc::clone(&composed));
        Ok(composed)
    }
}

/// The ray-cast impostor programs used by curve networks.
pub fn builtin_programs() -> Vec<ProgramTemplate> {
    use RenderDataType::{Float, Matrix44Float, Vector3Float};

    vec![
        ProgramTemplate::new(RAYCAST_SPHERE, include_str!("../shaders/raycast_sphere.wgsl"))
            .uniform("u_modelView", Matrix44Float)
            .uniform("u_projMatrix", Matrix44Float)
            .uniform("u_pointRadius", Float)
            .attribute("a_position", Vector3Float),
        ProgramTemplate::new(RAYCAST_CYLINDER, include_str!("../shaders/raycast_cylinder.wgsl"))
            .uniform("u_modelView", Matrix44Float)
            .uniform("u_projMatrix", Matrix44Float)
            .uniform("u_radius", Float)
            .attribute("a_position_tail", Vector3Float)
            .attribute("a_position_tip", Vector3Float),
        ProgramTemplate::new(RAYCAST_VECTOR, include_str!("../shaders/raycast_vector.wgsl"))
            .uniform("u_modelView", Matrix44Float)
            .uniform("u_projMatrix", Matrix44Float)
            .uniform("u_radius", Float)
            .uniform("u_lengthMult", Float)
            .attribute("a_vector_base", Vector3Float)
            .attribute("a_vector", Vector3Float),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rules: &[&str]) -> Vec<String> {
        rules.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rule_order_gives_distinct_programs() {
        let mut reg = ShaderRegistry::new();
        let a = reg
            .compose(RAYCAST_CYLINDER, &names(&["SHADE_BASECOLOR", "TRANSPARENCY_STRUCTURE"]))
            .unwrap();
        let b = reg
            .compose(RAYCAST_CYLINDER, &names(&["TRANSPARENCY_STRUCTURE", "SHADE_BASECOLOR"]))
            .unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(reg.compose_count(), 2);
        assert_eq!(reg.cached_len(), 2);
    }

    #[test]
    fn test_same_request_hits_cache() {
        let mut reg = ShaderRegistry::new();
        let rules = names(&["SHADE_BASECOLOR", "LIGHT_PASSTHRU"]);
        let a = reg.compose(RAYCAST_SPHERE, &rules).unwrap();
        let b = reg.compose(RAYCAST_SPHERE, &rules).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.compose_count(), 1);
    }

    #[test]
    fn test_defaults_appended_after_custom_rules() {
        let mut reg = ShaderRegistry::new();
        let p = reg
            .compose(RAYCAST_SPHERE, &names(&["SHADE_BASECOLOR", "", "LIGHT_PASSTHRU"]))
            .unwrap();
        assert_eq!(
            p.rules,
            names(&["SHADE_BASECOLOR", "LIGHT_PASSTHRU", "GLOBAL_FRAGMENT_FILTER"])
        );
        assert_eq!(
            p.key,
            "$PROGRAMNAME: RAYCAST_SPHERE#  $RULES: SHADE_BASECOLOR# LIGHT_PASSTHRU#   $DEFAULTS: GLOBAL_FRAGMENT_FILTER# "
        );
    }

    #[test]
    fn test_explicit_default_not_duplicated() {
        let mut reg = ShaderRegistry::new();
        let p = reg
            .compose(RAYCAST_SPHERE, &names(&["GLOBAL_FRAGMENT_FILTER", "SHADE_BASECOLOR"]))
            .unwrap();
        assert_eq!(p.rules.iter().filter(|r| *r == "GLOBAL_FRAGMENT_FILTER").count(), 1);
    }

    #[test]
    fn test_composition_errors() {
        let mut reg = ShaderRegistry::new();
        assert!(matches!(
            reg.compose("NOPE", &[]),
            Err(RenderError::UnknownShaderProgram(_))
        ));
        assert!(matches!(
            reg.compose(RAYCAST_SPHERE, &names(&["NOT_A_RULE"])),
            Err(RenderError::UnknownShaderRule(name)) if name == "NOT_A_RULE"
        ));
        assert!(matches!(
            reg.compose(RAYCAST_SPHERE, &names(&["SHADE_COLOR", "SHADE_COLOR"])),
            Err(RenderError::DuplicateShaderRule { .. })
        ));
        assert_eq!(reg.compose_count(), 0);
    }

    #[test]
    fn test_conflicting_declaration() {
        let mut reg = ShaderRegistry::new();
        reg.register_rule(
            ShaderRule::new("BAD_VALUE").attribute("a_value", RenderDataType::Vector3Float),
        );
        let err = reg
            .compose(RAYCAST_SPHERE, &names(&["SPHERE_PROPAGATE_VALUE", "BAD_VALUE"]))
            .unwrap_err();
        assert!(matches!(err, RenderError::ConflictingDeclaration { name, .. } if name == "a_value"));
    }

    #[test]
    fn test_shared_declarations_merge() {
        let mut reg = ShaderRegistry::new();
        let p = reg
            .compose(
                RAYCAST_CYLINDER,
                &names(&[
                    "CYLINDER_PROPAGATE_VALUE",
                    "SHADE_COLORMAP_VALUE",
                    "ISOLINE_STRIPE_VALUECOLOR",
                    "CONTOUR_VALUECOLOR",
                ]),
            )
            .unwrap();
        assert_eq!(p.uniforms.iter().filter(|u| u.name == "u_modLen").count(), 1);
        assert!(p.texture("t_colormap").is_some());
        assert!(p.attribute("a_value").is_some());
    }

    #[test]
    fn test_composed_source_has_rule_text_and_no_tags() {
        let mut reg = ShaderRegistry::new();
        let p = reg
            .compose(
                RAYCAST_CYLINDER,
                &names(&["CYLINDER_PROPAGATE_BLEND_VALUE", "SHADE_COLORMAP_VALUE", "LIGHT_MATCAP"]),
            )
            .unwrap();
        assert!(!p.source.contains("${"));
        let value = p.source.find("mix(a_value_tail").unwrap();
        let color = p.source.find("rangeTVal").unwrap();
        assert!(value < color);

        let full = p.full_source();
        assert!(full.contains("var<storage, read> a_value_tail: array<f32>;"));
        assert!(full.contains("var<storage, read> a_position_tail: array<vec4<f32>>;"));
        assert!(full.contains("var t_mat_k: texture_2d<f32>;"));
        assert!(full.contains("var t_colormap_sampler: sampler;"));
    }

    #[test]
    fn test_uniform_layout_follows_wgsl_alignment() {
        let mut reg = ShaderRegistry::new();
        let p = reg
            .compose(RAYCAST_SPHERE, &names(&["SHADE_BASECOLOR", "LIGHT_PASSTHRU"]))
            .unwrap();
        let layout = p.uniform_layout();
        // mat4, mat4, f32 radius, vec3 base color (aligned to 16), f32 exposure
        assert_eq!(layout.slot("u_modelView").unwrap().offset, 0);
        assert_eq!(layout.slot("u_projMatrix").unwrap().offset, 64);
        assert_eq!(layout.slot("u_pointRadius").unwrap().offset, 128);
        assert_eq!(layout.slot("u_baseColor").unwrap().offset, 144);
        assert_eq!(layout.slot("u_exposure").unwrap().offset, 156);
        assert_eq!(layout.size, 160);
    }

    #[test]
    fn test_register_rule_drops_cache() {
        let mut reg = ShaderRegistry::new();
        reg.compose(RAYCAST_SPHERE, &names(&["SHADE_BASECOLOR"])).unwrap();
        assert_eq!(reg.cached_len(), 1);
        reg.register_rule(ShaderRule::new("CUSTOM").replace("GENERATE_ALPHA", "alphaOut = 0.5;"));
        assert_eq!(reg.cached_len(), 0);
        let p = reg
            .compose(RAYCAST_SPHERE, &names(&["SHADE_BASECOLOR", "CUSTOM"]))
            .unwrap();
        assert!(p.source.contains("alphaOut = 0.5;"));
    }
}
