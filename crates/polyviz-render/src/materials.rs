//! Material system.
//!
//! Materials define how surfaces are shaded. Blendable materials (clay, wax, candy, flat)
//! use 4-channel matcap textures (R/G/B/K) for color-tinted lighting. Static materials
//! (mud, ceramic, jade, normal) use a single matcap texture for all channels.
//!
//! Built-in matcaps are generated procedurally from the material's lighting factors.
//! Custom materials can be loaded from image files.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::error::{RenderError, RenderResult};
use crate::types::TextureData;

/// Side length of generated matcap textures.
pub const MATCAP_SIZE: u32 = 64;

/// A material definition for rendering.
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Whether this is a flat (unlit) material.
    pub is_flat: bool,
    /// Whether this material has separate R/G/B/K matcap channels (blendable).
    pub is_blendable: bool,
    /// Ambient light factor (0.0 - 1.0).
    pub ambient: f32,
    /// Diffuse reflection factor (0.0 - 1.0).
    pub diffuse: f32,
    /// Specular reflection intensity (0.0 - 1.0).
    pub specular: f32,
    /// Specular shininess/exponent (higher = sharper highlights).
    pub shininess: f32,
    /// Surface color of static materials, which ignore the quantity color.
    pub base_tint: Vec3,
}

impl Material {
    /// Creates a new blendable material with custom properties.
    pub fn blendable(
        name: impl Into<String>,
        ambient: f32,
        diffuse: f32,
        specular: f32,
        shininess: f32,
    ) -> Self {
        Self {
            name: name.into(),
            is_flat: false,
            is_blendable: true,
            ambient,
            diffuse,
            specular,
            shininess,
            base_tint: Vec3::ONE,
        }
    }

    /// Creates a new static (non-blendable) material with custom properties.
    pub fn static_mat(
        name: impl Into<String>,
        base_tint: Vec3,
        ambient: f32,
        diffuse: f32,
        specular: f32,
        shininess: f32,
    ) -> Self {
        Self {
            name: name.into(),
            is_flat: false,
            is_blendable: false,
            ambient,
            diffuse,
            specular,
            shininess,
            base_tint,
        }
    }

    /// Creates a flat (unlit) material. Flat is blendable but shader skips matcap.
    pub fn flat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_flat: true,
            is_blendable: true,
            ambient: 1.0,
            diffuse: 0.0,
            specular: 0.0,
            shininess: 1.0,
            base_tint: Vec3::ONE,
        }
    }

    #[must_use]
    pub fn clay() -> Self {
        Self::blendable("clay", 0.25, 0.75, 0.1, 8.0)
    }

    #[must_use]
    pub fn wax() -> Self {
        Self::blendable("wax", 0.2, 0.7, 0.4, 16.0)
    }

    #[must_use]
    pub fn candy() -> Self {
        Self::blendable("candy", 0.15, 0.6, 0.7, 64.0)
    }

    #[must_use]
    pub fn ceramic() -> Self {
        Self::static_mat("ceramic", Vec3::new(0.92, 0.91, 0.88), 0.2, 0.65, 0.5, 32.0)
    }

    #[must_use]
    pub fn jade() -> Self {
        Self::static_mat("jade", Vec3::new(0.36, 0.66, 0.46), 0.3, 0.6, 0.3, 24.0)
    }

    #[must_use]
    pub fn mud() -> Self {
        Self::static_mat("mud", Vec3::new(0.46, 0.36, 0.26), 0.3, 0.7, 0.0, 1.0)
    }

    #[must_use]
    pub fn normal() -> Self {
        Self::static_mat("normal", Vec3::new(0.6, 0.6, 0.9), 0.2, 0.7, 0.3, 32.0)
    }

    /// Shading intensity and highlight for a unit view-space normal.
    fn shade(&self, normal: Vec3) -> (f32, f32) {
        if self.is_flat {
            return (1.0, 0.0);
        }
        let light = Vec3::new(-0.4, 0.6, 0.7).normalize();
        let half = (light + Vec3::Z).normalize();
        let lambert = normal.dot(light).max(0.0);
        let highlight = self.specular * normal.dot(half).max(0.0).powf(self.shininess);
        (self.ambient + self.diffuse * lambert, highlight)
    }

    /// Generates the four matcap channels for this material.
    #[allow(clippy::cast_precision_loss)]
    pub fn generate_matcaps(&self) -> MatcapSet {
        let size = MATCAP_SIZE;
        let last = (size - 1) as f32;
        let mut channels: [Vec<Vec4>; 4] =
            std::array::from_fn(|_| Vec::with_capacity((size * size) as usize));

        for y in 0..size {
            for x in 0..size {
                let nx = 2.0 * (x as f32 / last) - 1.0;
                let ny = 1.0 - 2.0 * (y as f32 / last);
                let nz = (1.0 - nx * nx - ny * ny).max(0.0).sqrt();
                let (intensity, highlight) = self.shade(Vec3::new(nx, ny, nz).normalize_or_zero());
                let spec = Vec3::splat(highlight);

                if self.is_blendable {
                    channels[0].push((Vec3::X * intensity + spec).extend(1.0));
                    channels[1].push((Vec3::Y * intensity + spec).extend(1.0));
                    channels[2].push((Vec3::Z * intensity + spec).extend(1.0));
                    channels[3].push(spec.extend(1.0));
                } else {
                    let texel = (self.base_tint * intensity + spec).extend(1.0);
                    for channel in &mut channels {
                        channel.push(texel);
                    }
                }
            }
        }

        let [r, g, b, k] = channels.map(|texels| Arc::new(TextureData::new(size, size, texels)));
        MatcapSet { r, g, b, k }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::clay()
    }
}

/// Host-side matcap textures of one material.
///
/// For static materials all four channels hold the same texture.
#[derive(Debug, Clone)]
pub struct MatcapSet {
    pub r: Arc<TextureData>,
    pub g: Arc<TextureData>,
    pub b: Arc<TextureData>,
    pub k: Arc<TextureData>,
}

/// Registry for managing materials.
#[derive(Default)]
pub struct MaterialRegistry {
    materials: HashMap<String, Material>,
    matcaps: HashMap<String, MatcapSet>,
    default_material: String,
}

impl MaterialRegistry {
    /// Creates a new material registry with default materials.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            materials: HashMap::new(),
            matcaps: HashMap::new(),
            default_material: "clay".to_string(),
        };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(Material::clay());
        self.register(Material::wax());
        self.register(Material::candy());
        self.register(Material::ceramic());
        self.register(Material::jade());
        self.register(Material::mud());
        self.register(Material::normal());
        self.register(Material::flat("flat"));
    }

    /// Registers a material and generates its matcaps.
    pub fn register(&mut self, material: Material) {
        let matcaps = material.generate_matcaps();
        self.register_with_matcaps(material, matcaps);
    }

    /// Registers a material with explicit matcap textures.
    pub fn register_with_matcaps(&mut self, material: Material, matcaps: MatcapSet) {
        if self.materials.contains_key(&material.name) {
            log::warn!("replacing material {}", material.name);
        }
        self.matcaps.insert(material.name.clone(), matcaps);
        self.materials.insert(material.name.clone(), material);
    }

    /// Loads a static material whose single image is used for all channels.
    pub fn load_static_material(&mut self, name: &str, path: &Path) -> RenderResult<()> {
        let texture = Arc::new(decode_matcap_image_from_file(path)?);
        let matcaps = MatcapSet {
            r: Arc::clone(&texture),
            g: Arc::clone(&texture),
            b: Arc::clone(&texture),
            k: texture,
        };
        let material = Material::static_mat(name, Vec3::ONE, 0.2, 0.7, 0.3, 32.0);
        self.register_with_matcaps(material, matcaps);
        log::info!("loaded static material '{name}' from {}", path.display());
        Ok(())
    }

    /// Loads a blendable material from four images, in R, G, B, K order.
    pub fn load_blendable_material(&mut self, name: &str, paths: [&Path; 4]) -> RenderResult<()> {
        let [r, g, b, k] = [
            decode_matcap_image_from_file(paths[0])?,
            decode_matcap_image_from_file(paths[1])?,
            decode_matcap_image_from_file(paths[2])?,
            decode_matcap_image_from_file(paths[3])?,
        ]
        .map(Arc::new);
        let material = Material::blendable(name, 0.25, 0.75, 0.1, 8.0);
        self.register_with_matcaps(material, MatcapSet { r, g, b, k });
        log::info!("loaded blendable material '{name}'");
        Ok(())
    }

    /// Gets a material by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Gets the matcap textures of a material.
    #[must_use]
    pub fn matcap(&self, name: &str) -> Option<&MatcapSet> {
        self.matcaps.get(name)
    }

    /// Returns true if a material with the given name is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Name of the default material.
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default_material
    }

    /// Sets the default material name.
    pub fn set_default(&mut self, name: &str) {
        if self.materials.contains_key(name) {
            self.default_material = name.to_string();
        }
    }

    /// Returns all material names, with built-in materials first in a stable order,
    /// followed by custom materials sorted alphabetically.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        const BUILTIN_ORDER: &[&str] = &[
            "clay", "wax", "candy", "flat", "mud", "ceramic", "jade", "normal",
        ];
        let mut names: Vec<&str> = BUILTIN_ORDER
            .iter()
            .copied()
            .filter(|n| self.materials.contains_key(*n))
            .collect();
        let mut custom: Vec<&str> = self
            .materials
            .keys()
            .map(String::as_str)
            .filter(|n| !BUILTIN_ORDER.contains(n))
            .collect();
        custom.sort_unstable();
        names.extend(custom);
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Decodes an image file from disk into a matcap texture.
///
/// Supports any format the `image` crate can open: HDR, JPEG, PNG, EXR, etc.
pub fn decode_matcap_image_from_file(path: &Path) -> RenderResult<TextureData> {
    use image::GenericImageView;

    let img = image::open(path).map_err(|e| {
        RenderError::MaterialLoad(format!("failed to open '{}': {e}", path.display()))
    })?;
    let (width, height) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(RenderError::MaterialLoad(format!(
            "image '{}' has zero dimensions",
            path.display()
        )));
    }

    let rgb32f = img.to_rgb32f();
    let texels = rgb32f
        .as_raw()
        .chunks_exact(3)
        .map(|c| Vec4::new(c[0], c[1], c[2], 1.0))
        .collect();

    Ok(TextureData::new(width, height, texels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_material() {
        let mat = Material::flat("test_flat");
        assert!(mat.is_flat);
        assert!(mat.is_blendable);
        assert_eq!(mat.diffuse, 0.0);
        assert_eq!(mat.specular, 0.0);
    }

    #[test]
    fn test_material_registry() {
        let registry = MaterialRegistry::new();
        assert!(registry.get("clay").is_some());
        assert!(registry.get("wax").is_some());
        assert!(registry.get("candy").is_some());
        assert!(registry.get("flat").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.matcap("clay").is_some());
        assert_eq!(registry.default_name(), "clay");
    }

    #[test]
    fn test_blendable_materials() {
        assert!(Material::clay().is_blendable);
        assert!(Material::wax().is_blendable);
        assert!(Material::candy().is_blendable);
        assert!(Material::flat("flat").is_blendable);
        assert!(!Material::mud().is_blendable);
        assert!(!Material::ceramic().is_blendable);
        assert!(!Material::jade().is_blendable);
        assert!(!Material::normal().is_blendable);
    }

    #[test]
    fn test_material_registry_names_order() {
        let mut registry = MaterialRegistry::new();
        let mut custom = Material::clay();
        custom.name = "zebra_mat".to_string();
        registry.register(custom);

        let mut custom2 = Material::clay();
        custom2.name = "alpha_mat".to_string();
        registry.register(custom2);

        let expected = vec![
            "clay", "wax", "candy", "flat", "mud", "ceramic", "jade", "normal",
            "alpha_mat", "zebra_mat",
        ];
        assert_eq!(registry.names(), expected);
    }

    #[test]
    fn test_generated_matcaps() {
        let clay = Material::clay().generate_matcaps();
        assert_eq!(clay.r.width, MATCAP_SIZE);
        assert_eq!(clay.r.texels.len(), (MATCAP_SIZE * MATCAP_SIZE) as usize);

        // The R channel only carries red, apart from the white highlight.
        let center = clay.r.texel(MATCAP_SIZE / 2, MATCAP_SIZE / 2);
        assert!(center.x > center.y);

        let mud = Material::mud().generate_matcaps();
        assert_eq!(mud.r.texels, mud.k.texels);

        let flat = Material::flat("flat").generate_matcaps();
        assert!(flat.r.texels.iter().all(|t| (t.x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_load_static_material_from_file() {
        let path = std::env::temp_dir().join(format!("polyviz_matcap_{}.png", std::process::id()));
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let mut registry = MaterialRegistry::new();
        registry.load_static_material("red", &path).unwrap();
        let matcap = registry.matcap("red").unwrap();
        assert_eq!((matcap.r.width, matcap.r.height), (4, 2));
        assert!(Arc::ptr_eq(&matcap.r, &matcap.k));
        assert!((matcap.r.texel(0, 0).x - 1.0).abs() < 1e-6);

        std::fs::remove_file(&path).ok();
        assert!(matches!(
            registry.load_static_material("missing", &path),
            Err(RenderError::MaterialLoad(_))
        ));
    }
}
