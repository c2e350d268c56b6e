//! The viewer owns the engine, the shared state and every registered structure.

use egui::{CollapsingHeader, Ui};
use glam::{Mat4, Vec3};
use polyviz_core::{Options, PolyvizError, Registry, Result, Structure, ViewerState};
use polyviz_render::{Engine, EngineStats, MockEngine, WgpuEngine};
use polyviz_structures::CurveNetwork;

const CURVE_NETWORK: &str = "CurveNetwork";

/// A scene of curve networks drawn through one [`Engine`].
pub struct Viewer {
    engine: Box<dyn Engine>,
    state: ViewerState,
    structures: Registry<CurveNetwork>,
}

impl Viewer {
    pub fn new(engine: Box<dyn Engine>, options: Options) -> Self {
        log::debug!("viewer on {} backend", engine.backend_name());
        Self {
            engine,
            state: ViewerState::new(options),
            structures: Registry::new(),
        }
    }

    /// A viewer on the mock engine, with default options.
    pub fn headless() -> Self {
        Self::new(Box::new(MockEngine::new()), Options::default())
    }

    /// A viewer on a wgpu device without a window.
    pub fn wgpu_headless(options: Options) -> Result<Self> {
        let engine = pollster::block_on(WgpuEngine::new_headless())?;
        Ok(Self::new(Box::new(engine), options))
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn options(&self) -> &Options {
        &self.state.options
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// The engine, for registering color maps, materials or shader rules.
    pub fn engine_mut(&mut self) -> &mut dyn Engine {
        self.engine.as_mut()
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    fn register(&mut self, network: CurveNetwork) -> Result<&mut CurveNetwork> {
        let name = network.name().to_string();
        self.structures.register(Box::new(network))?;
        self.structures
            .get_mut(CURVE_NETWORK, &name)
            .ok_or(PolyvizError::StructureNotFound(name))
    }

    fn check_free(&self, name: &str) -> Result<()> {
        if self.structures.contains(CURVE_NETWORK, name) {
            return Err(PolyvizError::StructureExists(name.to_string()));
        }
        Ok(())
    }

    /// Registers a curve network with explicit edges.
    pub fn register_curve_network(
        &mut self,
        name: &str,
        nodes: Vec<Vec3>,
        edges: &[[u32; 2]],
    ) -> Result<&mut CurveNetwork> {
        self.check_free(name)?;
        let network = CurveNetwork::new(&self.state, name, nodes, edges)?;
        self.register(network)
    }

    /// Registers a curve network joining consecutive nodes.
    pub fn register_curve_network_line(
        &mut self,
        name: &str,
        nodes: Vec<Vec3>,
    ) -> Result<&mut CurveNetwork> {
        self.check_free(name)?;
        let network = CurveNetwork::new_line(&self.state, name, nodes)?;
        self.register(network)
    }

    /// Registers a curve network joining consecutive nodes and closing the loop.
    pub fn register_curve_network_loop(
        &mut self,
        name: &str,
        nodes: Vec<Vec3>,
    ) -> Result<&mut CurveNetwork> {
        self.check_free(name)?;
        let network = CurveNetwork::new_loop(&self.state, name, nodes)?;
        self.register(network)
    }

    /// Registers a curve network of separate segments (0-1, 2-3, ...).
    pub fn register_curve_network_segments(
        &mut self,
        name: &str,
        nodes: Vec<Vec3>,
    ) -> Result<&mut CurveNetwork> {
        self.check_free(name)?;
        let network = CurveNetwork::new_segments(&self.state, name, nodes)?;
        self.register(network)
    }

    pub fn curve_network(&self, name: &str) -> Option<&CurveNetwork> {
        self.structures.get(CURVE_NETWORK, name)
    }

    pub fn curve_network_mut(&mut self, name: &str) -> Option<&mut CurveNetwork> {
        self.structures.get_mut(CURVE_NETWORK, name)
    }

    /// Like [`Self::curve_network_mut`], but missing names are an error.
    pub fn try_curve_network_mut(&mut self, name: &str) -> Result<&mut CurveNetwork> {
        self.structures
            .get_mut(CURVE_NETWORK, name)
            .ok_or_else(|| PolyvizError::StructureNotFound(name.to_string()))
    }

    /// Structures in registration order.
    pub fn structures(&self) -> impl Iterator<Item = &CurveNetwork> {
        self.structures.iter()
    }

    pub fn n_structures(&self) -> usize {
        self.structures.len()
    }

    /// Removes a structure by name. Returns false if there was none.
    pub fn remove_structure(&mut self, name: &str) -> bool {
        let removed = self.structures.remove_named(name) > 0;
        if removed {
            log::info!("removed structure '{name}'");
        }
        removed
    }

    pub fn remove_all_structures(&mut self) {
        self.structures.clear();
    }

    /// Bounding box of all enabled structures.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.structures.bounding_box()
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.engine.set_camera(view, projection);
    }

    /// Points the camera at the enabled structures from the +z side.
    pub fn fit_camera(&mut self, aspect: f32) {
        let (min, max) = self
            .bounding_box()
            .unwrap_or((Vec3::splat(-1.0), Vec3::splat(1.0)));
        let center = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(1e-3);
        let fov = 45.0_f32.to_radians();
        let distance = radius / (fov * 0.5).sin();

        let eye = center + Vec3::Z * distance;
        let view = Mat4::look_at_rh(eye, center, Vec3::Y);
        let projection =
            Mat4::perspective_rh(fov, aspect, distance * 0.01, distance + radius * 2.0);
        self.set_camera(view, projection);
    }

    /// Draws every enabled structure in registration order.
    ///
    /// A structure that fails to draw is logged and skipped. Returns the number
    /// of structures that failed.
    pub fn draw_frame(&mut self) -> usize {
        let engine = self.engine.as_mut();
        let mut failures = 0;
        for network in self.structures.iter_mut() {
            if !network.is_enabled() {
                continue;
            }
            if let Err(e) = network.draw(engine) {
                log::error!("failed to draw curve network [{}]: {e}", network.name());
                failures += 1;
            }
        }
        failures
    }

    /// Builds the structures panel. Returns true if anything changed.
    pub fn build_ui(&mut self, ui: &mut Ui) -> bool {
        let colormaps: Vec<&str> = self.engine.color_maps().names().collect();
        let materials = self.engine.materials().names();

        let mut changed = false;
        CollapsingHeader::new("Structures")
            .default_open(true)
            .show(ui, |ui| {
                if self.structures.is_empty() {
                    ui.label("No structures registered");
                    return;
                }
                for network in self.structures.iter_mut() {
                    let header = format!("{} ({CURVE_NETWORK})", network.name());
                    CollapsingHeader::new(header)
                        .default_open(true)
                        .show(ui, |ui| {
                            changed |= network.build_egui_ui(ui, &colormaps, &materials);
                        });
                }
            });
        changed
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::headless()
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("backend", &self.engine.backend_name())
            .field("structures", &self.structures.len())
            .finish_non_exhaustive()
    }
}
