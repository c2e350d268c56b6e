//! Demo showing curve network quantities.
//!
//! Builds a helix with scalar, color and vector data on its nodes and edges, then
//! draws a few frames. Uses a wgpu device when one is available and the mock
//! engine otherwise. Run with `RUST_LOG=debug` to see program builds and uploads.

use polyviz::*;

fn helix(n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|i| {
            let t = i as f32 / (n - 1) as f32;
            let angle = t * 6.0 * std::f32::consts::PI;
            Vec3::new(angle.cos(), angle.sin(), t * 2.0 - 1.0)
        })
        .collect()
}

fn main() -> Result<()> {
    init_logging();

    let mut viewer = match Viewer::wgpu_headless(Options::default()) {
        Ok(viewer) => viewer,
        Err(e) => {
            log::warn!("no wgpu adapter ({e}), drawing with the mock engine");
            Viewer::headless()
        }
    };

    let nodes = helix(64);
    let n_edges = nodes.len() - 1;
    let heights: Vec<f32> = nodes.iter().map(|p| p.z).collect();
    let tangents: Vec<Vec3> = nodes.windows(2).map(|w| (w[1] - w[0]).normalize()).collect();
    let edge_labels: Vec<f32> = (0..n_edges).map(|i| (i / 8 % 4) as f32).collect();
    let edge_colors: Vec<Vec3> = (0..n_edges)
        .map(|i| {
            let t = i as f32 / n_edges as f32;
            Vec3::new(t, 0.3, 1.0 - t)
        })
        .collect();

    let network = viewer.register_curve_network_line("helix", nodes)?;
    network.set_radius(0.01, true).set_color(Vec3::new(0.8, 0.4, 0.1));
    network.add_node_scalar_quantity("height", heights, DataType::Symmetric)?;
    network.add_edge_scalar_quantity("segment", edge_labels, DataType::Categorical)?;
    network.add_edge_color_quantity("gradient", edge_colors)?;
    network.add_edge_vector_quantity("tangent", tangents, VectorType::Standard)?;
    network.set_quantity_enabled("height", true)?;
    network.set_quantity_enabled("tangent", true)?;

    viewer.register_curve_network_segments(
        "axes",
        vec![Vec3::ZERO, Vec3::X, Vec3::ZERO, Vec3::Y, Vec3::ZERO, Vec3::Z],
    )?;

    viewer.fit_camera(16.0 / 9.0);
    viewer.draw_frame();

    // Switch the dominant quantity; only the new one builds programs.
    viewer
        .try_curve_network_mut("helix")?
        .set_quantity_enabled("segment", true)?;
    viewer.draw_frame();
    viewer.draw_frame();

    let stats = viewer.stats();
    log::info!(
        "{} programs compiled, {} buffers uploaded, {} draws",
        stats.programs_compiled,
        stats.buffer_uploads,
        stats.draw_calls
    );

    if let Some(helix) = viewer.curve_network_mut("helix") {
        for row in helix.edge_info(10)? {
            log::info!("edge 10 {}: {}", row.name, row.value);
        }
    }
    Ok(())
}
