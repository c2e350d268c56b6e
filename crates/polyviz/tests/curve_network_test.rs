//! Integration tests for curve network quantities drawn through the viewer.
//!
//! Every test runs on the mock engine, so no GPU is needed.

use polyviz::*;

fn path_nodes() -> Vec<Vec3> {
    vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)]
}

fn viewer_with_path() -> Viewer {
    let mut viewer = Viewer::headless();
    viewer
        .register_curve_network_line("path", path_nodes())
        .expect("register failed");
    viewer
}

fn path(viewer: &mut Viewer) -> &mut CurveNetwork {
    viewer.curve_network_mut("path").expect("path is registered")
}

#[test]
fn edge_values_average_onto_nodes() {
    let mut viewer = viewer_with_path();
    path(&mut viewer)
        .add_edge_scalar_quantity("weight", vec![2.0, 4.0], DataType::Standard)
        .unwrap();
    path(&mut viewer).set_quantity_enabled("weight", true).unwrap();
    assert_eq!(viewer.draw_frame(), 0);

    let q = path(&mut viewer)
        .get_quantity::<CurveEdgeScalarQuantity>("weight")
        .unwrap();
    assert_eq!(q.node_average_values(), &[2.0, 3.0, 4.0]);
}

#[test]
fn categorical_tie_resolves_to_first_incident_edge() {
    let mut viewer = viewer_with_path();
    path(&mut viewer)
        .add_edge_scalar_quantity("label", vec![7.0, 9.0], DataType::Categorical)
        .unwrap();
    path(&mut viewer).set_quantity_enabled("label", true).unwrap();
    viewer.draw_frame();

    let q = path(&mut viewer)
        .get_quantity::<CurveEdgeScalarQuantity>("label")
        .unwrap();
    assert_eq!(q.node_average_values(), &[7.0, 7.0, 9.0]);
}

#[test]
fn disabled_quantity_builds_and_draws_nothing() {
    let mut viewer = viewer_with_path();
    path(&mut viewer)
        .add_node_scalar_quantity("height", vec![0.0, 1.0, 2.0], DataType::Standard)
        .unwrap();

    viewer.draw_frame();
    let network = viewer.curve_network("path").unwrap();
    let q = network.quantity("height").unwrap();
    assert_eq!(q.program_build_count(), 0);
    assert_eq!(q.program_state(), ProgramState::Uninitialized);
    // only the base cylinder and sphere programs
    assert_eq!(viewer.stats().draw_calls, 2);
}

#[test]
fn unchanged_frames_do_not_upload() {
    let mut viewer = viewer_with_path();
    path(&mut viewer)
        .add_node_color_quantity("rgb", vec![Vec3::X, Vec3::Y, Vec3::Z])
        .unwrap();
    path(&mut viewer).set_quantity_enabled("rgb", true).unwrap();

    viewer.draw_frame();
    let after_first = viewer.stats();
    viewer.draw_frame();
    let second = viewer.stats().since(&after_first);
    assert_eq!(second.buffer_uploads, 0);
    assert_eq!(second.programs_requested, 0);
    assert_eq!(second.draw_calls, 2);

    path(&mut viewer)
        .get_quantity_mut::<CurveNodeColorQuantity>("rgb")
        .unwrap()
        .update_data(vec![Vec3::ONE; 3])
        .unwrap();
    viewer.draw_frame();
    assert!(viewer.stats().since(&after_first).buffer_uploads > 0);
}

#[test]
fn one_dominant_quantity_at_a_time() {
    let mut viewer = viewer_with_path();
    let network = path(&mut viewer);
    network
        .add_node_scalar_quantity("a", vec![0.0, 1.0, 2.0], DataType::Standard)
        .unwrap();
    network
        .add_edge_color_quantity("b", vec![Vec3::X, Vec3::Y])
        .unwrap();
    network
        .add_edge_vector_quantity("c", vec![Vec3::Y, Vec3::Y], VectorType::Standard)
        .unwrap();

    network.set_quantity_enabled("a", true).unwrap();
    network.set_quantity_enabled("c", true).unwrap();
    network.set_quantity_enabled("b", true).unwrap();

    let enabled: Vec<&str> = network
        .quantities()
        .filter(|q| q.is_enabled())
        .map(|q| q.name())
        .collect();
    assert_eq!(enabled, ["b", "c"]);

    viewer.draw_frame();
    // color edge + node programs, then one vector program
    assert_eq!(viewer.stats().draw_calls, 3);
}

#[test]
fn failing_structure_does_not_stop_the_frame() {
    let mut viewer = Viewer::headless();
    viewer
        .register_curve_network_line("broken", path_nodes())
        .unwrap()
        .set_material("no such material");
    viewer
        .register_curve_network_loop("fine", path_nodes())
        .unwrap();

    assert_eq!(viewer.draw_frame(), 1);
    assert_eq!(viewer.stats().draw_calls, 2);
    assert_eq!(
        viewer.curve_network("broken").unwrap().program_state(),
        ProgramState::Uninitialized
    );
}

#[test]
fn disabled_structure_is_skipped() {
    let mut viewer = viewer_with_path();
    path(&mut viewer).set_enabled(false);
    assert_eq!(viewer.draw_frame(), 0);
    assert_eq!(viewer.stats().draw_calls, 0);
    assert!(viewer.bounding_box().is_none());
}

#[test]
fn settings_persist_across_reregistration() {
    let mut viewer = viewer_with_path();
    path(&mut viewer).set_color(Vec3::new(1.0, 0.0, 0.0));
    assert!(viewer.remove_structure("path"));

    viewer
        .register_curve_network_line("path", path_nodes())
        .unwrap();
    assert_eq!(path(&mut viewer).color(), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn invalid_input_is_reported() {
    let mut viewer = Viewer::headless();
    let err = viewer
        .register_curve_network("bad", path_nodes(), &[[0, 5]])
        .unwrap_err();
    assert!(matches!(err, PolyvizError::InvalidEdge { .. }));
    assert!(viewer.curve_network("bad").is_none());

    viewer
        .register_curve_network_line("path", path_nodes())
        .unwrap();
    let Err(err) =
        path(&mut viewer).add_edge_scalar_quantity("short", vec![1.0], DataType::Standard)
    else {
        panic!("one value for two edges was accepted");
    };
    assert!(matches!(
        err,
        PolyvizError::SizeMismatch {
            expected: 2,
            actual: 1
        }
    ));
}
