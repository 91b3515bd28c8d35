mod common;

use std::rc::Rc;

use holo_ngin::{
    Matrix4, Scene, SceneError, SquareMatrix,
    data_structures::transform::{PhysicsTransform, physics_to_render, to_columns},
    gpu::headless::HeadlessGpu,
    physics::{PhysicsWorld, descriptor::PhysicsDescriptor},
    resources::AssetSource,
};

use crate::common::test_utils::{TestAssets, assert_matrix_near, ball_at, falling_box};

const MVP: u32 = 0;

fn room_with_box(assets: &TestAssets, gpu: &mut HeadlessGpu) -> Scene {
    let mut scene = Scene::new(assets.config());
    scene.add_object(gpu, "ground", "room.obj", "ground.phys").unwrap();
    scene.add_object(gpu, "box", "crate.obj", "box.phys").unwrap();
    scene
}

/// Render-space height of an object, which is physics-space Y.
fn height(matrix: &Matrix4<f32>) -> f32 {
    -matrix.w.z
}

#[test]
fn box_falls_onto_static_ground() {
    let assets = TestAssets::with_defaults("scene_scenario");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);

    for _ in 0..60 {
        scene.update();
        assert_eq!(scene.model_matrix("ground").unwrap(), Matrix4::identity());
    }
    // One second of free fall from 20 m.
    let after_one_second = height(&scene.model_matrix("box").unwrap());
    assert!((14.8..15.3).contains(&after_one_second), "{after_one_second}");

    for _ in 60..120 {
        scene.update();
        assert_eq!(scene.model_matrix("ground").unwrap(), Matrix4::identity());
    }
    // Free fall alone would be below the ground by now; the box rests on it.
    let after_two_seconds = height(&scene.model_matrix("box").unwrap());
    assert!((0.5..1.5).contains(&after_two_seconds), "{after_two_seconds}");
    assert_eq!(scene.tick_count(), 120);
}

#[test]
fn updates_match_an_independent_simulation_step_for_step() {
    let assets = TestAssets::with_defaults("scene_reference");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);

    let source = AssetSource::new(assets.root());
    let mut reference = PhysicsWorld::new([0.0, -9.81, 0.0], 1.0 / 60.0);
    reference.add_from_file(&source, "ground.phys").unwrap();
    let body = reference.add_from_file(&source, "box.phys").unwrap().last().unwrap();

    for tick in 1..=90 {
        scene.update();
        reference.step();
        let expected = physics_to_render(reference.transform(body).unwrap());
        let actual = scene.model_matrix("box").unwrap();
        assert_matrix_near(&to_columns(&actual), &expected);
        assert_eq!(scene.tick_count(), tick);
    }
}

#[test]
fn matrices_use_the_render_axes() {
    let assets = TestAssets::with_defaults("scene_axes");
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let rotation = [0.0, half, 0.0, half];
    assets.write_physics(
        "turned.phys",
        &PhysicsDescriptor::single(ball_at([1.0, 2.0, 3.0]).bodies[0].clone().with_rotation(rotation)),
    );
    let mut gpu = HeadlessGpu::new();
    let mut scene = Scene::new(assets.config().with_gravity([0.0, 0.0, 0.0]));
    scene.add_object(&mut gpu, "turned", "crate.obj", "turned.phys").unwrap();

    // Fresh objects start at identity until the first update.
    assert_eq!(scene.model_matrix("turned").unwrap(), Matrix4::identity());
    scene.update();

    let m = scene.model_matrix("turned").unwrap();
    assert!((m.w.x - 1.0).abs() < 1e-5);
    assert!((m.w.y - 3.0).abs() < 1e-5);
    assert!((m.w.z + 2.0).abs() < 1e-5);
    let expected = physics_to_render(PhysicsTransform {
        position: [1.0, 2.0, 3.0],
        rotation,
    });
    assert_matrix_near(&to_columns(&m), &expected);
}

#[test]
fn objects_share_models_but_not_matrices() {
    let assets = TestAssets::with_defaults("scene_isolation");
    assets.write_physics("left.phys", &ball_at([-2.0, 0.0, 0.0]));
    assets.write_physics("right.phys", &ball_at([2.0, 0.0, 0.0]));
    let mut gpu = HeadlessGpu::new();
    let mut scene = Scene::new(assets.config().with_gravity([0.0, 0.0, 0.0]));

    scene.add_object(&mut gpu, "left", "crate.obj", "left.phys").unwrap();
    let uploads = gpu.upload_count();
    scene.add_object(&mut gpu, "right", "crate.obj", "right.phys").unwrap();
    assert_eq!(gpu.upload_count(), uploads);
    assert!(Rc::ptr_eq(
        scene.object("left").unwrap().model(),
        scene.object("right").unwrap().model()
    ));
    assert_eq!(scene.mesh_cache().len(), 1);

    scene.update();
    let right_before = scene.model_matrix("right").unwrap();
    let left_before = scene.model_matrix("left").unwrap();

    scene.set_object_velocity("left", 6.0, 0.0, 0.0).unwrap();
    scene.update();

    assert_eq!(scene.model_matrix("right").unwrap(), right_before);
    let left_after = scene.model_matrix("left").unwrap();
    assert!((left_after.w.x - left_before.w.x - 0.1).abs() < 1e-4, "{left_after:?}");
}

#[test]
fn draw_issues_one_call_per_sub_shape_in_insertion_order() {
    let assets = TestAssets::with_defaults("scene_draw");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);
    scene.update();

    let projection = holo_ngin::camera::perspective(90.0, 1.0, 0.1, 100.0);
    let view = Matrix4::from_translation(holo_ngin::Vector3::new(0.0, -1.0, -5.0));
    scene.set_projection_matrix(projection);
    scene.set_view_matrix(view);

    let calls = scene.draw(&mut gpu, MVP).unwrap();
    let draws = gpu.take_draws();
    assert_eq!(calls, 3);
    assert_eq!(draws.len(), 3);

    let room = scene.object("ground").unwrap().model().clone();
    let crate_model = scene.object("box").unwrap().model().clone();
    let expected_order = [
        (room.shapes[0].positions, scene.model_matrix("ground").unwrap()),
        (room.shapes[1].positions, scene.model_matrix("ground").unwrap()),
        (crate_model.shapes[0].positions, scene.model_matrix("box").unwrap()),
    ];
    for (draw, (positions, model)) in draws.iter().zip(expected_order) {
        assert_eq!(draw.location, MVP);
        assert_eq!(draw.call.positions, positions);
        assert_matrix_near(&draw.mvp, &(projection * view * model));
    }

    // Drawing again without an update sees the same matrices.
    scene.draw(&mut gpu, MVP).unwrap();
    let again = gpu.take_draws();
    assert_eq!(again, draws);
}

#[test]
fn drawing_needs_both_matrices() {
    let assets = TestAssets::with_defaults("scene_missing_matrix");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);

    assert!(matches!(scene.draw(&mut gpu, MVP), Err(SceneError::MissingMatrix("projection"))));
    scene.set_projection_matrix(Matrix4::identity());
    assert!(matches!(scene.draw(&mut gpu, MVP), Err(SceneError::MissingMatrix("view"))));
    scene.set_view_matrix(Matrix4::identity());
    assert_eq!(scene.draw(&mut gpu, MVP).unwrap(), 3);
}

#[test]
fn unknown_names_are_reported() {
    let assets = TestAssets::with_defaults("scene_not_found");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);

    assert!(matches!(
        scene.set_object_position("ghost", 0.0, 1.0, 0.0),
        Err(SceneError::ObjectNotFound(name)) if name == "ghost"
    ));
    assert!(matches!(
        scene.set_object_velocity("ghost", 0.0, 1.0, 0.0),
        Err(SceneError::ObjectNotFound(_))
    ));
    assert!(matches!(scene.set_object_elasticity("ghost", 0.5), Err(SceneError::ObjectNotFound(_))));
    assert!(matches!(scene.model_matrix("ghost"), Err(SceneError::ObjectNotFound(_))));
}

#[test]
fn duplicate_names_are_rejected_without_side_effects() {
    let assets = TestAssets::with_defaults("scene_duplicate");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);
    let bodies = scene.physics().body_count();

    let err = scene.add_object(&mut gpu, "box", "crate.obj", "box.phys").unwrap_err();
    assert!(matches!(err, SceneError::DuplicateObject(name) if name == "box"));
    assert_eq!(scene.len(), 2);
    assert_eq!(scene.physics().body_count(), bodies);
}

#[test]
fn failed_model_load_rolls_the_bodies_back() {
    let assets = TestAssets::with_defaults("scene_rollback");
    let mut gpu = HeadlessGpu::new();
    let mut scene = Scene::new(assets.config());

    let err = scene.add_object(&mut gpu, "box", "missing.obj", "box.phys").unwrap_err();
    assert!(matches!(err, SceneError::Load { .. }), "{err}");
    assert!(scene.is_empty());
    assert_eq!(scene.physics().body_count(), 0);
    assert!(scene.mesh_cache().is_empty());

    // The name is still free afterwards.
    scene.add_object(&mut gpu, "box", "crate.obj", "box.phys").unwrap();
    assert_eq!(scene.physics().body_count(), 1);
}

#[test]
fn physics_files_must_exist_and_hold_a_body() {
    let assets = TestAssets::with_defaults("scene_bad_physics");
    assets.write_physics("empty.phys", &PhysicsDescriptor::default());
    let mut gpu = HeadlessGpu::new();
    let mut scene = Scene::new(assets.config());

    let err = scene.add_object(&mut gpu, "a", "crate.obj", "missing.phys").unwrap_err();
    assert!(matches!(err, SceneError::Load { .. }));
    let err = scene.add_object(&mut gpu, "b", "crate.obj", "empty.phys").unwrap_err();
    assert!(matches!(err, SceneError::EmptyDescriptor(_)));
    assert!(scene.is_empty());
    assert_eq!(gpu.upload_count(), 0);
}

#[test]
fn setters_act_in_physics_space() {
    let assets = TestAssets::with_defaults("scene_setters");
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);

    scene.set_object_position("box", 3.0, 5.0, 0.0).unwrap();
    assert_eq!(scene.body_position("box").unwrap(), [3.0, 5.0, 0.0]);
    scene.update();
    let [x, y, _] = scene.body_position("box").unwrap();
    assert!((x - 3.0).abs() < 1e-5);
    assert!(y < 5.0 && y > 4.9, "{y}");
    assert!((height(&scene.model_matrix("box").unwrap()) - y).abs() < 1e-5);

    scene.set_object_elasticity("box", 0.9).unwrap();
    let body = scene.object("box").unwrap().body();
    assert_eq!(scene.physics().elasticity(body), Some(0.9));

    scene.set_object_velocity("box", 0.0, 2.0, 0.0).unwrap();
    assert_eq!(scene.physics().velocity(body), Some([0.0, 2.0, 0.0]));
}

#[test]
fn elapsed_time_only_catches_up_when_enabled() {
    let assets = TestAssets::with_defaults("scene_elapsed");
    let mut gpu = HeadlessGpu::new();

    let mut fixed = room_with_box(&assets, &mut gpu);
    assert_eq!(fixed.update_elapsed(0.5), 1);
    assert_eq!(fixed.tick_count(), 1);

    let mut catching_up = Scene::new(assets.config().with_accumulator(true).with_timestep(1.0 / 60.0, 4));
    catching_up.add_object(&mut gpu, "box", "crate.obj", "box.phys").unwrap();
    assert_eq!(catching_up.update_elapsed(0.06), 3);
    assert_eq!(catching_up.update_elapsed(0.001), 0);
    // A long stall is capped.
    assert_eq!(catching_up.update_elapsed(1.0), 4);
    assert_eq!(catching_up.tick_count(), 7);
    assert!(height(&catching_up.model_matrix("box").unwrap()) < 20.0);
}

#[test]
fn teardown_releases_every_gpu_resource() {
    let assets = TestAssets::with_defaults("scene_teardown");
    assets.write_physics("second_box.phys", &falling_box(4.0));
    let mut gpu = HeadlessGpu::new();
    let mut scene = room_with_box(&assets, &mut gpu);
    scene.add_object(&mut gpu, "box2", "crate.obj", "second_box.phys").unwrap();
    assert_eq!(scene.object_names().collect::<Vec<_>>(), ["ground", "box", "box2"]);
    assert!(!gpu.buffers().is_empty());
    assert_eq!(gpu.textures().len(), 1);

    scene.teardown(&mut gpu);
    assert!(gpu.buffers().is_empty());
    assert!(gpu.textures().is_empty());
}
