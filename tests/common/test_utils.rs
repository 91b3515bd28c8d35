use std::path::Path;

use holo_ngin::{
    Matrix4,
    config::SceneConfig,
    physics::descriptor::{BodyDescriptor, PhysicsDescriptor, ShapeDescriptor, write_descriptor},
};

pub const ROOM_OBJ: &str = "\
mtllib room.mtl
o wall
v -1.0 0.0 -1.0
v 1.0 0.0 -1.0
v 0.0 2.0 -1.0
f 1 2 3
o floor
v -1.0 0.0 -1.0
v 1.0 0.0 -1.0
v 1.0 0.0 1.0
v -1.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 1.0 0.0
usemtl checker
f 4/1/1 5/2/1 6/3/1 7/4/1
";

pub const ROOM_MTL: &str = "\
newmtl checker
Kd 1.0 1.0 1.0
map_Kd checker.png
";

pub const CRATE_OBJ: &str = "\
o crate
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
vn 0.0 0.0 1.0
f 1//1 2//1 3//1 4//1
";

/// Scratch asset directory, removed again when dropped.
pub struct TestAssets {
    dir: tempfile::TempDir,
}

impl TestAssets {
    pub fn new(test_name: &str) -> Self {
        init_logger();
        let dir = tempfile::Builder::new()
            .prefix(&format!("holo-ngin-{test_name}-"))
            .tempdir()
            .unwrap();
        Self { dir }
    }

    /// The room (bare wall, textured floor), a crate and a ground/box pair of descriptors.
    pub fn with_defaults(test_name: &str) -> Self {
        let assets = Self::new(test_name);
        assets.write("room.obj", ROOM_OBJ);
        assets.write("room.mtl", ROOM_MTL);
        assets.write_checker("checker.png", 4);
        assets.write("crate.obj", CRATE_OBJ);
        assets.write_physics("ground.phys", &ground());
        assets.write_physics("box.phys", &falling_box(20.0));
        assets
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> SceneConfig {
        SceneConfig::default().with_asset_root(self.root())
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) {
        std::fs::write(self.root().join(name), contents).unwrap();
    }

    pub fn write_checker(&self, name: &str, size: u32) {
        let img = image::RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        img.save(self.root().join(name)).unwrap();
    }

    pub fn write_physics(&self, name: &str, descriptor: &PhysicsDescriptor) {
        write_descriptor(self.root().join(name), descriptor).unwrap();
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Static slab whose top face is at y = 0.5.
pub fn ground() -> PhysicsDescriptor {
    PhysicsDescriptor::single(BodyDescriptor::new(
        "ground",
        0.0,
        ShapeDescriptor::Cuboid {
            half_extents: [10.0, 0.5, 10.0],
        },
    ))
}

/// Unit cube of mass 1 at the given height.
pub fn falling_box(height: f32) -> PhysicsDescriptor {
    PhysicsDescriptor::single(
        BodyDescriptor::new(
            "box",
            1.0,
            ShapeDescriptor::Cuboid {
                half_extents: [0.5, 0.5, 0.5],
            },
        )
        .with_translation([0.0, height, 0.0]),
    )
}

pub fn ball_at(translation: [f32; 3]) -> PhysicsDescriptor {
    PhysicsDescriptor::single(
        BodyDescriptor::new("ball", 1.0, ShapeDescriptor::Ball { radius: 0.5 }).with_translation(translation),
    )
}

pub fn assert_matrix_near(actual: &[[f32; 4]; 4], expected: &Matrix4<f32>) {
    let expected: [[f32; 4]; 4] = (*expected).into();
    for (col, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        for row in 0..4 {
            assert!(
                (a[row] - e[row]).abs() < 1e-4,
                "column {col} row {row}: {actual:?} != {expected:?}"
            );
        }
    }
}
