//! One frame of a head-mounted display, or of the monitor fallback.
//!
//! The HMD runtime sits behind [`StereoDriver`]: it hands out per-eye
//! projections and view offsets and brackets each eye's submission. The
//! scene knows nothing about distortion or buffer submission.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{error::SceneError, gpu::DrawSubmitter, scene::Scene};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];
}

pub trait StereoDriver {
    /// Starts a frame. `false` means no HMD frame is available and the
    /// monitor view should be drawn instead.
    fn begin_frame(&mut self) -> bool;

    fn eye_projection(&self, eye: Eye) -> Matrix4<f32>;

    /// Head-to-eye transform, applied on top of the camera view.
    fn eye_view_offset(&self, eye: Eye) -> Matrix4<f32>;

    fn begin_eye(&mut self, eye: Eye);

    fn end_eye(&mut self, eye: Eye);

    fn end_frame(&mut self);
}

/// Driver for running without a headset: every frame is a monitor frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoDriver;

impl StereoDriver for MonoDriver {
    fn begin_frame(&mut self) -> bool {
        false
    }

    fn eye_projection(&self, _eye: Eye) -> Matrix4<f32> {
        Matrix4::identity()
    }

    fn eye_view_offset(&self, _eye: Eye) -> Matrix4<f32> {
        Matrix4::identity()
    }

    fn begin_eye(&mut self, _eye: Eye) {}

    fn end_eye(&mut self, _eye: Eye) {}

    fn end_frame(&mut self) {}
}

/// Side-by-side stereo with a fixed interpupillary distance and one shared
/// projection, for previewing stereo output without a headset.
#[derive(Clone, Copy, Debug)]
pub struct FixedStereoDriver {
    /// Metres between the eyes.
    pub ipd: f32,
    pub projection: Matrix4<f32>,
}

impl FixedStereoDriver {
    pub fn new(ipd: f32, projection: Matrix4<f32>) -> Self {
        Self { ipd, projection }
    }
}

impl StereoDriver for FixedStereoDriver {
    fn begin_frame(&mut self) -> bool {
        true
    }

    fn eye_projection(&self, _eye: Eye) -> Matrix4<f32> {
        self.projection
    }

    fn eye_view_offset(&self, eye: Eye) -> Matrix4<f32> {
        let half = self.ipd * 0.5;
        // The left eye sits at -x, so the world shifts the other way.
        let shift = match eye {
            Eye::Left => half,
            Eye::Right => -half,
        };
        Matrix4::from_translation(Vector3::new(shift, 0.0, 0.0))
    }

    fn begin_eye(&mut self, _eye: Eye) {}

    fn end_eye(&mut self, _eye: Eye) {}

    fn end_frame(&mut self) {}
}

/// Runs one frame: a single [`Scene::update`], then a draw per eye.
///
/// Physics never advances between the eyes. Without an HMD frame the scene
/// is drawn once with `fallback_projection` and the plain camera view.
/// Returns the number of draw calls issued.
pub fn render_frame(
    scene: &mut Scene,
    driver: &mut dyn StereoDriver,
    camera_view: Matrix4<f32>,
    fallback_projection: Matrix4<f32>,
    target: &mut dyn DrawSubmitter,
    mvp_location: u32,
) -> Result<usize, SceneError> {
    scene.update();

    if !driver.begin_frame() {
        scene.set_projection_matrix(fallback_projection);
        scene.set_view_matrix(camera_view);
        return scene.draw(target, mvp_location);
    }

    let mut calls = 0;
    let mut result = Ok(());
    for eye in Eye::BOTH {
        driver.begin_eye(eye);
        scene.set_projection_matrix(driver.eye_projection(eye));
        scene.set_view_matrix(driver.eye_view_offset(eye) * camera_view);
        let drawn = scene.draw(target, mvp_location);
        driver.end_eye(eye);
        match drawn {
            Ok(n) => calls += n,
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    driver.end_frame();
    result.map(|_| calls)
}
