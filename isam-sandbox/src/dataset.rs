use crate::settings::SandboxSettings;
use isam_core::{
    nalgebra::{Point2, Point3, Rotation3, Vector2, Vector3},
    CameraIntrinsics, CameraPose, Result,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// The ground truth the estimator tries to recover: cameras on a circle
/// facing the origin and landmarks on the corners of a cube around it.
pub struct SyntheticScene {
    pub poses: Vec<CameraPose>,
    pub landmarks: Vec<Point3<f64>>,
}

impl SyntheticScene {
    pub fn generate(settings: &SandboxSettings) -> Self {
        let poses = (0..settings.pose_count)
            .map(|ix| {
                let angle =
                    2.0 * std::f64::consts::PI * ix as f64 / settings.pose_count as f64;
                let eye = Point3::new(
                    settings.circle_radius * angle.cos(),
                    settings.circle_radius * angle.sin(),
                    settings.camera_height,
                );
                CameraPose::facing(eye, Point3::origin(), Vector3::z())
            })
            .collect();
        // Corners in the canonical order; asking for more than eight
        // landmarks fills additional cubes at growing scale.
        let corners = [
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
        ];
        let landmarks = (0..settings.landmark_count)
            .map(|ix| {
                let [x, y, z] = corners[ix % corners.len()];
                let scale = settings.cube_half_extent * (1.0 + 0.5 * (ix / corners.len()) as f64);
                Point3::new(scale * x, scale * y, scale * z)
            })
            .collect();
        Self { poses, landmarks }
    }
}

pub fn intrinsics(settings: &SandboxSettings) -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(settings.focal_x, settings.focal_y))
        .principal_point(Point2::new(settings.center_x, settings.center_y))
        .skew(settings.skew)
}

/// Produces the synthetic pixel observations.
///
/// With a zero `measurement_noise_sigma` (the default) the observations are
/// exact projections. Otherwise a seeded jitter is added, so two runs with
/// the same settings still observe identical pixels.
pub struct Observations {
    intrinsics: CameraIntrinsics,
    sigma: f64,
    rng: Xoshiro256PlusPlus,
}

impl Observations {
    pub fn new(settings: &SandboxSettings) -> Self {
        Self {
            intrinsics: intrinsics(settings),
            sigma: settings.measurement_noise_sigma,
            rng: Xoshiro256PlusPlus::seed_from_u64(settings.measurement_noise_seed),
        }
    }

    pub fn pixel(&mut self, pose: &CameraPose, landmark: &Point3<f64>) -> Result<Point2<f64>> {
        let mut pixel = self.intrinsics.project(pose.world_to_camera(*landmark))?;
        if self.sigma > 0.0 {
            pixel.x += self.rng.gen_range(-self.sigma..=self.sigma);
            pixel.y += self.rng.gen_range(-self.sigma..=self.sigma);
        }
        Ok(pixel)
    }
}

/// The initial guesses are intentionally off from the ground truth so the
/// estimator has work to do: poses are composed with a fixed camera-frame
/// offset and landmarks are shifted by a fixed world vector.
pub fn pose_guess(truth: &CameraPose) -> CameraPose {
    let offset = CameraPose::from_parts(
        Vector3::new(0.05, -0.10, 0.20),
        Rotation3::new(Vector3::new(-0.1, 0.2, 0.25)),
    );
    truth.compose(&offset)
}

pub fn point_guess(truth: &Point3<f64>) -> Point3<f64> {
    truth + Vector3::new(-0.25, 0.20, 0.15)
}
