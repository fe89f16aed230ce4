use serde::{Deserialize, Serialize};

/// The settings for a sandbox run.
///
/// Every field has a default matching the classic synthetic scenario, so an
/// empty or missing settings file reproduces the canonical run.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct SandboxSettings {
    /// The x focal length in pixels
    #[serde(default = "default_focal")]
    pub focal_x: f64,
    /// The y focal length in pixels
    #[serde(default = "default_focal")]
    pub focal_y: f64,
    /// The x principal point coordinate
    #[serde(default = "default_center")]
    pub center_x: f64,
    /// The y principal point coordinate
    #[serde(default = "default_center")]
    pub center_y: f64,
    /// The skew
    #[serde(default = "default_skew")]
    pub skew: f64,
    /// The number of camera poses on the circle
    #[serde(default = "default_pose_count")]
    pub pose_count: usize,
    /// The number of landmarks on the cube
    #[serde(default = "default_landmark_count")]
    pub landmark_count: usize,
    /// The radius of the camera circle
    #[serde(default = "default_circle_radius")]
    pub circle_radius: f64,
    /// The height of the camera circle above the cube center
    #[serde(default = "default_camera_height")]
    pub camera_height: f64,
    /// Half the edge length of the landmark cube
    #[serde(default = "default_cube_half_extent")]
    pub cube_half_extent: f64,
    /// The standard deviation of the pixel observation noise model
    #[serde(default = "default_pixel_sigma")]
    pub pixel_sigma: f64,
    /// The translation standard deviation of the first-pose prior
    #[serde(default = "default_pose_prior_translation_sigma")]
    pub pose_prior_translation_sigma: f64,
    /// The rotation standard deviation of the first-pose prior
    #[serde(default = "default_pose_prior_rotation_sigma")]
    pub pose_prior_rotation_sigma: f64,
    /// The standard deviation of the first-landmark prior
    #[serde(default = "default_point_prior_sigma")]
    pub point_prior_sigma: f64,
    /// The amplitude of the jitter added to synthetic pixel measurements
    #[serde(default = "default_measurement_noise_sigma")]
    pub measurement_noise_sigma: f64,
    /// The seed for the measurement jitter
    #[serde(default = "default_measurement_noise_seed")]
    pub measurement_noise_seed: u64,
    /// The tangent norm past which a variable is relinearized
    #[serde(default = "default_relinearize_threshold")]
    pub relinearize_threshold: f64,
    /// How many passes go by between relinearization checks
    #[serde(default = "default_relinearize_skip")]
    pub relinearize_skip: usize,
    /// Extra refinement passes after each update
    #[serde(default = "default_extra_refine_passes")]
    pub extra_refine_passes: usize,
    /// Milliseconds to pause after each frame
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            focal_x: default_focal(),
            focal_y: default_focal(),
            center_x: default_center(),
            center_y: default_center(),
            skew: default_skew(),
            pose_count: default_pose_count(),
            landmark_count: default_landmark_count(),
            circle_radius: default_circle_radius(),
            camera_height: default_camera_height(),
            cube_half_extent: default_cube_half_extent(),
            pixel_sigma: default_pixel_sigma(),
            pose_prior_translation_sigma: default_pose_prior_translation_sigma(),
            pose_prior_rotation_sigma: default_pose_prior_rotation_sigma(),
            point_prior_sigma: default_point_prior_sigma(),
            measurement_noise_sigma: default_measurement_noise_sigma(),
            measurement_noise_seed: default_measurement_noise_seed(),
            relinearize_threshold: default_relinearize_threshold(),
            relinearize_skip: default_relinearize_skip(),
            extra_refine_passes: default_extra_refine_passes(),
            frame_delay_ms: default_frame_delay_ms(),
        }
    }
}

fn default_focal() -> f64 {
    50.0
}

fn default_center() -> f64 {
    50.0
}

fn default_skew() -> f64 {
    0.0
}

fn default_pose_count() -> usize {
    8
}

fn default_landmark_count() -> usize {
    8
}

fn default_circle_radius() -> f64 {
    30.0
}

fn default_camera_height() -> f64 {
    0.0
}

fn default_cube_half_extent() -> f64 {
    10.0
}

fn default_pixel_sigma() -> f64 {
    1.0
}

fn default_pose_prior_translation_sigma() -> f64 {
    0.3
}

fn default_pose_prior_rotation_sigma() -> f64 {
    0.1
}

fn default_point_prior_sigma() -> f64 {
    0.1
}

fn default_measurement_noise_sigma() -> f64 {
    0.0
}

fn default_measurement_noise_seed() -> u64 {
    5
}

fn default_relinearize_threshold() -> f64 {
    0.01
}

fn default_relinearize_skip() -> usize {
    1
}

fn default_extra_refine_passes() -> usize {
    1
}

fn default_frame_delay_ms() -> u64 {
    0
}
