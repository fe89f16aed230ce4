use crate::{PoseTangent, Skew3};
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Point3, Rotation3, Vector3};

/// The pose of a camera in the world: a camera-to-world isometry.
///
/// The translation is the position of the optical center in world
/// coordinates and the rotation columns are the camera axes expressed in
/// world coordinates. Camera space is right-handed with positive `z`
/// forwards, positive `y` down, and positive `x` right, so the camera looks
/// along the third column of the rotation.
///
/// Optimizers never manipulate the isometry directly. They work on the
/// se(3) tangent chart anchored at the current pose: [`CameraPose::retract`]
/// applies a [`PoseTangent`] and [`CameraPose::local_from`] recovers the
/// tangent between two nearby poses. The chart is decoupled - the
/// translation moves in world coordinates while the rotation is
/// left-multiplied by the exponential of the rotation component.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
pub struct CameraPose(pub IsometryMatrix3<f64>);

impl CameraPose {
    /// A pose at the world origin looking along positive `z`.
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    /// Create the pose from its position and orientation in the world.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    /// Create a pose at `eye` with the camera `z` axis pointing at `target`.
    ///
    /// `up` fixes the roll and must not be collinear with the view
    /// direction.
    pub fn facing(eye: Point3<f64>, target: Point3<f64>, up: Vector3<f64>) -> Self {
        Self(IsometryMatrix3::face_towards(&eye, &target, &up))
    }

    /// The position of the optical center in world coordinates.
    pub fn translation(&self) -> Point3<f64> {
        self.0.translation.vector.into()
    }

    /// The orientation of the camera in world coordinates.
    pub fn rotation(&self) -> Rotation3<f64> {
        self.0.rotation
    }

    /// Composes with a relative pose on the right (a perturbation expressed
    /// in the camera frame).
    #[must_use]
    pub fn compose(&self, relative: &CameraPose) -> Self {
        Self(self.0 * relative.0)
    }

    /// Transforms a world point into camera coordinates.
    pub fn world_to_camera(&self, point: Point3<f64>) -> Point3<f64> {
        self.0.inverse_transform_point(&point)
    }

    /// Transforms a camera-frame point into world coordinates.
    pub fn camera_to_world(&self, point: Point3<f64>) -> Point3<f64> {
        self.0.transform_point(&point)
    }

    /// Applies a tangent-chart update to the pose.
    ///
    /// The translation moves by `delta.translation` in world coordinates and
    /// the rotation becomes `exp(delta.rotation) * R`.
    #[must_use]
    pub fn retract(&self, delta: &PoseTangent) -> Self {
        let rotation = Skew3(delta.rotation).rotation() * self.0.rotation;
        let translation = self.0.translation.vector + delta.translation;
        Self::from_parts(translation, rotation)
    }

    /// The tangent that retracts `reference` onto `self`, to first order.
    ///
    /// This is the residual a prior factor measures: zero exactly when the
    /// two poses coincide.
    pub fn local_from(&self, reference: &CameraPose) -> PoseTangent {
        let rotation: Skew3 = (self.0.rotation * reference.0.rotation.inverse()).into();
        PoseTangent::new(
            self.0.translation.vector - reference.0.translation.vector,
            rotation.0,
        )
    }
}
