use core::{
    iter::Sum,
    ops::{Add, AddAssign},
};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Rotation3, Unit, Vector3, Vector6};

/// A member of the lie algebra so(3), the tangent space of 3d rotation.
///
/// This is only used where an optimizer needs unconstrained coordinates for
/// the rotational degrees of freedom. Everywhere else rotations are stored
/// as rotation matrices, since converting between the two is non-trivial.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
pub struct Skew3(pub Vector3<f64>);

impl Skew3 {
    /// This converts the Skew3 into its skew-symmetric matrix form.
    pub fn hat(self) -> Matrix3<f64> {
        self.0.cross_matrix()
    }

    /// Converts the Skew3 to a Rotation3 matrix (the exponential map).
    pub fn rotation(self) -> Rotation3<f64> {
        self.into()
    }

    /// Converts the Skew3 into a Rotation3 matrix quickly, but only works
    /// when the rotation is very small.
    fn rotation_small(self) -> Rotation3<f64> {
        Rotation3::from_matrix(&(Matrix3::identity() + self.hat()))
    }

    /// The left Jacobian of the exponential map.
    ///
    /// For an increment `e` of the tangent coordinates,
    /// `exp(w + e) = exp(J_l(w) * e) * exp(w)` to first order. Optimizers
    /// that parameterize a rotation as a tangent offset from a fixed base
    /// rotation use this to map their global parameter derivatives into the
    /// local chart at the current rotation.
    pub fn left_jacobian(self) -> Matrix3<f64> {
        let theta2 = self.0.norm_squared();
        let hat = self.hat();
        if theta2 <= f64::EPSILON {
            // Second order Taylor expansion about zero.
            Matrix3::identity() + 0.5 * hat + (hat * hat) / 6.0
        } else {
            let theta = theta2.sqrt();
            Matrix3::identity()
                + ((1.0 - theta.cos()) / theta2) * hat
                + ((theta - theta.sin()) / (theta2 * theta)) * (hat * hat)
        }
    }
}

/// This is the exponential map.
impl From<Skew3> for Rotation3<f64> {
    fn from(w: Skew3) -> Self {
        // This check is done to avoid the degenerate case where the angle is near zero.
        let theta2 = w.0.norm_squared();
        if theta2 <= f64::EPSILON {
            w.rotation_small()
        } else {
            let theta = theta2.sqrt();
            let axis = Unit::new_unchecked(w.0 / theta);
            Self::from_axis_angle(&axis, theta)
        }
    }
}

/// This is the log map.
impl From<Rotation3<f64>> for Skew3 {
    fn from(r: Rotation3<f64>) -> Self {
        let skew3 = r.scaled_axis();
        // scaled_axis can produce NaN for rotations within float error of identity.
        let skew3 = if skew3.iter().any(|n| n.is_nan()) {
            Vector3::zeros()
        } else {
            skew3
        };
        Self(skew3)
    }
}

/// A small translation and rotation that will be applied to a pose.
///
/// This is a member of the lie algebra se(3), laid out with the translation
/// components before the rotation components. All linear solves express
/// pose updates in these coordinates, and [`CameraPose::retract`]
/// (crate::CameraPose::retract) applies them.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct PoseTangent {
    pub translation: Vector3<f64>,
    pub rotation: Vector3<f64>,
}

impl PoseTangent {
    pub fn new(translation: Vector3<f64>, rotation: Vector3<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
        }
    }

    /// Reads the tangent from a stacked vector (translation before rotation).
    pub fn from_vector(v: Vector6<f64>) -> Self {
        Self {
            translation: Vector3::new(v[0], v[1], v[2]),
            rotation: Vector3::new(v[3], v[4], v[5]),
        }
    }

    /// Stacks the tangent into a vector (translation before rotation).
    pub fn vector(&self) -> Vector6<f64> {
        let t = self.translation;
        let r = self.rotation;
        Vector6::new(t.x, t.y, t.z, r.x, r.y, r.z)
    }

    /// The combined norm of the translation and rotation components.
    ///
    /// Relinearization thresholds compare against this.
    pub fn norm(&self) -> f64 {
        self.vector().norm()
    }

    /// Scales both the rotation and the translation.
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.translation *= scale;
        self.rotation *= scale;
        self
    }
}

impl Add for PoseTangent {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            translation: self.translation + rhs.translation,
            rotation: self.rotation + rhs.rotation,
        }
    }
}

impl AddAssign for PoseTangent {
    fn add_assign(&mut self, rhs: Self) {
        self.translation += rhs.translation;
        self.rotation += rhs.rotation;
    }
}

impl Sum for PoseTangent {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(PoseTangent::identity(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_log_round_trip() {
        let w = Skew3(Vector3::new(0.3, -0.2, 0.45));
        let back: Skew3 = w.rotation().into();
        assert!((w.0 - back.0).norm() < 1e-12);
    }

    #[test]
    fn log_of_identity_is_zero() {
        let w: Skew3 = Rotation3::identity().into();
        assert_eq!(w.0, Vector3::zeros());
    }

    #[test]
    fn left_jacobian_matches_finite_difference() {
        let w = Skew3(Vector3::new(0.4, -0.1, 0.2));
        let jacobian = w.left_jacobian();
        let eps = 1e-6;
        for axis in 0..3 {
            let mut e = Vector3::zeros();
            e[axis] = eps;
            // exp(w + e) * exp(w)^-1 should equal exp(J_l(w) * e).
            let perturbed = Skew3(w.0 + e).rotation() * w.rotation().inverse();
            let local: Skew3 = perturbed.into();
            let predicted = jacobian * e;
            assert!(
                (local.0 - predicted).norm() < 1e-9,
                "axis {} differs: {} vs {}",
                axis,
                local.0,
                predicted
            );
        }
    }

    #[test]
    fn tangent_vector_round_trip() {
        let tangent = PoseTangent::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.2, 0.3));
        assert_eq!(PoseTangent::from_vector(tangent.vector()), tangent);
    }
}
