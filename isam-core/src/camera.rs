use crate::{Error, Result};
use nalgebra::{Matrix2x3, Matrix3, Point2, Point3, Vector2};

/// Intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// Projection takes a camera-frame point, divides by depth to reach the
/// virtual image plane, and applies the intrinsic matrix to land in pixel
/// coordinates. Distortion is not modeled.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            principal_point: Point2::new(0.0, 0.0),
            skew: 0.0,
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Projects a camera-frame point to pixel coordinates.
    ///
    /// Fails with [`Error::Cheirality`] when the point sits at or behind the
    /// optical center, since such a point has no projection.
    pub fn project(&self, point: Point3<f64>) -> Result<Point2<f64>> {
        if point.z <= f64::EPSILON {
            return Err(Error::Cheirality);
        }
        let x = point.x / point.z;
        let y = point.y / point.z;
        Ok(Point2::new(
            self.focals.x * x + self.skew * y + self.principal_point.x,
            self.focals.y * y + self.principal_point.y,
        ))
    }

    /// Projects a camera-frame point and also returns the Jacobian of the
    /// pixel coordinates in respect to the camera-frame point.
    pub fn project_with_jacobian(&self, point: Point3<f64>) -> Result<(Point2<f64>, Matrix2x3<f64>)> {
        let pixel = self.project(point)?;
        let z_inv = 1.0 / point.z;
        let x = point.x * z_inv;
        let y = point.y * z_inv;
        #[rustfmt::skip]
        let jacobian = Matrix2x3::new(
            self.focals.x * z_inv, self.skew * z_inv,     -(self.focals.x * x + self.skew * y) * z_inv,
            0.0,                   self.focals.y * z_inv, -self.focals.y * y * z_inv,
        );
        Ok((pixel, jacobian))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::identity()
            .focal(50.0)
            .principal_point(Point2::new(50.0, 50.0))
    }

    #[test]
    fn centered_point_projects_to_principal_point() {
        let pixel = intrinsics().project(Point3::new(0.0, 0.0, 10.0)).unwrap();
        assert!((pixel - Point2::new(50.0, 50.0)).norm() < 1e-12);
    }

    #[test]
    fn point_behind_camera_is_cheirality_failure() {
        assert_eq!(
            intrinsics().project(Point3::new(1.0, 1.0, -2.0)),
            Err(Error::Cheirality)
        );
        assert_eq!(
            intrinsics().project(Point3::new(1.0, 1.0, 0.0)),
            Err(Error::Cheirality)
        );
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let intrinsics = intrinsics().skew(1.3);
        let point = Point3::new(2.0, -1.5, 12.0);
        let (pixel, jacobian) = intrinsics.project_with_jacobian(point).unwrap();
        let eps = 1e-7;
        for axis in 0..3 {
            let mut perturbed = point;
            perturbed[axis] += eps;
            let moved = intrinsics.project(perturbed).unwrap();
            let numeric = (moved - pixel) / eps;
            let analytic = jacobian.column(axis);
            assert!(
                (numeric - analytic).norm() < 1e-5,
                "axis {} differs: {} vs {}",
                axis,
                numeric,
                analytic
            );
        }
    }
}
