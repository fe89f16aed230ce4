use crate::{CameraIntrinsics, CameraPose, NoiseModel, Result, Symbol, Values};
use nalgebra::{DMatrix, DVector, Point2, Point3};

/// A probabilistic constraint over one or two variables.
///
/// Every factor carries a measurement and a noise model. Its residual is
/// the whitened difference between what the current values predict and what
/// was measured, and its linearization additionally provides the Jacobian
/// block of that residual for each connected variable, expressed on the
/// variable's tangent chart (se(3) for poses, world coordinates for
/// landmarks).
#[derive(Debug, Clone)]
pub enum Factor {
    /// Anchors a pose variable to a reference pose. Used on the first pose
    /// to fix the coordinate frame.
    PosePrior {
        symbol: Symbol,
        pose: CameraPose,
        noise: NoiseModel,
    },
    /// Anchors a landmark variable to a reference position. Used on the
    /// first landmark to fix the scale.
    PointPrior {
        symbol: Symbol,
        point: Point3<f64>,
        noise: NoiseModel,
    },
    /// The observation of a landmark as a pixel in the image of a pose.
    Projection {
        pose: Symbol,
        landmark: Symbol,
        pixel: Point2<f64>,
        intrinsics: CameraIntrinsics,
        noise: NoiseModel,
    },
}

/// The whitened residual of a factor and its Jacobian block per connected
/// variable, both evaluated at a particular set of values.
#[derive(Debug, Clone)]
pub struct Linearization {
    pub residual: DVector<f64>,
    pub blocks: Vec<(Symbol, DMatrix<f64>)>,
}

impl Factor {
    /// The variables this factor connects.
    pub fn symbols(&self) -> Vec<Symbol> {
        match self {
            Factor::PosePrior { symbol, .. } | Factor::PointPrior { symbol, .. } => vec![*symbol],
            Factor::Projection { pose, landmark, .. } => vec![*pose, *landmark],
        }
    }

    /// The dimension of the residual.
    pub fn dim(&self) -> usize {
        match self {
            Factor::PosePrior { .. } => 6,
            Factor::PointPrior { .. } => 3,
            Factor::Projection { .. } => 2,
        }
    }

    fn noise(&self) -> &NoiseModel {
        match self {
            Factor::PosePrior { noise, .. }
            | Factor::PointPrior { noise, .. }
            | Factor::Projection { noise, .. } => noise,
        }
    }

    /// The whitened residual at the given values.
    pub fn residual(&self, values: &Values) -> Result<DVector<f64>> {
        let mut residual = match self {
            Factor::PosePrior { symbol, pose, .. } => {
                let estimate = values.pose(*symbol)?;
                DVector::from_column_slice(estimate.local_from(pose).vector().as_slice())
            }
            Factor::PointPrior { symbol, point, .. } => {
                let estimate = values.point(*symbol)?;
                DVector::from_column_slice((estimate - point).as_slice())
            }
            Factor::Projection {
                pose,
                landmark,
                pixel,
                intrinsics,
                ..
            } => {
                let pose = values.pose(*pose)?;
                let point = values.point(*landmark)?;
                let predicted = intrinsics.project(pose.world_to_camera(point))?;
                DVector::from_column_slice((predicted - pixel).as_slice())
            }
        };
        self.noise().whiten_residual(&mut residual);
        Ok(residual)
    }

    /// The whitened residual and per-variable Jacobian blocks at the given
    /// values.
    ///
    /// Prior factors are linearized to first order with an identity chart
    /// Jacobian, which is exact for the translation components and accurate
    /// to the size of the rotational residual for the rotation components.
    pub fn linearize(&self, values: &Values) -> Result<Linearization> {
        let (mut residual, mut blocks) = match self {
            Factor::PosePrior { symbol, pose, .. } => {
                let estimate = values.pose(*symbol)?;
                let residual =
                    DVector::from_column_slice(estimate.local_from(pose).vector().as_slice());
                (residual, vec![(*symbol, DMatrix::identity(6, 6))])
            }
            Factor::PointPrior { symbol, point, .. } => {
                let estimate = values.point(*symbol)?;
                let residual = DVector::from_column_slice((estimate - point).as_slice());
                (residual, vec![(*symbol, DMatrix::identity(3, 3))])
            }
            Factor::Projection {
                pose: pose_symbol,
                landmark,
                pixel,
                intrinsics,
                ..
            } => {
                let pose = values.pose(*pose_symbol)?;
                let point = values.point(*landmark)?;
                let (predicted, pixel_jacobian) =
                    intrinsics.project_with_jacobian(pose.world_to_camera(point))?;
                let residual = DVector::from_column_slice((predicted - pixel).as_slice());

                // The camera point is R^T (p - t) for camera-to-world pose
                // (R, t). On the pose chart the translation moves t in world
                // coordinates and the rotation is left-multiplied, giving
                //   d p_c / d dt = -R^T
                //   d p_c / d dr = R^T hat(p - t)
                // and for the landmark simply d p_c / d p = R^T.
                let rotation_transpose = *pose.rotation().inverse().matrix();
                let lever = (point - pose.translation()).cross_matrix();

                let mut pose_jacobian = DMatrix::zeros(2, 6);
                pose_jacobian
                    .fixed_slice_mut::<2, 3>(0, 0)
                    .copy_from(&(pixel_jacobian * -rotation_transpose));
                pose_jacobian
                    .fixed_slice_mut::<2, 3>(0, 3)
                    .copy_from(&(pixel_jacobian * rotation_transpose * lever));

                let mut point_jacobian = DMatrix::zeros(2, 3);
                point_jacobian
                    .fixed_slice_mut::<2, 3>(0, 0)
                    .copy_from(&(pixel_jacobian * rotation_transpose));

                (
                    residual,
                    vec![(*pose_symbol, pose_jacobian), (*landmark, point_jacobian)],
                )
            }
        };
        let noise = self.noise();
        noise.whiten_residual(&mut residual);
        for (_, block) in &mut blocks {
            noise.whiten_jacobian(block);
        }
        Ok(Linearization { residual, blocks })
    }
}
