use nalgebra::{DMatrix, DVector};

/// The uncertainty attached to a measurement.
///
/// Whitening divides every residual row (and the matching Jacobian rows) by
/// its standard deviation, so that the sum of squared whitened residuals is
/// the negative log-likelihood the optimizer minimizes. Only independent
/// per-axis noise is modeled; correlated noise has no use here.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// The same standard deviation on every axis.
    Isotropic { sigma: f64 },
    /// A separate standard deviation per axis.
    Diagonal { sigmas: DVector<f64> },
}

impl NoiseModel {
    /// An isotropic model. `sigma` must be positive.
    pub fn isotropic(sigma: f64) -> Self {
        assert!(sigma > 0.0, "noise sigma must be positive");
        Self::Isotropic { sigma }
    }

    /// A per-axis model. Every sigma must be positive.
    pub fn diagonal(sigmas: impl Into<DVector<f64>>) -> Self {
        let sigmas = sigmas.into();
        assert!(
            sigmas.iter().all(|&sigma| sigma > 0.0),
            "noise sigmas must be positive"
        );
        Self::Diagonal { sigmas }
    }

    /// The standard deviation for a given residual row.
    pub fn sigma(&self, row: usize) -> f64 {
        match self {
            NoiseModel::Isotropic { sigma } => *sigma,
            NoiseModel::Diagonal { sigmas } => sigmas[row],
        }
    }

    /// Scales a residual into whitened coordinates.
    pub fn whiten_residual(&self, residual: &mut DVector<f64>) {
        for row in 0..residual.len() {
            residual[row] /= self.sigma(row);
        }
    }

    /// Scales the rows of a Jacobian block into whitened coordinates.
    pub fn whiten_jacobian(&self, jacobian: &mut DMatrix<f64>) {
        for row in 0..jacobian.nrows() {
            let sigma = self.sigma(row);
            for value in jacobian.row_mut(row).iter_mut() {
                *value /= sigma;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_whitening_scales_every_row() {
        let noise = NoiseModel::isotropic(2.0);
        let mut residual = DVector::from_vec(vec![2.0, -4.0]);
        noise.whiten_residual(&mut residual);
        assert_eq!(residual, DVector::from_vec(vec![1.0, -2.0]));
    }

    #[test]
    fn diagonal_whitening_scales_per_axis() {
        let noise = NoiseModel::diagonal(DVector::from_vec(vec![1.0, 0.5]));
        let mut jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        noise.whiten_jacobian(&mut jacobian);
        assert_eq!(jacobian, DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 6.0, 8.0]));
    }
}
