use crate::linear::Ordering;
use isam_core::{
    nalgebra::{
        dimension::{Dynamic, U1},
        DMatrix, DVector, VecStorage, Vector3, Vector6,
    },
    Error, FactorGraph, PoseTangent, Result, Skew3, Values,
};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, MinimizationReport};
use log::debug;

/// Adapts a factor graph and a set of values to a least-squares problem
/// over the stacked tangent coordinates of every variable.
///
/// The parameter vector is the tangent offset from the values the problem
/// was created with (so it starts at zero). Poses apply their offset
/// through [`CameraPose::retract`](isam_core::CameraPose::retract); because
/// the solver differentiates in this fixed chart rather than in the chart
/// at the current pose, the rotational Jacobian columns are corrected by
/// the left Jacobian of the exponential map.
pub struct GraphProblem<'a> {
    graph: &'a FactorGraph,
    base: Values,
    current: Values,
    ordering: Ordering,
    delta: DVector<f64>,
    residual_rows: usize,
}

impl<'a> GraphProblem<'a> {
    pub fn new(graph: &'a FactorGraph, values: Values) -> Self {
        let ordering = Ordering::new(&values);
        let delta = DVector::zeros(ordering.total());
        let residual_rows = graph.iter().map(|factor| factor.dim()).sum();
        Self {
            graph,
            base: values.clone(),
            current: values,
            ordering,
            delta,
            residual_rows,
        }
    }

    /// The refined values at the current parameters.
    pub fn into_values(self) -> Values {
        self.current
    }

    /// The rotation component of the current offset for a pose variable
    /// starting at the given column.
    fn rotation_offset(&self, offset: usize) -> Skew3 {
        Skew3(Vector3::from_iterator(
            self.delta.rows(offset + 3, 3).iter().copied(),
        ))
    }
}

impl LeastSquaresProblem<f64, Dynamic, Dynamic> for GraphProblem<'_> {
    type ResidualStorage = VecStorage<f64, Dynamic, U1>;
    type JacobianStorage = VecStorage<f64, Dynamic, Dynamic>;
    type ParameterStorage = VecStorage<f64, Dynamic, U1>;

    /// Set the stored parameters `$\vec{x}$`.
    fn set_params(&mut self, params: &DVector<f64>) {
        self.delta = params.clone();
        self.current = self.base.clone();
        for (symbol, offset, dim) in self.ordering.iter() {
            let block = self.delta.rows(offset, dim);
            if dim == 6 {
                let tangent =
                    PoseTangent::from_vector(Vector6::from_iterator(block.iter().copied()));
                self.current
                    .retract_pose(symbol, &tangent)
                    .expect("ordering refers to a pose missing from the base values");
            } else {
                let step = Vector3::from_iterator(block.iter().copied());
                self.current
                    .retract_point(symbol, &step)
                    .expect("ordering refers to a point missing from the base values");
            }
        }
    }

    /// Get the stored parameters `$\vec{x}$`.
    fn params(&self) -> DVector<f64> {
        self.delta.clone()
    }

    /// Compute the residual vector.
    fn residuals(&self) -> Option<DVector<f64>> {
        let mut stacked = DVector::zeros(self.residual_rows);
        let mut row = 0;
        for factor in self.graph.iter() {
            let residual = factor.residual(&self.current).ok()?;
            stacked.rows_mut(row, residual.len()).copy_from(&residual);
            row += residual.len();
        }
        Some(stacked)
    }

    /// Compute the Jacobian of the residual vector.
    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(self.residual_rows, self.ordering.total());
        let mut row = 0;
        for factor in self.graph.iter() {
            let linearization = factor.linearize(&self.current).ok()?;
            let rows = linearization.residual.len();
            for (symbol, block) in &linearization.blocks {
                let (offset, dim) = self.ordering.slot(*symbol).ok()?;
                let mut target = jacobian.slice_mut((row, offset), (rows, dim));
                if dim == 6 {
                    // Translation columns are shared between the charts;
                    // rotation columns need the chain through exp.
                    let chain = self.rotation_offset(offset).left_jacobian();
                    target.columns_mut(0, 3).copy_from(&block.columns(0, 3));
                    target
                        .columns_mut(3, 3)
                        .copy_from(&(block.columns(3, 3) * chain));
                } else {
                    target.copy_from(block);
                }
            }
            row += rows;
        }
        Some(jacobian)
    }
}

/// Refines the values against the whole graph with Levenberg-Marquardt,
/// run to convergence.
///
/// Returns the refined values together with the solver's termination
/// report; an unsuccessful termination is surfaced as
/// [`Error::DidNotConverge`].
pub fn batch_refine(
    graph: &FactorGraph,
    values: &Values,
) -> Result<(Values, MinimizationReport<f64>)> {
    let lm = LevenbergMarquardt::new();
    let (problem, report) = lm.minimize(GraphProblem::new(graph, values.clone()));
    debug!(
        "Levenberg-Marquardt finished after {} evaluations: {:?}",
        report.number_of_evaluations, report.termination
    );
    if !report.termination.was_successful() {
        return Err(Error::DidNotConverge);
    }
    Ok((problem.into_values(), report))
}
