use isam_core::{Error, Linearization, PoseTangent, Result, Symbol, Value, Values};
use itertools::Itertools;
use nalgebra::{DMatrix, DVector, Vector3, Vector6};

/// Assigns every variable a column range in the stacked linear system.
///
/// Poses occupy six columns (their se(3) tangent) and landmarks three
/// (world coordinates). Variables are laid out in symbol order, so the
/// same values always produce the same ordering.
#[derive(Debug, Clone)]
pub(crate) struct Ordering {
    slots: Vec<(Symbol, usize, usize)>,
    total: usize,
}

impl Ordering {
    pub fn new(values: &Values) -> Self {
        let mut slots = Vec::with_capacity(values.len());
        let mut offset = 0;
        for (symbol, value) in values.iter() {
            let dim = match value {
                Value::Pose(_) => 6,
                Value::Point(_) => 3,
            };
            slots.push((symbol, offset, dim));
            offset += dim;
        }
        Self {
            slots,
            total: offset,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The column offset and width of a variable.
    pub fn slot(&self, symbol: Symbol) -> Result<(usize, usize)> {
        self.slots
            .binary_search_by_key(&symbol, |&(symbol, _, _)| symbol)
            .map(|ix| (self.slots[ix].1, self.slots[ix].2))
            .map_err(|_| Error::UnknownVariable(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, usize, usize)> + '_ {
        self.slots.iter().copied()
    }
}

/// Accumulates the normal equations `H = sum J^T J`, `b = -sum J^T r` from
/// whitened linearizations.
pub(crate) fn normal_equations<'a>(
    linearizations: impl Iterator<Item = &'a Linearization>,
    ordering: &Ordering,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let n = ordering.total();
    let mut hessian = DMatrix::zeros(n, n);
    let mut gradient = DVector::zeros(n);
    for linearization in linearizations {
        for (symbol_a, jacobian_a) in &linearization.blocks {
            let (offset_a, dim_a) = ordering.slot(*symbol_a)?;
            let mut gradient_block = gradient.rows_mut(offset_a, dim_a);
            gradient_block -= jacobian_a.transpose() * &linearization.residual;
        }
        for ((symbol_a, jacobian_a), (symbol_b, jacobian_b)) in
            linearization.blocks.iter().cartesian_product(&linearization.blocks)
        {
            let (offset_a, dim_a) = ordering.slot(*symbol_a)?;
            let (offset_b, dim_b) = ordering.slot(*symbol_b)?;
            let mut hessian_block = hessian.slice_mut((offset_a, offset_b), (dim_a, dim_b));
            hessian_block += jacobian_a.transpose() * jacobian_b;
        }
    }
    Ok((hessian, gradient))
}

/// Solves `H delta = b` by Cholesky factorization.
///
/// Failure to factor means the accumulated constraints do not determine
/// every variable, which is fatal to the caller.
pub(crate) fn solve_normal_equations(
    hessian: DMatrix<f64>,
    gradient: DVector<f64>,
) -> Result<DVector<f64>> {
    hessian
        .cholesky()
        .map(|cholesky| cholesky.solve(&gradient))
        .ok_or(Error::IndeterminateSystem)
}

/// Applies a stacked delta to the values, returning the tangent norm that
/// each variable moved by.
pub(crate) fn retract_all(
    values: &mut Values,
    ordering: &Ordering,
    delta: &DVector<f64>,
) -> Result<Vec<(Symbol, f64)>> {
    let mut moved = Vec::with_capacity(ordering.iter().count());
    for (symbol, offset, dim) in ordering.iter() {
        let block = delta.rows(offset, dim);
        if dim == 6 {
            let tangent = PoseTangent::from_vector(Vector6::from_iterator(block.iter().copied()));
            values.retract_pose(symbol, &tangent)?;
        } else {
            let step = Vector3::from_iterator(block.iter().copied());
            values.retract_point(symbol, &step)?;
        }
        moved.push((symbol, block.norm()));
    }
    Ok(moved)
}
