use crate::Symbol;
use thiserror::Error;

/// Failures surfaced by the graph containers and the estimators.
///
/// Every variant is fatal to the run that produced it. The variable-keyed
/// variants indicate caller bugs (a guess inserted twice, a factor naming a
/// variable that never received a guess), the structural and numerical
/// variants indicate an estimation pass that cannot proceed. None of them
/// are recovered internally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A second value was inserted for a symbol within one container.
    #[error("variable {0} already has a value")]
    DuplicateVariable(Symbol),
    /// A value was requested for a symbol that never received one.
    #[error("variable {0} has no value")]
    UnknownVariable(Symbol),
    /// A symbol of one category was used with a value of the other.
    #[error("variable {0} used with a value of the wrong category")]
    CategoryMismatch(Symbol),
    /// A landmark entered the estimator with fewer than two observing poses
    /// and no prior, which leaves its position unconstrained along at least
    /// one direction.
    #[error("variable {0} needs two observing poses or a prior before estimation")]
    UnderconstrainedVariable(Symbol),
    /// A point projected at or behind the optical center.
    #[error("point projects at or behind the optical center")]
    Cheirality,
    /// The normal equations could not be factored.
    #[error("normal equations are not positive definite")]
    IndeterminateSystem,
    /// The batch refiner terminated without converging.
    #[error("batch refinement did not converge")]
    DidNotConverge,
}

pub type Result<T> = core::result::Result<T, Error>;
