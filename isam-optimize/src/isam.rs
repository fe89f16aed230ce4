use crate::linear::{normal_equations, retract_all, solve_normal_equations, Ordering};
use average::Mean;
use isam_core::{Error, Factor, FactorGraph, Linearization, Result, Symbol, Values};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Tuning parameters for the incremental smoother.
#[derive(Debug, Copy, Clone)]
pub struct IsamParams {
    /// A variable whose accumulated tangent motion since its last
    /// linearization exceeds this norm has every factor touching it
    /// relinearized on the next eligible pass.
    pub relinearize_threshold: f64,
    /// Relinearization eligibility is only checked every this-many passes.
    /// New factors are always linearized fresh regardless.
    pub relinearize_skip: usize,
}

impl Default for IsamParams {
    fn default() -> Self {
        Self {
            relinearize_threshold: default_relinearize_threshold(),
            relinearize_skip: default_relinearize_skip(),
        }
    }
}

fn default_relinearize_threshold() -> f64 {
    0.1
}

fn default_relinearize_skip() -> usize {
    10
}

/// What one refinement pass did.
#[derive(Debug, Copy, Clone)]
pub struct UpdateStats {
    /// Factors in the system after the pass.
    pub factors: usize,
    /// Variables in the system after the pass.
    pub variables: usize,
    /// Variables whose factors were relinearized during the pass.
    pub relinearized: usize,
    /// The norm of the stacked update the pass applied.
    pub delta_norm: f64,
    /// The mean whitened residual norm per factor after the pass.
    pub mean_residual: f64,
}

struct Entry {
    factor: Factor,
    linearization: Linearization,
}

/// The incremental smoother.
///
/// Factors and values accumulate across [`Isam::update`] calls and are
/// never removed; the estimate is refined monotonically and never rolled
/// back. Each update merges the new batch, checks it is well formed, and
/// runs one Gauss-Newton pass; [`Isam::refine`] runs an extra pass with no
/// new data when more accuracy is wanted.
///
/// The pass reuses each factor's cached Jacobians until one of its
/// variables has moved past [`IsamParams::relinearize_threshold`] since
/// that factor was last linearized. Residuals are always evaluated at the
/// current values, so stale Jacobians only slow convergence, never bias
/// the fixed point.
pub struct Isam {
    params: IsamParams,
    entries: Vec<Entry>,
    values: Values,
    /// Accumulated tangent motion per variable since its factors were
    /// last linearized.
    drift: BTreeMap<Symbol, f64>,
    passes_since_relinearization: usize,
    updates: usize,
}

impl Default for Isam {
    fn default() -> Self {
        Self::new(IsamParams::default())
    }
}

impl Isam {
    pub fn new(params: IsamParams) -> Self {
        Self {
            params,
            entries: Vec::new(),
            values: Values::new(),
            drift: BTreeMap::new(),
            passes_since_relinearization: 0,
            updates: 0,
        }
    }

    pub fn params(&self) -> &IsamParams {
        &self.params
    }

    /// The current best estimate of every known variable.
    pub fn estimate(&self) -> &Values {
        &self.values
    }

    /// How many factors the smoother holds.
    pub fn factor_count(&self) -> usize {
        self.entries.len()
    }

    /// Every factor the smoother has accumulated, in commit order.
    pub fn factors(&self) -> impl Iterator<Item = &Factor> {
        self.entries.iter().map(|entry| &entry.factor)
    }

    /// How many batches have been committed.
    pub fn update_count(&self) -> usize {
        self.updates
    }

    /// Merges a batch of new factors and initial guesses, then runs one
    /// refinement pass.
    ///
    /// Every symbol referenced by a new factor must have a value either
    /// already in the smoother or in `initial`, every new guess must be for
    /// a symbol the smoother has never seen, and every landmark must be
    /// observed by at least two poses or carry a prior. Violations are
    /// caller bugs and surface as errors.
    pub fn update(&mut self, graph: FactorGraph, initial: Values) -> Result<UpdateStats> {
        self.values.merge(initial)?;
        for symbol in graph.referenced_symbols() {
            if !self.values.contains(symbol) {
                return Err(Error::UnknownVariable(symbol));
            }
        }
        for factor in graph {
            let linearization = factor.linearize(&self.values)?;
            for symbol in factor.symbols() {
                self.drift.entry(symbol).or_insert(0.0);
            }
            self.entries.push(Entry {
                factor,
                linearization,
            });
        }
        self.check_constrained()?;
        self.updates += 1;
        self.pass()
    }

    /// Runs one refinement pass with no new data, trading extra compute for
    /// accuracy.
    pub fn refine(&mut self) -> Result<UpdateStats> {
        if self.entries.is_empty() {
            return Err(Error::IndeterminateSystem);
        }
        self.pass()
    }

    /// The two-observation rule, checked structurally: every landmark needs
    /// a prior or two distinct observing poses before it can be estimated,
    /// and every variable must be touched by at least one factor.
    fn check_constrained(&self) -> Result<()> {
        let mut observers: BTreeMap<Symbol, BTreeSet<Symbol>> = BTreeMap::new();
        let mut with_prior: BTreeSet<Symbol> = BTreeSet::new();
        let mut referenced: BTreeSet<Symbol> = BTreeSet::new();
        for entry in &self.entries {
            match &entry.factor {
                Factor::PosePrior { symbol, .. } | Factor::PointPrior { symbol, .. } => {
                    with_prior.insert(*symbol);
                    referenced.insert(*symbol);
                }
                Factor::Projection { pose, landmark, .. } => {
                    observers.entry(*landmark).or_default().insert(*pose);
                    referenced.insert(*pose);
                    referenced.insert(*landmark);
                }
            }
        }
        for symbol in self.values.symbols() {
            if !referenced.contains(&symbol) {
                return Err(Error::UnderconstrainedVariable(symbol));
            }
            if symbol.is_landmark() && !with_prior.contains(&symbol) {
                let observed_by = observers.get(&symbol).map_or(0, BTreeSet::len);
                if observed_by < 2 {
                    return Err(Error::UnderconstrainedVariable(symbol));
                }
            }
        }
        Ok(())
    }

    fn pass(&mut self) -> Result<UpdateStats> {
        let start = Instant::now();
        let relinearized = self.relinearize_stale()?;

        // Jacobians may be stale, residuals never are.
        self.refresh_residuals()?;

        let ordering = Ordering::new(&self.values);
        let (hessian, gradient) =
            normal_equations(self.entries.iter().map(|entry| &entry.linearization), &ordering)?;
        let delta = solve_normal_equations(hessian, gradient)?;
        let delta_norm = delta.norm();

        for (symbol, moved) in retract_all(&mut self.values, &ordering, &delta)? {
            if let Some(drift) = self.drift.get_mut(&symbol) {
                *drift += moved;
            }
        }

        self.refresh_residuals()?;
        let mean: Mean = self
            .entries
            .iter()
            .map(|entry| entry.linearization.residual.norm())
            .collect();

        let stats = UpdateStats {
            factors: self.entries.len(),
            variables: self.values.len(),
            relinearized,
            delta_norm,
            mean_residual: mean.mean(),
        };
        debug!(
            "pass over {} factors and {} variables took {:?}: |delta| = {:.3e}, mean residual = {:.3e}, {} variables relinearized",
            stats.factors,
            stats.variables,
            start.elapsed(),
            stats.delta_norm,
            stats.mean_residual,
            stats.relinearized,
        );
        Ok(stats)
    }

    /// Relinearizes every factor touching a variable that drifted past the
    /// threshold, if this pass is eligible.
    fn relinearize_stale(&mut self) -> Result<usize> {
        self.passes_since_relinearization += 1;
        if self.passes_since_relinearization < self.params.relinearize_skip {
            return Ok(0);
        }
        self.passes_since_relinearization = 0;
        let stale: BTreeSet<Symbol> = self
            .drift
            .iter()
            .filter(|&(_, &drift)| drift > self.params.relinearize_threshold)
            .map(|(&symbol, _)| symbol)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        for entry in &mut self.entries {
            if entry
                .factor
                .symbols()
                .iter()
                .any(|symbol| stale.contains(symbol))
            {
                entry.linearization = entry.factor.linearize(&self.values)?;
            }
        }
        for symbol in &stale {
            if let Some(drift) = self.drift.get_mut(symbol) {
                *drift = 0.0;
            }
        }
        Ok(stale.len())
    }

    fn refresh_residuals(&mut self) -> Result<()> {
        for entry in &mut self.entries {
            entry.linearization.residual = entry.factor.residual(&self.values)?;
        }
        Ok(())
    }
}
