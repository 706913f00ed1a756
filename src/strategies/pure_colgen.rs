use std::collections::BTreeMap;

use crate::engine::solution::{Scale, Solution, SolutionId};
use crate::engine::{PotentialProvider, SolverState, SolverStrategy, StopFlags, INT_FEAS_TOL};
use crate::error::{Error, Result};
use crate::master_relaxation::MasterSolution;

/// Column generation on the master's own basic solution and LP duals.
///
/// `lamb` is the master objective, `f_e = lamb - slack_e`, prices are the
/// edge duals clipped at zero and `q` holds the selection duals.
#[derive(Default)]
pub struct PureColGen {
    snapshot: Option<(SolutionId, MasterSolution)>,
}

impl PureColGen {
    pub fn new() -> Self {
        PureColGen { snapshot: None }
    }

    /// Solves the master and reads its column values as the next solution.
    /// Parallel columns of the same tree are summed.
    pub(crate) fn read_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        let master_solution = state.master_mut().solve()?.clone();

        let mut trees = vec![BTreeMap::new(); state.num_requests()];
        for column in state.master().pool().get_all_columns() {
            let value = master_solution.column_values[column.id.0 as usize];
            if value > 0.0 {
                *trees[column.data.request].entry(column.data.tree.clone()).or_insert(0.0) += value;
            }
        }
        for request in &mut trees {
            request.retain(|_, value: &mut f64| *value <= 1.0 + INT_FEAS_TOL);
        }

        let x = state.intern(Solution::new(trees));
        // an equal solution may have been read before, but the duals moved since
        state.forget(x);
        self.snapshot = Some((x, master_solution));
        Ok(x)
    }

    fn master_solution(&self, x: SolutionId) -> Result<&MasterSolution> {
        match &self.snapshot {
            Some((id, solution)) if *id == x => Ok(solution),
            _ => Err(Error::MasterNotSolved),
        }
    }
}

impl PotentialProvider for PureColGen {
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64> {
        Ok(self.master_solution(x)?.objective)
    }

    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>> {
        let solution = self.master_solution(x)?;
        Ok(solution.edge_slacks.iter().map(|slack| solution.objective - slack).collect())
    }

    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        // duals may come back as tiny negative numbers
        Ok(self.master_solution(x)?.edge_duals.iter().map(|dual| dual.max(0.0)).collect())
    }

    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        Ok(self.master_solution(x)?.selection_duals.clone())
    }
}

impl SolverStrategy for PureColGen {
    fn name(&self) -> &'static str {
        "Pure Column Generation"
    }

    fn scale(&self) -> Scale {
        Scale::NONE
    }

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        self.read_solution(state)
    }

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()> {
        column_generation_checks(self, state, x, Scale::NONE)
    }
}

/// Stop conditions shared by all variants that read the master:
///
/// * `DUALITYMATCH` when the new trees cost at least `lamb` in total
/// * `REDCOST` when no request's reduced cost is below `-tol * total / num_requests`
/// * `TOL_MET` when the tolerance drops to `tol / (2 + tol)`
/// * `MAXITER` once the iteration cap is reached
pub(crate) fn column_generation_checks<P: PotentialProvider + ?Sized>(
    provider: &mut P,
    state: &mut SolverState,
    x: SolutionId,
    t: Scale,
) -> Result<()> {
    let tol = state.settings().tolerance;

    let costs = state.new_tree_costs(provider, x, t)?;
    let total_new_cost: f64 = costs.iter().sum();
    if total_new_cost >= state.lamb(provider, x)? {
        state.raise(StopFlags::DUALITYMATCH);
    }

    let q = state.q(provider, x, t)?;
    let threshold = -tol * total_new_cost / state.num_requests() as f64;
    if costs.iter().zip(q.iter()).all(|(cost, q)| cost - q >= threshold) {
        state.raise(StopFlags::REDCOST);
    }

    if state.tolerance(provider, x, t)? <= tol / (2.0 + tol) {
        state.raise(StopFlags::TOL_MET);
    }

    if state.iteration() >= state.settings().max_iterations {
        state.raise(StopFlags::MAXITER);
    }

    Ok(())
}
