use crate::engine::solution::{Scale, SolutionId};
use crate::engine::{PotentialProvider, SolverState, SolverStrategy, INT_FEAS_TOL};
use crate::error::Result;
use crate::strategies::pure_colgen::{column_generation_checks, PureColGen};

/// Column generation over the integer master.
///
/// Duals of a MIP carry no information, so prices put equal mass on the
/// tight edges (load equal to the congestion) and `q` is the cheapest
/// column of each request under those prices.
#[derive(Default)]
pub struct ColGenIP {
    duals: PureColGen,
}

impl ColGenIP {
    pub fn new() -> Self {
        ColGenIP { duals: PureColGen::new() }
    }
}

impl PotentialProvider for ColGenIP {
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64> {
        self.duals.generate_lamb(state, x)
    }

    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>> {
        self.duals.generate_f(state, x)
    }

    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        let lamb = state.lamb(self, x)?;
        let f = state.f(self, x)?;

        let tight: Vec<f64> = f
            .iter()
            .map(|load| if (load - lamb).abs() <= INT_FEAS_TOL { 1.0 } else { 0.0 })
            .collect();
        let num_tight: f64 = tight.iter().sum();
        if num_tight == 0.0 {
            return Ok(tight);
        }
        Ok(tight.into_iter().map(|p| p / num_tight).collect())
    }

    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        let prices = state.prices(self, x, t)?;

        let mut cheapest = vec![state.num_edges() as f64; state.num_requests()];
        for column in state.master().pool().get_all_columns() {
            let cost = prices.cost(&column.data.tree)?;
            let best = &mut cheapest[column.data.request];
            if cost < *best {
                *best = cost;
            }
        }
        Ok(cheapest)
    }
}

impl SolverStrategy for ColGenIP {
    fn name(&self) -> &'static str {
        "Integer Column Generation"
    }

    fn prepare(&mut self, state: &mut SolverState) -> Result<()> {
        state.master_mut().set_integer();
        Ok(())
    }

    fn scale(&self) -> Scale {
        Scale::NONE
    }

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        self.duals.read_solution(state)
    }

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()> {
        column_generation_checks(self, state, x, Scale::NONE)
    }
}
