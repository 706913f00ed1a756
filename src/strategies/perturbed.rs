use std::sync::Arc;

use rust_decimal::Decimal;

use crate::engine::solution::{Scale, SolutionId};
use crate::engine::{PotentialProvider, SolverState, SolverStrategy, StopFlags};
use crate::error::Result;
use crate::misc::FullHashMap;
use crate::pricing::Prices;
use crate::strategies::jansen_zhang::{entropic_prices, potential, solve_theta};
use crate::strategies::pure_colgen::{column_generation_checks, PureColGen};

/// Column generation priced with smoothed duals.
///
/// Solutions, loads and `q` are read off the master like [`PureColGen`].
/// The oracle receives the entropic prices of the log barrier at the fixed
/// scale `t = tolerance`, while the first two stop checks still use the
/// master's true duals.
#[derive(Default)]
pub struct Perturbed {
    duals: PureColGen,
    t: f64,
    true_prices: FullHashMap<(SolutionId, Scale), Arc<Vec<f64>>>,
}

impl Perturbed {
    pub fn new() -> Self {
        Perturbed::default()
    }

    /// Clipped master duals of `x`, as seen by the last price computation
    pub fn true_prices(&self, x: SolutionId, t: Scale) -> Option<&Arc<Vec<f64>>> {
        self.true_prices.get(&(x, t))
    }
}

impl PotentialProvider for Perturbed {
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64> {
        self.duals.generate_lamb(state, x)
    }

    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>> {
        self.duals.generate_f(state, x)
    }

    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        let true_prices = self.duals.generate_p(state, x, t)?;
        self.true_prices.insert((x, t), Arc::new(true_prices));

        let theta = state.theta(self, x, t)?;
        let f = state.f(self, x)?;
        entropic_prices(&f, theta, t.0)
    }

    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        self.duals.generate_q(state, x, t)
    }

    fn generate_theta(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Decimal> {
        let f = state.f(self, x)?;
        let lamb = state.lamb(self, x)?;
        solve_theta(&f, lamb, t.0)
    }

    fn generate_phi(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<f64> {
        let theta = state.theta(self, x, t)?;
        let f = state.f(self, x)?;
        potential(&f, theta, t.0)
    }
}

impl SolverStrategy for Perturbed {
    fn name(&self) -> &'static str {
        "Perturbed Column Generation"
    }

    fn prepare(&mut self, state: &mut SolverState) -> Result<()> {
        self.t = state.settings().tolerance;
        Ok(())
    }

    fn scale(&self) -> Scale {
        Scale(self.t)
    }

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        self.duals.read_solution(state)
    }

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()> {
        let t = Scale(self.t);

        // smoothed prices first, they record the true ones on the way
        state.p(self, x, t)?;
        let true_prices = match self.true_prices.get(&(x, t)) {
            Some(prices) => prices.clone(),
            None => Arc::new(self.duals.generate_p(state, x, t)?),
        };
        let true_prices = Prices::from_edge_values(state.instance(), &true_prices);

        let costs = state.new_trees().iter().map(|tree| true_prices.cost(tree)).collect::<Result<Vec<_>>>()?;
        if costs.iter().sum::<f64>() >= state.lamb(self, x)? {
            state.raise(StopFlags::DUALITYMATCH);
        }

        let q = state.q(self, x, t)?;
        if costs.iter().zip(q.iter()).all(|(cost, q)| cost - q >= 0.0) {
            state.raise(StopFlags::REDCOST);
        }

        column_generation_checks(self, state, x, t)
    }
}
