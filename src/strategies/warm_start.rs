use crate::engine::solution::{Scale, SolutionId};
use crate::engine::{PotentialProvider, SolverState, SolverStrategy, StopFlags};
use crate::error::Result;
use crate::pricing::{ApproxOracle, PricingKind, PricingOracle};
use crate::strategies::pure_colgen::{column_generation_checks, PureColGen};
use crate::ui::UIUserMessage;

/// Column generation that prices with the 2-approximation until it stalls,
/// then switches once to an exact oracle. That is the configured oracle, or
/// the plain exact one if the configuration asks for the 2-approximation.
///
/// The switch keeps every column of the master and clears the stop flags.
/// It does not happen if the first phase ends on the iteration cap or a timeout.
#[derive(Default)]
pub struct WarmStart {
    duals: PureColGen,
    exact: Option<Box<dyn PricingOracle>>,
    transition_iteration: Option<i64>,
    first_stop_flags: StopFlags,
}

impl WarmStart {
    pub fn new() -> Self {
        WarmStart::default()
    }

    /// Iteration at which the oracle was switched
    pub fn transition_iteration(&self) -> Option<i64> {
        self.transition_iteration
    }

    /// Stop flags that ended the approximate phase
    pub fn first_stop_flags(&self) -> StopFlags {
        self.first_stop_flags
    }
}

impl PotentialProvider for WarmStart {
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64> {
        self.duals.generate_lamb(state, x)
    }

    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>> {
        self.duals.generate_f(state, x)
    }

    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        self.duals.generate_p(state, x, t)
    }

    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        self.duals.generate_q(state, x, t)
    }
}

impl SolverStrategy for WarmStart {
    fn name(&self) -> &'static str {
        "Warm Start Column Generation"
    }

    fn prepare(&mut self, state: &mut SolverState) -> Result<()> {
        let approx = Box::new(ApproxOracle::new(state.instance().clone()));
        self.exact = Some(state.replace_oracle(approx));
        Ok(())
    }

    fn pricing_kind(&self, configured: PricingKind) -> PricingKind {
        match configured {
            PricingKind::TwoApprox => PricingKind::Exact,
            exact => exact,
        }
    }

    fn scale(&self) -> Scale {
        Scale::NONE
    }

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        self.duals.read_solution(state)
    }

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()> {
        column_generation_checks(self, state, x, Scale::NONE)?;

        let flags = state.stop_flags();
        let stalled = flags.intersects(StopFlags::DUALITYMATCH | StopFlags::REDCOST | StopFlags::TOL_MET);
        let exhausted = flags.intersects(StopFlags::MAXITER | StopFlags::TIMEOUT);
        if !stalled || exhausted {
            return Ok(());
        }

        if let Some(exact) = self.exact.take() {
            let approx = state.replace_oracle(exact);
            self.transition_iteration = Some(state.iteration());
            self.first_stop_flags = flags;
            state.reset_stop_flags();
            state.ui().send(UIUserMessage::OracleSwitch {
                iteration: state.iteration(),
                from: approx.name().to_string(),
                to: state.oracle_name().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_target_is_always_exact() {
        let warm_start = WarmStart::new();
        assert_eq!(warm_start.pricing_kind(PricingKind::TwoApprox), PricingKind::Exact);
        assert_eq!(warm_start.pricing_kind(PricingKind::Exact), PricingKind::Exact);
        assert_eq!(warm_start.pricing_kind(PricingKind::ExactWithDelay), PricingKind::ExactWithDelay);
    }
}
