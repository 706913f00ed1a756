use rust_decimal::prelude::{FromPrimitive, Signed, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

use crate::engine::solution::{Scale, Solution, SolutionId};
use crate::engine::{dot, to_f64, PotentialProvider, SolverState, SolverStrategy, StopFlags};
use crate::error::{Error, Result};
use crate::ui::{ScalingPhaseUIState, UIUserMessage};

const MAX_RIDDER_ITERATIONS: usize = 200;

fn decimal(value: f64, what: &'static str) -> Result<Decimal> {
    Decimal::from_f64(value).ok_or(Error::NonFinite(what))
}

fn decimals(values: &[f64], what: &'static str) -> Result<Vec<Decimal>> {
    values.iter().map(|v| decimal(*v, what)).collect()
}

/// `(t/M) * sum_e theta / (theta - f_e) - 1`
fn theta_equation(theta: Decimal, loads: &[Decimal], t: Decimal, m: Decimal) -> Result<Decimal> {
    let mut sum = Decimal::ZERO;
    for load in loads {
        let term = theta.checked_div(theta - load).ok_or(Error::NonFinite("theta equation"))?;
        sum = sum.checked_add(term).ok_or(Error::NonFinite("theta equation"))?;
    }
    t.checked_mul(sum)
        .and_then(|v| v.checked_div(m))
        .map(|v| v - Decimal::ONE)
        .ok_or(Error::NonFinite("theta equation"))
}

/// Root of `(t/M) * sum_e theta / (theta - f_e) = 1` on
/// `[lamb / (1 - t/M), lamb / (1 - t)]` by Ridder's method.
///
/// All arithmetic is carried out in 96 bit decimals; the terms blow up as
/// theta approaches the largest load.
pub fn solve_theta(loads: &[f64], lamb: f64, t: f64) -> Result<Decimal> {
    let m = Decimal::from(loads.len());
    let lamb = loads.iter().copied().fold(lamb, f64::max);
    let loads = decimals(loads, "edge load")?;
    let lamb = decimal(lamb, "lambda")?;
    let t = decimal(t, "scale")?;

    let share = t.checked_div(m).ok_or(Error::NonFinite("theta bracket"))?;
    let mut low = lamb.checked_div(Decimal::ONE - share).ok_or(Error::NonFinite("theta bracket"))?;
    let mut high = lamb.checked_div(Decimal::ONE - t).ok_or(Error::NonFinite("theta bracket"))?;

    let show = |g: Option<Decimal>| g.map_or_else(|| "-".to_string(), |g| g.to_string());
    let not_bracketed = |low: Decimal, high: Decimal, g_low, g_high| Error::RootNotBracketed {
        low: low.to_string(),
        high: high.to_string(),
        g_low: show(g_low),
        g_high: show(g_high),
    };

    if lamb <= Decimal::ZERO || low >= high {
        return Err(not_bracketed(low, high, None, None));
    }

    let g = |theta: Decimal| theta_equation(theta, &loads, t, m);
    let mut g_low = g(low)?;
    let mut g_high = g(high)?;

    // rounding of the bracket ends may leave a root that sits exactly on an end slightly outside
    let end_tolerance = Decimal::new(1, 20);
    if g_low.abs() <= end_tolerance {
        return Ok(low);
    }
    if g_high.abs() <= end_tolerance {
        return Ok(high);
    }
    if g_low.signum() == g_high.signum() {
        return Err(not_bracketed(low, high, Some(g_low), Some(g_high)));
    }

    let accuracy = Decimal::new(1, 24) * high;
    let mut answer: Option<Decimal> = None;

    for _ in 0..MAX_RIDDER_ITERATIONS {
        let mid = (low + high) / Decimal::TWO;
        let g_mid = g(mid)?;
        let s = (g_mid * g_mid - g_low * g_high).sqrt().ok_or(Error::NonFinite("ridder step"))?;
        if s.is_zero() {
            return Ok(answer.unwrap_or(mid));
        }

        let direction = (g_low - g_high).signum();
        let next = mid + (mid - low) * direction * g_mid / s;
        if answer.is_some_and(|a| (next - a).abs() <= accuracy) {
            return Ok(next);
        }
        answer = Some(next);

        let g_next = g(next)?;
        if g_next.is_zero() {
            return Ok(next);
        }

        if g_mid.signum() != g_next.signum() {
            low = mid;
            g_low = g_mid;
            high = next;
            g_high = g_next;
        } else if g_low.signum() != g_next.signum() {
            high = next;
            g_high = g_next;
        } else if g_high.signum() != g_next.signum() {
            low = next;
            g_low = g_next;
        } else {
            return Err(not_bracketed(low, high, Some(g_low), Some(g_high)));
        }

        if (high - low).abs() <= accuracy {
            return Ok(next);
        }
    }

    Err(Error::RootNotConverged(MAX_RIDDER_ITERATIONS))
}

/// `p_e = t * theta / (M * (theta - f_e))`, sums to one at the root theta
pub fn entropic_prices(loads: &[f64], theta: Decimal, t: f64) -> Result<Vec<f64>> {
    let m = Decimal::from(loads.len());
    let t = decimal(t, "scale")?;
    let numerator = t * theta;

    loads
        .iter()
        .map(|load| {
            let gap = theta - decimal(*load, "edge load")?;
            let price = numerator.checked_div(m * gap).ok_or(Error::NonFinite("entropic price"))?;
            to_f64(price, "entropic price")
        })
        .collect()
}

/// `phi = ln(theta) - (t/M) * sum_e ln(theta - f_e)`
pub fn potential(loads: &[f64], theta: Decimal, t: f64) -> Result<f64> {
    let m = Decimal::from(loads.len());
    let t = decimal(t, "scale")?;

    let mut barrier = Decimal::ZERO;
    for load in loads {
        let gap = theta - decimal(*load, "edge load")?;
        barrier += gap.checked_ln().ok_or(Error::NonFinite("potential"))?;
    }
    let barrier = (t * barrier).checked_div(m).ok_or(Error::NonFinite("potential"))?;
    let phi = theta.checked_ln().ok_or(Error::NonFinite("potential"))? - barrier;
    to_f64(phi, "potential")
}

/// One scaling phase: entered at `iteration` with the given `sigma`
#[derive(Clone, Debug, PartialEq)]
pub struct ScalingPhase {
    pub iteration: i64,
    pub sigma: f64,
    pub lamb: f64,
}

/// Jansen-Zhang potential reduction.
///
/// Each iteration moves the solution towards the newest trees, priced by
/// the entropic prices of the log barrier potential. `sigma` halves at every
/// scaling phase and `t = sigma / 6`. The first check after the seed always
/// closes the bootstrap phase.
pub struct JansenZhang {
    sigma: f64,
    t: f64,
    m: f64,
    w: Option<f64>,
    lambda_of_prev_scaling: f64,
    phases: Vec<ScalingPhase>,
}

impl Default for JansenZhang {
    fn default() -> Self {
        JansenZhang::new()
    }
}

impl JansenZhang {
    /// `sigma` is taken from the solver settings in `prepare`
    pub fn new() -> Self {
        JansenZhang {
            sigma: 1.0,
            t: 1.0 / 6.0,
            m: 0.0,
            w: None,
            lambda_of_prev_scaling: 0.0,
            phases: Vec::new(),
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn phases(&self) -> &[ScalingPhase] {
        &self.phases
    }

    fn start_phase(&mut self, state: &mut SolverState, x: SolutionId, lamb: f64) -> Result<()> {
        self.sigma /= 2.0;
        self.t = self.sigma / 6.0;
        let w = if self.w.is_none() {
            (1.0 + self.sigma) / ((1.0 + self.sigma / 3.0) * self.m)
        } else {
            (1.0 + self.sigma) / (1.0 + 2.0 * self.sigma)
        };
        self.w = Some(w);
        self.lambda_of_prev_scaling = lamb;

        self.phases.push(ScalingPhase {
            iteration: state.iteration(),
            sigma: self.sigma,
            lamb,
        });
        state.ui().send(UIUserMessage::ScalingPhase(ScalingPhaseUIState {
            iteration: state.iteration(),
            sigma: self.sigma,
            t: self.t,
            w,
            lamb,
        }));

        let t = Scale(self.t);
        let prices = state.prices(self, x, t)?;
        state.generate_new_trees(&prices)
    }
}

impl PotentialProvider for JansenZhang {
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64> {
        Ok(state.f(self, x)?.iter().copied().fold(0.0, f64::max))
    }

    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>> {
        Ok(state.solution(x).edge_loads(state.instance()))
    }

    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        let theta = state.theta(self, x, t)?;
        let f = state.f(self, x)?;
        entropic_prices(&f, theta, t.0)
    }

    /// Cheapest tree already in the solution, per request
    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>> {
        let prices = state.prices(self, x, t)?;
        let solution = state.solution(x).clone();
        solution
            .requests()
            .iter()
            .map(|trees| {
                trees
                    .keys()
                    .map(|tree| prices.cost(tree))
                    .try_fold(f64::INFINITY, |best, cost| cost.map(|c| best.min(c)))
            })
            .collect()
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

impl SolverStrategy for JansenZhang {
    fn name(&self) -> &'static str {
        "Jansen-Zhang"
    }

    fn prepare(&mut self, state: &mut SolverState) -> Result<()> {
        self.sigma = state.settings().sigma0;
        self.t = self.sigma / 6.0;
        self.m = state.num_edges() as f64;
        Ok(())
    }

    fn scale(&self) -> Scale {
        Scale(self.t)
    }

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId> {
        let Some(previous) = state.current_solution() else {
            let seed = Solution::from_trees(state.new_trees());
            return Ok(state.intern(seed));
        };

        let t = Scale(self.t);
        let p = state.p(self, previous, t)?;
        let f = state.f(self, previous)?;
        let pf = dot(&p, &f);
        let pf_prime = dot(&p, &state.new_tree_loads());
        let theta = to_f64(state.theta(self, previous, t)?, "theta")?;
        let tolerance = state.tolerance(self, previous, t)?;

        let step = self.t * theta * tolerance / (2.0 * self.m * (pf + pf_prime));
        if !step.is_finite() {
            return Err(Error::NonFinite("step size"));
        }

        let next = state.solution(previous).convex_step(state.new_trees(), step);
        Ok(state.intern(next))
    }

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()> {
        let tol = state.settings().tolerance;
        let t = Scale(self.t);

        let costs = state.new_tree_costs(self, x, t)?;
        let lamb = state.lamb(self, x)?;
        if costs.iter().sum::<f64>() >= lamb {
            state.raise(StopFlags::DUALITYMATCH);
        }

        let q = state.q(self, x, t)?;
        if costs.iter().zip(q.iter()).all(|(cost, q)| cost - q >= tol) {
            state.raise(StopFlags::REDCOST);
        }

        match self.w {
            None => self.start_phase(state, x, lamb)?,
            Some(w) => {
                if state.tolerance(self, x, t)? <= self.sigma / 6.0 || lamb <= w * self.lambda_of_prev_scaling {
                    if self.sigma <= tol {
                        state.raise(StopFlags::TOL_MET);
                    } else {
                        self.start_phase(state, x, lamb)?;
                    }
                }
            }
        }

        if state.iteration() >= state.settings().max_iterations {
            state.raise(StopFlags::MAXITER);
        }

        Ok(())
    }
}
