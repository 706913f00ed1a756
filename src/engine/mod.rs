use std::fmt::{Display, Formatter};
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::instance::{MulticastPackingInstance, Tree};
use crate::master_relaxation::MasterRelaxation;
use crate::misc::{FullHashMap, HashMap};
use crate::pricing::{PricingKind, PricingOracle, Prices};
use crate::solvers::LPEnv;
use crate::ui::{IterationUIState, PricingProblemUIState, UISender, UIUserMessage};

pub mod solution;

use solution::{Scale, Solution, SolutionArena, SolutionId};

/// Tolerance used when reading integral values from an LP/MIP solution
pub const INT_FEAS_TOL: f64 = 1.0e-5;
/// Default accuracy target of all variants
pub const TOLERANCE: f64 = 0.9;
pub const MAX_ITERS: i64 = 1000;

/// Register of independent termination reasons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StopFlags(pub u8);

impl StopFlags {
    pub const NONE: StopFlags = StopFlags(0);
    pub const TOL_MET: StopFlags = StopFlags(0b00001);
    pub const DUALITYMATCH: StopFlags = StopFlags(0b00010);
    pub const REDCOST: StopFlags = StopFlags(0b00100);
    pub const MAXITER: StopFlags = StopFlags(0b01000);
    pub const TIMEOUT: StopFlags = StopFlags(0b10000);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: StopFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: StopFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for StopFlags {
    type Output = StopFlags;

    fn bitor(self, rhs: StopFlags) -> StopFlags {
        StopFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StopFlags {
    fn bitor_assign(&mut self, rhs: StopFlags) {
        self.0 |= rhs.0;
    }
}

impl Display for StopFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05b}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct SolverSettings {
    /// Accuracy target; also the scale of the perturbed variant
    pub tolerance: f64,
    pub max_iterations: i64,
    /// Initial `sigma` of the Jansen-Zhang scaling phases
    pub sigma0: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            tolerance: TOLERANCE,
            max_iterations: MAX_ITERS,
            sigma0: 1.0,
        }
    }
}

/// Computes the potentials of a solution. One implementation per variant.
///
/// Implementations are called through the memoising accessors of
/// [`SolverState`] and may use those accessors themselves for values they
/// depend on.
pub trait PotentialProvider {
    /// Maximum congestion `lamb(x)`
    fn generate_lamb(&mut self, state: &mut SolverState, x: SolutionId) -> Result<f64>;

    /// Load per edge `f(x)`, dense edge order
    fn generate_f(&mut self, state: &mut SolverState, x: SolutionId) -> Result<Vec<f64>>;

    /// Price per edge `p(x,t)`, dense edge order
    fn generate_p(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>>;

    /// Price already credited to each request, `q(x,t)`
    fn generate_q(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Vec<f64>>;

    fn generate_theta(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<Decimal> {
        let lamb = state.lamb(self, x)?;
        Decimal::from_f64(lamb).ok_or(Error::NonFinite("lambda"))
    }

    fn generate_phi(&mut self, state: &mut SolverState, x: SolutionId, t: Scale) -> Result<f64> {
        Ok(state.lamb(self, x)?.ln())
    }
}

/// How a variant produces the next solution and which stop conditions it checks
pub trait SolverStrategy: PotentialProvider {
    fn name(&self) -> &'static str;

    /// Called once after the master and the oracle exist, before the seed trees are generated
    fn prepare(&mut self, state: &mut SolverState) -> Result<()> {
        Ok(())
    }

    /// Oracle the solver builds when the caller asked for `configured`
    fn pricing_kind(&self, configured: PricingKind) -> PricingKind {
        configured
    }

    /// Scaling parameter of the next iteration's prices
    fn scale(&self) -> Scale;

    fn next_solution(&mut self, state: &mut SolverState) -> Result<SolutionId>;

    fn perform_checks_and_updates(&mut self, state: &mut SolverState, x: SolutionId) -> Result<()>;
}

/// Everything a variant reads or grows while iterating
pub struct SolverState {
    instance: Arc<MulticastPackingInstance>,
    master: MasterRelaxation,
    oracle: Box<dyn PricingOracle>,
    arena: SolutionArena,
    history: Vec<SolutionId>,
    new_trees: Vec<Tree>,
    iteration: i64,
    stop_flags: StopFlags,
    settings: SolverSettings,
    ui: UISender,

    lamb_cache: HashMap<SolutionId, f64>,
    load_cache: HashMap<SolutionId, Arc<Vec<f64>>>,
    price_cache: FullHashMap<(SolutionId, Scale), Arc<Vec<f64>>>,
    cost_cache: FullHashMap<(SolutionId, Scale), Arc<Vec<f64>>>,
    theta_cache: FullHashMap<(SolutionId, Scale), Decimal>,
    phi_cache: FullHashMap<(SolutionId, Scale), f64>,
}

impl SolverState {
    pub fn new(
        instance: Arc<MulticastPackingInstance>,
        master: MasterRelaxation,
        oracle: Box<dyn PricingOracle>,
        settings: SolverSettings,
        ui: UISender,
    ) -> Self {
        SolverState {
            instance,
            master,
            oracle,
            arena: SolutionArena::default(),
            history: Vec::new(),
            new_trees: Vec::new(),
            iteration: -1,
            stop_flags: StopFlags::NONE,
            settings,
            ui,
            lamb_cache: HashMap::default(),
            load_cache: HashMap::default(),
            price_cache: FullHashMap::default(),
            cost_cache: FullHashMap::default(),
            theta_cache: FullHashMap::default(),
            phi_cache: FullHashMap::default(),
        }
    }

    pub fn lamb<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId) -> Result<f64> {
        if let Some(lamb) = self.lamb_cache.get(&x) {
            return Ok(*lamb);
        }
        let lamb = provider.generate_lamb(self, x)?;
        self.lamb_cache.insert(x, lamb);
        Ok(lamb)
    }

    pub fn f<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId) -> Result<Arc<Vec<f64>>> {
        if let Some(f) = self.load_cache.get(&x) {
            return Ok(f.clone());
        }
        let f = Arc::new(provider.generate_f(self, x)?);

        #[cfg(feature = "validity_assertions")]
        {
            let loads = self.arena.get(x).edge_loads(&self.instance);
            for (k, (provided, recomputed)) in f.iter().zip(&loads).enumerate() {
                assert!(
                    (provided - recomputed).abs() <= 1e-6,
                    "load of edge {} is {provided}, solution says {recomputed}",
                    self.instance.edges()[k]
                );
            }
        }

        self.load_cache.insert(x, f.clone());
        Ok(f)
    }

    pub fn p<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<Arc<Vec<f64>>> {
        if let Some(p) = self.price_cache.get(&(x, t)) {
            return Ok(p.clone());
        }
        let p = provider.generate_p(self, x, t)?;
        if p.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFinite("edge prices"));
        }
        let p = Arc::new(p);
        self.price_cache.insert((x, t), p.clone());
        Ok(p)
    }

    pub fn q<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<Arc<Vec<f64>>> {
        if let Some(q) = self.cost_cache.get(&(x, t)) {
            return Ok(q.clone());
        }
        let q = Arc::new(provider.generate_q(self, x, t)?);
        self.cost_cache.insert((x, t), q.clone());
        Ok(q)
    }

    pub fn theta<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<Decimal> {
        if let Some(theta) = self.theta_cache.get(&(x, t)) {
            return Ok(*theta);
        }
        let theta = provider.generate_theta(self, x, t)?;
        self.theta_cache.insert((x, t), theta);
        Ok(theta)
    }

    pub fn phi<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<f64> {
        if let Some(phi) = self.phi_cache.get(&(x, t)) {
            return Ok(*phi);
        }
        let phi = provider.generate_phi(self, x, t)?;
        self.phi_cache.insert((x, t), phi);
        Ok(phi)
    }

    /// Drops every memoised value of `x`.
    /// Values read off the master depend on the columns present at the time
    /// of the solve, so they are refreshed whenever the master is re-read.
    pub(crate) fn forget(&mut self, x: SolutionId) {
        self.lamb_cache.remove(&x);
        self.load_cache.remove(&x);
        self.price_cache.retain(|(id, _), _| *id != x);
        self.cost_cache.retain(|(id, _), _| *id != x);
        self.theta_cache.retain(|(id, _), _| *id != x);
        self.phi_cache.retain(|(id, _), _| *id != x);
    }

    /// `p(x,t)` as prices for a pricing oracle
    pub fn prices<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<Prices> {
        let p = self.p(provider, x, t)?;
        Ok(Prices::from_edge_values(&self.instance, &p))
    }

    /// Load the newest trees would add at weight one, `f'`
    pub fn new_tree_loads(&self) -> Vec<f64> {
        let mut loads = vec![0.0; self.instance.num_edges()];
        for edge in self.new_trees.iter().flat_map(Tree::edges) {
            if let Some(k) = self.instance.edge_index(edge) {
                loads[k] += 1.0;
            }
        }
        loads
    }

    /// Cost of each newest tree under `p(x,t)`
    pub fn new_tree_costs<P: PotentialProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        x: SolutionId,
        t: Scale,
    ) -> Result<Vec<f64>> {
        let prices = self.prices(provider, x, t)?;
        self.new_trees.iter().map(|tree| prices.cost(tree)).collect()
    }

    /// `(<p,f> - <p,f'>) / (<p,f> + <p,f'>)`, zero if the denominator vanishes
    pub fn tolerance<P: PotentialProvider + ?Sized>(&mut self, provider: &mut P, x: SolutionId, t: Scale) -> Result<f64> {
        let p = self.p(provider, x, t)?;
        let f = self.f(provider, x)?;
        let pf = dot(&p, &f);
        let pf_prime = dot(&p, &self.new_tree_loads());
        if pf + pf_prime == 0.0 {
            return Ok(0.0);
        }
        Ok((pf - pf_prime) / (pf + pf_prime))
    }

    /// Runs the current oracle for every request and adds the trees as columns
    pub fn generate_new_trees(&mut self, prices: &Prices) -> Result<()> {
        let start = Instant::now();
        self.new_trees = self.oracle.generate_new_trees(&mut self.master, prices)?;
        self.ui.send(UIUserMessage::PricingProblemFinish(PricingProblemUIState {
            oracle: self.oracle.name().to_string(),
            runtime: start.elapsed().as_secs_f64(),
            num_trees: self.new_trees.len(),
        }));
        Ok(())
    }

    pub fn intern(&mut self, solution: Solution) -> SolutionId {
        #[cfg(feature = "validity_assertions")]
        for (i, request) in solution.requests().iter().enumerate() {
            assert!(request.values().all(|w| *w > 0.0), "request {i} has a non-positive tree weight");
        }

        self.arena.intern(solution)
    }

    pub fn raise(&mut self, flag: StopFlags) {
        self.stop_flags |= flag;
    }

    /// Only used by the oracle switch of the warm start variant
    pub(crate) fn reset_stop_flags(&mut self) {
        self.stop_flags = StopFlags::NONE;
    }

    /// Swaps the pricing oracle. Columns already in the master are kept.
    pub fn replace_oracle(&mut self, oracle: Box<dyn PricingOracle>) -> Box<dyn PricingOracle> {
        std::mem::replace(&mut self.oracle, oracle)
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn instance(&self) -> &Arc<MulticastPackingInstance> {
        &self.instance
    }

    pub fn num_requests(&self) -> usize {
        self.instance.num_requests()
    }

    pub fn num_edges(&self) -> usize {
        self.instance.num_edges()
    }

    pub fn master(&self) -> &MasterRelaxation {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut MasterRelaxation {
        &mut self.master
    }

    pub fn solution(&self, x: SolutionId) -> &Arc<Solution> {
        self.arena.get(x)
    }

    pub fn history(&self) -> &[SolutionId] {
        &self.history
    }

    pub fn current_solution(&self) -> Option<SolutionId> {
        self.history.last().copied()
    }

    pub fn new_trees(&self) -> &[Tree] {
        &self.new_trees
    }

    pub fn iteration(&self) -> i64 {
        self.iteration
    }

    pub fn stop_flags(&self) -> StopFlags {
        self.stop_flags
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn ui(&self) -> &UISender {
        &self.ui
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

pub(crate) fn to_f64(value: Decimal, what: &'static str) -> Result<f64> {
    value.to_f64().ok_or(Error::NonFinite(what))
}

/// Column generation driver.
///
/// The solver never loops on its own behalf: callers drive it with
/// [`perform_iteration`](Self::perform_iteration) and inspect the stop flags,
/// or use [`solve_until_stopped`](Self::solve_until_stopped).
pub struct MulticastPackingSolver<S: SolverStrategy> {
    state: SolverState,
    strategy: S,
}

impl<S: SolverStrategy> MulticastPackingSolver<S> {
    /// Builds the master and the oracle, then seeds one tree per request at unit prices
    pub fn new<E: LPEnv>(
        instance: Arc<MulticastPackingInstance>,
        mut strategy: S,
        pricing: PricingKind,
        env: &mut E,
        settings: SolverSettings,
        ui: UISender,
    ) -> Result<Self> {
        let master = MasterRelaxation::new(instance.clone(), env, ui.clone());
        let oracle = strategy.pricing_kind(pricing).build(&instance, env, &ui)?;
        ui.send(UIUserMessage::Log(format!(
            "{} nodes, {} edges, {} requests, pricing with {}",
            instance.graph().node_count(),
            instance.num_edges(),
            instance.num_requests(),
            oracle.name()
        )));
        let mut state = SolverState::new(instance, master, oracle, settings, ui);

        strategy.prepare(&mut state)?;
        state.ui.send(UIUserMessage::StartPhase(strategy.name(), 0));
        state.generate_new_trees(&Prices::Uniform(1.0))?;

        Ok(MulticastPackingSolver { state, strategy })
    }

    pub fn perform_iteration(&mut self) -> Result<()> {
        let start = Instant::now();

        let t = self.strategy.scale();
        let x = self.strategy.next_solution(&mut self.state)?;
        self.state.iteration += 1;
        self.state.history.push(x);

        let prices = self.state.prices(&mut self.strategy, x, t)?;
        self.state.generate_new_trees(&prices)?;
        self.strategy.perform_checks_and_updates(&mut self.state, x)?;

        self.report(x, t, start)
    }

    fn report(&mut self, x: SolutionId, t: Scale, start: Instant) -> Result<()> {
        let ui_state = IterationUIState {
            solver: self.strategy.name(),
            iteration: self.state.iteration,
            lamb: self.state.lamb(&mut self.strategy, x)?,
            phi: self.state.phi(&mut self.strategy, x, t)?,
            tolerance: self.state.tolerance(&mut self.strategy, x, t)?,
            stop_flags: self.state.stop_flags,
            num_columns: self.state.master.num_columns(),
            runtime: start.elapsed().as_secs_f64(),
        };
        self.state.ui.send(UIUserMessage::IterationFinish(ui_state));
        Ok(())
    }

    /// Iterates while no stop flag is set. Raises `TIMEOUT` once `time_limit` has elapsed.
    pub fn solve_until_stopped(&mut self, time_limit: Option<Duration>) -> Result<StopFlags> {
        let start = Instant::now();
        while self.state.stop_flags.is_empty() {
            if time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                self.state.raise(StopFlags::TIMEOUT);
                self.state.ui.send(UIUserMessage::TimeLimitReached);
                break;
            }
            self.perform_iteration()?;
        }
        Ok(self.state.stop_flags)
    }

    pub fn lamb(&mut self, x: SolutionId) -> Result<f64> {
        self.state.lamb(&mut self.strategy, x)
    }

    pub fn f(&mut self, x: SolutionId) -> Result<Arc<Vec<f64>>> {
        self.state.f(&mut self.strategy, x)
    }

    pub fn p(&mut self, x: SolutionId, t: Scale) -> Result<Arc<Vec<f64>>> {
        self.state.p(&mut self.strategy, x, t)
    }

    pub fn q(&mut self, x: SolutionId, t: Scale) -> Result<Arc<Vec<f64>>> {
        self.state.q(&mut self.strategy, x, t)
    }

    pub fn theta(&mut self, x: SolutionId, t: Scale) -> Result<f64> {
        let theta = self.state.theta(&mut self.strategy, x, t)?;
        to_f64(theta, "theta")
    }

    pub fn phi(&mut self, x: SolutionId, t: Scale) -> Result<f64> {
        self.state.phi(&mut self.strategy, x, t)
    }

    pub fn tolerance(&mut self, x: SolutionId, t: Scale) -> Result<f64> {
        self.state.tolerance(&mut self.strategy, x, t)
    }

    pub fn scale(&self) -> Scale {
        self.strategy.scale()
    }

    pub fn stop_flags(&self) -> StopFlags {
        self.state.stop_flags
    }

    pub fn iteration(&self) -> i64 {
        self.state.iteration
    }

    pub fn current_solution(&self) -> Option<SolutionId> {
        self.state.current_solution()
    }

    pub fn solution(&self, x: SolutionId) -> &Solution {
        self.state.solution(x)
    }

    pub fn history(&self) -> &[SolutionId] {
        self.state.history()
    }

    pub fn new_trees(&self) -> &[Tree] {
        &self.state.new_trees
    }

    pub fn master(&self) -> &MasterRelaxation {
        &self.state.master
    }

    pub fn oracle_name(&self) -> &str {
        self.state.oracle_name()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn state(&self) -> &SolverState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accumulate_and_render_as_five_bits() {
        let mut flags = StopFlags::NONE;
        assert!(flags.is_empty());
        flags |= StopFlags::REDCOST;
        flags |= StopFlags::TOL_MET;
        assert_eq!(flags.to_string(), "00101");
        assert!(flags.contains(StopFlags::REDCOST));
        assert!(!flags.intersects(StopFlags::MAXITER | StopFlags::TIMEOUT));
        assert_eq!((StopFlags::TIMEOUT | StopFlags::MAXITER).0, 0b11000);
    }

    #[test]
    fn scale_keys_compare_by_bits() {
        let mut cache: FullHashMap<(SolutionId, Scale), f64> = FullHashMap::default();
        cache.insert((SolutionId(0), Scale(1.0 / 6.0)), 1.0);
        assert_eq!(cache.get(&(SolutionId(0), Scale(1.0 / 6.0))), Some(&1.0));
        assert_eq!(cache.get(&(SolutionId(0), Scale::NONE)), None);
    }
}
