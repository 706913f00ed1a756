use std::fmt::{Display, Formatter};

pub mod highs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl std::hash::Hash for VarId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for VarId {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConstrId(pub u32);

impl std::hash::Hash for ConstrId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ConstrId {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
    Integer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstrSense {
    Less,
    Equal,
    Greater,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    Optimal,
    Infeasible,
    /// Anything else the backend reports (time limit, unbounded, ...)
    Other(String),
}

impl Display for ModelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Optimal => write!(f, "OPTIMAL"),
            ModelStatus::Infeasible => write!(f, "INFEASIBLE"),
            ModelStatus::Other(status) => write!(f, "{status}"),
        }
    }
}

/// Factory used for LPModels
pub trait LPEnv {
    fn new_with_seed(seed: i32) -> Self where Self: Sized;
    fn set_time_limit(&mut self, seconds: f64);
    // Create an empty model that inherits the environment settings
    fn new_model(&mut self, name: &str) -> Box<dyn LPModel>;
}

/// Trait for a linear (or mixed integer) programming model.
///
/// Conventions shared by all backends:
/// * the dual of a row is the change of the optimal objective per unit
///   increase of its right hand side, so a binding `>=` row of a
///   minimisation has a non-negative dual; MIP solves report zero duals
/// * the slack of a row is `activity - rhs`
pub trait LPModel {
    fn name(&self) -> &str;

    /// Adds a variable. `column` places it into already existing rows.
    fn add_var(
        &mut self,
        name: &str,
        kind: VarKind,
        obj: f64,
        lb: f64,
        ub: f64,
        column: &[(ConstrId, f64)],
    ) -> VarId;

    fn add_constr(&mut self, name: &str, expr: &[(VarId, f64)], sense: ConstrSense, rhs: f64) -> ConstrId;

    fn get_constr_by_name(&self, name: &str) -> Option<ConstrId>;

    /// Replaces the whole objective, variables not listed get coefficient zero
    fn set_objective(&mut self, expr: &[(VarId, f64)], sense: ObjSense);

    fn set_var_kind(&mut self, var: VarId, kind: VarKind);

    // Run optimization.
    fn optimize(&mut self) -> ModelStatus;

    // Return optimal objective function
    fn get_objective(&self) -> f64;

    // Return solution coefficents for the list of variables
    fn get_x_list(&self, vars: &[VarId]) -> Vec<f64>;

    // Return dual values for list of constraints
    fn get_dual_list(&self, constrs: &[ConstrId]) -> Vec<f64>;

    // Return slacks (activity - rhs) for list of constraints
    fn get_slack_list(&self, constrs: &[ConstrId]) -> Vec<f64>;

    // Return runtime of optimization in seconds
    fn get_runtime(&self) -> f64;
}
