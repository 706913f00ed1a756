#![warn(warnings)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(non_upper_case_globals)]
#![allow(clippy::needless_return)]
#![allow(clippy::items_after_statements)]
#![allow(unused_variables, unused_imports, dead_code)]

pub mod misc;
pub mod error;
pub mod instance;
pub mod pricing;
pub mod master_relaxation;
pub mod engine;
pub mod strategies;
pub mod solvers;
mod ui;

pub use ui::*;

pub use engine::solution::{Scale, Solution, SolutionId};
pub use engine::{MulticastPackingSolver, PotentialProvider, SolverSettings, SolverState, SolverStrategy, StopFlags};
pub use error::{Error, Result};
pub use instance::{Edge, EdgeData, MulticastPackingInstance, MulticastRequest, Tree};
pub use pricing::{PricingKind, PricingOracle, Prices};
