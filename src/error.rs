use thiserror::Error;

/// Failures that abort the current pricing call or iteration.
///
/// Stop conditions are never reported through this type, see `StopFlags`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A per-edge price vector has no entry for the edge in either orientation.
    #[error("no price for edge ({0}, {1}) in either orientation")]
    MissingPrice(usize, usize),

    #[error("negative price {price} on edge ({u}, {v})")]
    NegativePrice { u: usize, v: usize, price: f64 },

    /// The LP/MIP collaborator did not report an optimal status.
    #[error("{model} exited with status {status}")]
    SolverNonOptimal { model: String, status: String },

    #[error("master relaxation has not been solved yet")]
    MasterNotSolved,

    /// The theta equation has the same sign on both ends of its bracket.
    #[error("theta equation not bracketed on [{low}, {high}] (g(low)={g_low}, g(high)={g_high})")]
    RootNotBracketed {
        low: String,
        high: String,
        g_low: String,
        g_high: String,
    },

    #[error("theta root finding did not converge after {0} iterations")]
    RootNotConverged(usize),

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("terminal {terminal} unreachable from {source_node}")]
    UnreachableTerminal { terminal: usize, source_node: usize },

    #[error("invalid instance: {0}")]
    InvalidInstance(String),
}

pub type Result<T> = std::result::Result<T, Error>;
