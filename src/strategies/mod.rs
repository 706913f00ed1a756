mod integer;
pub mod jansen_zhang;
mod perturbed;
mod pure_colgen;
mod warm_start;

pub use integer::ColGenIP;
pub use jansen_zhang::{JansenZhang, ScalingPhase};
pub use perturbed::Perturbed;
pub use pure_colgen::PureColGen;
pub use warm_start::WarmStart;
