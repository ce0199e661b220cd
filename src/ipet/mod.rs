//! IPET model construction: per-function/per-level CFG models (§4.4) and
//! their composition across tasks through an SSTG (§4.5).

pub mod cost;
pub mod model;
pub mod sstg;

pub use cost::{CostFn, UniformCost};
pub use model::{IpetModel, IpetModelResult};
pub use sstg::{StateTransitionIpet, StateTransitionIpetResult};
