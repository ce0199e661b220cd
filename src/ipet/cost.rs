//! The architecture cost-function boundary (§2 CostFn boundary, §4.4).
//!
//! Grounded on `features/cost_analysis/infrastructure/analyzer.rs`'s split
//! between a graph-shaped analyzer and the opaque cost model it calls
//! through: this crate owns edge/node bookkeeping, the caller owns cycle
//! counts.

use crate::shared::models::IpetEdge;

/// Supplies the per-edge cost the core has no opinion about: cycle counts,
/// pipeline-refill and memory-access latencies, all architecture-specific
/// and owned by the caller (§4.4 "architecture-dependent cost function
/// supplied by the caller").
pub trait CostFn {
    fn edge_cost(&self, edge: &IpetEdge) -> i64;
}

/// A cost function charging a fixed cost per edge regardless of shape.
/// Useful for tests and for callers with no architecture model wired in
/// yet.
#[derive(Debug, Clone, Copy)]
pub struct UniformCost(pub i64);

impl CostFn for UniformCost {
    fn edge_cost(&self, _edge: &IpetEdge) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeEndpoint, Level, ProgramPoint};

    #[test]
    fn uniform_cost_ignores_edge_shape() {
        let cost = UniformCost(3);
        let e = IpetEdge::new(
            ProgramPoint::Block("a".into()),
            EdgeEndpoint::block("b"),
            Level::Machinecode,
        );
        assert_eq!(cost.edge_cost(&e), 3);
    }
}
