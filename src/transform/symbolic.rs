//! [`SymbolicBoundTransformation`]: resolves a flow fact's non-constant RHS
//! against known bindings before giving up (§4.8, new in this expansion).
//!
//! A full symbolic-expression evaluator is explicitly out of scope — §2
//! names `ExpressionEvaluator` as an external collaborator this crate never
//! implements. This transformation stays inside that boundary: it only ever
//! does whole-string lookups against a caller-supplied binding table (a
//! relation graph's node-name map, typically), never parses an expression
//! grammar. A symbolic RHS that needs real evaluation stays untranslatable
//! and is counted in `AnalysisStats::symbolic_bounds_skipped` by the caller.

use crate::program::{FlowFact, RhsExpr};

pub struct SymbolicBoundTransformation;

impl SymbolicBoundTransformation {
    /// Attempt to resolve `ff`'s RHS against `bindings`. Returns a copy of
    /// `ff` with a constant RHS if the RHS was already constant, parses as a
    /// bare numeric literal, or matches a binding key exactly; `None`
    /// otherwise.
    pub fn try_resolve(
        ff: &FlowFact,
        bindings: &std::collections::HashMap<String, f64>,
    ) -> Option<FlowFact> {
        let RhsExpr::Symbolic(expr) = &ff.rhs else {
            return Some(ff.clone());
        };
        let trimmed = expr.trim();
        let resolved = if let Ok(v) = trimmed.parse::<f64>() {
            v
        } else if let Some(&v) = bindings.get(trimmed) {
            v
        } else {
            return None;
        };
        let mut out = ff.clone();
        out.rhs = RhsExpr::Constant(resolved);
        Some(out)
    }
}
