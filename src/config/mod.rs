//! Analysis options and run statistics.
//!
//! Per the design notes ("Global/ambient options... pass explicitly as an
//! options record; avoid process-wide singletons"), every builder in this
//! crate takes an [`AnalysisOptions`] by reference rather than reading from a
//! singleton. [`AnalysisStats`] is the companion accumulator for non-fatal
//! skips, mirroring the error design's "non-fatal skips accumulate into
//! statistics reported at the end."

/// Options controlling a single analysis run.
///
/// Cloneable and cheap; construct one per [`crate::orchestrator::Orchestrator`]
/// invocation.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Use the unaffected-reference count as a secondary elimination
    /// tiebreak (protects explicit infeasibility annotations like `x = 0`
    /// from being eliminated first). Disabling this is useful to observe
    /// the assertion path it exists to prevent; see DESIGN.md.
    pub eliminate_by_unaffected_tiebreak: bool,

    /// Eliminate CFG-edge variables during `simplify` (in addition to
    /// instruction variables and empty blocks). Disabled by default since
    /// edge-level detail is usually what a caller wants preserved after a
    /// simplify pass.
    pub simplify_eliminate_cfg_edges: bool,

    /// Large constant used both to bound loops in the SSTG (§4.5) and as the
    /// `BIGM` bound injected during unbounded-solve diagnosis (§4.2).
    pub big_m: i64,

    /// Emit verbose `tracing` events for elimination/diagnosis steps. This is
    /// independent of the crate's `trace` Cargo feature: the feature gates
    /// whether `tracing` events are compiled in at all, this flag gates
    /// whether the (always-compiled) events are emitted at `debug` vs
    /// `trace` level.
    pub verbose: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            eliminate_by_unaffected_tiebreak: true,
            simplify_eliminate_cfg_edges: false,
            big_m: 1_000_000,
            verbose: false,
        }
    }
}

/// Accumulated non-fatal skip statistics for a single analysis run.
///
/// Every `Orchestrator` operation returns one of these alongside its output,
/// so a caller can see what was silently skipped even on overall success.
#[derive(Debug, Clone, Default)]
pub struct AnalysisStats {
    /// Flow facts skipped because their scope was context-sensitive.
    pub context_sensitive_scopes_skipped: u64,
    /// Flow facts skipped because the RHS was symbolic and could not be
    /// resolved to a constant (§4.8 / Open Questions).
    pub symbolic_bounds_skipped: u64,
    /// Functions skipped during `transform` because no relation graph
    /// covered them.
    pub missing_relation_graphs: u64,
    /// Unknown-variable references skipped while importing flow facts
    /// (rather than treated as fatal).
    pub unknown_variables_ignored: u64,
    /// Constraints dropped as tautologies during normalization.
    pub tautologies_dropped: u64,
}

impl AnalysisStats {
    /// Merge another stats record into this one.
    pub fn merge(&mut self, other: &AnalysisStats) {
        self.context_sensitive_scopes_skipped += other.context_sensitive_scopes_skipped;
        self.symbolic_bounds_skipped += other.symbolic_bounds_skipped;
        self.missing_relation_graphs += other.missing_relation_graphs;
        self.unknown_variables_ignored += other.unknown_variables_ignored;
        self.tautologies_dropped += other.tautologies_dropped;
    }

    /// True if nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.context_sensitive_scopes_skipped == 0
            && self.symbolic_bounds_skipped == 0
            && self.missing_relation_graphs == 0
            && self.unknown_variables_ignored == 0
    }
}
