//! The `TimingEntry` output produced by [`crate::orchestrator::Orchestrator`]
//! operations (§6 Outputs).

use serde::{Deserialize, Serialize};

use crate::program::flow_fact::ScopeSpec;

/// One line of a [`TimingEntry`]'s cost breakdown: the contribution of a
/// single referenced variable (an edge, a block, an `(ABB, device-set)`
/// pair) to the overall bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub reference: String,
    pub cycles: f64,
    pub wcet_frequency: f64,
    pub wcet_contribution: f64,
    #[serde(default)]
    pub criticality: Option<f64>,
}

/// A freshly computed WCET/WCEC bound for one scope, with its contributing
/// variables broken out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingEntry {
    pub scope: ScopeSpec,
    pub cycles: f64,
    pub profile: Vec<ProfileEntry>,
}

impl TimingEntry {
    /// Total contribution recorded in the profile; should equal `cycles`
    /// for a profile that accounts for the whole objective.
    pub fn profiled_total(&self) -> f64 {
        self.profile.iter().map(|p| p.wcet_contribution).sum()
    }
}
