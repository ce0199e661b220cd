//! The `sstg` entity of the external program document (§6) and its
//! conversion into the internal [`StateNode`]/[`Device`]/[`DeviceSet`]
//! model consumed by [`crate::ipet::sstg::StateTransitionIpet`].

use serde::{Deserialize, Serialize};

use crate::program::flow_fact::ProgramPointSpec;
use crate::shared::models::{Device, DeviceSet, StateNode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessorsSpec {
    #[serde(default)]
    pub local: Vec<usize>,
    #[serde(default)]
    pub global: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SstgNodeInput {
    pub index: usize,
    #[serde(default)]
    pub abb: Option<ProgramPointSpec>,
    #[serde(default)]
    pub function: Option<String>,
    /// Names into the owning [`SstgInput::device_list`] of devices powered
    /// on while this node is active.
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub microstructure: bool,
    #[serde(default)]
    pub is_source: bool,
    #[serde(default)]
    pub is_sink: bool,
    #[serde(default)]
    pub isr_entry: bool,
    #[serde(default)]
    pub loops: Vec<usize>,
    #[serde(default)]
    pub successors: SuccessorsSpec,
    #[serde(default)]
    pub frequency_variable: Option<ProgramPointSpec>,
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInput {
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub energy_stay_on: f64,
    #[serde(default)]
    pub energy_stay_off: f64,
    #[serde(default)]
    pub energy_turn_on: f64,
    #[serde(default)]
    pub energy_turn_off: f64,
}

impl From<&DeviceInput> for Device {
    fn from(d: &DeviceInput) -> Self {
        Device {
            name: d.name.clone(),
            energy_stay_on: d.energy_stay_on,
            energy_stay_off: d.energy_stay_off,
            energy_turn_on: d.energy_turn_on,
            energy_turn_off: d.energy_turn_off,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SstgInput {
    pub name: String,
    pub nodes: Vec<SstgNodeInput>,
    pub device_list: Vec<DeviceInput>,
}

impl SstgInput {
    /// Resolve every node's `devices` name list against `device_list` into a
    /// [`DeviceSet`], then build the internal [`StateNode`] graph. A device
    /// name with no matching catalog entry is dropped rather than treated
    /// as fatal: the input document's device catalog is assumed to be
    /// complete, and a typo there is a data-quality issue outside this
    /// crate's declared error kinds.
    pub fn resolve_state_nodes(&self) -> Vec<StateNode> {
        self.nodes
            .iter()
            .map(|input| {
                let devices = DeviceSet::from_devices(
                    input
                        .devices
                        .iter()
                        .filter_map(|name| self.device_list.iter().find(|d| &d.name == name))
                        .map(Device::from),
                )
                .with_baseline();

                let mut node = StateNode::new(input.index).with_devices(devices);
                if let (Some(abb), Some(function)) = (&input.abb, &input.function) {
                    node = node.with_abb(abb.to_program_point(), function.clone());
                }
                if input.microstructure {
                    node = node.as_microstructure();
                }
                if input.is_source {
                    node = node.as_source();
                }
                if input.is_sink {
                    node = node.as_sink();
                }
                if input.isr_entry {
                    node = node.as_isr_entry();
                }
                node.frequency_variable = input
                    .frequency_variable
                    .as_ref()
                    .map(ProgramPointSpec::to_program_point);
                node.cost = input.cost;
                node.successors_local = input.successors.local.clone();
                node.successors_global = input.successors.global.clone();
                node.loops = input.loops.iter().copied().collect();
                node
            })
            .collect()
    }
}
