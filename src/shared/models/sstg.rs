//! [`StateNode`] (SSTG node) and per-cycle device energy model (§3, §4.5).
//!
//! Grounded on `features/taint_analysis/infrastructure/interprocedural/call_graph.rs`'s
//! node-plus-attribute-set shape, generalized from "function reachable from a
//! call site" to "ABB reachable under a device set, possibly an ISR entry".

use rustc_hash::FxHashSet;
use std::fmt;

use super::program_point::ProgramPoint;

/// A powered peripheral tracked for WCEC. Energy figures are per-cycle
/// (`energy_stay_on`/`energy_stay_off`) or one-shot (`energy_turn_on`/
/// `energy_turn_off`), matching the `device-list` entries of §6's `sstg`
/// schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub energy_stay_on: f64,
    pub energy_stay_off: f64,
    pub energy_turn_on: f64,
    pub energy_turn_off: f64,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            energy_stay_on: 0.0,
            energy_stay_off: 0.0,
            energy_turn_on: 0.0,
            energy_turn_off: 0.0,
        }
    }

    /// The always-present pseudo-device that gives WCEC a non-zero floor
    /// even when every real device is off. Insertion is idempotent by name
    /// (§9 Open Questions); callers should use [`DeviceSet::with_baseline`]
    /// rather than constructing this directly more than once per set.
    pub fn baseline() -> Self {
        Self {
            name: "Baseline".to_string(),
            energy_stay_on: 1.0,
            energy_stay_off: 1.0,
            energy_turn_on: 0.0,
            energy_turn_off: 0.0,
        }
    }
}

impl Eq for Device {}
impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A set of devices active simultaneously, keyed by device name. Two device
/// sets with the same member names are the same set regardless of
/// insertion order, matching the "devices:set" field of §3's StateNode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut set = Self::new();
        for d in devices {
            set.insert(d);
        }
        set
    }

    /// Insert a device, replacing any existing device of the same name.
    /// Idempotent by name, as required of the `Baseline` pseudo-device.
    pub fn insert(&mut self, device: Device) {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.name == device.name) {
            *existing = device;
        } else {
            self.devices.push(device);
        }
    }

    /// Self by value with the `Baseline` pseudo-device inserted, idempotent
    /// whether or not it is already present.
    pub fn with_baseline(mut self) -> Self {
        self.insert(Device::baseline());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.iter().any(|d| d.name == name)
    }

    /// Names in sorted order: the canonical key used to identify a device
    /// set for the `(ABB, device-set)` WCEC variable family (§4.5).
    pub fn key(&self) -> String {
        let mut names: Vec<&str> = self.devices.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.join("+")
    }

    /// Sum of `energy_stay_on` (if the device is held on) or
    /// `energy_stay_off` across all members, the per-cycle energy cost of
    /// this device set while active (§4.5 WCEC variant).
    pub fn per_cycle_energy(&self, active: impl Fn(&str) -> bool) -> f64 {
        self.devices
            .iter()
            .map(|d| {
                if active(&d.name) {
                    d.energy_stay_on
                } else {
                    d.energy_stay_off
                }
            })
            .sum()
    }

    /// The one-shot switching cost of moving from `self` to `other`: every
    /// device turned on contributes its `energy_turn_on`, every device
    /// turned off contributes its `energy_turn_off`.
    pub fn switching_energy(&self, other: &DeviceSet) -> f64 {
        let turned_on: f64 = other
            .devices
            .iter()
            .filter(|d| !self.contains(&d.name))
            .map(|d| d.energy_turn_on)
            .sum();
        let turned_off: f64 = self
            .devices
            .iter()
            .filter(|d| !other.contains(&d.name))
            .map(|d| d.energy_turn_off)
            .sum();
        turned_on + turned_off
    }
}

impl fmt::Display for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

/// One SSTG node: `(abb?, function?, devices, microstructure, is_source,
/// is_sink, isr_entry, frequency_variable?, cost?)` (§3).
///
/// An ABB is a single-entry single-exit machine-code region; `microstructure`
/// nodes are implementation scaffolding (e.g. a dispatch-edge splitter) that
/// must not have their cost counted a second time against the ABB they
/// shadow.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub index: usize,
    pub abb: Option<ProgramPoint>,
    pub function: Option<String>,
    pub devices: DeviceSet,
    pub microstructure: bool,
    pub is_source: bool,
    pub is_sink: bool,
    pub isr_entry: bool,
    pub frequency_variable: Option<ProgramPoint>,
    pub cost: Option<f64>,
    /// Local-scope successors (within the same task/ISR) and global-scope
    /// successors (dispatch edges to other tasks/ISRs), per §6's
    /// `successors.local` / `successors.global`.
    pub successors_local: Vec<usize>,
    pub successors_global: Vec<usize>,
    /// SSTG node indices this node loops back to, relating its `pos`/`neg`
    /// interrupt-correction pair (§4.5) to the enclosing loop bound.
    pub loops: FxHashSet<usize>,
}

impl StateNode {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            abb: None,
            function: None,
            devices: DeviceSet::new(),
            microstructure: false,
            is_source: false,
            is_sink: false,
            isr_entry: false,
            frequency_variable: None,
            cost: None,
            successors_local: Vec::new(),
            successors_global: Vec::new(),
            loops: FxHashSet::default(),
        }
    }

    pub fn with_abb(mut self, abb: ProgramPoint, function: impl Into<String>) -> Self {
        self.abb = Some(abb);
        self.function = Some(function.into());
        self
    }

    pub fn with_devices(mut self, devices: DeviceSet) -> Self {
        self.devices = devices;
        self
    }

    pub fn as_microstructure(mut self) -> Self {
        self.microstructure = true;
        self
    }

    pub fn as_source(mut self) -> Self {
        self.is_source = true;
        self
    }

    pub fn as_sink(mut self) -> Self {
        self.is_sink = true;
        self
    }

    pub fn as_isr_entry(mut self) -> Self {
        self.isr_entry = true;
        self
    }

    /// The [`ProgramPoint`] used as this node's frequency variable in the
    /// superstructure ILP: the explicit `frequency_variable`, if named by
    /// the input document, otherwise a node-indexed synthetic point.
    pub fn variable_point(&self) -> ProgramPoint {
        self.frequency_variable
            .clone()
            .unwrap_or_else(|| ProgramPoint::GlobalProgramPoint(format!("sstg_node_{}", self.index)))
    }
}
