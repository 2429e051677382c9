//! Committed resolution edges.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::module::ModuleId;
use crate::requirement::Namespace;

/// Which declaration of a module a wire satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementSlot {
    /// Index into `Module::requirements`.
    Declared(usize),
    /// The fragment's host requirement.
    Host,
}

/// A requirement identified by its declaring module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementRef {
    pub module: ModuleId,
    pub slot: RequirementSlot,
}

impl RequirementRef {
    pub fn declared(module: ModuleId, index: usize) -> Self {
        Self {
            module,
            slot: RequirementSlot::Declared(index),
        }
    }

    pub fn host(module: ModuleId) -> Self {
        Self {
            module,
            slot: RequirementSlot::Host,
        }
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            RequirementSlot::Declared(i) => write!(f, "{}#{}", self.module, i),
            RequirementSlot::Host => write!(f, "{}#host", self.module),
        }
    }
}

/// A capability identified by its declaring module and index into
/// `Module::capabilities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityRef {
    pub module: ModuleId,
    pub index: usize,
}

/// An immutable resolved edge from a requirement to the capability chosen
/// for it. Wires are only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wire {
    pub namespace: Namespace,
    /// Package, module or namespace name the wire is for.
    pub name: String,
    /// Module whose class space receives the wire (the host for merged
    /// fragment requirements).
    pub requirer: ModuleId,
    pub requirement: RequirementRef,
    /// Module supplying the capability (the host for fragment capabilities).
    pub provider: ModuleId,
    /// Absent for module and host wires.
    pub capability: Option<CapabilityRef>,
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.namespace, self.name, self.requirer, self.provider
        )
    }
}

/// The committed wiring of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleWiring {
    pub wires: Vec<Wire>,
}

impl ModuleWiring {
    pub fn new(wires: Vec<Wire>) -> Self {
        Self { wires }
    }

    pub fn by_namespace(&self) -> BTreeMap<Namespace, Vec<Wire>> {
        let mut grouped: BTreeMap<Namespace, Vec<Wire>> = BTreeMap::new();
        for wire in &self.wires {
            grouped
                .entry(wire.namespace.clone())
                .or_default()
                .push(wire.clone());
        }
        grouped
    }

    /// Hosts a fragment is attached to.
    pub fn hosts(&self) -> Vec<ModuleId> {
        self.wires
            .iter()
            .filter(|w| w.namespace == Namespace::Host)
            .map(|w| w.provider)
            .collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.wires.iter().map(|w| w.provider)
    }
}
