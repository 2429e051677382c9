use modwire_core::requirement::{HostRequirement, Namespace, Requirement};
use modwire_core::wiring::RequirementSlot;

use crate::module::ModIdx;

pub(crate) type CapId = usize;
pub(crate) type ConstraintId = usize;

/// Something that can satisfy a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Supplier {
    Capability(CapId),
    Module(ModIdx),
}

#[derive(Debug, Clone)]
pub(crate) enum ConstraintKind {
    Requirement(Requirement),
    Host(HostRequirement),
}

/// A requirement as the resolver tracks it: its owner's class space, the
/// module that declared it, and the suppliers that survived resolution.
#[derive(Debug, Clone)]
pub(crate) struct Constraint {
    /// Module whose class space the constraint belongs to. For requirements
    /// merged from a fragment this is the host.
    pub owner: ModIdx,
    /// Module that declared the requirement.
    pub origin: ModIdx,
    pub slot: RequirementSlot,
    pub kind: ConstraintKind,
    /// Viable suppliers in preference order.
    pub candidates: Vec<Supplier>,
    pub selected: Option<usize>,
    /// Cleared when the fragment that contributed it detaches.
    pub active: bool,
    /// Optional constraint dropped to avoid a uses conflict.
    pub suppressed: bool,
    /// Supplier picked by the combination search, kept across re-resolution.
    pub preferred: Option<Supplier>,
}

impl Constraint {
    pub fn new(owner: ModIdx, origin: ModIdx, slot: RequirementSlot, kind: ConstraintKind) -> Self {
        Self {
            owner,
            origin,
            slot,
            kind,
            candidates: Vec::new(),
            selected: None,
            active: true,
            suppressed: false,
            preferred: None,
        }
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        match &self.kind {
            ConstraintKind::Requirement(r) => Some(r),
            ConstraintKind::Host(_) => None,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match &self.kind {
            ConstraintKind::Requirement(r) => r.namespace(),
            ConstraintKind::Host(_) => Namespace::Host,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.requirement().is_some_and(Requirement::is_optional)
    }

    pub fn is_dynamic(&self) -> bool {
        self.requirement().is_some_and(Requirement::is_dynamic)
    }

    pub fn is_multiple(&self) -> bool {
        self.requirement().is_some_and(Requirement::is_multiple)
    }

    pub fn from_fragment(&self) -> bool {
        self.owner != self.origin
    }

    /// Suppliers currently wired: every candidate for multiple cardinality,
    /// otherwise the selected one.
    pub fn wired(&self) -> Vec<Supplier> {
        match self.selected {
            None => Vec::new(),
            Some(_) if self.is_multiple() || self.is_dynamic() => self.candidates.clone(),
            Some(i) => self.candidates.get(i).copied().into_iter().collect(),
        }
    }

    pub fn selected_supplier(&self) -> Option<Supplier> {
        self.selected.and_then(|i| self.candidates.get(i).copied())
    }

    pub fn select(&mut self, candidates: Vec<Supplier>) -> bool {
        let preferred = self
            .preferred
            .and_then(|p| candidates.iter().position(|c| *c == p));
        self.selected = if candidates.is_empty() {
            None
        } else {
            Some(preferred.unwrap_or(0))
        };
        self.candidates = candidates;
        self.selected.is_some()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.selected = None;
    }
}
