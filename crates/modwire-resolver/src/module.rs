use modwire_core::module::{Module, ModuleState};
use modwire_core::outcome::ResolverError;

use crate::constraint::{CapId, ConstraintId};

pub(crate) type ModIdx = usize;

/// A fragment requirement folded into an identical host constraint. The
/// host's choice must still satisfy it once the host resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Folded {
    pub fragment: ModIdx,
    pub index: usize,
    pub into: ConstraintId,
}

/// Resolution-time state of one module.
#[derive(Debug, Clone)]
pub(crate) struct ResolverModule {
    pub module: Module,
    pub state: ModuleState,
    /// State before this resolution started.
    pub previous_state: ModuleState,
    /// Resolved before this batch and left untouched by the refresh.
    pub committed: bool,
    pub pending_removal: bool,
    /// Cleared by eligibility checks and singleton selection.
    pub resolvable: bool,
    /// Failed during the current pass; not retried until the next pass.
    pub failed: bool,
    pub generics: Vec<ConstraintId>,
    pub requires: Vec<ConstraintId>,
    pub imports: Vec<ConstraintId>,
    /// Host constraint of a fragment.
    pub host: Option<ConstraintId>,
    pub capabilities: Vec<CapId>,
    /// Attached fragments, in attachment order.
    pub fragments: Vec<ModIdx>,
    /// Hosts a fragment is attached to.
    pub hosts: Vec<ModIdx>,
    pub folded: Vec<Folded>,
    pub errors: Vec<ResolverError>,
}

impl ResolverModule {
    pub fn new(module: Module, pending_removal: bool, refreshed: bool) -> Self {
        let previous_state = module.state;
        let committed = previous_state == ModuleState::Resolved && !refreshed;
        Self {
            module,
            state: if committed {
                ModuleState::Resolved
            } else {
                ModuleState::Unresolved
            },
            previous_state,
            committed,
            pending_removal,
            resolvable: true,
            failed: false,
            generics: Vec::new(),
            requires: Vec::new(),
            imports: Vec::new(),
            host: None,
            capabilities: Vec::new(),
            fragments: Vec::new(),
            hosts: Vec::new(),
            folded: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.module.is_fragment()
    }

    /// Constraints in resolution order.
    pub fn constraints(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.generics
            .iter()
            .chain(&self.requires)
            .chain(&self.imports)
            .copied()
    }

    /// True if the module may supply new constraints in this batch.
    pub fn can_supply(&self) -> bool {
        self.resolvable && !self.pending_removal && !self.failed
    }

    pub fn record(&mut self, error: ResolverError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }
}
