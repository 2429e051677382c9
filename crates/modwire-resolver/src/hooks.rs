//! Extension points consulted during resolution.

use std::cmp::Ordering;

use modwire_core::module::{Module, ModuleId};
use modwire_core::requirement::{HostRequirement, Requirement};
use modwire_core::version::Version;
use modwire_core::wiring::CapabilityRef;

/// What a hook or selection policy gets to see of one candidate supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateView<'a> {
    pub module: ModuleId,
    pub module_name: &'a str,
    /// Version of the capability when it carries one, otherwise of the module.
    pub version: &'a Version,
    /// `None` when the candidate is a whole module.
    pub capability: Option<CapabilityRef>,
    pub resolved: bool,
}

/// Filters applied to the resolver's view of the catalog.
///
/// Every method defaults to leaving its input untouched.
pub trait ResolverHook {
    /// Remove modules that must not be resolved in this batch.
    fn filter_resolvable(&self, _candidates: &mut Vec<ModuleId>) {}

    /// Remove candidate suppliers for `requirement` of `requirer`.
    fn filter_matches(
        &self,
        _requirer: &Module,
        _requirement: &Requirement,
        _candidates: &mut Vec<CandidateView<'_>>,
    ) {
    }

    /// Remove candidate hosts for the host requirement of `fragment`.
    fn filter_host_matches(
        &self,
        _fragment: &Module,
        _host: &HostRequirement,
        _candidates: &mut Vec<CandidateView<'_>>,
    ) {
    }

    /// Remove same-name singletons that should not collide with `singleton`.
    fn filter_singleton_collisions(&self, _singleton: &Module, _collisions: &mut Vec<ModuleId>) {}
}

/// External ordering consulted before the built-in candidate preference.
///
/// Returning [`Ordering::Equal`] defers to the built-in order.
pub trait SelectionPolicy {
    fn compare(&self, a: &CandidateView<'_>, b: &CandidateView<'_>) -> Ordering;
}

impl<F> SelectionPolicy for F
where
    F: Fn(&CandidateView<'_>, &CandidateView<'_>) -> Ordering,
{
    fn compare(&self, a: &CandidateView<'_>, b: &CandidateView<'_>) -> Ordering {
        self(a, b)
    }
}
