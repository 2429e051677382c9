//! What a resolution produces for the catalog: per-module states, wiring and
//! resolver errors.
//!
//! Resolver errors are data. A module that cannot be resolved carries one or
//! more [`ResolverError`]s explaining why, and the rest of the batch is
//! unaffected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::module::{ModuleId, ModuleState};
use crate::requirement::Namespace;
use crate::version::Version;
use crate::wiring::{ModuleWiring, RequirementRef, Wire};

/// Why a module, or one of its requirements, could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverErrorKind {
    MissingRequiredCapability,
    MissingRequiredModule,
    MissingImportedPackage,
    UsesConflict,
    SingletonCollision,
    FragmentConflict,
    MissingFragmentHost,
    DisabledModule,
    MissingExecutionEnvironment,
    PlatformFilterMismatch,
    InvalidNativeCode,
}

impl ResolverErrorKind {
    /// Eligibility failures are checked before any constraint is resolved.
    pub fn is_eligibility(self) -> bool {
        matches!(
            self,
            Self::DisabledModule
                | Self::MissingExecutionEnvironment
                | Self::PlatformFilterMismatch
                | Self::InvalidNativeCode
        )
    }
}

impl fmt::Display for ResolverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingRequiredCapability => "missing required capability",
            Self::MissingRequiredModule => "missing required module",
            Self::MissingImportedPackage => "missing imported package",
            Self::UsesConflict => "uses conflict",
            Self::SingletonCollision => "singleton collision",
            Self::FragmentConflict => "fragment conflict",
            Self::MissingFragmentHost => "missing fragment host",
            Self::DisabledModule => "disabled module",
            Self::MissingExecutionEnvironment => "missing execution environment",
            Self::PlatformFilterMismatch => "platform filter mismatch",
            Self::InvalidNativeCode => "invalid native code",
        })
    }
}

/// A structured resolution failure attached to the offending module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverError {
    pub kind: ResolverErrorKind,
    pub module: ModuleId,
    /// The failing requirement, when the failure is constraint-level.
    pub requirement: Option<RequirementRef>,
    /// Another module the failure refers to, e.g. a singleton winner.
    pub related: Option<ModuleId>,
    pub detail: String,
}

impl ResolverError {
    pub fn new(kind: ResolverErrorKind, module: ModuleId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            module,
            requirement: None,
            related: None,
            detail: detail.into(),
        }
    }

    pub fn for_requirement(mut self, requirement: RequirementRef) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn related_to(mut self, module: ModuleId) -> Self {
        self.related = Some(module);
        self
    }
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Final result of one module after a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutcome {
    pub id: ModuleId,
    pub name: String,
    pub version: Version,
    pub previous_state: ModuleState,
    pub state: ModuleState,
    pub wiring: ModuleWiring,
    pub errors: Vec<ResolverError>,
    /// Hosts a fragment ended up attached to.
    pub hosts: Vec<ModuleId>,
}

impl ModuleOutcome {
    pub fn is_resolved(&self) -> bool {
        self.state == ModuleState::Resolved
    }

    /// True if this resolution moved the module to a different state.
    pub fn changed(&self) -> bool {
        self.previous_state != self.state
    }

    pub fn wires(&self) -> BTreeMap<Namespace, Vec<Wire>> {
        self.wiring.by_namespace()
    }

    pub fn has_error(&self, kind: ResolverErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

/// The output of one `resolve` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub modules: BTreeMap<ModuleId, ModuleOutcome>,
    /// Pending-removal modules dropped by this resolution.
    pub discarded: Vec<ModuleId>,
}

impl ResolutionOutcome {
    pub fn get(&self, id: ModuleId) -> Option<&ModuleOutcome> {
        self.modules.get(&id)
    }

    pub fn state(&self, id: ModuleId) -> Option<ModuleState> {
        self.modules.get(&id).map(|m| m.state)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules.values().filter(|m| m.is_resolved())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules.values().filter(|m| !m.is_resolved())
    }

    pub fn errors(&self, id: ModuleId) -> &[ResolverError] {
        self.modules
            .get(&id)
            .map(|m| m.errors.as_slice())
            .unwrap_or_default()
    }

    /// Providers `id` is wired to in `namespace`, in wire order.
    pub fn providers(&self, id: ModuleId, namespace: &Namespace) -> Vec<ModuleId> {
        self.modules
            .get(&id)
            .map(|m| {
                m.wiring
                    .wires
                    .iter()
                    .filter(|w| &w.namespace == namespace)
                    .map(|w| w.provider)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Provider of package `name` for module `id`, if wired.
    pub fn package_provider(&self, id: ModuleId, name: &str) -> Option<ModuleId> {
        self.modules.get(&id).and_then(|m| {
            m.wiring
                .wires
                .iter()
                .find(|w| w.namespace == Namespace::Package && w.name == name)
                .map(|w| w.provider)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.resolved().count();
        let unresolved = self.len() - resolved;
        writeln!(f, "Resolved {resolved} of {} modules.", self.len())?;
        if unresolved == 0 {
            return Ok(());
        }
        writeln!(f, "Unresolved ({unresolved}):")?;
        for m in self.unresolved() {
            writeln!(f, "  {}:{} [{}]", m.name, m.version, m.id)?;
            for e in &m.errors {
                writeln!(f, "    {e}")?;
            }
        }
        Ok(())
    }
}
