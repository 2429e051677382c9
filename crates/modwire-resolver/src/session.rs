//! Arena holding everything one resolution works on: resolver modules,
//! capability entries, constraints and the candidate indexes over them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use modwire_core::attrs::AttrValue;
use modwire_core::capability::Capability;
use modwire_core::config::ResolverConfig;
use modwire_core::module::{Module, ModuleId, ModuleState};
use modwire_core::outcome::{ModuleOutcome, ResolutionOutcome, ResolverError, ResolverErrorKind};
use modwire_core::requirement::{Namespace, Requirement};
use modwire_core::wiring::{CapabilityRef, ModuleWiring, RequirementRef, RequirementSlot, Wire};

use crate::constraint::{CapId, Constraint, ConstraintId, ConstraintKind, Supplier};
use crate::hooks::{CandidateView, ResolverHook, SelectionPolicy};
use crate::index::VersionedIndex;
use crate::module::{ModIdx, ResolverModule};

/// A capability as offered in some module's class space.
#[derive(Debug, Clone)]
pub(crate) struct CapEntry {
    /// Module offering it; the host for fragment capabilities.
    pub host: ModIdx,
    /// Module that declared it.
    pub origin: ModIdx,
    /// Index into the origin's `Module::capabilities`.
    pub index: usize,
    pub capability: Capability,
    pub attached: bool,
}

/// Candidate preference: external policy, preferred module, resolved before
/// unresolved, higher version, then lower module id.
pub(crate) struct Ranker<'r> {
    resolved: Vec<bool>,
    preferred: Option<String>,
    policy: Option<&'r dyn SelectionPolicy>,
}

impl Ranker<'_> {
    pub fn compare(
        &self,
        modules: &[ResolverModule],
        caps: &[CapEntry],
        a: Supplier,
        b: Supplier,
    ) -> Ordering {
        let va = self.view(modules, caps, a);
        let vb = self.view(modules, caps, b);
        if let Some(policy) = self.policy {
            let ordering = policy.compare(&va, &vb);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        let preferred = |v: &CandidateView<'_>| self.preferred.as_deref() == Some(v.module_name);
        preferred(&vb)
            .cmp(&preferred(&va))
            .then(vb.resolved.cmp(&va.resolved))
            .then_with(|| vb.version.cmp(va.version))
            .then(va.module.cmp(&vb.module))
            .then(va.capability.cmp(&vb.capability))
    }

    pub fn view<'a>(
        &self,
        modules: &'a [ResolverModule],
        caps: &'a [CapEntry],
        supplier: Supplier,
    ) -> CandidateView<'a> {
        match supplier {
            Supplier::Capability(id) => {
                let entry = &caps[id];
                let module = &modules[entry.host].module;
                let version = match &entry.capability {
                    Capability::Package(export) => &export.version,
                    Capability::Generic(generic) => match generic.attributes.get("version") {
                        Some(AttrValue::Version(v)) => v,
                        _ => &module.version,
                    },
                };
                CandidateView {
                    module: module.id,
                    module_name: &module.name,
                    version,
                    capability: Some(CapabilityRef {
                        module: modules[entry.origin].module.id,
                        index: entry.index,
                    }),
                    resolved: self.resolved[entry.host],
                }
            }
            Supplier::Module(idx) => {
                let module = &modules[idx].module;
                CandidateView {
                    module: module.id,
                    module_name: &module.name,
                    version: &module.version,
                    capability: None,
                    resolved: self.resolved[idx],
                }
            }
        }
    }
}

pub(crate) struct Session<'r> {
    pub modules: Vec<ResolverModule>,
    pub by_id: HashMap<ModuleId, ModIdx>,
    pub caps: Vec<CapEntry>,
    pub constraints: Vec<Constraint>,
    pub packages: VersionedIndex<CapId>,
    pub generics: VersionedIndex<CapId>,
    pub names: VersionedIndex<ModIdx>,
    pub ranker: Ranker<'r>,
    pub config: &'r ResolverConfig,
    pub hook: Option<&'r dyn ResolverHook>,
    /// Memoized `roots_of` results, dropped whenever any selection changes.
    pub roots: HashMap<(ModIdx, String), Vec<CapId>>,
    pub visiting: HashSet<(ModIdx, String)>,
}

impl<'r> Session<'r> {
    /// Build the arena. `modules` pairs each module with its pending-removal
    /// flag; modules in `refreshed` start unresolved, every other resolved
    /// module gets its committed wiring restored.
    pub fn new(
        mut modules: Vec<(Module, bool)>,
        refreshed: &HashSet<ModuleId>,
        wirings: &BTreeMap<ModuleId, ModuleWiring>,
        config: &'r ResolverConfig,
        hook: Option<&'r dyn ResolverHook>,
        policy: Option<&'r dyn SelectionPolicy>,
    ) -> Self {
        modules.sort_by_key(|(m, _)| m.id);
        let mut session = Self {
            modules: Vec::with_capacity(modules.len()),
            by_id: HashMap::new(),
            caps: Vec::new(),
            constraints: Vec::new(),
            packages: VersionedIndex::new(),
            generics: VersionedIndex::new(),
            names: VersionedIndex::new(),
            ranker: Ranker {
                resolved: Vec::new(),
                preferred: config.preferred_module.clone(),
                policy,
            },
            config,
            hook,
            roots: HashMap::new(),
            visiting: HashSet::new(),
        };

        for (module, pending) in modules {
            session.by_id.insert(module.id, session.modules.len());
            let refresh = refreshed.contains(&module.id) || !wirings.contains_key(&module.id);
            session
                .modules
                .push(ResolverModule::new(module, pending, refresh));
        }
        session.ranker.resolved = session
            .modules
            .iter()
            .map(|m| m.previous_state == ModuleState::Resolved)
            .collect();

        for idx in 0..session.modules.len() {
            session.declare(idx);
        }

        for idx in 0..session.modules.len() {
            let m = &session.modules[idx];
            if !m.committed || !m.is_fragment() {
                continue;
            }
            let Some(wiring) = wirings.get(&m.module.id) else {
                continue;
            };
            for host in wiring.hosts() {
                if let Some(&h) = session.by_id.get(&host) {
                    session.merge_fragment(h, idx);
                }
            }
        }
        for idx in 0..session.modules.len() {
            if !session.modules[idx].committed {
                continue;
            }
            if let Some(wiring) = wirings.get(&session.modules[idx].module.id) {
                session.restore_wiring(idx, wiring);
            }
        }

        session.reorder();
        session
    }

    /// Create constraints and capability entries for a module's own
    /// declarations. A fragment only gets its host constraint; the rest is
    /// merged into hosts on attachment.
    fn declare(&mut self, idx: ModIdx) {
        self.names_put(idx);
        let module = self.modules[idx].module.clone();
        if let Some(host) = module.host {
            let cid = self.constraints.len();
            self.constraints.push(Constraint::new(
                idx,
                idx,
                RequirementSlot::Host,
                ConstraintKind::Host(host),
            ));
            self.modules[idx].host = Some(cid);
            return;
        }
        for (i, requirement) in module.requirements.into_iter().enumerate() {
            if requirement.is_effective() {
                self.add_constraint(idx, idx, i, requirement);
            }
        }
        for (i, capability) in module.capabilities.into_iter().enumerate() {
            if capability.is_effective() {
                self.add_capability(idx, idx, i, capability);
            }
        }
    }

    fn names_put(&mut self, idx: ModIdx) {
        let (ranker, modules, caps) = (&self.ranker, &self.modules, &self.caps);
        let name = modules[idx].module.name.clone();
        self.names.put(&name, idx, |a, b| {
            ranker.compare(modules, caps, Supplier::Module(*a), Supplier::Module(*b))
        });
    }

    pub fn add_constraint(
        &mut self,
        owner: ModIdx,
        origin: ModIdx,
        index: usize,
        requirement: Requirement,
    ) -> ConstraintId {
        let cid = self.constraints.len();
        let list = match requirement {
            Requirement::Generic(_) => &mut self.modules[owner].generics,
            Requirement::Module(_) => &mut self.modules[owner].requires,
            Requirement::Package(_) => &mut self.modules[owner].imports,
        };
        list.push(cid);
        self.constraints.push(Constraint::new(
            owner,
            origin,
            RequirementSlot::Declared(index),
            ConstraintKind::Requirement(requirement),
        ));
        cid
    }

    pub fn add_capability(
        &mut self,
        host: ModIdx,
        origin: ModIdx,
        index: usize,
        capability: Capability,
    ) -> CapId {
        let id = self.caps.len();
        let key = capability.index_key().to_string();
        let is_package = matches!(capability, Capability::Package(_));
        self.caps.push(CapEntry {
            host,
            origin,
            index,
            capability,
            attached: true,
        });
        self.modules[host].capabilities.push(id);

        let (ranker, modules, caps) = (&self.ranker, &self.modules, &self.caps);
        let cmp = |a: &CapId, b: &CapId| {
            ranker.compare(modules, caps, Supplier::Capability(*a), Supplier::Capability(*b))
        };
        if is_package {
            self.packages.put(&key, id, cmp);
        } else {
            self.generics.put(&key, id, cmp);
        }
        id
    }

    pub fn remove_capability(&mut self, id: CapId) {
        let entry = &mut self.caps[id];
        entry.attached = false;
        let key = entry.capability.index_key().to_string();
        match entry.capability {
            Capability::Package(_) => self.packages.remove(&key, &id),
            Capability::Generic(_) => self.generics.remove(&key, &id),
        };
    }

    /// Turn committed wires back into selected constraints.
    fn restore_wiring(&mut self, idx: ModIdx, wiring: &ModuleWiring) {
        for wire in &wiring.wires {
            if wire.namespace == Namespace::Host {
                continue;
            }
            let (Some(&origin), Some(&provider)) = (
                self.by_id.get(&wire.requirement.module),
                self.by_id.get(&wire.provider),
            ) else {
                continue;
            };
            let found = self.modules[idx].constraints().find(|&cid| {
                let c = &self.constraints[cid];
                c.active && c.origin == origin && c.slot == wire.requirement.slot
            });
            let Some(cid) = found else {
                tracing::trace!(wire = %wire, "committed wire has no matching constraint");
                continue;
            };
            let supplier = match wire.capability {
                Some(cap) => {
                    let declaring = self.by_id.get(&cap.module).copied();
                    let found = self.modules[provider].capabilities.iter().copied().find(|&c| {
                        let e = &self.caps[c];
                        Some(e.origin) == declaring && e.index == cap.index
                    });
                    match found {
                        Some(c) => Supplier::Capability(c),
                        None => continue,
                    }
                }
                None => Supplier::Module(provider),
            };
            let c = &mut self.constraints[cid];
            c.candidates.push(supplier);
            c.selected = Some(0);
        }
    }

    /// Re-sort every index against the current resolution states.
    pub fn reorder(&mut self) {
        self.ranker.resolved = self
            .modules
            .iter()
            .map(|m| m.state == ModuleState::Resolved)
            .collect();
        let (ranker, modules, caps) = (&self.ranker, &self.modules, &self.caps);
        self.packages.reorder(|a, b| {
            ranker.compare(modules, caps, Supplier::Capability(*a), Supplier::Capability(*b))
        });
        self.generics.reorder(|a, b| {
            ranker.compare(modules, caps, Supplier::Capability(*a), Supplier::Capability(*b))
        });
        self.names.reorder(|a, b| {
            ranker.compare(modules, caps, Supplier::Module(*a), Supplier::Module(*b))
        });
    }

    pub fn supplier_module(&self, supplier: Supplier) -> ModIdx {
        match supplier {
            Supplier::Capability(id) => self.caps[id].host,
            Supplier::Module(idx) => idx,
        }
    }

    pub fn supplier_valid(&self, supplier: Supplier) -> bool {
        match supplier {
            Supplier::Capability(id) => self.caps[id].attached,
            Supplier::Module(_) => true,
        }
    }

    /// Valid and not known to have failed.
    pub fn supplier_alive(&self, supplier: Supplier) -> bool {
        self.supplier_valid(supplier)
            && self.modules[self.supplier_module(supplier)].state != ModuleState::Unresolved
    }

    /// Matching suppliers for a constraint in preference order, after the hook.
    pub fn find_candidates(&self, cid: ConstraintId) -> Vec<Supplier> {
        let c = &self.constraints[cid];
        let owner = c.owner;
        let found: Vec<Supplier> = match &c.kind {
            ConstraintKind::Requirement(Requirement::Package(import)) => self
                .packages
                .get(&import.name)
                .iter()
                .copied()
                .filter(|&id| {
                    let e = &self.caps[id];
                    e.attached
                        && self.modules[e.host].can_supply()
                        && e.capability
                            .as_package()
                            .is_some_and(|x| import.matches(x, &self.modules[e.host].module))
                })
                .map(Supplier::Capability)
                .collect(),
            ConstraintKind::Requirement(Requirement::Module(require)) => self
                .names
                .get(&require.name)
                .iter()
                .copied()
                .filter(|&idx| {
                    idx != owner
                        && self.modules[idx].can_supply()
                        && require.matches(&self.modules[idx].module)
                })
                .map(Supplier::Module)
                .collect(),
            ConstraintKind::Requirement(Requirement::Generic(generic)) => self
                .generics
                .get(&generic.namespace)
                .iter()
                .copied()
                .filter(|&id| {
                    let e = &self.caps[id];
                    e.attached
                        && self.modules[e.host].can_supply()
                        && e.capability.as_generic().is_some_and(|x| generic.matches(x))
                })
                .map(Supplier::Capability)
                .collect(),
            ConstraintKind::Host(host) => self
                .names
                .get(&host.name)
                .iter()
                .copied()
                .filter(|&idx| {
                    self.modules[idx].can_supply() && host.matches(&self.modules[idx].module)
                })
                .map(Supplier::Module)
                .collect(),
        };
        let Some(hook) = self.hook else {
            return found;
        };
        let requirer = &self.modules[owner].module;
        match &c.kind {
            ConstraintKind::Requirement(requirement) => self.filter_views(found, |views| {
                hook.filter_matches(requirer, requirement, views)
            }),
            ConstraintKind::Host(host) => self.filter_views(found, |views| {
                hook.filter_host_matches(requirer, host, views)
            }),
        }
    }

    fn filter_views<F>(&self, found: Vec<Supplier>, filter: F) -> Vec<Supplier>
    where
        F: FnOnce(&mut Vec<CandidateView<'_>>),
    {
        let mut views: Vec<CandidateView<'_>> = found
            .iter()
            .map(|&s| self.ranker.view(&self.modules, &self.caps, s))
            .collect();
        filter(&mut views);
        let kept: BTreeSet<(ModuleId, Option<CapabilityRef>)> =
            views.iter().map(|v| (v.module, v.capability)).collect();
        found
            .into_iter()
            .filter(|&s| {
                let v = self.ranker.view(&self.modules, &self.caps, s);
                kept.contains(&(v.module, v.capability))
            })
            .collect()
    }

    /// True if `supplier` satisfies `requirement` on its own terms.
    pub fn satisfies(&self, supplier: Supplier, requirement: &Requirement) -> bool {
        match (supplier, requirement) {
            (Supplier::Capability(id), Requirement::Package(import)) => {
                let e = &self.caps[id];
                e.capability
                    .as_package()
                    .is_some_and(|x| import.matches(x, &self.modules[e.host].module))
            }
            (Supplier::Capability(id), Requirement::Generic(generic)) => self.caps[id]
                .capability
                .as_generic()
                .is_some_and(|x| generic.matches(x)),
            (Supplier::Module(idx), Requirement::Module(require)) => {
                require.matches(&self.modules[idx].module)
            }
            _ => false,
        }
    }

    pub fn requirement_ref(&self, cid: ConstraintId) -> RequirementRef {
        let c = &self.constraints[cid];
        RequirementRef {
            module: self.modules[c.origin].module.id,
            slot: c.slot,
        }
    }

    /// Error for a constraint no supplier could satisfy, attributed to the
    /// module that declared it.
    pub fn missing_error(&self, cid: ConstraintId) -> ResolverError {
        let c = &self.constraints[cid];
        let kind = match c.namespace() {
            Namespace::Package => ResolverErrorKind::MissingImportedPackage,
            Namespace::Module => ResolverErrorKind::MissingRequiredModule,
            Namespace::Host => ResolverErrorKind::MissingFragmentHost,
            Namespace::Generic(_) => ResolverErrorKind::MissingRequiredCapability,
        };
        let detail = match &c.kind {
            ConstraintKind::Requirement(r) => r.to_string(),
            ConstraintKind::Host(h) => h.to_string(),
        };
        ResolverError::new(kind, self.modules[c.origin].module.id, detail)
            .for_requirement(self.requirement_ref(cid))
    }

    /// Packages exported in a module's class space.
    pub fn exported(&self, idx: ModIdx, package: &str) -> Vec<CapId> {
        self.modules[idx]
            .capabilities
            .iter()
            .copied()
            .filter(|&id| {
                let e = &self.caps[id];
                e.attached && e.capability.as_package().is_some_and(|x| x.name == package)
            })
            .collect()
    }

    fn wires_of(&self, idx: ModIdx) -> Vec<Wire> {
        let rm = &self.modules[idx];
        let id = rm.module.id;
        let mut wires = Vec::new();
        if rm.is_fragment() {
            for &h in &rm.hosts {
                let host = &self.modules[h];
                if host.state == ModuleState::Resolved {
                    wires.push(Wire {
                        namespace: Namespace::Host,
                        name: host.module.name.clone(),
                        requirer: id,
                        requirement: RequirementRef::host(id),
                        provider: host.module.id,
                        capability: None,
                    });
                }
            }
            return wires;
        }
        for cid in rm.constraints() {
            let c = &self.constraints[cid];
            if !c.active {
                continue;
            }
            for supplier in c.wired() {
                let (name, provider, capability) = match supplier {
                    Supplier::Capability(cap) => {
                        let e = &self.caps[cap];
                        (
                            e.capability.index_key().to_string(),
                            self.modules[e.host].module.id,
                            Some(CapabilityRef {
                                module: self.modules[e.origin].module.id,
                                index: e.index,
                            }),
                        )
                    }
                    Supplier::Module(r) => {
                        let m = &self.modules[r].module;
                        (m.name.clone(), m.id, None)
                    }
                };
                wires.push(Wire {
                    namespace: c.namespace(),
                    name,
                    requirer: id,
                    requirement: self.requirement_ref(cid),
                    provider,
                    capability,
                });
            }
        }
        wires.sort_by(|a, b| {
            (&a.namespace, a.requirement, &a.name, a.provider)
                .cmp(&(&b.namespace, b.requirement, &b.name, b.provider))
        });
        wires
    }

    /// Final per-module results. Modules still marked resolving at this
    /// point never settled and are reported unresolved.
    pub fn outcome(&self, discarded: Vec<ModuleId>) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome {
            modules: BTreeMap::new(),
            discarded,
        };
        for (idx, rm) in self.modules.iter().enumerate() {
            let state = match rm.state {
                ModuleState::Resolved => ModuleState::Resolved,
                _ => ModuleState::Unresolved,
            };
            let resolved = state == ModuleState::Resolved;
            let hosts = rm
                .hosts
                .iter()
                .filter(|&&h| self.modules[h].state == ModuleState::Resolved)
                .map(|&h| self.modules[h].module.id)
                .collect();
            outcome.modules.insert(
                rm.module.id,
                ModuleOutcome {
                    id: rm.module.id,
                    name: rm.module.name.clone(),
                    version: rm.module.version.clone(),
                    previous_state: rm.previous_state,
                    state,
                    wiring: if resolved {
                        ModuleWiring::new(self.wires_of(idx))
                    } else {
                        ModuleWiring::default()
                    },
                    errors: rm.errors.clone(),
                    hosts: if rm.is_fragment() && resolved {
                        hosts
                    } else {
                        Vec::new()
                    },
                },
            );
        }
        outcome
    }
}
