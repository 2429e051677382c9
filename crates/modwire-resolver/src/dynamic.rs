use modwire_core::module::ModuleState;
use modwire_core::requirement::{ImportResolution, Namespace, Requirement};
use modwire_core::wiring::{CapabilityRef, Wire};

use crate::constraint::{ConstraintId, ConstraintKind, Supplier};
use crate::module::ModIdx;
use crate::session::Session;

impl Session<'_> {
    /// Wire `package` for a resolved module through one of its dynamic
    /// imports. Only already-resolved exporters are considered, and a
    /// candidate that would conflict with what the importer already sees is
    /// skipped in favour of the next one.
    pub(crate) fn resolve_dynamic(&mut self, m: ModIdx, package: &str) -> Option<Wire> {
        let rm = &self.modules[m];
        if rm.state != ModuleState::Resolved || rm.is_fragment() {
            return None;
        }
        if !self.exported(m, package).is_empty() {
            tracing::debug!(module = %rm.module, package, "package is exported by the importer");
            return None;
        }
        if self.imported(m, package).is_some() {
            tracing::debug!(module = %rm.module, package, "package is already wired");
            return None;
        }

        let imports: Vec<ConstraintId> = rm
            .imports
            .iter()
            .copied()
            .filter(|&cid| {
                let c = &self.constraints[cid];
                c.active
                    && matches!(
                        &c.kind,
                        ConstraintKind::Requirement(Requirement::Package(import))
                            if import.resolution == ImportResolution::Dynamic
                                && import.matches_name(package)
                    )
            })
            .collect();
        if imports.is_empty() {
            tracing::debug!(module = %rm.module, package, "no dynamic import matches");
            return None;
        }

        for cid in imports {
            let Some(Requirement::Package(import)) = self.constraints[cid].requirement().cloned()
            else {
                continue;
            };
            let mut candidates: Vec<Supplier> = self
                .packages
                .get(package)
                .iter()
                .copied()
                .filter(|&cap| {
                    let e = &self.caps[cap];
                    let host = &self.modules[e.host];
                    e.attached
                        && e.host != m
                        && host.state == ModuleState::Resolved
                        && !host.pending_removal
                        && e.capability
                            .as_package()
                            .is_some_and(|x| import.matches(x, &host.module))
                })
                .map(Supplier::Capability)
                .collect();
            if let Some(hook) = self.hook {
                let requirement = Requirement::Package(import.clone());
                let mut views: Vec<_> = candidates
                    .iter()
                    .map(|&s| self.ranker.view(&self.modules, &self.caps, s))
                    .collect();
                hook.filter_matches(&self.modules[m].module, &requirement, &mut views);
                let kept: Vec<_> = views.iter().map(|v| v.capability).collect();
                candidates.retain(|&s| {
                    kept.contains(&self.ranker.view(&self.modules, &self.caps, s).capability)
                });
            }

            for supplier in candidates {
                let Supplier::Capability(cap) = supplier else {
                    continue;
                };
                if !self.dynamic_consistent(m, cap) {
                    continue;
                }
                let c = &mut self.constraints[cid];
                c.candidates.push(supplier);
                c.selected.get_or_insert(0);
                self.roots.clear();

                let e = &self.caps[cap];
                let wire = Wire {
                    namespace: Namespace::Package,
                    name: package.to_string(),
                    requirer: self.modules[m].module.id,
                    requirement: self.requirement_ref(cid),
                    provider: self.modules[e.host].module.id,
                    capability: Some(CapabilityRef {
                        module: self.modules[e.origin].module.id,
                        index: e.index,
                    }),
                };
                tracing::debug!(wire = %wire, "dynamic import wired");
                return Some(wire);
            }
        }
        tracing::debug!(module = %self.modules[m].module, package, "no consistent dynamic supplier");
        None
    }
}
