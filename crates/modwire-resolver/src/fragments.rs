//! Fragment attachment: merging a fragment's requirements and capabilities
//! into its hosts, and taking them back out again.

use modwire_core::module::{FragmentAttachment, ModuleState};
use modwire_core::outcome::{ResolverError, ResolverErrorKind};
use modwire_core::requirement::Requirement;
use modwire_core::wiring::{RequirementRef, RequirementSlot};

use crate::constraint::{ConstraintKind, Supplier};
use crate::module::{Folded, ModIdx};
use crate::session::Session;

impl Session<'_> {
    /// Attach every unresolved fragment to each host it matches, in id order.
    pub(crate) fn attach_fragments(&mut self) {
        for f in 0..self.modules.len() {
            let rm = &self.modules[f];
            if !rm.is_fragment() || rm.state == ModuleState::Resolved || !rm.can_supply() {
                continue;
            }
            let Some(cid) = rm.host else {
                continue;
            };
            let hosts = self.find_candidates(cid);
            if hosts.is_empty() {
                let error = self.missing_error(cid);
                tracing::debug!(fragment = %self.modules[f].module, "no host matches");
                self.modules[f].record(error);
                continue;
            }
            let mut attached = Vec::new();
            for supplier in hosts {
                let Supplier::Module(h) = supplier else {
                    continue;
                };
                match self.attach_fragment(h, f) {
                    Ok(()) => attached.push(supplier),
                    Err(error) => {
                        tracing::debug!(
                            fragment = %self.modules[f].module,
                            host = %self.modules[h].module,
                            "{error}"
                        );
                        self.modules[f].record(error);
                    }
                }
            }
            self.constraints[cid].select(attached);
        }
    }

    fn attach_fragment(&mut self, h: ModIdx, f: ModIdx) -> Result<(), ResolverError> {
        let host = &self.modules[h];
        let fragment = &self.modules[f];
        let conflict = |detail: String| {
            ResolverError::new(ResolverErrorKind::FragmentConflict, fragment.module.id, detail)
                .related_to(host.module.id)
        };

        let resolved = host.state == ModuleState::Resolved;
        match host.module.fragment_attachment {
            FragmentAttachment::Never => {
                return Err(conflict(format!(
                    "host {} does not accept fragments",
                    host.module
                )))
            }
            FragmentAttachment::ResolveTime if resolved => {
                return Err(conflict(format!(
                    "host {} is already resolved",
                    host.module
                )))
            }
            _ => {}
        }
        if let Some(&other) = host
            .fragments
            .iter()
            .find(|&&g| self.modules[g].module.name == fragment.module.name)
        {
            return Err(conflict(format!(
                "{} is already attached to {}",
                self.modules[other].module, host.module
            )));
        }
        if resolved && !self.config.relaxed {
            if let Some(requirement) = self.new_requirements(h, f).first() {
                return Err(conflict(format!(
                    "{requirement} would add a new constraint to resolved host {}",
                    host.module
                )));
            }
        }

        self.merge_fragment(h, f);
        Ok(())
    }

    /// Non-optional fragment requirements the host does not already declare.
    fn new_requirements(&self, h: ModIdx, f: ModIdx) -> Vec<Requirement> {
        self.modules[f]
            .module
            .requirements
            .iter()
            .filter(|r| r.is_effective() && !r.is_optional() && !r.is_dynamic())
            .filter(|r| {
                !self.modules[h].constraints().any(|cid| {
                    let c = &self.constraints[cid];
                    c.active && c.requirement().is_some_and(|own| own.same_target(r))
                })
            })
            .cloned()
            .collect()
    }

    /// Fold a fragment's declarations into a host. Requirements and
    /// capabilities the host already declares are not duplicated.
    pub(crate) fn merge_fragment(&mut self, h: ModIdx, f: ModIdx) {
        let fragment = self.modules[f].module.clone();
        for (i, requirement) in fragment.requirements.into_iter().enumerate() {
            if !requirement.is_effective() {
                continue;
            }
            let existing = self.modules[h].constraints().find(|&cid| {
                let c = &self.constraints[cid];
                c.active
                    && c.requirement()
                        .is_some_and(|own| own.same_target(&requirement))
            });
            match existing {
                Some(into) => self.modules[h].folded.push(Folded {
                    fragment: f,
                    index: i,
                    into,
                }),
                None => {
                    self.add_constraint(h, f, i, requirement);
                }
            }
        }
        for (i, capability) in fragment.capabilities.into_iter().enumerate() {
            if !capability.is_effective() {
                continue;
            }
            let declared = self.modules[h]
                .capabilities
                .iter()
                .any(|&id| self.caps[id].capability.same_offer(&capability));
            if !declared {
                self.add_capability(h, f, i, capability);
            }
        }
        self.modules[h].fragments.push(f);
        self.modules[f].hosts.push(h);
        self.roots.clear();
    }

    /// Take a fragment's contributions back out of a host. A constraint the
    /// fragment contributed survives if another attached fragment had folded
    /// the same requirement into it; that fragment becomes its origin.
    pub(crate) fn detach_fragment(&mut self, h: ModIdx, f: ModIdx) {
        tracing::debug!(
            fragment = %self.modules[f].module,
            host = %self.modules[h].module,
            "detaching fragment"
        );
        self.modules[h].fragments.retain(|&g| g != f);
        self.modules[f].hosts.retain(|&g| g != h);

        let owned: Vec<_> = self.modules[h]
            .constraints()
            .filter(|&cid| self.constraints[cid].active && self.constraints[cid].origin == f)
            .collect();
        for cid in owned {
            let heir = self.modules[h]
                .folded
                .iter()
                .position(|x| x.into == cid && x.fragment != f);
            match heir {
                Some(pos) => {
                    let folded = self.modules[h].folded.remove(pos);
                    let requirement =
                        self.modules[folded.fragment].module.requirements[folded.index].clone();
                    let c = &mut self.constraints[cid];
                    c.origin = folded.fragment;
                    c.slot = RequirementSlot::Declared(folded.index);
                    c.kind = ConstraintKind::Requirement(requirement);
                    c.clear();
                }
                None => {
                    let c = &mut self.constraints[cid];
                    c.active = false;
                    c.clear();
                    let rm = &mut self.modules[h];
                    rm.generics.retain(|&x| x != cid);
                    rm.requires.retain(|&x| x != cid);
                    rm.imports.retain(|&x| x != cid);
                }
            }
        }
        self.modules[h].folded.retain(|x| x.fragment != f);

        let caps: Vec<_> = self.modules[h]
            .capabilities
            .iter()
            .copied()
            .filter(|&id| self.caps[id].origin == f)
            .collect();
        for id in &caps {
            self.remove_capability(*id);
        }
        self.modules[h].capabilities.retain(|id| !caps.contains(id));
        self.roots.clear();
    }

    /// Detach fragments whose folded requirements the host's own wiring does
    /// not satisfy.
    pub(crate) fn check_folded(&mut self, h: ModIdx) {
        for entry in self.modules[h].folded.clone() {
            if !self.modules[h].fragments.contains(&entry.fragment) {
                continue;
            }
            let requirement = &self.modules[entry.fragment].module.requirements[entry.index];
            if requirement.is_dynamic() {
                continue;
            }
            let c = &self.constraints[entry.into];
            let satisfied = match c.selected_supplier() {
                Some(supplier) => self.satisfies(supplier, requirement),
                None => requirement.is_optional(),
            };
            if satisfied {
                continue;
            }
            let error = ResolverError::new(
                ResolverErrorKind::FragmentConflict,
                self.modules[entry.fragment].module.id,
                format!(
                    "{requirement} is not satisfied by the wiring of host {}",
                    self.modules[h].module
                ),
            )
            .for_requirement(RequirementRef::declared(
                self.modules[entry.fragment].module.id,
                entry.index,
            ))
            .related_to(self.modules[h].module.id);
            self.detach_fragment(h, entry.fragment);
            self.modules[entry.fragment].record(error);
        }
    }
}
