//! Uses-consistency: which capabilities supply a package into a module's
//! class space, and whether wiring a supplier would expose a package from
//! two unrelated sources.

use std::collections::{BTreeSet, HashSet};

use modwire_core::module::ModuleState;
use modwire_core::requirement::Requirement;

use crate::constraint::{CapId, ConstraintId, Supplier};
use crate::module::ModIdx;
use crate::session::Session;

/// Two incompatible root sets for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UsesConflict {
    /// Constraint whose supplier introduced the conflict.
    pub constraint: ConstraintId,
    pub optional: bool,
    pub package: String,
    /// Roots the module already sees.
    pub mine: Vec<CapId>,
    /// Roots the supplier exposes.
    pub theirs: Vec<CapId>,
}

impl Session<'_> {
    /// Capabilities that supply `package` into the class space of `m`: the
    /// roots of the import's supplier if `m` imports it, else the union of
    /// what required modules contribute, else `m`'s own export.
    pub(crate) fn roots_of(&mut self, m: ModIdx, package: &str) -> Vec<CapId> {
        let key = (m, package.to_string());
        if let Some(roots) = self.roots.get(&key) {
            return roots.clone();
        }
        if !self.visiting.insert(key.clone()) {
            return Vec::new();
        }
        let mut roots = self.compute_roots(m, package);
        roots.sort_unstable();
        roots.dedup();
        self.visiting.remove(&key);
        self.roots.insert(key, roots.clone());
        roots
    }

    fn compute_roots(&mut self, m: ModIdx, package: &str) -> Vec<CapId> {
        if let Some(cap) = self.imported(m, package) {
            let host = self.caps[cap].host;
            if host == m {
                return vec![cap];
            }
            let upstream = self.roots_of(host, package);
            return if upstream.is_empty() { vec![cap] } else { upstream };
        }
        let mut roots = Vec::new();
        let mut visited = HashSet::from([m]);
        for r in self.required_modules(m, false) {
            roots.extend(self.contribution(r, package, &mut visited));
        }
        if roots.is_empty() {
            roots = self.exported(m, package);
        }
        roots
    }

    /// What a required module `r` makes visible of `package`: its own export
    /// (or the import substituting it) plus whatever its re-exported
    /// requirements contribute.
    fn contribution(
        &mut self,
        r: ModIdx,
        package: &str,
        visited: &mut HashSet<ModIdx>,
    ) -> Vec<CapId> {
        if !visited.insert(r) {
            return Vec::new();
        }
        let mut roots = if self.imported(r, package).is_some() {
            self.roots_of(r, package)
        } else {
            self.exported(r, package)
        };
        for next in self.required_modules(r, true) {
            roots.extend(self.contribution(next, package, visited));
        }
        roots
    }

    /// Capability currently wired for an import of `package`.
    pub(crate) fn imported(&self, m: ModIdx, package: &str) -> Option<CapId> {
        self.import_of(m, package).map(|(_, cap)| cap)
    }

    fn import_of(&self, m: ModIdx, package: &str) -> Option<(ConstraintId, CapId)> {
        self.modules[m].imports.iter().find_map(|&cid| {
            let c = &self.constraints[cid];
            if !c.active {
                return None;
            }
            c.wired().into_iter().find_map(|s| match s {
                Supplier::Capability(cap) if self.caps[cap].capability.index_key() == package => {
                    Some((cid, cap))
                }
                _ => None,
            })
        })
    }

    fn required_modules(&self, m: ModIdx, reexported_only: bool) -> Vec<ModIdx> {
        self.modules[m]
            .requires
            .iter()
            .filter_map(|&cid| {
                let c = &self.constraints[cid];
                let reexport = matches!(c.requirement(), Some(Requirement::Module(r)) if r.reexport);
                if !c.active || (reexported_only && !reexport) {
                    return None;
                }
                match c.selected_supplier() {
                    Some(Supplier::Module(r)) => Some(r),
                    _ => None,
                }
            })
            .collect()
    }

    /// Packages whose provenance a supplier pins down for its consumers. A
    /// required module exposes its exports and those it re-exports.
    fn exposed_packages(&self, supplier: Supplier) -> (ModIdx, BTreeSet<String>) {
        match supplier {
            Supplier::Capability(cap) => {
                let e = &self.caps[cap];
                (e.host, e.capability.uses().clone())
            }
            Supplier::Module(r) => {
                let mut packages = BTreeSet::new();
                let mut stack = vec![r];
                let mut seen = HashSet::new();
                while let Some(next) = stack.pop() {
                    if !seen.insert(next) {
                        continue;
                    }
                    for &cap in &self.modules[next].capabilities {
                        if let Some(export) = self.caps[cap].capability.as_package() {
                            packages.insert(export.name.clone());
                            packages.extend(export.uses.iter().cloned());
                        }
                    }
                    stack.extend(self.required_modules(next, true));
                }
                (r, packages)
            }
        }
    }

    /// Conflicts introduced by wiring `supplier` into `m`, checked through the
    /// supplier's uses and one more level through the roots it exposes.
    pub(crate) fn supplier_conflicts(
        &mut self,
        m: ModIdx,
        supplier: Supplier,
    ) -> Vec<(String, Vec<CapId>, Vec<CapId>)> {
        let (source, packages) = self.exposed_packages(supplier);
        let mut checked = BTreeSet::new();
        let mut conflicts = Vec::new();
        for package in packages {
            self.check_package(m, source, &package, true, &mut checked, &mut conflicts);
        }
        conflicts
    }

    fn check_package(
        &mut self,
        m: ModIdx,
        source: ModIdx,
        package: &str,
        descend: bool,
        checked: &mut BTreeSet<String>,
        conflicts: &mut Vec<(String, Vec<CapId>, Vec<CapId>)>,
    ) {
        if source == m || !checked.insert(package.to_string()) {
            return;
        }
        let mine = self.roots_of(m, package);
        let theirs = self.roots_of(source, package);
        if mine.is_empty() || theirs.is_empty() {
            return;
        }
        if !self.compatible(&mine, &theirs) {
            conflicts.push((package.to_string(), mine, theirs));
            return;
        }
        if descend {
            for cap in theirs {
                let host = self.caps[cap].host;
                let uses = self.caps[cap].capability.uses().clone();
                for next in uses {
                    self.check_package(m, host, &next, false, checked, conflicts);
                }
            }
        }
    }

    /// Root sets agree if the supplying modules of one contain the other's.
    fn compatible(&self, a: &[CapId], b: &[CapId]) -> bool {
        let ha: BTreeSet<ModIdx> = a.iter().map(|&c| self.caps[c].host).collect();
        let hb: BTreeSet<ModIdx> = b.iter().map(|&c| self.caps[c].host).collect();
        ha.is_subset(&hb) || hb.is_subset(&ha)
    }

    /// Every uses conflict among modules resolved in this batch.
    pub(crate) fn find_conflicts(&mut self) -> Vec<UsesConflict> {
        let mut found = Vec::new();
        for m in 0..self.modules.len() {
            let rm = &self.modules[m];
            if rm.state != ModuleState::Resolved || rm.committed || rm.is_fragment() {
                continue;
            }
            let ids: Vec<ConstraintId> = rm.constraints().collect();
            for cid in ids {
                let c = &self.constraints[cid];
                if !c.active {
                    continue;
                }
                let optional = c.is_optional();
                for supplier in c.wired() {
                    for (package, mine, theirs) in self.supplier_conflicts(m, supplier) {
                        // Blame an optional import of the package over the
                        // constraint that exposed it.
                        let (constraint, optional) = match self.import_of(m, &package) {
                            Some((own, _)) if self.constraints[own].is_optional() => (own, true),
                            _ => (cid, optional),
                        };
                        found.push(UsesConflict {
                            constraint,
                            optional,
                            package,
                            mine,
                            theirs,
                        });
                    }
                }
            }
        }
        found
    }

    /// Check a dynamic candidate against the roots the importer's existing
    /// wiring already pins for its package, and against every package the
    /// importer sees that the candidate's transitive uses reach.
    pub(crate) fn dynamic_consistent(&mut self, m: ModIdx, cap: CapId) -> bool {
        let package = self.caps[cap].capability.index_key().to_string();
        let host = self.caps[cap].host;
        let offered = match self.roots_of(host, &package) {
            roots if roots.is_empty() => vec![cap],
            roots => roots,
        };
        for pinned in self.pinned_roots(m, &package) {
            if !self.compatible(&pinned, &offered) {
                tracing::trace!(package = %package, "dynamic candidate splits an existing package");
                return false;
            }
        }

        let mut pending: Vec<(ModIdx, String)> = self.caps[cap]
            .capability
            .uses()
            .iter()
            .map(|p| (self.caps[cap].host, p.clone()))
            .collect();
        let mut seen = BTreeSet::new();
        while let Some((source, package)) = pending.pop() {
            if !seen.insert((source, package.clone())) {
                continue;
            }
            let mine = self.roots_of(m, &package);
            let theirs = self.roots_of(source, &package);
            if !mine.is_empty() && !theirs.is_empty() && !self.compatible(&mine, &theirs) {
                tracing::trace!(package = %package, "dynamic candidate conflicts");
                return false;
            }
            for root in theirs {
                let host = self.caps[root].host;
                for next in self.caps[root].capability.uses() {
                    pending.push((host, next.clone()));
                }
            }
        }
        true
    }

    /// Root sets for `package` that the wiring of `m` already commits to:
    /// what `m` sees through required modules, and what each wired supplier
    /// exposes through its uses, checked one level down.
    fn pinned_roots(&mut self, m: ModIdx, package: &str) -> Vec<Vec<CapId>> {
        let mut pinned = Vec::new();
        let own = self.roots_of(m, package);
        if !own.is_empty() {
            pinned.push(own);
        }
        let ids: Vec<ConstraintId> = self.modules[m].constraints().collect();
        for cid in ids {
            if !self.constraints[cid].active {
                continue;
            }
            for supplier in self.constraints[cid].wired() {
                let (source, packages) = self.exposed_packages(supplier);
                if source == m {
                    continue;
                }
                if packages.contains(package) {
                    pinned.push(self.roots_of(source, package));
                }
                for exposed in packages {
                    for root in self.roots_of(source, &exposed) {
                        if self.caps[root].capability.uses().contains(package) {
                            let host = self.caps[root].host;
                            pinned.push(self.roots_of(host, package));
                        }
                    }
                }
            }
        }
        pinned.retain(|roots| !roots.is_empty());
        pinned
    }

    /// Human-readable description of a conflict.
    pub(crate) fn describe(&self, conflict: &UsesConflict) -> String {
        let c = &self.constraints[conflict.constraint];
        let owner = &self.modules[c.owner].module;
        let names = |roots: &[CapId]| {
            roots
                .iter()
                .map(|&cap| self.modules[self.caps[cap].host].module.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{owner} sees package {} from {} but wiring {} exposes it from {}",
            conflict.package,
            names(&conflict.mine),
            c.requirement().map(ToString::to_string).unwrap_or_default(),
            names(&conflict.theirs)
        )
    }
}
