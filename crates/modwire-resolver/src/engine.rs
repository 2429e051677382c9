//! Per-module recursive resolution with cycle handling.
//!
//! A module being resolved is marked `Resolving`. Reaching it again through
//! its own dependencies records it in the cycle list instead of recursing;
//! modules that finish while the list is non-empty stay `Resolving` until the
//! outermost call settles the whole cycle at once.

use modwire_core::module::ModuleState;

use crate::constraint::ConstraintId;
use crate::module::ModIdx;
use crate::session::Session;

#[derive(Debug, Clone, Copy)]
enum Group {
    Generic,
    Require,
    Import,
}

impl Session<'_> {
    /// Resolve every unresolved module, in id order.
    pub(crate) fn resolve_all(&mut self) {
        for m in 0..self.modules.len() {
            if self.modules[m].state != ModuleState::Unresolved {
                continue;
            }
            let mut cycle = Vec::new();
            self.resolve_module(m, &mut cycle);
            if !cycle.is_empty() {
                self.settle_cycle(&cycle);
            }
        }
        let resolved = self
            .modules
            .iter()
            .filter(|m| m.state == ModuleState::Resolved)
            .count();
        tracing::debug!(resolved, total = self.modules.len(), "resolution pass finished");
    }

    pub(crate) fn resolve_module(&mut self, m: ModIdx, cycle: &mut Vec<ModIdx>) -> bool {
        match self.modules[m].state {
            ModuleState::Resolved => return true,
            ModuleState::Resolving => {
                if !cycle.contains(&m) {
                    cycle.push(m);
                }
                return true;
            }
            ModuleState::Unresolved => {}
        }
        if !self.modules[m].can_supply() {
            return false;
        }
        if self.modules[m].is_fragment() {
            return self.resolve_fragment(m, cycle);
        }

        self.modules[m].state = ModuleState::Resolving;
        tracing::trace!(module = %self.modules[m].module, "resolving");
        let ok = self.resolve_group(m, Group::Generic, cycle)
            && self.resolve_group(m, Group::Require, cycle)
            && self.resolve_group(m, Group::Import, cycle);
        if !ok {
            self.fail(m);
            return false;
        }
        self.check_folded(m);
        self.finish(m, cycle);
        true
    }

    fn finish(&mut self, m: ModIdx, cycle: &mut Vec<ModIdx>) {
        if cycle.is_empty() {
            self.modules[m].state = ModuleState::Resolved;
            tracing::debug!(module = %self.modules[m].module, "resolved");
        } else if !cycle.contains(&m) {
            cycle.push(m);
        }
    }

    /// A fragment resolves with its hosts. Constraints it added to an
    /// already-resolved host are resolved here.
    fn resolve_fragment(&mut self, f: ModIdx, cycle: &mut Vec<ModIdx>) -> bool {
        if self.modules[f].hosts.is_empty() {
            self.modules[f].failed = true;
            return false;
        }
        self.modules[f].state = ModuleState::Resolving;
        for h in self.modules[f].hosts.clone() {
            if !self.resolve_module(h, cycle) {
                continue;
            }
            if self.modules[h].committed {
                self.resolve_late_constraints(h, f, cycle);
            }
        }
        let live = self.modules[f]
            .hosts
            .iter()
            .any(|&h| self.modules[h].state != ModuleState::Unresolved);
        if !live {
            self.modules[f].state = ModuleState::Unresolved;
            self.modules[f].failed = true;
            return false;
        }
        self.finish(f, cycle);
        true
    }

    fn resolve_late_constraints(&mut self, h: ModIdx, f: ModIdx, cycle: &mut Vec<ModIdx>) {
        let pending: Vec<ConstraintId> = self.modules[h]
            .constraints()
            .filter(|&cid| {
                let c = &self.constraints[cid];
                c.active && c.origin == f && !c.is_dynamic() && c.selected.is_none()
            })
            .collect();
        for cid in pending {
            if self.resolve_constraint(cid, cycle) || self.constraints[cid].is_optional() {
                continue;
            }
            let error = self.missing_error(cid);
            self.detach_fragment(h, f);
            self.modules[f].record(error);
            return;
        }
    }

    /// Resolve one group of constraints. Fails on the first unsatisfiable
    /// non-optional constraint the module declared itself; a failing
    /// constraint contributed by a fragment detaches that fragment instead.
    fn resolve_group(&mut self, m: ModIdx, group: Group, cycle: &mut Vec<ModIdx>) -> bool {
        let ids = match group {
            Group::Generic => self.modules[m].generics.clone(),
            Group::Require => self.modules[m].requires.clone(),
            Group::Import => self.modules[m].imports.clone(),
        };
        let mut i = 0;
        while i < ids.len() {
            let cid = ids[i];
            let c = &self.constraints[cid];
            if !c.active || c.suppressed || c.is_dynamic() {
                i += 1;
                continue;
            }
            if self.resolve_constraint(cid, cycle) || self.constraints[cid].is_optional() {
                i += 1;
                continue;
            }

            let origin = self.constraints[cid].origin;
            let error = self.missing_error(cid);
            if origin == m {
                tracing::debug!(module = %self.modules[m].module, "{error}");
                self.modules[m].record(error);
                return false;
            }
            self.detach_fragment(m, origin);
            self.modules[origin].record(error);
            // Retry a constraint another fragment took over.
            let c = &self.constraints[cid];
            if !(c.active && c.origin != origin) {
                i += 1;
            }
        }
        true
    }

    /// Resolve the suppliers of one constraint and keep the ones that resolve.
    pub(crate) fn resolve_constraint(&mut self, cid: ConstraintId, cycle: &mut Vec<ModIdx>) -> bool {
        let owner = self.constraints[cid].owner;
        let found = self.find_candidates(cid);
        let mut viable = Vec::with_capacity(found.len());
        for supplier in found {
            let provider = self.supplier_module(supplier);
            if provider == owner || self.resolve_module(provider, cycle) {
                viable.push(supplier);
            }
        }
        viable.retain(|&s| self.supplier_valid(s));
        tracing::trace!(
            module = %self.modules[owner].module,
            requirement = %self.requirement_ref(cid),
            candidates = viable.len(),
            "constraint evaluated"
        );
        self.roots.clear();
        self.constraints[cid].select(viable)
    }

    pub(crate) fn fail(&mut self, m: ModIdx) {
        let ids: Vec<ConstraintId> = self.modules[m].constraints().collect();
        for cid in ids {
            self.constraints[cid].clear();
        }
        let rm = &mut self.modules[m];
        rm.state = ModuleState::Unresolved;
        rm.failed = true;
        self.roots.clear();
        tracing::debug!(module = %self.modules[m].module, "failed to resolve");
    }

    /// Settle a cycle: members whose suppliers failed move to the next live
    /// candidate or fail themselves, until nothing changes; the rest resolve.
    pub(crate) fn settle_cycle(&mut self, cycle: &[ModIdx]) {
        loop {
            let mut changed = false;
            for &m in cycle {
                if self.modules[m].state != ModuleState::Resolving {
                    continue;
                }
                if !self.revalidate(m) {
                    self.fail(m);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for &m in cycle {
            if self.modules[m].state == ModuleState::Resolving {
                self.modules[m].state = ModuleState::Resolved;
                tracing::debug!(module = %self.modules[m].module, "resolved with cycle");
            }
        }
    }

    /// Re-resolve modules of this batch whose suppliers have since failed.
    pub(crate) fn cascade(&mut self) {
        loop {
            let mut changed = false;
            for m in 0..self.modules.len() {
                let rm = &self.modules[m];
                if rm.state != ModuleState::Resolved || rm.committed {
                    continue;
                }
                if !self.revalidate(m) {
                    self.fail(m);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Check that every wired supplier of `m` is still alive, moving to the
    /// next live candidate where one is not. Returns false if `m` must fail;
    /// the reason is recorded.
    fn revalidate(&mut self, m: ModIdx) -> bool {
        if self.modules[m].is_fragment() {
            let live = self.modules[m]
                .hosts
                .iter()
                .any(|&h| self.modules[h].state != ModuleState::Unresolved);
            if !live {
                self.modules[m].failed = true;
            }
            return live;
        }

        let ids: Vec<ConstraintId> = self.modules[m].constraints().collect();
        for cid in ids {
            let c = &self.constraints[cid];
            if !c.active || c.selected.is_none() || c.is_dynamic() {
                continue;
            }
            let alive: Vec<usize> = (0..c.candidates.len())
                .filter(|&i| self.supplier_alive(c.candidates[i]))
                .collect();
            let current = c.selected.is_some_and(|s| alive.contains(&s));
            if (c.is_multiple() && alive.len() == c.candidates.len()) || (!c.is_multiple() && current) {
                continue;
            }

            self.roots.clear();
            if !alive.is_empty() {
                let c = &mut self.constraints[cid];
                if c.is_multiple() {
                    c.candidates = alive.iter().map(|&i| c.candidates[i]).collect();
                    c.selected = Some(0);
                } else {
                    c.selected = Some(alive[0]);
                }
                continue;
            }
            if self.constraints[cid].is_optional() {
                self.constraints[cid].clear();
                continue;
            }
            let origin = self.constraints[cid].origin;
            let error = self.missing_error(cid);
            if origin != m {
                self.detach_fragment(m, origin);
                self.modules[origin].record(error);
                continue;
            }
            tracing::debug!(module = %self.modules[m].module, "{error}");
            self.modules[m].record(error);
            return false;
        }
        self.check_folded(m);
        true
    }
}
