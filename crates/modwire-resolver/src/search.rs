//! Combination search over ambiguous constraints.
//!
//! Constraints with more than one viable supplier form the digits of an
//! odometer. Starting from every constraint's first candidate, the search
//! advances the last digit, carrying into earlier ones, and keeps the
//! combination with the fewest non-optional uses conflicts.

use std::time::{Duration, Instant};

use modwire_core::module::ModuleState;
use modwire_core::outcome::{ResolverError, ResolverErrorKind};

use crate::constraint::ConstraintId;
use crate::grouping::UsesConflict;
use crate::session::Session;

fn blocking(conflicts: &[UsesConflict]) -> usize {
    conflicts.iter().filter(|c| !c.optional).count()
}

/// Advance the odometer. Returns false once every combination was visited.
fn advance(indices: &mut [usize], sizes: &[usize]) -> bool {
    for i in (0..indices.len()).rev() {
        indices[i] += 1;
        if indices[i] < sizes[i] {
            return true;
        }
        indices[i] = 0;
    }
    false
}

impl Session<'_> {
    /// Pick suppliers for ambiguous constraints so that as few modules as
    /// possible see a package from unrelated sources. Returns the conflicts
    /// left in the adopted combination.
    pub(crate) fn search_combinations(&mut self, budget: Duration) -> Vec<UsesConflict> {
        let ambiguous: Vec<ConstraintId> = (0..self.constraints.len())
            .filter(|&cid| {
                let c = &self.constraints[cid];
                let owner = &self.modules[c.owner];
                c.active
                    && c.selected.is_some()
                    && !c.is_multiple()
                    && !c.is_dynamic()
                    && c.candidates.len() > 1
                    && owner.state == ModuleState::Resolved
                    && !owner.committed
            })
            .collect();
        if ambiguous.is_empty() {
            return self.find_conflicts();
        }

        let slots = self.slots(ambiguous);
        let sizes: Vec<usize> = slots
            .iter()
            .map(|slot| self.constraints[slot[0]].candidates.len())
            .collect();
        let mut indices = vec![0; slots.len()];
        self.apply(&slots, &indices);
        let mut conflicts = self.find_conflicts();
        let mut best = (blocking(&conflicts), indices.clone());
        if best.0 == 0 {
            return conflicts;
        }

        tracing::debug!(
            slots = slots.len(),
            conflicts = best.0,
            "searching supplier combinations"
        );
        let started = Instant::now();
        let mut tried = 1usize;
        while advance(&mut indices, &sizes) {
            if started.elapsed() >= budget {
                tracing::warn!(
                    tried,
                    remaining_conflicts = best.0,
                    "combination search timed out after {:?}; keeping the best combination so far",
                    budget
                );
                break;
            }
            tried += 1;
            self.apply(&slots, &indices);
            let found = self.find_conflicts();
            let count = blocking(&found);
            if count < best.0 {
                best = (count, indices.clone());
                conflicts = found;
                if count == 0 {
                    break;
                }
            }
        }

        self.apply(&slots, &best.1);
        for (slot, &i) in slots.iter().zip(&best.1) {
            for &cid in slot {
                let c = &mut self.constraints[cid];
                c.preferred = c.candidates.get(i).copied();
            }
        }
        tracing::debug!(tried, conflicts = best.0, "combination adopted");
        conflicts
    }

    /// One search digit per ambiguous constraint, or per distinct candidate
    /// set once there are more ambiguous constraints than the configured cap.
    fn slots(&self, ambiguous: Vec<ConstraintId>) -> Vec<Vec<ConstraintId>> {
        if ambiguous.len() <= self.config.max_multiple_suppliers {
            return ambiguous.into_iter().map(|cid| vec![cid]).collect();
        }
        let mut slots: Vec<Vec<ConstraintId>> = Vec::new();
        for cid in ambiguous {
            let candidates = &self.constraints[cid].candidates;
            match slots
                .iter_mut()
                .find(|slot| self.constraints[slot[0]].candidates == *candidates)
            {
                Some(slot) => slot.push(cid),
                None => slots.push(vec![cid]),
            }
        }
        tracing::debug!(merged = slots.len(), "merged ambiguous constraints by candidate set");
        slots
    }

    fn apply(&mut self, slots: &[Vec<ConstraintId>], indices: &[usize]) {
        for (slot, &i) in slots.iter().zip(indices) {
            for &cid in slot {
                self.constraints[cid].selected = Some(i);
            }
        }
        self.roots.clear();
    }

    /// Act on the conflicts left after the search: optional constraints are
    /// dropped, fragments detached, and owning modules failed. Returns true
    /// if any module failed.
    pub(crate) fn settle_conflicts(&mut self, conflicts: Vec<UsesConflict>) -> bool {
        let mut failed = false;
        for conflict in conflicts {
            let c = &self.constraints[conflict.constraint];
            if !c.active || c.selected.is_none() {
                continue;
            }
            let (owner, origin) = (c.owner, c.origin);
            if self.modules[owner].state != ModuleState::Resolved {
                continue;
            }
            let error = ResolverError::new(
                ResolverErrorKind::UsesConflict,
                self.modules[origin].module.id,
                self.describe(&conflict),
            )
            .for_requirement(self.requirement_ref(conflict.constraint));
            tracing::debug!("{error}");

            if conflict.optional {
                let c = &mut self.constraints[conflict.constraint];
                c.suppressed = true;
                c.clear();
                self.roots.clear();
            } else if origin != owner {
                self.detach_fragment(owner, origin);
                self.modules[origin].record(error);
            } else {
                self.modules[owner].record(error);
                self.fail(owner);
                self.modules[owner].resolvable = false;
                failed = true;
            }
        }
        failed
    }

    /// Put every module of this batch back to unresolved for another pass,
    /// keeping the search's supplier choices as preferences.
    pub(crate) fn reset_batch(&mut self) {
        for m in 0..self.modules.len() {
            let rm = &self.modules[m];
            if rm.committed || !rm.resolvable || rm.pending_removal {
                continue;
            }
            let ids: Vec<ConstraintId> = rm.constraints().collect();
            for cid in ids {
                self.constraints[cid].clear();
            }
            let rm = &mut self.modules[m];
            rm.state = ModuleState::Unresolved;
            rm.failed = false;
            if !rm.is_fragment() {
                rm.errors.retain(|e| e.kind.is_eligibility());
            }
        }
        self.roots.clear();
    }
}
