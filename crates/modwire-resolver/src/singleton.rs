use std::collections::BTreeSet;

use modwire_core::module::{ModuleId, ModuleState};
use modwire_core::outcome::{ResolverError, ResolverErrorKind};

use crate::module::ModIdx;
use crate::session::Session;

impl Session<'_> {
    /// Keep one singleton per name. A resolved singleton keeps its place;
    /// otherwise the preferred candidate wins and every module colliding
    /// with a winner is made unresolvable.
    pub(crate) fn select_singletons(&mut self) {
        let names: Vec<String> = self.names.names().into_iter().map(str::to_string).collect();
        for name in names {
            let mut group: Vec<ModIdx> = self
                .names
                .get(&name)
                .iter()
                .copied()
                .filter(|&idx| {
                    let m = &self.modules[idx];
                    m.module.singleton
                        && (m.state == ModuleState::Resolved || (m.resolvable && !m.pending_removal))
                })
                .collect();
            if group.len() < 2 {
                continue;
            }
            group.sort_by_key(|&idx| self.modules[idx].state != ModuleState::Resolved);

            let mut selected: Vec<ModIdx> = Vec::new();
            let mut excluded: BTreeSet<ModIdx> = BTreeSet::new();
            for &winner in &group {
                if excluded.contains(&winner) {
                    continue;
                }
                selected.push(winner);
                let mut collisions: Vec<ModuleId> = group
                    .iter()
                    .filter(|&&o| o != winner)
                    .map(|&o| self.modules[o].module.id)
                    .collect();
                if let Some(hook) = self.hook {
                    hook.filter_singleton_collisions(&self.modules[winner].module, &mut collisions);
                }
                for &loser in &group {
                    let m = &self.modules[loser];
                    if loser == winner
                        || selected.contains(&loser)
                        || m.state == ModuleState::Resolved
                        || !collisions.contains(&m.module.id)
                        || !excluded.insert(loser)
                    {
                        continue;
                    }
                    let winner_module = &self.modules[winner].module;
                    let error = ResolverError::new(
                        ResolverErrorKind::SingletonCollision,
                        m.module.id,
                        format!("another singleton version is selected: {winner_module}"),
                    )
                    .related_to(winner_module.id);
                    tracing::debug!(module = %m.module, winner = %winner_module, "singleton collision");
                    let m = &mut self.modules[loser];
                    m.resolvable = false;
                    m.record(error);
                }
            }
        }
    }
}
