//! The resolver: binds to a catalog and turns its modules into wiring.
//!
//! One `resolve` call runs these phases over a fresh [`Session`]:
//! refresh closure and restored wiring, eligibility checks, singleton
//! selection, fragment attachment, recursive per-module resolution, the
//! combination search over ambiguous suppliers, and the commit back into the
//! catalog.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use modwire_core::catalog::{Catalog, InMemoryCatalog};
use modwire_core::config::ResolverConfig;
use modwire_core::environment::Environment;
use modwire_core::module::{Module, ModuleId, ModuleState};
use modwire_core::outcome::ResolutionOutcome;
use modwire_core::wiring::{ModuleWiring, Wire};
use modwire_util::errors::{ModwireError, ModwireResult};

use crate::hooks::{ResolverHook, SelectionPolicy};
use crate::session::Session;

/// Resolves the modules of one bound catalog.
///
/// Mutating operations take `&mut self`, so at most one resolution runs on
/// a resolver at a time.
pub struct Resolver<C: Catalog = InMemoryCatalog> {
    config: ResolverConfig,
    catalog: Option<C>,
    hook: Option<Box<dyn ResolverHook>>,
    policy: Option<Box<dyn SelectionPolicy>>,
}

impl<C: Catalog> Resolver<C> {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            catalog: None,
            hook: None,
            policy: None,
        }
    }

    /// Create a resolver already bound to `catalog`.
    pub fn with_catalog(config: ResolverConfig, catalog: C) -> Self {
        let mut resolver = Self::new(config);
        resolver.catalog = Some(catalog);
        resolver
    }

    /// Bind the catalog this resolver works on. A resolver binds only once.
    pub fn bind(&mut self, catalog: C) -> ModwireResult<()> {
        if self.catalog.is_some() {
            return Err(ModwireError::CatalogAlreadyBound.into());
        }
        self.catalog = Some(catalog);
        Ok(())
    }

    pub fn catalog(&self) -> Option<&C> {
        self.catalog.as_ref()
    }

    pub fn catalog_mut(&mut self) -> Option<&mut C> {
        self.catalog.as_mut()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn set_hook(&mut self, hook: impl ResolverHook + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn set_selection_policy(&mut self, policy: impl SelectionPolicy + 'static) {
        self.policy = Some(Box::new(policy));
    }

    /// Resolve every unresolved module of the catalog. Modules in `refresh`,
    /// and everything wired to them, are unresolved first; refreshed modules
    /// pending removal are discarded.
    ///
    /// Resolution failures are reported per module in the outcome. Only a
    /// missing catalog or an unknown refresh id is an error.
    pub fn resolve(
        &mut self,
        refresh: Option<&[ModuleId]>,
        environment: &Environment,
    ) -> ModwireResult<ResolutionOutcome> {
        let catalog = self.catalog.as_mut().ok_or(ModwireError::NoCatalog)?;
        let installed = catalog.modules();
        let pending = catalog.removal_pending();
        let wirings = committed_wirings(&*catalog, installed.iter().chain(&pending));

        let refresh = refresh.unwrap_or_default();
        for id in refresh {
            if !installed.iter().chain(&pending).any(|m| m.id == *id) {
                return Err(ModwireError::UnknownModule { id: id.0 }.into());
            }
        }
        let refreshed = refresh_closure(refresh, &wirings);
        let discarded: Vec<ModuleId> = pending
            .iter()
            .map(|m| m.id)
            .filter(|id| refreshed.contains(id))
            .collect();

        let modules: Vec<(Module, bool)> = installed
            .into_iter()
            .map(|m| (m, false))
            .chain(
                pending
                    .into_iter()
                    .filter(|m| !refreshed.contains(&m.id))
                    .map(|m| (m, true)),
            )
            .collect();
        let batch = modules
            .iter()
            .filter(|(m, _)| m.state != ModuleState::Resolved || refreshed.contains(&m.id))
            .count();
        tracing::debug!(
            modules = modules.len(),
            batch,
            refreshed = refreshed.len(),
            discarded = discarded.len(),
            "starting resolution"
        );

        let mut session = Session::new(
            modules,
            &refreshed,
            &wirings,
            &self.config,
            self.hook.as_deref(),
            self.policy.as_deref(),
        );
        session.check_eligibility(environment);
        session.select_singletons();
        session.attach_fragments();
        session.resolve_all();

        let conflicts = session.search_combinations(self.config.search_timeout(batch));
        if !conflicts.is_empty() {
            let reresolve = session.settle_conflicts(conflicts);
            session.cascade();
            if reresolve {
                session.reset_batch();
                session.resolve_all();
                let remaining = session.find_conflicts();
                session.settle_conflicts(remaining);
                session.cascade();
            }
        }

        let outcome = session.outcome(discarded);
        catalog.commit(&outcome);
        Ok(outcome)
    }

    /// Wire `package` into a resolved module through a dynamic import.
    /// Returns the new wire, or `None` when the module has no matching
    /// dynamic import, already sees the package, or no consistent resolved
    /// exporter exists.
    pub fn resolve_dynamic(
        &mut self,
        importer: ModuleId,
        package: &str,
    ) -> ModwireResult<Option<Wire>> {
        let catalog = self.catalog.as_mut().ok_or(ModwireError::NoCatalog)?;
        let installed = catalog.modules();
        let pending = catalog.removal_pending();
        let wirings = committed_wirings(&*catalog, installed.iter().chain(&pending));
        let modules: Vec<(Module, bool)> = installed
            .into_iter()
            .map(|m| (m, false))
            .chain(pending.into_iter().map(|m| (m, true)))
            .collect();

        let mut session = Session::new(
            modules,
            &HashSet::new(),
            &wirings,
            &self.config,
            self.hook.as_deref(),
            self.policy.as_deref(),
        );
        let Some(&idx) = session.by_id.get(&importer) else {
            return Err(ModwireError::UnknownModule { id: importer.0 }.into());
        };
        let wire = session.resolve_dynamic(idx, package);
        if let Some(ref wire) = wire {
            catalog.commit_dynamic(wire);
        }
        Ok(wire)
    }
}

fn committed_wirings<'a, C: Catalog>(
    catalog: &C,
    modules: impl Iterator<Item = &'a Module>,
) -> BTreeMap<ModuleId, ModuleWiring> {
    modules
        .filter(|m| m.state == ModuleState::Resolved)
        .filter_map(|m| catalog.wiring(m.id).map(|w| (m.id, w)))
        .collect()
}

/// The refresh set plus every module wired to it, transitively, and the
/// hosts of refreshed fragments.
fn refresh_closure(
    refresh: &[ModuleId],
    wirings: &BTreeMap<ModuleId, ModuleWiring>,
) -> HashSet<ModuleId> {
    let mut closure: BTreeSet<ModuleId> = refresh.iter().copied().collect();
    loop {
        let before = closure.len();
        for (id, wiring) in wirings {
            if closure.contains(id) {
                closure.extend(wiring.hosts());
            } else if wiring.providers().any(|p| closure.contains(&p)) {
                closure.insert(*id);
            }
        }
        if closure.len() == before {
            break;
        }
    }
    closure.into_iter().collect()
}
