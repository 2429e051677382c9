//! The catalog collaborator: owns module metadata and committed wiring
//! between resolutions.
//!
//! The resolver reads modules from a [`Catalog`] at the start of every
//! `resolve` and hands the outcome back through [`Catalog::commit`]. How a
//! catalog persists anything is its own business; [`InMemoryCatalog`] keeps
//! everything in maps and can be seeded from a TOML fixture.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use modwire_util::errors::ModwireError;

use crate::attrs::retype_versions;
use crate::capability::Capability;
use crate::environment::Environment;
use crate::module::{Module, ModuleId, ModuleState};
use crate::outcome::{ResolutionOutcome, ResolverError};
use crate::wiring::{ModuleWiring, Wire};

/// Module metadata source and sink for resolution results.
pub trait Catalog {
    /// Installed modules, with their current state.
    fn modules(&self) -> Vec<Module>;

    /// Modules removed from the catalog that are still resolved. They may not
    /// be resolved again, but their wiring still binds their dependents.
    fn removal_pending(&self) -> Vec<Module>;

    /// Committed wiring of a resolved module.
    fn wiring(&self, id: ModuleId) -> Option<ModuleWiring>;

    /// Record the outcome of a resolution.
    fn commit(&mut self, outcome: &ResolutionOutcome);

    /// Record one additional wire installed by dynamic resolution.
    fn commit_dynamic(&mut self, wire: &Wire);
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    modules: BTreeMap<ModuleId, Module>,
    removal_pending: BTreeMap<ModuleId, Module>,
    wirings: BTreeMap<ModuleId, ModuleWiring>,
    errors: BTreeMap<ModuleId, Vec<ResolverError>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, replacing any module with the same id.
    pub fn add(&mut self, mut module: Module) -> ModuleId {
        let id = module.id;
        module.state = ModuleState::Unresolved;
        module.uninstalled = false;
        self.wirings.remove(&id);
        self.errors.remove(&id);
        self.modules.insert(id, module);
        id
    }

    /// Remove a module. A resolved module stays pending removal until a
    /// resolution refreshes it; an unresolved one is dropped immediately.
    pub fn remove(&mut self, id: ModuleId) -> Option<Module> {
        let mut module = self.modules.remove(&id)?;
        module.uninstalled = true;
        if module.state == ModuleState::Resolved {
            tracing::debug!(module = %module, "resolved module pending removal");
            self.removal_pending.insert(id, module.clone());
        } else {
            self.wirings.remove(&id);
            self.errors.remove(&id);
        }
        Some(module)
    }

    /// Replace the metadata of a module, e.g. to disable or enable it.
    ///
    /// The module keeps its state and committed wiring, so a resolved module
    /// goes on supplying its dependents under the old wiring. Pass its id to
    /// the next resolution's refresh set to have the new metadata take
    /// effect.
    pub fn update(&mut self, module: Module) {
        if let Some(existing) = self.modules.get_mut(&module.id) {
            let state = existing.state;
            *existing = module;
            existing.state = state;
        }
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id).or_else(|| self.removal_pending.get(&id))
    }

    pub fn state(&self, id: ModuleId) -> Option<ModuleState> {
        self.module(id).map(|m| m.state)
    }

    pub fn errors(&self, id: ModuleId) -> &[ResolverError] {
        self.errors.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_removal_pending(&self, id: ModuleId) -> bool {
        self.removal_pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Next id greater than every id in use.
    pub fn next_id(&self) -> ModuleId {
        let max = self
            .modules
            .keys()
            .chain(self.removal_pending.keys())
            .map(|id| id.0)
            .max()
            .unwrap_or(0);
        ModuleId(max + 1)
    }
}

impl Catalog for InMemoryCatalog {
    fn modules(&self) -> Vec<Module> {
        self.modules.values().cloned().collect()
    }

    fn removal_pending(&self) -> Vec<Module> {
        self.removal_pending.values().cloned().collect()
    }

    fn wiring(&self, id: ModuleId) -> Option<ModuleWiring> {
        self.wirings.get(&id).cloned()
    }

    fn commit(&mut self, outcome: &ResolutionOutcome) {
        for id in &outcome.discarded {
            self.removal_pending.remove(id);
            self.wirings.remove(id);
            self.errors.remove(id);
        }
        for (id, result) in &outcome.modules {
            let module = match self.modules.get_mut(id) {
                Some(m) => m,
                None => match self.removal_pending.get_mut(id) {
                    Some(m) => m,
                    None => continue,
                },
            };
            module.state = result.state;
            if result.is_resolved() {
                self.wirings.insert(*id, result.wiring.clone());
            } else {
                self.wirings.remove(id);
            }
            if result.errors.is_empty() {
                self.errors.remove(id);
            } else {
                self.errors.insert(*id, result.errors.clone());
            }
        }
    }

    fn commit_dynamic(&mut self, wire: &Wire) {
        self.wirings
            .entry(wire.requirer)
            .or_default()
            .wires
            .push(wire.clone());
    }
}

/// TOML fixture describing an environment and a set of modules.
///
/// ```toml
/// [[environment.alternatives]]
/// execution-environments = ["JavaSE-17"]
///
/// [[module]]
/// id = 1
/// name = "app"
/// version = "1.0"
///
/// [[module.requirements]]
/// kind = "package"
/// name = "org.acme.util"
/// version = "[1.0,2.0)"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default, rename = "module")]
    pub modules: Vec<Module>,
}

impl CatalogFixture {
    /// Load and parse a fixture from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModwireError::Catalog {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        let mut fixture: CatalogFixture =
            toml::from_str(content).map_err(|e| ModwireError::Catalog {
                message: format!("Failed to parse catalog: {e}"),
            })?;

        let mut seen = BTreeMap::new();
        for module in &fixture.modules {
            if let Some(previous) = seen.insert(module.id, module.name.clone()) {
                return Err(ModwireError::Catalog {
                    message: format!(
                        "duplicate module id {} ({previous} and {})",
                        module.id, module.name
                    ),
                }
                .into());
            }
        }

        tracing::debug!(
            modules = fixture.modules.len(),
            alternatives = fixture.environment.alternatives.len(),
            "catalog fixture parsed"
        );
        fixture.environment.normalize();
        for module in &mut fixture.modules {
            for cap in &mut module.capabilities {
                if let Capability::Generic(g) = cap {
                    retype_versions(&mut g.attributes);
                }
            }
        }
        Ok(fixture)
    }

    pub fn into_catalog(self) -> (InMemoryCatalog, Environment) {
        let mut catalog = InMemoryCatalog::new();
        for module in self.modules {
            catalog.add(module);
        }
        (catalog, self.environment)
    }
}
