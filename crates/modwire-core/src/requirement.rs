//! Requirements a module declares against the capabilities of other modules.
//!
//! Three requirement kinds share one tagged enum. Each variant knows how to
//! test a candidate; the resolver only needs the variant's lookup key and
//! namespace to find candidates in its indexes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{GenericCapability, PackageExport};
use crate::filter::Filter;
use crate::module::Module;
use crate::version::VersionRange;

/// The namespace a requirement or wire belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Namespace {
    Package,
    Module,
    Host,
    Generic(String),
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        match value.as_str() {
            "package" => Self::Package,
            "module" => Self::Module,
            "host" => Self::Host,
            _ => Self::Generic(value),
        }
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => f.write_str("package"),
            Self::Module => f.write_str("module"),
            Self::Host => f.write_str("host"),
            Self::Generic(ns) => f.write_str(ns),
        }
    }
}

/// How a package import is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportResolution {
    #[default]
    Static,
    Optional,
    /// Resolved lazily on first use; the name may end in `*`.
    Dynamic,
}

/// Cardinality of a generic requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
}

fn default_true() -> bool {
    true
}

/// A requirement declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Requirement {
    Package(PackageImport),
    Module(ModuleRequire),
    Generic(GenericRequire),
}

impl Requirement {
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Package(_) => Namespace::Package,
            Self::Module(_) => Namespace::Module,
            Self::Generic(g) => Namespace::Generic(g.namespace.clone()),
        }
    }

    /// Key candidates are filed under in the resolver's indexes.
    pub fn lookup_key(&self) -> &str {
        match self {
            Self::Package(p) => &p.name,
            Self::Module(m) => &m.name,
            Self::Generic(g) => &g.namespace,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Self::Package(p) => p.resolution == ImportResolution::Optional,
            Self::Module(m) => m.optional,
            Self::Generic(g) => g.optional,
        }
    }

    pub fn is_effective(&self) -> bool {
        match self {
            Self::Package(p) => p.effective,
            Self::Module(m) => m.effective,
            Self::Generic(g) => g.effective,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Package(p) if p.resolution == ImportResolution::Dynamic)
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Generic(g) if g.cardinality == Cardinality::Multiple)
    }

    /// True if `other` asks for the same thing, used to fold fragment
    /// requirements into a host that already declares them.
    pub fn same_target(&self, other: &Requirement) -> bool {
        match (self, other) {
            (Self::Package(a), Self::Package(b)) => a.name == b.name,
            (Self::Module(a), Self::Module(b)) => a.name == b.name,
            (Self::Generic(a), Self::Generic(b)) => {
                a.namespace == b.namespace && a.filter == b.filter
            }
            _ => false,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package(p) => write!(f, "import {} {}", p.name, p.version),
            Self::Module(m) => write!(f, "require {} {}", m.name, m.version),
            Self::Generic(g) => match &g.filter {
                Some(filter) => write!(f, "{} {}", g.namespace, filter),
                None => write!(f, "{}", g.namespace),
            },
        }
    }
}

impl From<PackageImport> for Requirement {
    fn from(value: PackageImport) -> Self {
        Self::Package(value)
    }
}

impl From<ModuleRequire> for Requirement {
    fn from(value: ModuleRequire) -> Self {
        Self::Module(value)
    }
}

impl From<GenericRequire> for Requirement {
    fn from(value: GenericRequire) -> Self {
        Self::Generic(value)
    }
}

/// Import of a named package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageImport {
    pub name: String,
    #[serde(default)]
    pub version: VersionRange,
    /// Restricts suppliers to modules of this name.
    #[serde(default, rename = "module-name")]
    pub module_name: Option<String>,
    #[serde(default, rename = "module-version")]
    pub module_version: VersionRange,
    /// Arbitrary attributes the export must carry with equal values.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub resolution: ImportResolution,
    #[serde(default = "default_true")]
    pub effective: bool,
}

impl PackageImport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionRange::any(),
            module_name: None,
            module_version: VersionRange::any(),
            attributes: BTreeMap::new(),
            resolution: ImportResolution::Static,
            effective: true,
        }
    }

    pub fn version(mut self, range: VersionRange) -> Self {
        self.version = range;
        self
    }

    pub fn optional(mut self) -> Self {
        self.resolution = ImportResolution::Optional;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.resolution = ImportResolution::Dynamic;
        self
    }

    pub fn from_module(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Name test, honouring a trailing `*` wildcard on dynamic imports.
    pub fn matches_name(&self, package: &str) -> bool {
        if self.name == "*" {
            return true;
        }
        match self.name.strip_suffix('*') {
            Some(prefix) if self.resolution == ImportResolution::Dynamic => {
                package.starts_with(prefix)
            }
            _ => self.name == package,
        }
    }

    /// Full match test of an export offered by `provider`.
    pub fn matches(&self, export: &PackageExport, provider: &Module) -> bool {
        if !self.matches_name(&export.name) || !self.version.contains(&export.version) {
            return false;
        }
        if let Some(ref module_name) = self.module_name {
            if *module_name != provider.name {
                return false;
            }
        }
        if !self.module_version.contains(&provider.version) {
            return false;
        }
        for (key, value) in &self.attributes {
            if export.attributes.get(key) != Some(value) {
                return false;
            }
        }
        export.mandatory.iter().all(|key| match key.as_str() {
            "module-name" => self.module_name.is_some(),
            "module-version" => !self.module_version.is_any(),
            _ => self.attributes.contains_key(key),
        })
    }
}

/// Requirement on a whole module by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRequire {
    pub name: String,
    #[serde(default)]
    pub version: VersionRange,
    #[serde(default)]
    pub optional: bool,
    /// Packages reachable through this requirement are visible to modules
    /// that in turn require the declaring module.
    #[serde(default)]
    pub reexport: bool,
    #[serde(default = "default_true")]
    pub effective: bool,
}

impl ModuleRequire {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionRange::any(),
            optional: false,
            reexport: false,
            effective: true,
        }
    }

    pub fn version(mut self, range: VersionRange) -> Self {
        self.version = range;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn reexport(mut self) -> Self {
        self.reexport = true;
        self
    }

    pub fn matches(&self, module: &Module) -> bool {
        !module.is_fragment() && module.name == self.name && self.version.contains(&module.version)
    }
}

/// Requirement on a capability in an arbitrary namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericRequire {
    pub namespace: String,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default = "default_true")]
    pub effective: bool,
}

impl GenericRequire {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: None,
            optional: false,
            cardinality: Cardinality::Single,
            effective: true,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.cardinality = Cardinality::Multiple;
        self
    }

    /// Inactive requirements are carried but never resolved.
    pub fn inactive(mut self) -> Self {
        self.effective = false;
        self
    }

    pub fn matches(&self, capability: &GenericCapability) -> bool {
        capability.namespace == self.namespace
            && self
                .filter
                .as_ref()
                .map_or(true, |f| f.matches(&capability.attributes))
    }
}

/// A fragment's requirement on its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequirement {
    pub name: String,
    #[serde(default)]
    pub version: VersionRange,
}

impl HostRequirement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionRange::any(),
        }
    }

    pub fn version(mut self, range: VersionRange) -> Self {
        self.version = range;
        self
    }

    pub fn matches(&self, host: &Module) -> bool {
        !host.is_fragment() && host.name == self.name && self.version.contains(&host.version)
    }
}

impl fmt::Display for HostRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {} {}", self.name, self.version)
    }
}
