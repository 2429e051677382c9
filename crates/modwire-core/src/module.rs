//! Modules: the versioned units the resolver wires together.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, PackageExport};
use crate::filter::Filter;
use crate::requirement::{HostRequirement, PackageImport, Requirement};
use crate::version::Version;

/// Catalog-assigned unique module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution state of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    #[default]
    Unresolved,
    Resolving,
    Resolved,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unresolved => "unresolved",
            Self::Resolving => "resolving",
            Self::Resolved => "resolved",
        })
    }
}

/// Host policy for attaching fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentAttachment {
    /// Fragments may attach at any time, including to a resolved host.
    #[default]
    Always,
    /// Fragments may only attach while the host itself is being resolved.
    ResolveTime,
    Never,
}

/// One native library clause, selected when its filter matches the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCodeClause {
    pub paths: Vec<String>,
    #[serde(default)]
    pub filter: Option<Filter>,
}

/// A module as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Present iff this module is a fragment.
    #[serde(default)]
    pub host: Option<HostRequirement>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default, rename = "fragment-attachment")]
    pub fragment_attachment: FragmentAttachment,
    /// Any one of these must be provided by the environment.
    #[serde(default, rename = "execution-environments")]
    pub required_execution_environments: Vec<String>,
    #[serde(default, rename = "platform-filter")]
    pub platform_filter: Option<Filter>,
    #[serde(default, rename = "native-code")]
    pub native_code: Vec<NativeCodeClause>,
    #[serde(default, rename = "native-code-optional")]
    pub native_code_optional: bool,
    /// Reason the catalog disabled this module, if any.
    #[serde(default)]
    pub disabled: Option<String>,
    #[serde(default)]
    pub uninstalled: bool,
    #[serde(default)]
    pub state: ModuleState,
}

impl Module {
    pub fn new(id: u64, name: impl Into<String>, version: Version) -> Self {
        Self {
            id: ModuleId(id),
            name: name.into(),
            version,
            requirements: Vec::new(),
            capabilities: Vec::new(),
            host: None,
            singleton: false,
            fragment_attachment: FragmentAttachment::Always,
            required_execution_environments: Vec::new(),
            platform_filter: None,
            native_code: Vec::new(),
            native_code_optional: false,
            disabled: None,
            uninstalled: false,
            state: ModuleState::Unresolved,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.host.is_some()
    }

    pub fn requires(mut self, requirement: impl Into<Requirement>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn provides(mut self, capability: impl Into<Capability>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Shorthand for a plain import of `package`.
    pub fn imports(self, package: &str) -> Self {
        self.requires(PackageImport::new(package))
    }

    /// Shorthand for an export of `package` at the module's version.
    pub fn exports(self, package: &str) -> Self {
        let version = self.version.clone();
        self.provides(PackageExport::new(package, version))
    }

    pub fn fragment_of(mut self, host: HostRequirement) -> Self {
        self.host = Some(host);
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn attachment(mut self, policy: FragmentAttachment) -> Self {
        self.fragment_attachment = policy;
        self
    }

    pub fn package_exports(&self) -> impl Iterator<Item = &PackageExport> {
        self.capabilities.iter().filter_map(Capability::as_package)
    }

    pub fn exports_package(&self, package: &str) -> bool {
        self.package_exports().any(|e| e.name == package)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.name, self.version, self.id)
    }
}
