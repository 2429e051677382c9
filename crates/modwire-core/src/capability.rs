//! Capabilities a module offers to the requirements of other modules.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;
use crate::requirement::Namespace;
use crate::version::Version;

fn default_true() -> bool {
    true
}

/// A capability declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capability {
    Package(PackageExport),
    Generic(GenericCapability),
}

impl Capability {
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Package(_) => Namespace::Package,
            Self::Generic(g) => Namespace::Generic(g.namespace.clone()),
        }
    }

    /// Key the capability is filed under in the resolver's indexes.
    pub fn index_key(&self) -> &str {
        match self {
            Self::Package(p) => &p.name,
            Self::Generic(g) => &g.namespace,
        }
    }

    pub fn uses(&self) -> &BTreeSet<String> {
        match self {
            Self::Package(p) => &p.uses,
            Self::Generic(g) => &g.uses,
        }
    }

    pub fn is_effective(&self) -> bool {
        match self {
            Self::Package(p) => p.effective,
            Self::Generic(g) => g.effective,
        }
    }

    pub fn as_package(&self) -> Option<&PackageExport> {
        match self {
            Self::Package(p) => Some(p),
            Self::Generic(_) => None,
        }
    }

    pub fn as_generic(&self) -> Option<&GenericCapability> {
        match self {
            Self::Package(_) => None,
            Self::Generic(g) => Some(g),
        }
    }

    /// True if `other` offers the same thing, used to fold fragment
    /// capabilities into a host that already declares them.
    pub fn same_offer(&self, other: &Capability) -> bool {
        match (self, other) {
            (Self::Package(a), Self::Package(b)) => a.name == b.name && a.version == b.version,
            (Self::Generic(a), Self::Generic(b)) => {
                a.namespace == b.namespace && a.attributes == b.attributes
            }
            _ => false,
        }
    }
}

impl From<PackageExport> for Capability {
    fn from(value: PackageExport) -> Self {
        Self::Package(value)
    }
}

impl From<GenericCapability> for Capability {
    fn from(value: GenericCapability) -> Self {
        Self::Generic(value)
    }
}

/// Export of a named package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageExport {
    pub name: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Attribute names an import must specify to match this export.
    #[serde(default)]
    pub mandatory: Vec<String>,
    /// Packages the implementation of this package depends on.
    #[serde(default)]
    pub uses: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub effective: bool,
}

impl PackageExport {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            attributes: BTreeMap::new(),
            mandatory: Vec::new(),
            uses: BTreeSet::new(),
            effective: true,
        }
    }

    pub fn uses<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses.extend(packages.into_iter().map(Into::into));
        self
    }
}

/// A capability in an arbitrary namespace, matched by filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCapability {
    pub namespace: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub uses: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub effective: bool,
}

impl GenericCapability {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attributes: Attributes::new(),
            uses: BTreeSet::new(),
            effective: true,
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<crate::attrs::AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn uses<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses.extend(packages.into_iter().map(Into::into));
        self
    }
}
