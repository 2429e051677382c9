//! Environment facts the resolver matches modules against.

use serde::{Deserialize, Serialize};

use crate::attrs::{retype_versions, Attributes};
use crate::filter::Filter;

/// One platform variant: its execution environments and filterable properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProperties {
    #[serde(default, rename = "execution-environments")]
    pub execution_environments: Vec<String>,
    #[serde(default)]
    pub properties: Attributes,
}

impl PlatformProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execution_environment(mut self, name: impl Into<String>) -> Self {
        self.execution_environments.push(name.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<crate::attrs::AttrValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn provides_any(&self, required: &[String]) -> bool {
        required.is_empty()
            || required
                .iter()
                .any(|ee| self.execution_environments.contains(ee))
    }
}

/// Alternative platform variants; modules match against the first variant
/// their platform filter accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub alternatives: Vec<PlatformProperties>,
}

impl Environment {
    pub fn new(alternatives: Vec<PlatformProperties>) -> Self {
        Self { alternatives }
    }

    pub fn single(properties: PlatformProperties) -> Self {
        Self::new(vec![properties])
    }

    /// Pick the first alternative matching `filter`. With no filter the first
    /// alternative is chosen; an environment without alternatives behaves as
    /// one empty property set.
    pub fn select(&self, filter: Option<&Filter>) -> Option<PlatformProperties> {
        if self.alternatives.is_empty() {
            let empty = PlatformProperties::default();
            return match filter {
                Some(f) if !f.matches(&empty.properties) => None,
                _ => Some(empty),
            };
        }
        self.alternatives
            .iter()
            .find(|alt| filter.map_or(true, |f| f.matches(&alt.properties)))
            .cloned()
    }

    /// Type `*version` properties loaded from text fixtures.
    pub fn normalize(&mut self) {
        for alt in &mut self.alternatives {
            retype_versions(&mut alt.properties);
        }
    }
}
