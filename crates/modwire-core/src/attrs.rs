//! Typed attribute maps carried by capabilities and environments.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A single attribute value. Filters compare against it according to its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Long(i64),
    List(Vec<String>),
    Str(String),
    #[serde(skip_deserializing)]
    Version(Version),
}

impl AttrValue {
    /// Build a value from fixture text, typing `*version` keys as versions.
    pub fn typed(key: &str, raw: &str) -> Self {
        if key == "version" || key.ends_with("-version") {
            if let Ok(v) = Version::parse(raw) {
                return Self::Version(v);
            }
        }
        Self::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<Version> for AttrValue {
    fn from(value: Version) -> Self {
        Self::Version(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Version(v) => write!(f, "{v}"),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Attribute map. Ordered so that iteration (and therefore output) is stable.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Re-type string values of `*version` keys as versions, in place.
///
/// Fixture formats carry every attribute as text; filters comparing with
/// `>=`/`<=` need the version typed to order `1.10` after `1.9`.
pub fn retype_versions(attrs: &mut Attributes) {
    for (key, value) in attrs.iter_mut() {
        if let AttrValue::Str(raw) = value {
            if let AttrValue::Version(v) = AttrValue::typed(key, raw) {
                *value = AttrValue::Version(v);
            }
        }
    }
}
