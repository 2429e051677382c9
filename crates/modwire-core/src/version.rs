//! Module version parsing, comparison, and range matching.
//!
//! Versions have the shape `major.minor.micro[.qualifier]`:
//! - Missing numeric segments are zero, so `1` == `1.0` == `1.0.0`
//! - Numeric segments compare as numbers
//! - The qualifier compares lexically; an empty qualifier sorts lowest
//!
//! Ranges use interval notation: `[1.0,2.0)`, `(1.0,2.0]`, `[1.5,1.5]`.
//! A bare version `1.0` means "1.0 or later" and the empty string means any
//! version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use modwire_util::errors::ModwireError;
use serde::{Deserialize, Serialize};

/// A parsed module version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// The `0.0.0` version used when a module declares none.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    pub fn parse(input: &str) -> Result<Self, ModwireError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let invalid = |message: &str| ModwireError::Version {
            input: input.to_string(),
            message: message.to_string(),
        };

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for (slot, label) in numbers.iter_mut().zip(["major", "minor", "micro"]) {
            match parts.next() {
                Some(part) => {
                    *slot = part
                        .parse::<u64>()
                        .map_err(|_| invalid(&format!("{label} is not a number")))?;
                }
                None => break,
            }
        }
        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("qualifier may only contain [A-Za-z0-9_-]"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }
}

impl FromStr for Version {
    type Err = ModwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ModwireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version range expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    pub lower: Bound,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl VersionRange {
    /// Matches every version.
    pub fn any() -> Self {
        Self::at_least(Version::empty())
    }

    pub fn at_least(version: Version) -> Self {
        Self {
            lower: Bound {
                version,
                inclusive: true,
            },
            upper: None,
        }
    }

    pub fn exact(version: Version) -> Self {
        Self {
            lower: Bound {
                version: version.clone(),
                inclusive: true,
            },
            upper: Some(Bound {
                version,
                inclusive: true,
            }),
        }
    }

    pub fn parse(spec: &str) -> Result<Self, ModwireError> {
        let s = spec.trim();
        if s.is_empty() {
            return Ok(Self::any());
        }
        if !s.starts_with('[') && !s.starts_with('(') {
            return Ok(Self::at_least(Version::parse(s)?));
        }

        let invalid = |message: &str| ModwireError::Version {
            input: spec.to_string(),
            message: message.to_string(),
        };

        if !s.ends_with(']') && !s.ends_with(')') {
            return Err(invalid("range must end with `]` or `)`"));
        }
        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];
        let Some((lower, upper)) = inner.split_once(',') else {
            return Err(invalid("range must contain a `,`"));
        };

        let lower = Version::parse(lower)?;
        let upper = Version::parse(upper)?;
        if upper < lower {
            return Err(invalid("upper bound is below lower bound"));
        }
        Ok(Self {
            lower: Bound {
                version: lower,
                inclusive: open_inclusive,
            },
            upper: Some(Bound {
                version: upper,
                inclusive: close_inclusive,
            }),
        })
    }

    /// Check if a version satisfies this range.
    pub fn contains(&self, version: &Version) -> bool {
        let cmp = version.cmp(&self.lower.version);
        if self.lower.inclusive {
            if cmp == Ordering::Less {
                return false;
            }
        } else if cmp != Ordering::Greater {
            return false;
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// True if this range is the unbounded "any version" range.
    pub fn is_any(&self) -> bool {
        self.upper.is_none() && self.lower.inclusive && self.lower.version == Version::empty()
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionRange {
    type Err = ModwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = ModwireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            None => write!(f, "{}", self.lower.version),
            Some(upper) => write!(
                f,
                "{}{},{}{}",
                if self.lower.inclusive { '[' } else { '(' },
                self.lower.version,
                upper.version,
                if upper.inclusive { ']' } else { ')' }
            ),
        }
    }
}
