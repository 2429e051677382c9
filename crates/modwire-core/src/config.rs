use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Resolver tuning loaded from a TOML file such as `modwire.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Combination search budget. When unset it is derived from the number
    /// of modules in the batch, see [`ResolverConfig::search_timeout`].
    #[serde(default, rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Ambiguous constraints tracked individually before constraints with
    /// identical candidate sets are merged into one search slot.
    #[serde(default = "default_max_multiple_suppliers", rename = "max-multiple-suppliers")]
    pub max_multiple_suppliers: usize,

    /// Module name whose capabilities are preferred over all others.
    #[serde(default, rename = "preferred-module")]
    pub preferred_module: Option<String>,

    /// Attach fragments that add constraints to already-resolved hosts
    /// instead of rejecting them.
    #[serde(default)]
    pub relaxed: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_multiple_suppliers: default_max_multiple_suppliers(),
            preferred_module: None,
            relaxed: false,
        }
    }
}

fn default_max_multiple_suppliers() -> usize {
    10
}

const BASE_TIMEOUT_MS: u64 = 30_000;
const PER_MODULE_TIMEOUT_MS: u64 = 30;
const MAX_TIMEOUT_MS: u64 = 90_000;

impl ResolverConfig {
    /// Load the configuration from `path`, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> miette::Result<Self> {
        if path.is_file() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                modwire_util::errors::ModwireError::Config {
                    message: format!("Failed to read {}: {e}", path.display()),
                }
            })?;
            Self::parse_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            modwire_util::errors::ModwireError::Config {
                message: format!("Failed to parse resolver config: {e}"),
            }
            .into()
        })
    }

    /// Combination search budget for a batch of `module_count` modules.
    pub fn search_timeout(&self, module_count: usize) -> Duration {
        let ms = self.timeout_ms.unwrap_or_else(|| {
            let derived = BASE_TIMEOUT_MS.saturating_add(PER_MODULE_TIMEOUT_MS * module_count as u64);
            derived.min(MAX_TIMEOUT_MS)
        });
        Duration::from_millis(ms)
    }
}
