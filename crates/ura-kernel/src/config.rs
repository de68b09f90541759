//! Kernel configuration.
//!
//! ```toml
//! [store]
//! duplicatePolicy = "overwrite"
//!
//! [resolution]
//! maxChainLength = 64
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// What a store builder does when the same key is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Sealing fails with a duplicate-registration problem.
    #[default]
    Reject,
    /// The later registration replaces the earlier one in place.
    Overwrite,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" | "error" => Ok(Self::Reject),
            "overwrite" | "last_write_wins" | "last-write-wins" => Ok(Self::Overwrite),
            _ => Err(format!("unknown duplicate policy: {s}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolutionConfig {
    /// Upper bound on the number of steps a chain may have.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chain_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KernelConfig {
    pub store: StoreConfig,
    pub resolution: ResolutionConfig,
}

impl KernelConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|source| ConfigError::ParseToml { source })?;
        if config.resolution.max_chain_length == Some(0) {
            return Err(ConfigError::Invalid(
                "resolution.maxChainLength must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
