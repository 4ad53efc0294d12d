//! Configuration for outline behavior.
//!
//! Built in code or parsed from TOML supplied by the host application.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineConfig {
    /// Predecessor remapping behavior
    #[serde(default)]
    pub remap: RemapConfig,

    /// Persistence submission behavior
    #[serde(default)]
    pub submit: SubmitConfig,

    /// Ancestor roll-up behavior
    #[serde(default)]
    pub rollup: RollupConfig,
}

impl OutlineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a configuration file, or defaults if the path is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Which structural operations rewrite predecessor references.
///
/// Reorder operations (move up/down and drag) deliberately leave
/// predecessors untouched, matching the desktop scheduling tools users
/// compare against; `on_reorder` opts into symmetric behavior instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapConfig {
    #[serde(default = "default_true")]
    pub on_indent: bool,

    #[serde(default = "default_true")]
    pub on_outdent: bool,

    #[serde(default)]
    pub on_reorder: bool,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            on_indent: true,
            on_outdent: true,
            on_reorder: false,
        }
    }
}

/// Persistence submission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Retry a failed batch once when the failure is transient
    #[serde(default = "default_true")]
    pub retry_transient: bool,

    /// Ask the store not to echo our own writes over the live channel
    #[serde(default = "default_true")]
    pub suppress_echo: bool,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            retry_transient: true,
            suppress_echo: true,
        }
    }
}

/// Ancestor roll-up configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Recompute ancestor dates/progress after commits and edits
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
