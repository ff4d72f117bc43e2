//! Configuration for tree construction
//!
//! Values come from a TOML file with a single `[tree]` table:
//!
//! ```toml
//! [tree]
//! max_leaf_size = 4096
//! split_window = 256
//! ```
//!
//! A missing file means defaults. Anything unparsable is an error rather than a
//! silent fallback, since leaf sizing changes the shape of every saved file.

use crate::error::{Result, RopeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upper bound on leaf size in bytes
pub const MAX_LEAF_SIZE: usize = 4096;

/// Default cap on the newline search window around a split midpoint
pub const SPLIT_WINDOW: usize = 256;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Leaf sizing used by construction and by inserts that overflow a leaf.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TreeConfig {
    /// Soft upper bound on bytes per leaf
    #[serde(default = "default_max_leaf_size")]
    pub max_leaf_size: usize,
    /// Largest distance from the midpoint scanned for a newline when splitting
    #[serde(default = "default_split_window")]
    pub split_window: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_leaf_size: default_max_leaf_size(),
            split_window: default_split_window(),
        }
    }
}

impl TreeConfig {
    /// Config with a custom leaf size and the default split window
    pub fn with_max_leaf_size(max_leaf_size: usize) -> Self {
        Self {
            max_leaf_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_leaf_size == 0 {
            return Err(RopeError::Config("max_leaf_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| RopeError::Config(e.to_string()))?;
        config.tree.validate()?;
        Ok(config)
    }

    /// Load from disk; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml(&text)
                    .map_err(|e| RopeError::Config(format!("{}: {}", path.display(), e)))?;
                tracing::debug!(path = %path.display(), ?config, "loaded config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn default_max_leaf_size() -> usize {
    MAX_LEAF_SIZE
}

fn default_split_window() -> usize {
    SPLIT_WINDOW
}
