//! Runtime configuration loaded from `voxpatch.toml`.
//!
//! ```toml
//! [resolver]
//! fuzzy_window = 0x4000
//! max_reported_candidates = 8
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resolver::constants::{DEFAULT_FUZZY_WINDOW, DEFAULT_MAX_REPORTED_CANDIDATES};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub resolver: ResolverConfig,
}

/// Configuration for the offset resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Bytes searched on each side of a fuzzy window centre
    pub fuzzy_window: usize,
    /// Cap on candidate offsets kept in ambiguity diagnostics
    pub max_reported_candidates: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_window: DEFAULT_FUZZY_WINDOW,
            max_reported_candidates: DEFAULT_MAX_REPORTED_CANDIDATES,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if config.resolver.max_reported_candidates == 0 {
            return Err(Error::Config(
                "resolver.max_reported_candidates must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
