//! Database configuration surface (ambient).

use serde::Deserialize;

use crate::error::{GraphError, Result};

/// Which `KvStore` backend the root facade should construct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Fjall,
    Redb,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Memory
    }
}

/// Vector subsystem configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorConfig {
    pub enabled: bool,
    pub dimensions: usize,
    /// Queue depth for the background embed worker; `0` disables async
    /// embedding (embeds run synchronously inline with `put`).
    pub embed_queue_depth: usize,
}

/// Journal subsystem configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub enabled: bool,
    /// Entries older than this many nanoseconds are eligible for trim by a
    /// caller-driven retention sweep; the engine itself never trims on its
    /// own.
    pub retention_ns: Option<u64>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention_ns: None,
        }
    }
}

/// Top-level configuration for a [`crate`]-backed database.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
    /// Applied to any pattern whose own `limit` is absent or zero.
    pub default_pattern_limit: Option<usize>,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub facets_enabled: bool,
    #[serde(default)]
    pub vector: VectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            default_pattern_limit: None,
            journal: JournalConfig::default(),
            facets_enabled: false,
            vector: VectorConfig::default(),
        }
    }
}

impl Config {
    /// Rejects configurations that can never be satisfied: an enabled
    /// vector subsystem with no dimensionality, or a backend that cannot
    /// back the subsystems requested of it.
    pub fn validate(&self) -> Result<()> {
        if self.vector.enabled && self.vector.dimensions == 0 {
            return Err(GraphError::Store(
                "vector subsystem enabled with dimensions == 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn vector_enabled_with_zero_dimensions_is_rejected() {
        let mut config = Config::default();
        config.vector.enabled = true;
        config.vector.dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn vector_enabled_with_dimensions_validates() {
        let mut config = Config::default();
        config.vector.enabled = true;
        config.vector.dimensions = 3;
        assert!(config.validate().is_ok());
    }
}
