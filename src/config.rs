//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tunables for the traversal and batch engines.
///
/// Every field has a default, so partial JSON (or an empty environment)
/// yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// Neighbour cap per traversal. Env: `ARCHGRAPH_MAX_TRAVERSAL_NODES`, default 100.
    pub max_traversal_nodes: usize,
    /// Depth ceiling for traversals. Env: `ARCHGRAPH_MAX_TRAVERSAL_DEPTH`, default 10.
    pub max_traversal_depth: u32,
    /// Items a batch runs at once. Env: `ARCHGRAPH_BATCH_CONCURRENCY`, default 8.
    pub batch_concurrency: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_traversal_nodes: 100,
            max_traversal_depth: 10,
            batch_concurrency: 8,
        }
    }
}

impl GraphConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_traversal_nodes: parse_env("ARCHGRAPH_MAX_TRAVERSAL_NODES", defaults.max_traversal_nodes)?,
            max_traversal_depth: parse_env("ARCHGRAPH_MAX_TRAVERSAL_DEPTH", defaults.max_traversal_depth)?,
            batch_concurrency: parse_env("ARCHGRAPH_BATCH_CONCURRENCY", defaults.batch_concurrency)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_traversal_nodes == 0 {
            return Err(Error::Config("maxTraversalNodes must be at least 1".into()));
        }
        if self.max_traversal_depth == 0 {
            return Err(Error::Config("maxTraversalDepth must be at least 1".into()));
        }
        if self.batch_concurrency == 0 {
            return Err(Error::Config("batchConcurrency must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("invalid {name} '{val}': {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = GraphConfig::from_json(r#"{"batchConcurrency": 2}"#).unwrap();
        assert_eq!(config.batch_concurrency, 2);
        assert_eq!(config.max_traversal_nodes, 100);
        assert_eq!(config.max_traversal_depth, 10);
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let err = GraphConfig::from_json(r#"{"maxTraversalNodes": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_garbage_json_is_a_config_error() {
        assert!(matches!(GraphConfig::from_json("{"), Err(Error::Config(_))));
    }
}
