//! Directional closure: dependencies follow outgoing edges, dependents
//! follow incoming ones (impact analysis).

use serde::{Deserialize, Serialize};

use super::{Neighbor, resolve_and_walk};
use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::model::{Direction, Entity, EntityLocator};
use crate::storage::StorageBackend;
use crate::{Error, Partial, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyDirection {
    Dependencies,
    Dependents,
}

impl DependencyDirection {
    fn walk_direction(self) -> Direction {
        match self {
            DependencyDirection::Dependencies => Direction::Outgoing,
            DependencyDirection::Dependents => Direction::Incoming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyResult {
    pub target: Entity,
    pub results: Vec<Neighbor>,
    pub depth: u32,
    pub direction: DependencyDirection,
    /// The filter that was applied; empty means every type.
    pub rel_types: Vec<String>,
    pub truncated: bool,
}

/// Transitive targets of `locator`'s outgoing edges.
pub async fn find_dependencies<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    rel_types: &[String],
    cancel: &CancelToken,
) -> Result<DependencyResult> {
    closure(backend, config, locator, max_depth, rel_types, DependencyDirection::Dependencies, cancel)
        .await
}

/// Transitive sources of `locator`'s incoming edges: what breaks if it changes.
pub async fn find_dependents<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    rel_types: &[String],
    cancel: &CancelToken,
) -> Result<DependencyResult> {
    closure(backend, config, locator, max_depth, rel_types, DependencyDirection::Dependents, cancel)
        .await
}

#[tracing::instrument(skip_all, fields(locator = %locator, direction = ?direction, max_depth = max_depth))]
async fn closure<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    rel_types: &[String],
    direction: DependencyDirection,
    cancel: &CancelToken,
) -> Result<DependencyResult> {
    let (walk, depth) = resolve_and_walk(
        backend,
        config,
        locator,
        max_depth,
        direction.walk_direction(),
        rel_types,
        cancel,
    )
    .await?;

    let cancelled = walk.cancelled;
    let result = DependencyResult {
        target: walk.origin,
        results: walk.hops.into_iter().map(Neighbor::from).collect(),
        depth,
        direction,
        rel_types: rel_types.to_vec(),
        truncated: walk.truncated,
    };
    if cancelled {
        return Err(Error::Cancelled { partial: Some(Box::new(Partial::Dependencies(result))) });
    }
    Ok(result)
}
