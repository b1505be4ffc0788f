//! Neighbour search in both directions.

use serde::{Deserialize, Serialize};

use super::resolve_and_walk;
use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::model::{Direction, Entity, EntityId, EntityLocator, RelId};
use crate::storage::{Hop, StorageBackend};
use crate::{Error, Partial, Result};

/// One entity reached from the center, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    pub entity: Entity,
    /// Type of the edge it was first reached over.
    pub rel_type: String,
    /// Direction of that edge as seen from `from`.
    pub direction: Direction,
    /// Hops from the center.
    pub depth: u32,
    /// The entity on the near side of the edge (the center at depth 1).
    pub from: EntityId,
    pub relationship: RelId,
}

impl From<Hop> for Neighbor {
    fn from(hop: Hop) -> Self {
        let direction = hop.direction();
        Self {
            entity: hop.entity,
            rel_type: hop.via.rel_type,
            direction,
            depth: hop.depth,
            from: hop.from,
            relationship: hop.via.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborResult {
    pub center: Entity,
    /// Each reachable entity once, in breadth-first order. Never the center.
    pub neighbors: Vec<Neighbor>,
    pub depth: u32,
    /// The node cap cut the result short.
    pub truncated: bool,
}

/// Entities within `max_depth` hops of `locator` over edges of any type and
/// direction.
#[tracing::instrument(skip_all, fields(locator = %locator, max_depth = max_depth))]
pub async fn find_neighbors<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    cancel: &CancelToken,
) -> Result<NeighborResult> {
    let (walk, depth) =
        resolve_and_walk(backend, config, locator, max_depth, Direction::Both, &[], cancel).await?;

    let cancelled = walk.cancelled;
    let result = NeighborResult {
        center: walk.origin,
        neighbors: walk.hops.into_iter().map(Neighbor::from).collect(),
        depth,
        truncated: walk.truncated,
    };
    if cancelled {
        return Err(Error::Cancelled { partial: Some(Box::new(Partial::Neighbors(result))) });
    }
    Ok(result)
}
