//! Traversal engine: read-only lookups and bounded graph walks.
//!
//! Every operation here resolves its locator and walks inside a single
//! read-only transaction, so it sees one consistent snapshot and never a
//! half-applied upsert. The actual breadth-first search is the backend's
//! `walk` primitive; this module shapes what comes back.
//!
//! ```text
//! find_neighbors      ─┐
//! find_dependencies   ─┼─► resolve(locator) ─► backend.walk(spec) ─► shape result
//! find_dependents     ─┤
//! get_entity_subgraph ─┘
//! ```

mod dependencies;
mod neighbors;
mod subgraph;

pub use dependencies::{DependencyDirection, DependencyResult, find_dependencies, find_dependents};
pub use neighbors::{Neighbor, NeighborResult, find_neighbors};
pub use subgraph::{Subgraph, SubgraphEdge, SubgraphNode, get_entity_subgraph};

use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::model::{Direction, Entity, EntityLocator};
use crate::storage::{StorageBackend, Walk, WalkSpec, single_match};
use crate::tx::TxMode;
use crate::{Error, Result};

/// Depth actually used for a requested `max_depth`: anything below 1 walks
/// one hop, anything above `ceiling` is clamped.
pub fn effective_depth(max_depth: i64, ceiling: u32) -> u32 {
    if max_depth <= 0 {
        return 1;
    }
    let ceiling = ceiling.max(1);
    u32::try_from(max_depth).map_or(ceiling, |d| d.min(ceiling))
}

/// Resolve a locator to exactly one entity.
pub(crate) async fn resolve<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    locator: &EntityLocator,
) -> Result<Entity> {
    let candidates = backend.find_entities(tx, locator).await?;
    single_match(locator, candidates)?
        .ok_or_else(|| Error::NotFound(format!("entity {locator}")))
}

/// Look up one entity by locator. Pure read.
#[tracing::instrument(skip_all, fields(locator = %locator))]
pub async fn get_entity_details<B: StorageBackend>(
    backend: &B,
    locator: &EntityLocator,
    cancel: &CancelToken,
) -> Result<Entity> {
    cancel.check()?;
    locator.validate("entity")?;

    let tx = backend.begin_tx(TxMode::ReadOnly).await?;
    let entity = resolve(backend, &tx, locator).await;
    backend.commit_tx(tx).await?;
    entity
}

/// Resolve `locator` and walk from it, all against one snapshot. Returns the
/// walk and the depth it used.
pub(crate) async fn resolve_and_walk<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    direction: Direction,
    rel_types: &[String],
    cancel: &CancelToken,
) -> Result<(Walk, u32)> {
    cancel.check()?;
    locator.validate("entity")?;
    if rel_types.iter().any(|t| t.trim().is_empty()) {
        return Err(Error::Validation("relationship type filter contains an empty type".into()));
    }

    let depth = effective_depth(max_depth, config.max_traversal_depth);
    if i64::from(depth) < max_depth {
        tracing::debug!(requested = max_depth, used = depth, "traversal depth clamped");
    }
    let spec = WalkSpec::new(direction, depth, config.max_traversal_nodes)
        .with_rel_types(rel_types.iter().cloned());

    let tx = backend.begin_tx(TxMode::ReadOnly).await?;
    let walk = match resolve(backend, &tx, locator).await {
        Ok(center) => backend.walk(&tx, center.id, &spec, cancel).await,
        Err(e) => Err(e),
    };
    backend.commit_tx(tx).await?;

    let walk = walk?;
    tracing::debug!(
        origin = %walk.origin.id,
        reached = walk.hops.len(),
        depth,
        truncated = walk.truncated,
        "traversal finished"
    );
    Ok((walk, depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_effective_depth() {
        assert_eq!(effective_depth(0, 10), 1);
        assert_eq!(effective_depth(-5, 10), 1);
        assert_eq!(effective_depth(3, 10), 3);
        assert_eq!(effective_depth(50, 10), 10);
        assert_eq!(effective_depth(i64::MAX, 10), 10);
    }

    proptest! {
        #[test]
        fn depth_is_always_within_bounds(requested in any::<i64>(), ceiling in 1u32..64) {
            let d = effective_depth(requested, ceiling);
            prop_assert!(d >= 1);
            prop_assert!(d <= ceiling);
            if requested <= 0 {
                prop_assert_eq!(d, 1);
            }
        }
    }
}
