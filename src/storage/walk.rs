//! Bounded breadth-first walk, shared by all backends.
//!
//! A backend implements [`WalkSource`] over whatever it holds a consistent
//! view of (a pinned snapshot, a locked connection) and hands it to
//! [`walk`]. The walk itself never touches storage directly, so every
//! backend gets identical ordering, dedup and capping.

use hashbrown::HashSet;

use crate::cancel::CancelToken;
use crate::model::{Direction, Entity, EntityId, RelId, Relationship};
use crate::{Error, Result};

/// Synchronous read access to one consistent view of the graph.
pub trait WalkSource {
    fn entity(&self, id: EntityId) -> Result<Option<Entity>>;

    /// Relationships touching `id` in the given direction. A self-loop is
    /// reported once.
    fn edges(&self, id: EntityId, dir: Direction) -> Result<Vec<Relationship>>;
}

/// What to walk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkSpec {
    pub direction: Direction,
    /// Empty means every type.
    pub rel_types: Vec<String>,
    /// Hops from the origin, at least 1.
    pub max_depth: u32,
    /// Cap on entities reached, origin excluded.
    pub node_limit: usize,
}

impl WalkSpec {
    pub fn new(direction: Direction, max_depth: u32, node_limit: usize) -> Self {
        Self { direction, rel_types: Vec::new(), max_depth, node_limit }
    }

    pub fn with_rel_types(mut self, rel_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.rel_types = rel_types.into_iter().map(Into::into).collect();
        self
    }

    fn allows(&self, rel_type: &str) -> bool {
        self.rel_types.is_empty() || self.rel_types.iter().any(|t| t == rel_type)
    }
}

/// One entity reached by a walk, and the edge it was first reached over.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub entity: Entity,
    /// The already-reached entity on the near side of `via`.
    pub from: EntityId,
    pub via: Relationship,
    pub depth: u32,
}

impl Hop {
    /// Direction of `via` as seen from `from`.
    pub fn direction(&self) -> Direction {
        self.via.direction_from(self.from)
    }
}

/// Everything a walk collected.
#[derive(Debug, Clone, PartialEq)]
pub struct Walk {
    pub origin: Entity,
    /// Reached entities in BFS order; never contains the origin.
    pub hops: Vec<Hop>,
    /// Every traversed edge whose endpoints are both in the result,
    /// deduplicated.
    pub edges: Vec<Relationship>,
    /// The node limit cut the walk short.
    pub truncated: bool,
    /// The cancel token fired before the walk finished.
    pub cancelled: bool,
}

/// Walk from `origin` following `spec`.
///
/// Fails with `NotFound` if the origin does not exist. Cancellation is not
/// an error here: the walk stops and reports `cancelled` with whatever it
/// had collected.
pub fn walk<S: WalkSource + ?Sized>(
    source: &S,
    origin: EntityId,
    spec: &WalkSpec,
    cancel: &CancelToken,
) -> Result<Walk> {
    let origin_entity = source
        .entity(origin)?
        .ok_or_else(|| Error::NotFound(format!("entity {origin}")))?;

    let mut result = Walk {
        origin: origin_entity,
        hops: Vec::new(),
        edges: Vec::new(),
        truncated: false,
        cancelled: false,
    };
    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut seen_edges: HashSet<RelId> = HashSet::new();
    seen.insert(origin);

    let mut frontier = vec![origin];
    'levels: for depth in 1..=spec.max_depth.max(1) {
        let mut next = Vec::new();

        for &current in &frontier {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break 'levels;
            }

            let mut rels = source.edges(current, spec.direction)?;
            rels.sort_by_key(|r| r.id);

            for rel in rels {
                if !spec.allows(&rel.rel_type) {
                    continue;
                }
                let Some(other) = rel.other_end(current) else { continue };
                if other == current {
                    continue;
                }

                if seen.contains(&other) {
                    if seen_edges.insert(rel.id) {
                        result.edges.push(rel);
                    }
                    continue;
                }
                if result.hops.len() >= spec.node_limit {
                    result.truncated = true;
                    continue;
                }
                // Dangling edge: the far end vanished. Skip rather than fail.
                let Some(entity) = source.entity(other)? else { continue };

                seen.insert(other);
                if seen_edges.insert(rel.id) {
                    result.edges.push(rel.clone());
                }
                result.hops.push(Hop { entity, from: current, via: rel, depth });
                next.push(other);
            }
        }

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    tracing::trace!(
        origin = %origin,
        hops = result.hops.len(),
        edges = result.edges.len(),
        truncated = result.truncated,
        cancelled = result.cancelled,
        "walk finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    /// Tiny adjacency-list source for exercising the walk on its own.
    #[derive(Default)]
    struct Fixture {
        entities: HashMap<EntityId, Entity>,
        rels: Vec<Relationship>,
    }

    impl Fixture {
        fn entity(mut self, id: u64) -> Self {
            self.entities.insert(EntityId(id), Entity::new(EntityId(id)).with_labels(["Function"]));
            self
        }

        fn edge(mut self, id: u64, src: u64, dst: u64, ty: &str) -> Self {
            self.rels.push(Relationship::new(RelId(id), EntityId(src), EntityId(dst), ty));
            self
        }
    }

    impl WalkSource for Fixture {
        fn entity(&self, id: EntityId) -> Result<Option<Entity>> {
            Ok(self.entities.get(&id).cloned())
        }

        fn edges(&self, id: EntityId, dir: Direction) -> Result<Vec<Relationship>> {
            Ok(self
                .rels
                .iter()
                .filter(|r| match dir {
                    Direction::Outgoing => r.src == id,
                    Direction::Incoming => r.dst == id,
                    Direction::Both => r.src == id || r.dst == id,
                })
                .cloned()
                .collect())
        }
    }

    fn ids(walk: &Walk) -> Vec<u64> {
        walk.hops.iter().map(|h| h.entity.id.0).collect()
    }

    #[test]
    fn test_diamond_reaches_each_node_once() {
        // 1 -> 2 -> 4, 1 -> 3 -> 4
        let g = Fixture::default()
            .entity(1).entity(2).entity(3).entity(4)
            .edge(1, 1, 2, "CALLS").edge(2, 1, 3, "CALLS")
            .edge(3, 2, 4, "CALLS").edge(4, 3, 4, "CALLS");

        let spec = WalkSpec::new(Direction::Outgoing, 3, 100);
        let walk = walk(&g, EntityId(1), &spec, &CancelToken::new()).unwrap();

        assert_eq!(ids(&walk), vec![2, 3, 4]);
        assert_eq!(walk.hops[2].depth, 2);
        assert_eq!(walk.hops[2].from, EntityId(2));
        // all four edges join reached entities
        assert_eq!(walk.edges.len(), 4);
    }

    #[test]
    fn test_cycle_never_returns_origin() {
        let g = Fixture::default()
            .entity(1).entity(2)
            .edge(1, 1, 2, "CALLS").edge(2, 2, 1, "CALLS").edge(3, 1, 1, "CALLS");

        let spec = WalkSpec::new(Direction::Both, 5, 100);
        let walk = walk(&g, EntityId(1), &spec, &CancelToken::new()).unwrap();
        assert_eq!(ids(&walk), vec![2]);
    }

    #[test]
    fn test_type_filter_and_direction() {
        let g = Fixture::default()
            .entity(1).entity(2).entity(3).entity(4)
            .edge(1, 1, 2, "CALLS").edge(2, 1, 3, "IMPORTS").edge(3, 4, 1, "CALLS");

        let out = WalkSpec::new(Direction::Outgoing, 1, 100).with_rel_types(["CALLS"]);
        assert_eq!(ids(&walk(&g, EntityId(1), &out, &CancelToken::new()).unwrap()), vec![2]);

        let inc = WalkSpec::new(Direction::Incoming, 1, 100);
        let w = walk(&g, EntityId(1), &inc, &CancelToken::new()).unwrap();
        assert_eq!(ids(&w), vec![4]);
        assert_eq!(w.hops[0].direction(), Direction::Incoming);
    }

    #[test]
    fn test_node_limit_truncates() {
        let mut g = Fixture::default().entity(0);
        for i in 1..=10 {
            g = g.entity(i).edge(i, 0, i, "CONTAINS");
        }
        let spec = WalkSpec::new(Direction::Outgoing, 1, 4);
        let walk = walk(&g, EntityId(0), &spec, &CancelToken::new()).unwrap();
        assert_eq!(walk.hops.len(), 4);
        assert!(walk.truncated);
        assert_eq!(walk.edges.len(), 4);
    }

    #[test]
    fn test_missing_origin_is_not_found() {
        let g = Fixture::default();
        let spec = WalkSpec::new(Direction::Both, 1, 10);
        let err = walk(&g, EntityId(9), &spec, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    /// Fires the token after the first expansion.
    struct TripAfterFirst<'a> {
        graph: &'a Fixture,
        cancel: CancelToken,
    }

    impl WalkSource for TripAfterFirst<'_> {
        fn entity(&self, id: EntityId) -> Result<Option<Entity>> {
            WalkSource::entity(self.graph, id)
        }

        fn edges(&self, id: EntityId, dir: Direction) -> Result<Vec<Relationship>> {
            self.cancel.cancel();
            WalkSource::edges(self.graph, id, dir)
        }
    }

    #[test]
    fn test_cancel_between_levels_keeps_collected_hops() {
        // 1 -> 2 -> 3
        let g = Fixture::default()
            .entity(1).entity(2).entity(3)
            .edge(1, 1, 2, "CALLS").edge(2, 2, 3, "CALLS");
        let cancel = CancelToken::new();
        let source = TripAfterFirst { graph: &g, cancel: cancel.clone() };

        let walk = walk(&source, EntityId(1), &WalkSpec::new(Direction::Outgoing, 3, 10), &cancel).unwrap();
        assert!(walk.cancelled);
        assert_eq!(ids(&walk), vec![2]);
        assert_eq!(walk.edges.len(), 1);
    }

    #[test]
    fn test_cancelled_walk_keeps_origin() {
        let g = Fixture::default().entity(1).entity(2).edge(1, 1, 2, "CALLS");
        let cancel = CancelToken::new();
        cancel.cancel();
        let walk = walk(&g, EntityId(1), &WalkSpec::new(Direction::Both, 2, 10), &cancel).unwrap();
        assert!(walk.cancelled);
        assert!(walk.hops.is_empty());
        assert_eq!(walk.origin.id, EntityId(1));
    }
}
