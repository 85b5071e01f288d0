use std::collections::{BTreeMap, HashMap};

use orbis_common::{ChunkId, EntityId, Point, Rect, SpaceError, WorldConfig};
use orbis_ecs::EntityHandle;

use crate::chunk::Chunk;

/// Occupancy statistics over the leaves of a [`Quadtree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafStats {
    pub leaves: usize,
    /// Leaves holding at least one entity.
    pub occupied: usize,
    pub deepest: u32,
    /// Member count of the fullest leaf.
    pub largest: usize,
}

/// Region quadtree over the square world `[0, world_size)²`.
///
/// Leaves hold their entities as an immutable [`Chunk`] snapshot; empty leaves
/// hold none. A leaf splits into four quadrants once it would exceed
/// `max_values` entities, unless it already sits at `max_depth`. Removal never
/// merges siblings back.
pub struct Quadtree {
    world_size: f32,
    root: Node,
    state: TreeState,
}

enum Node {
    Leaf {
        bounds: Rect,
        depth: u32,
        chunk: Option<Chunk>,
    },
    Branch {
        bounds: Rect,
        children: Box<[Node; 4]>,
    },
}

struct TreeState {
    max_values: usize,
    max_depth: u32,
    next_chunk: u64,
    /// Position each entity was inserted at; removal descends by it.
    positions: HashMap<EntityId, Point>,
}

impl TreeState {
    fn snapshot(&mut self, bounds: Rect, members: Vec<EntityHandle>) -> Option<Chunk> {
        if members.is_empty() {
            return None;
        }
        self.next_chunk += 1;
        Some(Chunk::new(ChunkId(self.next_chunk), bounds, members))
    }
}

impl Node {
    fn leaf(bounds: Rect, depth: u32) -> Self {
        Node::Leaf {
            bounds,
            depth,
            chunk: None,
        }
    }

    fn bounds(&self) -> Rect {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => *bounds,
        }
    }
}

impl Quadtree {
    pub fn new(world_size: f32, max_values: usize, max_depth: u32) -> Result<Self, SpaceError> {
        if !(world_size.is_finite() && world_size > 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "world_size must be positive, got {world_size}"
            )));
        }
        if max_values == 0 {
            return Err(SpaceError::InvalidConfig(
                "quadtree_max_values_count must be at least 1".into(),
            ));
        }
        Ok(Self {
            world_size,
            root: Node::leaf(Rect::square(world_size), 0),
            state: TreeState {
                max_values,
                max_depth,
                next_chunk: 0,
                positions: HashMap::new(),
            },
        })
    }

    /// A tree sized and bounded by a validated `config`.
    pub fn from_config(config: &WorldConfig) -> Result<Self, SpaceError> {
        config.validate()?;
        Self::new(
            config.world_size,
            config.quadtree_max_values_count,
            config.quadtree_max_depth,
        )
    }

    /// Side of the square area the root covers.
    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    /// Occupancy above which a leaf splits.
    pub fn max_values(&self) -> usize {
        self.state.max_values
    }

    /// Depth at which leaves stop splitting.
    pub fn max_depth(&self) -> u32 {
        self.state.max_depth
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.state.positions.len()
    }

    /// Whether no entity is indexed.
    pub fn is_empty(&self) -> bool {
        self.state.positions.is_empty()
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.positions.contains_key(&id)
    }

    /// Position the entity was inserted at.
    pub fn position_of(&self, id: EntityId) -> Option<Point> {
        self.state.positions.get(&id).copied()
    }

    /// Reject positions outside `[0, world_size)` on either axis.
    pub fn check_bounds(&self, p: Point) -> Result<(), SpaceError> {
        let inside = |v: f32| (0.0..self.world_size).contains(&v);
        if inside(p.x) && inside(p.y) {
            Ok(())
        } else {
            Err(SpaceError::OutOfBounds {
                x: p.x,
                y: p.y,
                world_size: self.world_size,
            })
        }
    }

    /// Insert at the entity's current position. Returns `false` if it was already present.
    pub fn insert(&mut self, entity: EntityHandle) -> Result<bool, SpaceError> {
        let pos = entity.position();
        self.check_bounds(pos)?;
        if self.contains(entity.id()) {
            return Ok(false);
        }
        self.state.positions.insert(entity.id(), pos);
        insert_into(&mut self.root, entity, pos, &mut self.state);
        Ok(true)
    }

    /// Insert many entities, all or nothing: if any position is out of bounds,
    /// nothing is inserted. Returns the entities that were not already present.
    pub fn insert_batch<I>(&mut self, entities: I) -> Result<Vec<EntityHandle>, SpaceError>
    where
        I: IntoIterator<Item = EntityHandle>,
    {
        let batch: Vec<(EntityHandle, Point)> = entities
            .into_iter()
            .map(|e| {
                let pos = e.position();
                (e, pos)
            })
            .collect();
        for (_, pos) in &batch {
            self.check_bounds(*pos)?;
        }

        let mut inserted = Vec::with_capacity(batch.len());
        for (entity, pos) in batch {
            if self.state.positions.contains_key(&entity.id()) {
                continue;
            }
            self.state.positions.insert(entity.id(), pos);
            insert_into(&mut self.root, entity.clone(), pos, &mut self.state);
            inserted.push(entity);
        }
        Ok(inserted)
    }

    /// Remove by id, descending by the last known position.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityHandle> {
        let pos = self.state.positions.remove(&id)?;
        let removed = remove_from(&mut self.root, id, pos, &mut self.state);
        if removed.is_none() {
            tracing::warn!(entity = %id, "indexed entity missing from its leaf");
        }
        removed
    }

    /// Chunks whose leaf overlaps `area`. The area may cross the world edges;
    /// each chunk appears once, ordered by id.
    pub fn query_range(&self, area: Rect) -> Vec<Chunk> {
        let mut found = BTreeMap::new();
        for piece in area.wrapped_pieces(self.world_size) {
            collect_chunks(&self.root, &piece, &mut found);
        }
        found.into_values().collect()
    }

    /// Every non-empty chunk, in depth-first quadrant order.
    pub fn chunks(&self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        visit_leaves(&self.root, &mut |_, _, chunk| {
            if let Some(chunk) = chunk {
                chunks.push(chunk.clone());
            }
        });
        chunks
    }

    /// Every indexed entity, leaf by leaf.
    pub fn entities(&self) -> Vec<EntityHandle> {
        self.chunks()
            .iter()
            .flat_map(|c| c.members().iter().cloned())
            .collect()
    }

    /// Depth and occupancy across all leaves.
    pub fn leaf_stats(&self) -> LeafStats {
        let mut stats = LeafStats::default();
        visit_leaves(&self.root, &mut |_, depth, chunk| {
            stats.leaves += 1;
            stats.deepest = stats.deepest.max(depth);
            if let Some(chunk) = chunk {
                stats.occupied += 1;
                stats.largest = stats.largest.max(chunk.len());
            }
        });
        stats
    }
}

/// Index of the quadrant of `bounds` containing `p`, in [`Rect::quadrants`] order.
fn quadrant(bounds: &Rect, p: Point) -> usize {
    let c = bounds.center();
    usize::from(p.x >= c.x) + 2 * usize::from(p.y >= c.y)
}

fn insert_into(node: &mut Node, entity: EntityHandle, pos: Point, state: &mut TreeState) {
    match node {
        Node::Branch { bounds, children } => {
            let i = quadrant(bounds, pos);
            insert_into(&mut children[i], entity, pos, state);
        }
        Node::Leaf {
            bounds,
            depth,
            chunk,
        } => {
            let count = chunk.as_ref().map_or(0, Chunk::len);
            if count < state.max_values || *depth >= state.max_depth {
                let mut members = chunk
                    .as_ref()
                    .map(|c| c.members().to_vec())
                    .unwrap_or_default();
                members.push(entity);
                *chunk = state.snapshot(*bounds, members);
                return;
            }

            let members = chunk
                .take()
                .map(|c| c.members().to_vec())
                .unwrap_or_default();
            let (parent, child_depth) = (*bounds, *depth + 1);
            let [nw, ne, sw, se] = parent.quadrants();
            *node = Node::Branch {
                bounds: parent,
                children: Box::new([
                    Node::leaf(nw, child_depth),
                    Node::leaf(ne, child_depth),
                    Node::leaf(sw, child_depth),
                    Node::leaf(se, child_depth),
                ]),
            };
            for member in members {
                let member_pos = state
                    .positions
                    .get(&member.id())
                    .copied()
                    .unwrap_or_else(|| member.position());
                insert_into(node, member, member_pos, state);
            }
            insert_into(node, entity, pos, state);
        }
    }
}

fn remove_from(
    node: &mut Node,
    id: EntityId,
    pos: Point,
    state: &mut TreeState,
) -> Option<EntityHandle> {
    match node {
        Node::Branch { bounds, children } => {
            let i = quadrant(bounds, pos);
            remove_from(&mut children[i], id, pos, state)
        }
        Node::Leaf { bounds, chunk, .. } => {
            let current = chunk.as_ref()?;
            let removed = current.members().iter().find(|m| m.id() == id)?.clone();
            let rest: Vec<EntityHandle> = current
                .members()
                .iter()
                .filter(|m| m.id() != id)
                .cloned()
                .collect();
            *chunk = state.snapshot(*bounds, rest);
            Some(removed)
        }
    }
}

fn collect_chunks(node: &Node, area: &Rect, found: &mut BTreeMap<ChunkId, Chunk>) {
    if !node.bounds().intersects(area) {
        return;
    }
    match node {
        Node::Leaf {
            chunk: Some(chunk), ..
        } => {
            found.insert(chunk.id(), chunk.clone());
        }
        Node::Leaf { chunk: None, .. } => {}
        Node::Branch { children, .. } => {
            for child in children.iter() {
                collect_chunks(child, area, found);
            }
        }
    }
}

fn visit_leaves<'a, F>(node: &'a Node, f: &mut F)
where
    F: FnMut(&'a Rect, u32, Option<&'a Chunk>),
{
    match node {
        Node::Leaf {
            bounds,
            depth,
            chunk,
        } => f(bounds, *depth, chunk.as_ref()),
        Node::Branch { children, .. } => {
            for child in children.iter() {
                visit_leaves(child, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_ecs::{Entity, EntityKind};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn point(x: f32, y: f32) -> EntityHandle {
        EntityHandle::new(
            Entity::builder(EntityKind::Point, Point::new(x, y))
                .build()
                .unwrap(),
        )
    }

    fn assert_invariants(tree: &Quadtree) {
        let mut seen = HashSet::new();
        visit_leaves(&tree.root, &mut |bounds, depth, chunk| {
            let Some(chunk) = chunk else { return };
            assert!(
                chunk.len() <= tree.max_values() || depth == tree.max_depth(),
                "leaf at depth {depth} holds {}",
                chunk.len()
            );
            for member in chunk.members() {
                let pos = tree.position_of(member.id()).unwrap();
                assert!(bounds.contains(pos), "{pos:?} outside {bounds:?}");
                assert!(seen.insert(member.id()), "duplicate {}", member.id());
            }
        });
        assert_eq!(seen.len(), tree.len());
    }

    #[test]
    fn leaf_splits_past_capacity() {
        let mut tree = Quadtree::new(64.0, 2, 3).unwrap();
        tree.insert(point(1.0, 1.0)).unwrap();
        tree.insert(point(40.0, 1.0)).unwrap();
        assert_eq!(tree.leaf_stats().leaves, 1);

        tree.insert(point(40.0, 40.0)).unwrap();
        let stats = tree.leaf_stats();
        assert_eq!(stats.leaves, 4);
        assert_eq!(stats.occupied, 3);
        assert_invariants(&tree);
    }

    #[test]
    fn max_depth_leaf_overflows() {
        let mut tree = Quadtree::new(64.0, 1, 2).unwrap();
        for _ in 0..5 {
            tree.insert(point(3.0, 3.0)).unwrap();
        }
        let stats = tree.leaf_stats();
        assert_eq!(stats.deepest, 2);
        assert_eq!(stats.largest, 5);
        assert_invariants(&tree);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut tree = Quadtree::new(64.0, 4, 3).unwrap();
        let e = point(5.0, 5.0);
        assert!(tree.insert(e.clone()).unwrap());
        assert!(!tree.insert(e).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn out_of_bounds_rejected() {
        let mut tree = Quadtree::new(64.0, 4, 3).unwrap();
        assert!(matches!(
            tree.insert(point(64.0, 0.0)),
            Err(SpaceError::OutOfBounds { .. })
        ));
        let batch = vec![point(1.0, 1.0), point(-1.0, 3.0)];
        assert!(tree.insert_batch(batch).is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn removal_does_not_merge() {
        let mut tree = Quadtree::new(64.0, 1, 3).unwrap();
        let a = point(1.0, 1.0);
        let b = point(50.0, 50.0);
        tree.insert_batch(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(tree.leaf_stats().leaves, 4);

        assert_eq!(tree.remove(a.id()), Some(a.clone()));
        assert_eq!(tree.remove(b.id()), Some(b));
        assert_eq!(tree.remove(a.id()), None);
        let stats = tree.leaf_stats();
        assert_eq!(stats.leaves, 4);
        assert_eq!(stats.occupied, 0);
        assert!(tree.chunks().is_empty());
    }

    #[test]
    fn removal_uses_inserted_position() {
        let mut tree = Quadtree::new(64.0, 1, 3).unwrap();
        let a = point(1.0, 1.0);
        tree.insert_batch(vec![a.clone(), point(50.0, 50.0)]).unwrap();
        a.borrow_mut().position = Point::new(60.0, 60.0);
        assert!(tree.remove(a.id()).is_some());
        assert_invariants(&tree);
    }

    #[test]
    fn chunk_id_changes_with_contents() {
        let mut tree = Quadtree::new(64.0, 4, 3).unwrap();
        tree.insert(point(1.0, 1.0)).unwrap();
        let before = tree.chunks()[0].id();
        tree.insert(point(2.0, 2.0)).unwrap();
        let after = tree.chunks()[0].id();
        assert_ne!(before, after);
        assert_eq!(tree.chunks()[0].len(), 2);
    }

    #[test]
    fn query_prunes_far_leaves() {
        let mut tree = Quadtree::new(64.0, 1, 3).unwrap();
        let near = point(2.0, 2.0);
        let far = point(40.0, 40.0);
        tree.insert_batch(vec![near.clone(), far]).unwrap();
        let chunks = tree.query_range(Rect::inflate_from(Point::new(4.0, 4.0), 2.0));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains(near.id()));
    }

    #[test]
    fn query_wraps_across_edges() {
        let mut tree = Quadtree::new(64.0, 1, 3).unwrap();
        let corner = point(1.0, 1.0);
        tree.insert_batch(vec![corner.clone(), point(30.0, 30.0)]).unwrap();
        let chunks = tree.query_range(Rect::inflate_from(Point::new(63.0, 63.0), 4.0));
        assert!(chunks.iter().any(|c| c.contains(corner.id())));
    }

    #[test]
    fn random_churn_keeps_invariants() {
        let world = 1024.0;
        let mut tree = Quadtree::new(world, 4, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut live: Vec<EntityHandle> = Vec::new();

        for step in 0..2_000 {
            if step % 3 == 2 && !live.is_empty() {
                let i = rng.gen_range(0..live.len());
                let victim = live.swap_remove(i);
                assert!(tree.remove(victim.id()).is_some());
            } else {
                let e = point(rng.gen_range(0.0..world), rng.gen_range(0.0..world));
                tree.insert(e.clone()).unwrap();
                live.push(e);
            }
        }
        assert_invariants(&tree);

        let everything: HashSet<EntityId> = tree
            .query_range(Rect::square(world))
            .iter()
            .flat_map(|c| c.members().iter().map(|m| m.id()))
            .collect();
        let expected: HashSet<EntityId> = live.iter().map(|e| e.id()).collect();
        assert_eq!(everything, expected);
        assert_eq!(tree.entities().len(), live.len());
    }
}
