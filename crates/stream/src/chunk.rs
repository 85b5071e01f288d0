use std::fmt;
use std::rc::Rc;

use orbis_common::{ChunkId, EntityId, Rect};
use orbis_ecs::EntityHandle;

/// Immutable snapshot of one quadtree leaf and the entities positioned inside it.
///
/// A leaf whose membership changes gets a new snapshot with a fresh [`ChunkId`],
/// so two snapshots with the same id always hold the same members. Cloning is cheap.
#[derive(Clone)]
pub struct Chunk {
    inner: Rc<ChunkData>,
}

struct ChunkData {
    id: ChunkId,
    bounds: Rect,
    members: Vec<EntityHandle>,
}

impl Chunk {
    pub(crate) fn new(id: ChunkId, bounds: Rect, members: Vec<EntityHandle>) -> Self {
        Self {
            inner: Rc::new(ChunkData {
                id,
                bounds,
                members,
            }),
        }
    }

    pub fn id(&self) -> ChunkId {
        self.inner.id
    }

    /// Bounds of the leaf this snapshot was taken from.
    pub fn bounds(&self) -> Rect {
        self.inner.bounds
    }

    pub fn members(&self) -> &[EntityHandle] {
        &self.inner.members
    }

    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.members.iter().any(|m| m.id() == id)
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Chunk {}

impl std::hash::Hash for Chunk {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.inner.id)
            .field("bounds", &self.inner.bounds)
            .field("members", &self.inner.members.len())
            .finish()
    }
}
