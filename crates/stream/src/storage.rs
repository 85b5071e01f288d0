use std::collections::BTreeMap;
use std::fmt;

use orbis_common::{ChunkId, Distance, EntityId, Point, Rect, SpaceError, WorldConfig, validate_radius};
use orbis_ecs::EntityHandle;

use crate::chunk::Chunk;
use crate::events::{EventLog, StateChanged};
use crate::quadtree::{LeafStats, Quadtree};

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// Something a storage hands to trackers, identified by a stable key.
pub trait Tracked: Clone {
    type Key: Ord + Copy + fmt::Debug;

    fn key(&self) -> Self::Key;
}

impl Tracked for EntityHandle {
    type Key = EntityId;

    fn key(&self) -> EntityId {
        self.id()
    }
}

impl Tracked for Chunk {
    type Key = ChunkId;

    fn key(&self) -> ChunkId {
        self.id()
    }
}

/// Uniform query and mutation contract over a set of registered entities.
///
/// Every mutating call that changes membership records exactly one
/// [`StateChanged`] in the storage's [`EventLog`]; calls that change nothing
/// record none. The log is bounded, so consumers should drain it regularly.
pub trait EntityStorage {
    /// Unit returned by [`EntityStorage::list_around`]: an entity, or a chunk of them.
    type Item: Tracked;

    /// Items within `radius` of `center` on the torus. Items may reach further
    /// than `radius`; a radius of zero yields nothing.
    fn list_around(&self, center: Point, radius: f32) -> Result<Vec<Self::Item>, StorageError>;

    fn register(&mut self, entity: EntityHandle) -> Result<(), StorageError>;

    /// Register several entities with a single notification. Fails without
    /// registering anything if any entity is out of bounds.
    fn register_batch<I>(&mut self, entities: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = EntityHandle>;

    /// Deregistering an entity that is not registered is logged and ignored.
    fn deregister(&mut self, entity: &EntityHandle);

    /// Whether `id` is registered.
    fn contains(&self, id: EntityId) -> bool;

    /// Number of registered entities.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered entity, in no particular order.
    fn entities(&self) -> Vec<EntityHandle>;

    /// Membership changes not yet drained, oldest first.
    fn events(&self) -> &EventLog;

    /// Take the retained membership changes, leaving the log empty.
    fn drain_events(&mut self) -> Vec<StateChanged>;
}

fn check_in_world(p: Point, world_size: f32) -> Result<(), SpaceError> {
    let inside = |v: f32| (0.0..world_size).contains(&v);
    if inside(p.x) && inside(p.y) {
        Ok(())
    } else {
        Err(SpaceError::OutOfBounds {
            x: p.x,
            y: p.y,
            world_size,
        })
    }
}

/// Unindexed storage: a plain set scanned on every query.
///
/// Suited to small populations of moving entities, such as players.
pub struct GlobalEntityStorage {
    world_size: f32,
    entities: BTreeMap<EntityId, EntityHandle>,
    events: EventLog,
}

impl GlobalEntityStorage {
    pub fn new(world_size: f32) -> Self {
        Self {
            world_size,
            entities: BTreeMap::new(),
            events: EventLog::default(),
        }
    }

    /// A storage sized for `config.world_size`.
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.world_size)
    }

    /// Keep at most `capacity` undrained events.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventLog::new(capacity);
        self
    }

    /// Side of the wrapping world this storage accepts positions in.
    pub fn world_size(&self) -> f32 {
        self.world_size
    }
}

impl EntityStorage for GlobalEntityStorage {
    type Item = EntityHandle;

    fn list_around(&self, center: Point, radius: f32) -> Result<Vec<EntityHandle>, StorageError> {
        validate_radius(radius)?;
        if radius == 0.0 {
            return Ok(Vec::new());
        }
        let distance = Distance::new(radius, self.world_size)?;
        Ok(self
            .entities
            .values()
            .filter(|handle| {
                let entity = handle.borrow();
                match &entity.display {
                    Some(display) => {
                        distance.is_display_close(entity.position, display.half_extent, center)
                    }
                    None => distance.is_close(entity.position, center),
                }
            })
            .cloned()
            .collect())
    }

    fn register(&mut self, entity: EntityHandle) -> Result<(), StorageError> {
        check_in_world(entity.position(), self.world_size)?;
        if self.entities.contains_key(&entity.id()) {
            return Ok(());
        }
        tracing::debug!(entity = %entity.id(), "registered");
        self.entities.insert(entity.id(), entity.clone());
        self.events.record(StateChanged::added(vec![entity]));
        Ok(())
    }

    fn register_batch<I>(&mut self, entities: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = EntityHandle>,
    {
        let batch: Vec<EntityHandle> = entities.into_iter().collect();
        for entity in &batch {
            check_in_world(entity.position(), self.world_size)?;
        }
        let mut added = Vec::new();
        for entity in batch {
            if self.entities.contains_key(&entity.id()) {
                continue;
            }
            self.entities.insert(entity.id(), entity.clone());
            added.push(entity);
        }
        if !added.is_empty() {
            tracing::debug!(count = added.len(), "registered batch");
            self.events.record(StateChanged::added(added));
        }
        Ok(())
    }

    fn deregister(&mut self, entity: &EntityHandle) {
        match self.entities.remove(&entity.id()) {
            Some(removed) => {
                tracing::debug!(entity = %entity.id(), "deregistered");
                self.events.record(StateChanged::removed(vec![removed]));
            }
            None => tracing::warn!(entity = %entity.id(), "entity was not registered"),
        }
    }

    fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.entities.len()
    }

    fn entities(&self) -> Vec<EntityHandle> {
        self.entities.values().cloned().collect()
    }

    fn events(&self) -> &EventLog {
        &self.events
    }

    fn drain_events(&mut self) -> Vec<StateChanged> {
        self.events.drain()
    }
}

/// Quadtree-indexed storage for stationary entities; queries return chunks.
pub struct QuadtreeEntityStorage {
    tree: Quadtree,
    events: EventLog,
}

impl QuadtreeEntityStorage {
    pub fn new(tree: Quadtree) -> Self {
        Self {
            tree,
            events: EventLog::default(),
        }
    }

    /// A storage over a quadtree built from `config`.
    pub fn from_config(config: &WorldConfig) -> Result<Self, StorageError> {
        Ok(Self::new(Quadtree::from_config(config)?))
    }

    /// Keep at most `capacity` undrained events.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventLog::new(capacity);
        self
    }

    /// The underlying index.
    pub fn tree(&self) -> &Quadtree {
        &self.tree
    }

    /// Depth and occupancy of the current leaves.
    pub fn leaf_stats(&self) -> LeafStats {
        self.tree.leaf_stats()
    }

    /// Snapshots of every non-empty leaf.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.tree.chunks()
    }
}

impl EntityStorage for QuadtreeEntityStorage {
    type Item = Chunk;

    fn list_around(&self, center: Point, radius: f32) -> Result<Vec<Chunk>, StorageError> {
        validate_radius(radius)?;
        if radius == 0.0 {
            return Ok(Vec::new());
        }
        Ok(self.tree.query_range(Rect::inflate_from(center, radius)))
    }

    fn register(&mut self, entity: EntityHandle) -> Result<(), StorageError> {
        let id = entity.id();
        if self.tree.insert(entity.clone())? {
            tracing::debug!(entity = %id, "registered");
            self.events.record(StateChanged::added(vec![entity]));
        }
        Ok(())
    }

    fn register_batch<I>(&mut self, entities: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = EntityHandle>,
    {
        let added = self.tree.insert_batch(entities)?;
        if !added.is_empty() {
            tracing::debug!(count = added.len(), "registered batch");
            self.events.record(StateChanged::added(added));
        }
        Ok(())
    }

    fn deregister(&mut self, entity: &EntityHandle) {
        match self.tree.remove(entity.id()) {
            Some(removed) => {
                tracing::debug!(entity = %entity.id(), "deregistered");
                self.events.record(StateChanged::removed(vec![removed]));
            }
            None => tracing::warn!(entity = %entity.id(), "entity was not registered"),
        }
    }

    fn contains(&self, id: EntityId) -> bool {
        self.tree.contains(id)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn entities(&self) -> Vec<EntityHandle> {
        self.tree.entities()
    }

    fn events(&self) -> &EventLog {
        &self.events
    }

    fn drain_events(&mut self) -> Vec<StateChanged> {
        self.events.drain()
    }
}
