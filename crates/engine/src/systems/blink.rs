use std::collections::BTreeMap;

use orbis_common::{ChunkId, EntityId, FrameTime};
use orbis_ecs::EntityHandle;
use orbis_stream::Chunk;

use crate::system::VisibilitySystem;
use crate::systems::AddChildToRegionSystem;

/// Chunk display attachment that keeps blinking comments out of the chunk.
///
/// A blinking member is shown on its own at its world position, so its
/// highlight can be drawn without redrawing the rest of the chunk. Every other
/// member is adopted into the chunk through [`AddChildToRegionSystem`]. Leaving
/// view ends the blink: the next time the member enters, it joins its chunk.
#[derive(Debug)]
pub struct BlinkCachedDisplaySystem {
    region: AddChildToRegionSystem,
    /// Blinking members shown on their own, keyed to the chunk that showed them.
    uncached: BTreeMap<EntityId, ChunkId>,
}

impl BlinkCachedDisplaySystem {
    pub fn new(world_size: f32) -> Self {
        Self {
            region: AddChildToRegionSystem::new(world_size),
            uncached: BTreeMap::new(),
        }
    }

    /// Displays currently parented to a chunk.
    pub fn attached(&self) -> usize {
        self.region.attached()
    }

    /// Blinking displays currently shown on their own.
    pub fn uncached(&self) -> usize {
        self.uncached.len()
    }

    fn show_blinking(&mut self, member: &EntityHandle, chunk: &Chunk) -> bool {
        let mut entity = member.borrow_mut();
        if !entity.blink.is_some_and(|b| b.blinking) {
            return false;
        }
        let position = entity.position;
        if let Some(display) = entity.display.as_mut() {
            display.attach_to_world(position);
            self.uncached.insert(member.id(), chunk.id());
        }
        true
    }

    /// Hide a member shown by `chunk` and end its blink. A member re-shown by
    /// a replacing snapshot is left alone.
    fn end_blink(&mut self, member: &EntityHandle, chunk: &Chunk) {
        if self.uncached.get(&member.id()) != Some(&chunk.id()) {
            return;
        }
        self.uncached.remove(&member.id());
        let mut entity = member.borrow_mut();
        if let Some(display) = entity.display.as_mut() {
            display.detach();
        }
        if let Some(blink) = entity.blink.as_mut() {
            blink.release();
        }
    }
}

impl VisibilitySystem<Chunk> for BlinkCachedDisplaySystem {
    fn enter(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            if !self.show_blinking(member, chunk) {
                self.region.adopt(member, chunk);
            }
        }
    }

    fn update(&mut self, _chunk: &Chunk, _time: &FrameTime) {}

    fn exit(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            self.end_blink(member, chunk);
            self.region.disown(member, chunk);
        }
        tracing::trace!(
            chunk = chunk.id().0,
            uncached = self.uncached.len(),
            "chunk released"
        );
    }

    fn finish(&mut self) {}
}
