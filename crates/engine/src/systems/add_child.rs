use orbis_common::{FrameTime, to_world_offset};
use orbis_ecs::EntityHandle;
use orbis_stream::Chunk;

use crate::system::VisibilitySystem;

/// Attaches the displays of a visible chunk's members to that chunk.
///
/// Each display records the chunk id and its offset from the chunk's origin.
/// A display is detached on exit only if it is still parented to the exiting
/// chunk, since a replacement snapshot may already have claimed it.
#[derive(Debug)]
pub struct AddChildToRegionSystem {
    world_size: f32,
    attached: usize,
}

impl AddChildToRegionSystem {
    pub fn new(world_size: f32) -> Self {
        Self {
            world_size,
            attached: 0,
        }
    }

    /// Displays currently attached by this system.
    pub fn attached(&self) -> usize {
        self.attached
    }
}

impl AddChildToRegionSystem {
    /// Parent `member`'s display to `chunk`, if it has one.
    pub fn adopt(&mut self, member: &EntityHandle, chunk: &Chunk) {
        let mut entity = member.borrow_mut();
        let position = entity.position;
        let Some(display) = entity.display.as_mut() else {
            return;
        };
        if display.parent.is_none() {
            self.attached += 1;
        }
        let origin = chunk.bounds().min();
        display.attach(chunk.id(), to_world_offset(position, origin, self.world_size));
    }

    /// Detach `member`'s display if it is still parented to `chunk`.
    pub fn disown(&mut self, member: &EntityHandle, chunk: &Chunk) {
        let mut entity = member.borrow_mut();
        let Some(display) = entity.display.as_mut() else {
            return;
        };
        if display.parent == Some(chunk.id()) {
            display.detach();
            self.attached = self.attached.saturating_sub(1);
        }
    }
}

impl VisibilitySystem<Chunk> for AddChildToRegionSystem {
    fn enter(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            self.adopt(member, chunk);
        }
        tracing::trace!(chunk = chunk.id().0, members = chunk.len(), "chunk attached");
    }

    fn update(&mut self, _chunk: &Chunk, _time: &FrameTime) {}

    fn exit(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            self.disown(member, chunk);
        }
    }

    fn finish(&mut self) {}
}
