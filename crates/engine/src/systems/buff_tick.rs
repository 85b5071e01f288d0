use orbis_common::FrameTime;
use orbis_ecs::EntityHandle;

use crate::system::TickSystem;

/// Advances the active buffs of every visible entity once per tick.
#[derive(Debug, Default)]
pub struct BuffTickSystem {
    expired: u64,
}

impl BuffTickSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffs that ran out since this system was created.
    pub fn expired(&self) -> u64 {
        self.expired
    }
}

impl TickSystem<EntityHandle> for BuffTickSystem {
    fn update(&mut self, entity: &EntityHandle, time: &FrameTime) {
        match entity.borrow_mut().tick_buffs(time) {
            Ok(expired) => self.expired += expired as u64,
            Err(e) => tracing::warn!(entity = %entity.id(), error = %e, "buff tick failed"),
        }
    }

    fn tick(&mut self, _time: &FrameTime) {}
}
