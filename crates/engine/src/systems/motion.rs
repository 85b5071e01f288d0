use orbis_common::{FrameTime, wrap};
use orbis_ecs::EntityHandle;

use crate::system::TickSystem;

/// Integrates velocity, scaled by the speed boost ratio, into position.
#[derive(Debug)]
pub struct MotionSystem {
    world_size: f32,
}

impl MotionSystem {
    pub fn new(world_size: f32) -> Self {
        Self { world_size }
    }
}

impl TickSystem<EntityHandle> for MotionSystem {
    fn update(&mut self, entity: &EntityHandle, time: &FrameTime) {
        let mut entity = entity.borrow_mut();
        let Some(motion) = entity.motion else {
            return;
        };
        let next = entity.position + motion.effective_velocity() * time.elapsed_secs();
        entity.position = wrap(next, self.world_size);
    }

    fn tick(&mut self, _time: &FrameTime) {}
}
