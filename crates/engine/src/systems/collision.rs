use std::collections::BTreeMap;

use orbis_common::{ChunkId, FrameTime, Point, axis_distance};
use orbis_stream::Chunk;

use crate::system::VisibilitySystem;

/// Keeps the chunks near the trackee and answers overlap queries against
/// the displays of their members.
#[derive(Debug)]
pub struct CollisionDetectionSystem {
    world_size: f32,
    chunks: BTreeMap<ChunkId, Chunk>,
}

impl CollisionDetectionSystem {
    pub fn new(world_size: f32) -> Self {
        Self {
            world_size,
            chunks: BTreeMap::new(),
        }
    }

    pub fn tracked_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// True when a box centered at `center` overlaps any tracked display.
    ///
    /// Boxes overlap when, on both axes, the wrapped distance between centers
    /// is less than the sum of half-extents.
    pub fn collides_with(&self, center: Point, half_extent: Point) -> bool {
        self.chunks
            .values()
            .flat_map(|chunk| chunk.members())
            .any(|member| {
                let entity = member.borrow();
                let Some(display) = entity.display.as_ref() else {
                    return false;
                };
                let p = entity.position;
                axis_distance(p.x, center.x, self.world_size) < display.half_extent.x + half_extent.x
                    && axis_distance(p.y, center.y, self.world_size)
                        < display.half_extent.y + half_extent.y
            })
    }
}

impl VisibilitySystem<Chunk> for CollisionDetectionSystem {
    fn enter(&mut self, chunk: &Chunk) {
        self.chunks.insert(chunk.id(), chunk.clone());
    }

    fn update(&mut self, _chunk: &Chunk, _time: &FrameTime) {}

    fn exit(&mut self, chunk: &Chunk) {
        self.chunks.remove(&chunk.id());
    }

    fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_common::WorldConfig;
    use orbis_ecs::{BuffFactory, EntityFactory};
    use orbis_stream::{EntityStorage, Quadtree, QuadtreeEntityStorage};

    const W: f32 = 1024.0;

    #[test]
    fn overlap_across_the_seam() {
        let config = WorldConfig::default();
        let factory = EntityFactory::new(&config, BuffFactory::new(&config, 1));
        // chest half extent is 14 x 12
        let chest = factory.create_chest(Point::new(2.0, 500.0)).unwrap();
        let mut storage = QuadtreeEntityStorage::new(Quadtree::new(W, 4, 2).unwrap());
        storage.register(chest.into()).unwrap();

        let mut system = CollisionDetectionSystem::new(W);
        for chunk in storage.chunks() {
            system.enter(&chunk);
        }
        assert!(system.collides_with(Point::new(1020.0, 505.0), Point::new(5.0, 5.0)));
        assert!(!system.collides_with(Point::new(1000.0, 505.0), Point::new(5.0, 5.0)));
        // touching edges do not overlap
        assert!(!system.collides_with(Point::new(2.0, 520.0), Point::new(5.0, 8.0)));
    }

    #[test]
    fn exit_forgets_chunk() {
        let config = WorldConfig::default();
        let factory = EntityFactory::new(&config, BuffFactory::new(&config, 1));
        let chest = factory.create_chest(Point::new(100.0, 100.0)).unwrap();
        let mut storage = QuadtreeEntityStorage::new(Quadtree::new(W, 4, 2).unwrap());
        storage.register(chest.into()).unwrap();
        let chunk = storage.chunks()[0].clone();

        let mut system = CollisionDetectionSystem::new(W);
        system.enter(&chunk);
        assert_eq!(system.tracked_chunks(), 1);
        system.exit(&chunk);
        assert_eq!(system.tracked_chunks(), 0);
        assert!(!system.collides_with(Point::new(100.0, 100.0), Point::ONE));
    }
}
