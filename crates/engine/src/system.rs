use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use orbis_common::{EntityId, FrameTime};
use orbis_ecs::EntityHandle;
use orbis_stream::Chunk;

/// Per-item lifecycle hooks driven by a tracker.
///
/// Within one tick a bound system sees `begin`, then `enter` for every item that
/// became visible, then `update` for every item that stayed visible. In the
/// closing half of the tick it sees `exit` for every item that left, then `finish`.
pub trait VisibilitySystem<T> {
    fn begin(&mut self, _time: &FrameTime) {}

    fn enter(&mut self, item: &T);

    fn update(&mut self, item: &T, time: &FrameTime);

    fn exit(&mut self, item: &T);

    fn finish(&mut self);
}

/// Hooks run every tick: `update` for each visible item, then `tick` once.
pub trait TickSystem<T> {
    fn update(&mut self, item: &T, time: &FrameTime);

    fn tick(&mut self, time: &FrameTime);
}

// A shared system can be bound several times and still be reached by its owner.
impl<T, S> VisibilitySystem<T> for Rc<RefCell<S>>
where
    S: VisibilitySystem<T> + ?Sized,
{
    fn begin(&mut self, time: &FrameTime) {
        self.borrow_mut().begin(time);
    }

    fn enter(&mut self, item: &T) {
        self.borrow_mut().enter(item);
    }

    fn update(&mut self, item: &T, time: &FrameTime) {
        self.borrow_mut().update(item, time);
    }

    fn exit(&mut self, item: &T) {
        self.borrow_mut().exit(item);
    }

    fn finish(&mut self) {
        self.borrow_mut().finish();
    }
}

impl<T, S> TickSystem<T> for Rc<RefCell<S>>
where
    S: TickSystem<T> + ?Sized,
{
    fn update(&mut self, item: &T, time: &FrameTime) {
        self.borrow_mut().update(item, time);
    }

    fn tick(&mut self, time: &FrameTime) {
        self.borrow_mut().tick(time);
    }
}

/// Runs a per-entity system over the members of chunks.
///
/// Chunk snapshots are replaced whenever a leaf's membership changes, so the
/// same entity can be reached through an entering and an exiting chunk in one
/// tick. Membership is counted per entity: the inner system sees `enter` when
/// an entity first becomes reachable and `exit` when the last chunk holding it
/// leaves. An entity that was already reachable when a new chunk brings it in
/// stayed visible, so it gets `update` instead.
#[derive(Debug)]
pub struct Lifted<S> {
    inner: S,
    reachable: BTreeMap<EntityId, usize>,
    time: FrameTime,
}

impl<S> Lifted<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reachable: BTreeMap::new(),
            time: FrameTime::default(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Entities currently reachable through at least one chunk.
    pub fn reachable(&self) -> usize {
        self.reachable.len()
    }
}

impl<S: VisibilitySystem<EntityHandle>> VisibilitySystem<Chunk> for Lifted<S> {
    fn begin(&mut self, time: &FrameTime) {
        self.time = *time;
        self.inner.begin(time);
    }

    fn enter(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            let count = self.reachable.entry(member.id()).or_insert(0);
            *count += 1;
            if *count == 1 {
                self.inner.enter(member);
            } else {
                self.inner.update(member, &self.time);
            }
        }
    }

    fn update(&mut self, chunk: &Chunk, time: &FrameTime) {
        for member in chunk.members() {
            self.inner.update(member, time);
        }
    }

    fn exit(&mut self, chunk: &Chunk) {
        for member in chunk.members() {
            let Some(count) = self.reachable.get_mut(&member.id()) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                self.reachable.remove(&member.id());
                self.inner.exit(member);
            }
        }
    }

    fn finish(&mut self) {
        self.inner.finish();
    }
}

impl<S: TickSystem<EntityHandle>> TickSystem<Chunk> for Lifted<S> {
    fn update(&mut self, chunk: &Chunk, time: &FrameTime) {
        for member in chunk.members() {
            self.inner.update(member, time);
        }
    }

    fn tick(&mut self, time: &FrameTime) {
        self.inner.tick(time);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;
    use orbis_common::Point;
    use orbis_ecs::{Entity, EntityKind};
    use orbis_stream::{EntityStorage, Quadtree, QuadtreeEntityStorage};

    fn point(x: f32, y: f32) -> EntityHandle {
        Entity::builder(EntityKind::Point, Point::new(x, y))
            .build()
            .unwrap()
            .into()
    }

    fn only_chunk(storage: &QuadtreeEntityStorage) -> Chunk {
        let chunks = storage.chunks();
        assert_eq!(chunks.len(), 1);
        chunks[0].clone()
    }

    #[test]
    fn lifted_visits_every_member() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut storage = QuadtreeEntityStorage::new(Quadtree::new(64.0, 8, 2).unwrap());
        let (a, b) = (point(1.0, 1.0), point(2.0, 2.0));
        storage.register_batch(vec![a.clone(), b.clone()]).unwrap();
        let chunk = only_chunk(&storage);

        let mut lifted = Lifted::new(Recorder::new("s", &log));
        lifted.enter(&chunk);
        VisibilitySystem::update(&mut lifted, &chunk, &FrameTime::default());
        lifted.exit(&chunk);
        lifted.finish();

        let log = log.borrow();
        assert_eq!(log.len(), 7);
        assert!(log.contains(&format!("s.enter {}", a.id())));
        assert!(log.contains(&format!("s.update {}", b.id())));
        assert!(log.contains(&format!("s.exit {}", b.id())));
        assert_eq!(log.last().map(String::as_str), Some("s.finish"));
    }

    #[test]
    fn replaced_chunk_keeps_shared_members() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut storage = QuadtreeEntityStorage::new(Quadtree::new(64.0, 8, 2).unwrap());
        let (a, b) = (point(1.0, 1.0), point(2.0, 2.0));
        storage.register(a.clone()).unwrap();
        let old = only_chunk(&storage);
        storage.register(b.clone()).unwrap();
        let new = only_chunk(&storage);

        let mut lifted = Lifted::new(Recorder::new("s", &log));
        lifted.enter(&old);
        lifted.enter(&new);
        lifted.exit(&old);

        assert_eq!(
            *log.borrow(),
            vec![
                format!("s.enter {}", a.id()),
                format!("s.update {}", a.id()),
                format!("s.enter {}", b.id()),
            ]
        );
        assert_eq!(lifted.reachable(), 2);
    }

    #[test]
    fn shared_binding_reaches_owner() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let shared = Rc::new(RefCell::new(Recorder::new("s", &log)));
        let mut bound = Rc::clone(&shared);
        VisibilitySystem::<EntityHandle>::finish(&mut bound);
        assert_eq!(shared.borrow().log.borrow().len(), 1);
    }
}
