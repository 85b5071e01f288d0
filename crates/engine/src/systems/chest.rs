use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use orbis_common::{Distance, FrameTime, Point, SpaceError, WorldConfig, wrap};
use orbis_ecs::{BuffData, BuffKind, BuffStrategy, EntityFactory, EntityHandle};
use orbis_stream::EntityStorage;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::system::{TickSystem, VisibilitySystem};

/// A chest system shared between its visibility and tick bindings.
pub type SharedChestSystem<S> = Rc<RefCell<ChestSystem<S>>>;

/// Opens chests the trackee touches and grants their buff.
struct ChestOpener {
    trackee: EntityHandle,
    touch: Distance,
    strategy: BuffStrategy,
}

impl ChestOpener {
    /// Returns true when `chest` was opened by this call.
    fn try_open(&mut self, chest: &EntityHandle, factory: &mut EntityFactory) -> bool {
        {
            let entity = chest.borrow();
            let Some(state) = entity.chest else {
                return false;
            };
            if state.is_open || !self.touch.is_close(self.trackee.position(), entity.position) {
                return false;
            }
        }
        if let Some(state) = chest.borrow_mut().chest.as_mut() {
            state.is_open = true;
        }

        let data = self.strategy.next_buff();
        self.grant(data, factory);
        tracing::info!(chest = %chest.id(), buff = ?data.kind, "{}", data.kind.description());
        true
    }

    fn grant(&mut self, data: BuffData, factory: &mut EntityFactory) {
        let mut trackee = self.trackee.borrow_mut();
        match data.kind {
            BuffKind::None => {}
            BuffKind::Hasty => {
                if let Some(buff) = factory.buff_factory().create(data) {
                    if let Err(e) = trackee.apply_buff(buff) {
                        tracing::warn!(error = %e, "could not apply chest buff");
                    }
                }
            }
            // kept for the next comment the trackee sends
            BuffKind::Chromatic => match trackee.buffs.as_mut() {
                Some(carrier) => carrier.pending_mut().add(data),
                None => tracing::warn!("trackee has no buff carrier"),
            },
        }
    }
}

/// Places a new chest near the trackee when the schedule runs out, or when
/// there is no schedule and every chest has been opened.
struct ChestSpawner {
    cooldown: Duration,
    schedule: Option<Duration>,
    spread: f32,
    world_size: f32,
    rng: ChaCha8Rng,
}

impl ChestSpawner {
    fn schedule_next(&mut self) {
        self.schedule = Some(self.cooldown);
    }

    fn is_due<S: EntityStorage>(&mut self, time: &FrameTime, chests: &S) -> bool {
        match self.schedule.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(time.elapsed);
                if !remaining.is_zero() {
                    return false;
                }
                self.schedule = None;
                true
            }
            None => !chests.entities().iter().any(|chest| {
                chest
                    .borrow()
                    .chest
                    .is_some_and(|state| !state.is_open)
            }),
        }
    }

    fn location(&mut self, around: Point) -> Point {
        let dx = self.rng.gen_range(-self.spread..=self.spread);
        let dy = self.rng.gen_range(-self.spread..=self.spread);
        wrap(around + Point::new(dx, dy), self.world_size)
    }
}

/// The chest loop: spawning on tick, opening on update, demolishing on exit.
///
/// Bind one shared instance both as a visibility system and as a tick system
/// over the storage holding the chests.
pub struct ChestSystem<S> {
    chests: Rc<RefCell<S>>,
    factory: EntityFactory,
    opener: ChestOpener,
    spawner: ChestSpawner,
    opened: usize,
    spawned: usize,
}

impl<S: EntityStorage> ChestSystem<S> {
    /// The first spawn is scheduled one cooldown from now.
    pub fn new(
        config: &WorldConfig,
        trackee: EntityHandle,
        chests: Rc<RefCell<S>>,
        factory: EntityFactory,
        seed: u64,
    ) -> Result<Self, SpaceError> {
        let mut seeds = ChaCha8Rng::seed_from_u64(seed);
        let mut spawner = ChestSpawner {
            cooldown: config.chest_spawn_cooldown(),
            schedule: None,
            spread: config.entity_tracker_update_radius() / 2.0,
            world_size: config.world_size,
            rng: ChaCha8Rng::seed_from_u64(seeds.next_u64()),
        };
        spawner.schedule_next();
        Ok(Self {
            chests,
            factory,
            opener: ChestOpener {
                trackee,
                touch: Distance::new(config.chest_touch_distance, config.world_size)?,
                strategy: BuffStrategy::new(seeds.next_u64()),
            },
            spawner,
            opened: 0,
            spawned: 0,
        })
    }

    pub fn shared(self) -> SharedChestSystem<S> {
        Rc::new(RefCell::new(self))
    }

    pub fn opened(&self) -> usize {
        self.opened
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Time left before the scheduled spawn, if one is scheduled.
    pub fn next_spawn_in(&self) -> Option<Duration> {
        self.spawner.schedule
    }

    fn spawn(&mut self) {
        let at = self.spawner.location(self.opener.trackee.position());
        let chest = match self.factory.create_chest(at) {
            Ok(chest) => EntityHandle::from(chest),
            Err(e) => {
                tracing::warn!(error = %e, "could not build chest");
                return;
            }
        };
        let id = chest.id();
        match self.chests.borrow_mut().register(chest) {
            Ok(()) => {
                self.spawned += 1;
                tracing::debug!(chest = %id, x = at.x, y = at.y, "chest spawned");
            }
            Err(e) => tracing::warn!(error = %e, "could not register chest"),
        }
    }
}

impl<S: EntityStorage> VisibilitySystem<EntityHandle> for ChestSystem<S> {
    fn enter(&mut self, _chest: &EntityHandle) {}

    fn update(&mut self, chest: &EntityHandle, _time: &FrameTime) {
        if self.opener.try_open(chest, &mut self.factory) {
            self.opened += 1;
            self.spawner.schedule_next();
        }
    }

    fn exit(&mut self, chest: &EntityHandle) {
        self.chests.borrow_mut().deregister(chest);
    }

    fn finish(&mut self) {}
}

impl<S: EntityStorage> TickSystem<EntityHandle> for ChestSystem<S> {
    fn update(&mut self, _chest: &EntityHandle, _time: &FrameTime) {}

    fn tick(&mut self, time: &FrameTime) {
        let due = self.spawner.is_due(time, &*self.chests.borrow());
        if due {
            self.spawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Phase, SystemEngine, VisibilityPipeline};
    use orbis_ecs::{BuffFactory, CommentData, EntityKind};
    use orbis_stream::GlobalEntityStorage;

    fn config() -> WorldConfig {
        WorldConfig {
            world_size: 1024.0,
            chest_spawn_cooldown_ms: 100,
            ..WorldConfig::default()
        }
    }

    fn factory(config: &WorldConfig) -> EntityFactory {
        EntityFactory::new(config, BuffFactory::new(config, 5))
    }

    fn setup() -> (
        EntityHandle,
        Rc<RefCell<GlobalEntityStorage>>,
        ChestSystem<GlobalEntityStorage>,
    ) {
        let config = config();
        let player: EntityHandle = factory(&config)
            .create_player(Point::new(500.0, 500.0))
            .unwrap()
            .into();
        let chests = Rc::new(RefCell::new(GlobalEntityStorage::new(config.world_size)));
        let system = ChestSystem::new(
            &config,
            player.clone(),
            Rc::clone(&chests),
            factory(&config),
            11,
        )
        .unwrap();
        (player, chests, system)
    }

    fn step(n: u64) -> FrameTime {
        FrameTime::new(n, Duration::from_millis(20))
    }

    #[test]
    fn spawns_after_cooldown_then_waits() {
        let (_, chests, mut system) = setup();
        for n in 1..=4 {
            system.tick(&step(n));
        }
        assert!(chests.borrow().is_empty());
        system.tick(&step(5));
        assert_eq!(chests.borrow().len(), 1);
        assert_eq!(system.next_spawn_in(), None);

        // an unopened chest holds back further spawns
        for n in 6..=20 {
            system.tick(&step(n));
        }
        assert_eq!(system.spawned(), 1);
    }

    #[test]
    fn touching_opens_and_grants() {
        let (player, chests, mut system) = setup();
        let chest: EntityHandle = factory(&config())
            .create_chest(Point::new(510.0, 490.0))
            .unwrap()
            .into();
        chests.borrow_mut().register(chest.clone()).unwrap();
        system.spawner.schedule = None;

        VisibilitySystem::update(&mut system, &chest, &step(1));
        assert!(chest.borrow().chest.unwrap().is_open);
        assert_eq!(system.opened(), 1);
        assert!(system.next_spawn_in().is_some());

        let p = player.borrow();
        let carrier = p.buffs.as_ref().unwrap();
        assert!(carrier.active_count() == 1 || carrier.pending().has_buff());

        // an opened chest is not opened again
        drop(p);
        VisibilitySystem::update(&mut system, &chest, &step(2));
        assert_eq!(system.opened(), 1);
    }

    #[test]
    fn chromatic_grant_reaches_next_sent_comment() {
        let (player, _, mut system) = setup();
        let mut opened = 0u64;
        while !player.borrow().buffs.as_ref().unwrap().pending().has_buff() {
            assert!(opened < 64, "no chromatic grant after {opened} chests");
            let chest: EntityHandle = factory(&config())
                .create_chest(player.position())
                .unwrap()
                .into();
            VisibilitySystem::update(&mut system, &chest, &step(opened + 1));
            opened += 1;
        }
        assert_eq!(system.opened() as u64, opened);

        let data = CommentData {
            position: player.position(),
            size: 20,
            color: 0xffffff,
            text: "found it".into(),
            buff: None,
        };
        let comment = {
            let mut p = player.borrow_mut();
            let carrier = p.buffs.as_mut().unwrap();
            factory(&config()).create_comment_from(carrier, &data).unwrap()
        };
        assert_eq!(comment.kind(), EntityKind::UpdatingComment);
        assert_eq!(comment.buffs.as_ref().unwrap().active_names(), vec!["chromatic"]);
        assert!(!player.borrow().buffs.as_ref().unwrap().pending().has_buff());
    }

    #[test]
    fn distant_chest_stays_closed() {
        let (_, _, mut system) = setup();
        let chest: EntityHandle = factory(&config())
            .create_chest(Point::new(600.0, 500.0))
            .unwrap()
            .into();
        VisibilitySystem::update(&mut system, &chest, &step(1));
        assert!(!chest.borrow().chest.unwrap().is_open);
    }

    #[test]
    fn exit_demolishes() {
        let (_, chests, mut system) = setup();
        let chest: EntityHandle = factory(&config())
            .create_chest(Point::new(10.0, 10.0))
            .unwrap()
            .into();
        chests.borrow_mut().register(chest.clone()).unwrap();
        system.exit(&chest);
        assert!(chests.borrow().is_empty());
    }

    #[test]
    fn shared_binding_in_pipeline() {
        let (player, chests, system) = setup();
        let shared = system.shared();
        let mut pipeline = VisibilityPipeline::builder(player.clone())
            .radius(Phase::Update, 300.0)
            .bind(Rc::clone(&shared), &chests, Phase::Update)
            .bind_tick(Rc::clone(&shared), &chests, Phase::Update)
            .build()
            .unwrap();

        let mut n = 1;
        while shared.borrow().spawned() == 0 && n < 100 {
            pipeline.update(&step(n)).unwrap();
            n += 1;
        }
        assert_eq!(shared.borrow().spawned(), 1);

        // walk onto the chest
        let at = chests.borrow().entities()[0].position();
        player.borrow_mut().position = at;
        pipeline.update(&step(n)).unwrap();
        pipeline.update(&step(n + 1)).unwrap();
        assert_eq!(shared.borrow().opened(), 1);

        // walk away: the chest leaves view and is demolished
        player.borrow_mut().position = wrap(at + Point::new(512.0, 512.0), 1024.0);
        pipeline.update(&step(n + 2)).unwrap();
        assert!(chests.borrow().is_empty());
    }
}
