use std::fmt;

use orbis_common::{EntityId, Point};
use orbis_ecs::{EntityHandle, EntityKind};
use orbis_engine::{Phase, PhaseSummary, VisibilityPipeline};
use orbis_stream::{EntityStorage, LeafStats, QuadtreeEntityStorage};

/// World inspector for developer tooling.
///
/// Provides read-only queries against storages and pipelines for debugging
/// and profiling.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of one storage.
    pub fn storage<S: EntityStorage>(name: &str, storage: &S) -> StorageSummary {
        StorageSummary {
            name: name.to_string(),
            entity_count: storage.len(),
            pending_events: storage.events().len(),
            leaves: None,
        }
    }

    /// Like [`WorldInspector::storage`], with the quadtree's leaf occupancy.
    pub fn quadtree(name: &str, storage: &QuadtreeEntityStorage) -> StorageSummary {
        StorageSummary {
            leaves: Some(storage.leaf_stats()),
            ..Self::storage(name, storage)
        }
    }

    pub fn phase(pipeline: &VisibilityPipeline, phase: Phase) -> PhaseReport {
        PhaseReport(pipeline.summary(phase))
    }

    pub fn inspect_entity(entity: &EntityHandle) -> EntityInfo {
        let e = entity.borrow();
        let (active_buffs, pending_buffs) = match e.buffs.as_ref() {
            Some(carrier) => (carrier.active_names(), carrier.pending().len()),
            None => (Vec::new(), 0),
        };
        EntityInfo {
            id: e.id(),
            kind: e.kind(),
            position: e.position,
            speed_boost_ratio: e.motion.map(|m| m.speed_boost_ratio),
            active_buffs,
            pending_buffs,
        }
    }

    /// List all entity ids in a storage.
    pub fn list_entities<S: EntityStorage>(storage: &S) -> Vec<EntityId> {
        storage.entities().iter().map(EntityHandle::id).collect()
    }
}

/// Summary of one storage for the inspector.
#[derive(Debug, Clone)]
pub struct StorageSummary {
    pub name: String,
    pub entity_count: usize,
    pub pending_events: usize,
    pub leaves: Option<LeafStats>,
}

impl fmt::Display for StorageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage {}: entities={} pending_events={}",
            self.name, self.entity_count, self.pending_events
        )?;
        if let Some(leaves) = self.leaves {
            write!(
                f,
                " leaves={} occupied={} deepest={} largest={}",
                leaves.leaves, leaves.occupied, leaves.deepest, leaves.largest
            )?;
        }
        Ok(())
    }
}

/// Printable view of a [`PhaseSummary`].
#[derive(Debug, Clone)]
pub struct PhaseReport(pub PhaseSummary);

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        let last = s
            .last_tick
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        write!(
            f,
            "Phase {}: radius={:.1} cadence={} last_tick={}",
            s.phase, s.radius, s.cadence, last
        )?;
        for r in &s.records {
            write!(
                f,
                "\n  {}: registered={} visible={} (+{} -{} ={}) systems={}/{}",
                r.storage,
                r.registered,
                r.visible,
                r.entered,
                r.exited,
                r.still_present,
                r.visibility_systems,
                r.tick_systems
            )?;
        }
        Ok(())
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Point,
    pub speed_boost_ratio: Option<f64>,
    pub active_buffs: Vec<&'static str>,
    pub pending_buffs: usize,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity [{}] {:?} pos=({:.2}, {:.2})",
            self.id, self.kind, self.position.x, self.position.y
        )?;
        if let Some(ratio) = self.speed_boost_ratio {
            write!(f, " speed=x{ratio:.2}")?;
        }
        if !self.active_buffs.is_empty() || self.pending_buffs > 0 {
            write!(
                f,
                " buffs=[{}] pending={}",
                self.active_buffs.join(", "),
                self.pending_buffs
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_common::{FrameTime, WorldConfig};
    use orbis_ecs::{BuffFactory, EntityFactory};
    use orbis_engine::systems::MotionSystem;
    use orbis_engine::SystemEngine;
    use orbis_stream::{GlobalEntityStorage, Quadtree};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn factory() -> (WorldConfig, EntityFactory) {
        let config = WorldConfig::default();
        let factory = EntityFactory::new(&config, BuffFactory::new(&config, 2));
        (config, factory)
    }

    #[test]
    fn summary_empty_storage() {
        let storage = GlobalEntityStorage::new(1024.0);
        let summary = WorldInspector::storage("comments", &storage);
        assert_eq!(summary.entity_count, 0);
        assert!(summary.leaves.is_none());
        assert!(summary.to_string().contains("entities=0"));
    }

    #[test]
    fn quadtree_summary_reports_leaves() {
        let (_, factory) = factory();
        let mut storage = QuadtreeEntityStorage::new(Quadtree::new(1024.0, 2, 4).unwrap());
        for i in 0..5 {
            let p = factory
                .create_point(Point::new(10.0 + i as f32, 10.0))
                .unwrap();
            storage.register(p.into()).unwrap();
        }
        let summary = WorldInspector::quadtree("points", &storage);
        assert_eq!(summary.entity_count, 5);
        assert_eq!(summary.pending_events, 5);
        let leaves = summary.leaves.unwrap();
        assert!(leaves.leaves >= 4);
        assert!(summary.to_string().contains("leaves="));
    }

    #[test]
    fn inspect_player() {
        let (_, mut factory) = factory();
        let player: EntityHandle = factory.create_player(Point::new(1.0, 2.0)).unwrap().into();
        let hasty = factory.buff_factory().create_hasty();
        player.borrow_mut().apply_buff(Box::new(hasty)).unwrap();

        let info = WorldInspector::inspect_entity(&player);
        assert_eq!(info.kind, EntityKind::Player);
        assert_eq!(info.active_buffs, vec!["hasty"]);
        assert!(info.to_string().contains("speed=x1.40"));
    }

    #[test]
    fn list_entities() {
        let (_, factory) = factory();
        let mut storage = GlobalEntityStorage::new(40_000.0);
        let a: EntityHandle = factory.create_point(Point::ZERO).unwrap().into();
        let b: EntityHandle = factory.create_point(Point::ONE).unwrap().into();
        storage.register_batch(vec![a.clone(), b.clone()]).unwrap();

        let ids = WorldInspector::list_entities(&storage);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id()));
        assert!(ids.contains(&b.id()));
    }

    #[test]
    fn phase_report_lists_records() {
        let (config, factory) = factory();
        let player: EntityHandle = factory.create_player(Point::ZERO).unwrap().into();
        let storage = Rc::new(RefCell::new(GlobalEntityStorage::new(config.world_size)));
        storage.borrow_mut().register(player.clone()).unwrap();
        let mut pipeline = VisibilityPipeline::builder(player)
            .radius(Phase::Update, 100.0)
            .bind_tick(MotionSystem::new(config.world_size), &storage, Phase::Update)
            .build()
            .unwrap();
        pipeline.update(&FrameTime::new(1, FrameTime::default().elapsed)).unwrap();

        let report = WorldInspector::phase(&pipeline, Phase::Update).to_string();
        assert!(report.contains("Phase update"));
        assert!(report.contains("last_tick=1"));
        assert!(report.contains("GlobalEntityStorage: registered=1 visible=1"));
    }
}
