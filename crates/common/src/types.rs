use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A position on the world plane.
pub type Point = glam::Vec2;

/// Unique identifier for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identity of one immutable chunk snapshot produced by the spatial index.
///
/// A chunk whose contents change is replaced by a snapshot with a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub u64);

/// Timing of one fixed-step tick, handed to every system hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    /// Sequence number of the tick, starting at 1 for the first tick.
    pub tick: u64,
    /// Time elapsed since the previous tick.
    pub elapsed: Duration,
}

impl FrameTime {
    pub fn new(tick: u64, elapsed: Duration) -> Self {
        Self { tick, elapsed }
    }

    /// The tick following this one with the same step.
    pub fn next(self) -> Self {
        Self {
            tick: self.tick + 1,
            elapsed: self.elapsed,
        }
    }

    /// Elapsed time in seconds, for velocity integration.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

impl Default for FrameTime {
    /// A 60 Hz step at tick 0.
    fn default() -> Self {
        Self {
            tick: 0,
            elapsed: Duration::from_micros(16_667),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn entity_id_display_is_short() {
        let id = EntityId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn frame_time_advances() {
        let t = FrameTime::new(1, Duration::from_millis(20));
        let n = t.next();
        assert_eq!(n.tick, 2);
        assert_eq!(n.elapsed, Duration::from_millis(20));
        assert!((n.elapsed_secs() - 0.02).abs() < 1e-6);
    }
}
