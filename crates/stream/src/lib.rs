//! Spatial storage and visibility tracking.
//!
//! Entities live in an [`EntityStorage`]: either a flat [`GlobalEntityStorage`]
//! scanned on every query, or a [`QuadtreeEntityStorage`] that answers range
//! queries with [`Chunk`] snapshots of its leaves. A [`RegionTracker`] diffs the
//! result of successive queries into entered, exited, and still-present sets.
//!
//! # Invariants
//! - Every quadtree leaf holds at most `max_values` entities unless it sits at `max_depth`.
//! - A position determines exactly one leaf; an entity is indexed at most once.
//! - A chunk snapshot never changes; a leaf whose contents change gets a new chunk id.
//! - Each membership-changing storage call records exactly one [`StateChanged`].
//! - A storage retains at most its [`EventLog`] capacity of undrained events.

mod chunk;
mod events;
mod quadtree;
mod storage;
mod tracker;

pub use chunk::Chunk;
pub use events::{DEFAULT_EVENT_CAPACITY, EventLog, StateChanged};
pub use quadtree::{LeafStats, Quadtree};
pub use storage::{
    EntityStorage, GlobalEntityStorage, QuadtreeEntityStorage, StorageError, Tracked,
};
pub use tracker::{Cadence, RegionDiff, RegionTracker, TickTimer, TrackerStats};

pub fn crate_info() -> &'static str {
    "orbis-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
