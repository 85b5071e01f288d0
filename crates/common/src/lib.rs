//! Shared vocabulary for the orbis engine.
//!
//! # Invariants
//! - The world is a square torus of side `world_size`; every coordinate lives in
//!   `[0, world_size)` on both axes.
//! - Distance on the torus is measured per axis, so a radius describes a square, not a circle.

mod config;
mod rect;
mod space;
mod types;

pub use config::WorldConfig;
pub use rect::Rect;
pub use space::{Distance, SpaceError, axis_distance, to_world_offset, validate_radius, wrap};
pub use types::{ChunkId, EntityId, FrameTime, Point};

pub fn crate_info() -> &'static str {
    "orbis-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
