use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::space::SpaceError;

/// Tunable world constants.
///
/// Plain numeric configuration: everything the spatial index, trackers, and buffs
/// need to agree on. Any field missing from a serialized config takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side of the square, wrapping world.
    pub world_size: f32,
    /// Number of comment chunks along one axis; sets the tracker update radius.
    pub comment_chunks_count: u32,
    /// A quadtree leaf splits once it would hold more than this many entities.
    pub quadtree_max_values_count: usize,
    /// Leaves at this depth never split.
    pub quadtree_max_depth: u32,
    pub player_move_distance_per_second: f32,
    /// Widest comment the renderer produces; comments are anchored at their center.
    pub maximum_comment_width: f32,
    pub hasty_boost_ratio: f64,
    pub chest_spawn_cooldown_ms: u64,
    /// Share of the chest cooldown a hasty buff lasts.
    pub hasty_duration_fraction: f64,
    /// Pending buffs kept per carrier.
    pub max_pending_buffs: usize,
    /// Comments allowed to carry an updating buff at load time.
    pub max_updating_comments_count: usize,
    /// Distance at which the trackee opens a chest.
    pub chest_touch_distance: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_size: 40_000.0,
            comment_chunks_count: 50,
            quadtree_max_values_count: 10,
            quadtree_max_depth: 6,
            player_move_distance_per_second: 216.0,
            maximum_comment_width: 100.0,
            hasty_boost_ratio: 1.4,
            chest_spawn_cooldown_ms: 120_000,
            hasty_duration_fraction: 0.9,
            max_pending_buffs: 1,
            max_updating_comments_count: 100,
            chest_touch_distance: 40.0,
        }
    }
}

impl WorldConfig {
    /// Check that the constants are mutually consistent.
    ///
    /// Quadtree cells must tile the world exactly, so the world size has to be a
    /// multiple of `2^quadtree_max_depth`.
    pub fn validate(&self) -> Result<(), SpaceError> {
        if !(self.world_size.is_finite() && self.world_size > 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "world_size must be positive, got {}",
                self.world_size
            )));
        }
        if self.quadtree_max_depth > 16 {
            return Err(SpaceError::InvalidConfig(format!(
                "quadtree_max_depth {} exceeds 16",
                self.quadtree_max_depth
            )));
        }
        let cells = (1u32 << self.quadtree_max_depth) as f32;
        if self.world_size.fract() != 0.0 || (self.world_size % cells) != 0.0 {
            return Err(SpaceError::InvalidConfig(format!(
                "world_size {} is not divisible by 2^{}",
                self.world_size, self.quadtree_max_depth
            )));
        }
        if self.quadtree_max_values_count == 0 {
            return Err(SpaceError::InvalidConfig(
                "quadtree_max_values_count must be at least 1".into(),
            ));
        }
        if self.comment_chunks_count == 0 {
            return Err(SpaceError::InvalidConfig(
                "comment_chunks_count must be at least 1".into(),
            ));
        }
        if self.max_pending_buffs == 0 {
            return Err(SpaceError::InvalidConfig(
                "max_pending_buffs must be at least 1".into(),
            ));
        }
        if !(self.hasty_boost_ratio.is_finite() && self.hasty_boost_ratio > 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "hasty_boost_ratio must be positive, got {}",
                self.hasty_boost_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.hasty_duration_fraction) {
            return Err(SpaceError::InvalidConfig(format!(
                "hasty_duration_fraction must lie in [0, 1], got {}",
                self.hasty_duration_fraction
            )));
        }
        Ok(())
    }

    /// Sampling radius for a viewport: the longer side, plus the part of a comment
    /// that may hang outside its chunk, plus two seconds of player movement, with
    /// ten percent headroom.
    pub fn render_radius(&self, viewport_width: f32, viewport_height: f32) -> f32 {
        let longer_side = viewport_width.max(viewport_height);
        let buffering_distance = self.player_move_distance_per_second * 2.0;
        let radius =
            longer_side + self.maximum_comment_width_outside_chunk() + buffering_distance;
        (radius * 1.1).ceil()
    }

    pub fn maximum_comment_width_outside_chunk(&self) -> f32 {
        self.maximum_comment_width / 2.0
    }

    pub fn background_sampling_radius(&self) -> f32 {
        self.world_size / 10.0
    }

    pub fn entity_tracker_update_radius(&self) -> f32 {
        self.world_size / self.comment_chunks_count as f32
    }

    pub fn chest_spawn_cooldown(&self) -> Duration {
        Duration::from_millis(self.chest_spawn_cooldown_ms)
    }

    pub fn hasty_duration(&self) -> Duration {
        let millis = self.chest_spawn_cooldown_ms as f64 * self.hasty_duration_fraction;
        Duration::from_millis(millis.round() as u64)
    }
}
