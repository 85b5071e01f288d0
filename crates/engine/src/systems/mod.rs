//! Built-in systems bound into the visibility pipeline.

mod add_child;
mod blink;
mod buff_tick;
mod chest;
mod collision;
mod motion;

pub use add_child::AddChildToRegionSystem;
pub use blink::BlinkCachedDisplaySystem;
pub use buff_tick::BuffTickSystem;
pub use chest::{ChestSystem, SharedChestSystem};
pub use collision::CollisionDetectionSystem;
pub use motion::MotionSystem;
