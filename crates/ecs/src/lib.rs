//! Entities, their components, and the buff engine.
//!
//! An entity is an id, a position, and a fixed set of optional component slots.
//! Which slots must be filled is decided by its [`EntityKind`] and checked when
//! the entity is built. Registered entities are shared through [`EntityHandle`].
//!
//! # Invariants
//! - An entity's id never changes; handles compare and hash by it.
//! - An entity built through [`EntityBuilder`] always has its kind's required components.
//! - Every buff applied to an entity is reverted at most once.

pub mod buff;
mod component;
mod entity;
mod factory;

pub use buff::{
    BuffCarrier, BuffData, BuffDataContainer, BuffEffect, BuffError, BuffFactory, BuffKind,
    BuffState, BuffStrategy, Chromatic, Hasty, PermanentBuff, TimedBuff, UpdatingBuff,
};
pub use component::{Blink, Chest, Comment, Component, Display, Motion};
pub use entity::{Entity, EntityBuilder, EntityError, EntityHandle, EntityKind};
pub use factory::{CommentData, EntityFactory};

pub fn crate_info() -> &'static str {
    "orbis-ecs v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("ecs"));
    }
}
