//! Buffs: reversible mutations of one component, timed or permanent.
//!
//! # Invariants
//! - `set` runs exactly once, when the buff is activated.
//! - `unset` runs at most once, on expiry or explicit removal, and only after `set`.
//! - An expired buff never touches its target again.

mod chromatic;
mod container;
mod factory;
mod hasty;

use std::fmt;
use std::time::Duration;

use orbis_common::FrameTime;

use crate::component::Component;
use crate::entity::Entity;

pub use chromatic::{BouncingColorTransition, Chromatic, ColorTransitionLaw};
pub use container::{BuffData, BuffDataContainer, BuffKind};
pub use factory::{BuffFactory, BuffStrategy};
pub use hasty::Hasty;

/// Errors from the buff engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuffError {
    #[error("no buff data available")]
    EmptyContainer,
    #[error("buff container capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
    #[error("buff target requires a {0} component")]
    MissingComponent(&'static str),
    #[error("entity has no buff carrier")]
    NoCarrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffState {
    /// Created but never activated.
    Pending,
    Active,
    Expired,
}

/// The delta a buff applies to its target component.
pub trait BuffEffect: 'static {
    type Target: Component;

    fn name(&self) -> &'static str;

    /// Apply the delta.
    fn set(&mut self, target: &mut Self::Target);

    /// Called every tick while the buff is active.
    fn update(&mut self, _target: &mut Self::Target, _time: &FrameTime) {}

    /// Revert exactly what `set` applied.
    fn unset(&mut self, target: &mut Self::Target);
}

/// A buff living in an entity's [`BuffCarrier`], driven once per tick.
pub trait UpdatingBuff {
    fn name(&self) -> &'static str;

    /// Apply the delta to the entity. Called once, before the first tick.
    fn activate(&mut self, entity: &mut Entity) -> Result<(), BuffError>;

    fn tick(&mut self, entity: &mut Entity, time: &FrameTime) -> Result<(), BuffError>;

    fn is_expired(&self) -> bool;

    /// Revert the delta now if it is still applied, and expire.
    fn remove(&mut self, entity: &mut Entity) -> Result<(), BuffError>;
}

fn target_of<C: Component>(entity: &mut Entity) -> Result<&mut C, BuffError> {
    C::slot(entity).ok_or(BuffError::MissingComponent(C::NAME))
}

/// A buff that reverts itself once its duration has elapsed.
#[derive(Debug)]
pub struct TimedBuff<E> {
    effect: E,
    duration: Duration,
    remaining: Duration,
    state: BuffState,
}

impl<E: BuffEffect> TimedBuff<E> {
    pub fn new(effect: E, duration: Duration) -> Self {
        Self {
            effect,
            duration,
            remaining: duration,
            state: BuffState::Pending,
        }
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn state(&self) -> BuffState {
        self.state
    }

    pub fn activate_component(&mut self, target: &mut E::Target) {
        if self.state == BuffState::Pending {
            self.effect.set(target);
            self.state = BuffState::Active;
        }
    }

    /// One tick against the target component.
    ///
    /// The first tick of a never-activated buff applies `set` in place of `update`.
    /// The tick on which the remaining time reaches zero calls `unset` and expires.
    pub fn tick_component(&mut self, target: &mut E::Target, time: &FrameTime) {
        match self.state {
            BuffState::Expired => return,
            BuffState::Pending => self.activate_component(target),
            BuffState::Active => self.effect.update(target, time),
        }
        self.remaining = self.remaining.saturating_sub(time.elapsed);
        if self.remaining.is_zero() {
            self.effect.unset(target);
            self.state = BuffState::Expired;
        }
    }

    pub fn remove_component(&mut self, target: &mut E::Target) {
        if self.state == BuffState::Active {
            self.effect.unset(target);
        }
        self.state = BuffState::Expired;
    }
}

impl<E: BuffEffect> UpdatingBuff for TimedBuff<E> {
    fn name(&self) -> &'static str {
        self.effect.name()
    }

    fn activate(&mut self, entity: &mut Entity) -> Result<(), BuffError> {
        let target = target_of::<E::Target>(entity)?;
        self.activate_component(target);
        Ok(())
    }

    fn tick(&mut self, entity: &mut Entity, time: &FrameTime) -> Result<(), BuffError> {
        if self.state == BuffState::Expired {
            return Ok(());
        }
        let target = target_of::<E::Target>(entity)?;
        self.tick_component(target, time);
        Ok(())
    }

    fn is_expired(&self) -> bool {
        self.state == BuffState::Expired
    }

    fn remove(&mut self, entity: &mut Entity) -> Result<(), BuffError> {
        if self.state == BuffState::Active {
            let target = target_of::<E::Target>(entity)?;
            self.remove_component(target);
        }
        self.state = BuffState::Expired;
        Ok(())
    }
}

/// A buff that stays until removed from outside.
#[derive(Debug)]
pub struct PermanentBuff<E> {
    effect: E,
    state: BuffState,
}

impl<E: BuffEffect> PermanentBuff<E> {
    pub fn new(effect: E) -> Self {
        Self {
            effect,
            state: BuffState::Pending,
        }
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn state(&self) -> BuffState {
        self.state
    }
}

impl<E: BuffEffect> UpdatingBuff for PermanentBuff<E> {
    fn name(&self) -> &'static str {
        self.effect.name()
    }

    fn activate(&mut self, entity: &mut Entity) -> Result<(), BuffError> {
        if self.state == BuffState::Pending {
            let target = target_of::<E::Target>(entity)?;
            self.effect.set(target);
            self.state = BuffState::Active;
        }
        Ok(())
    }

    fn tick(&mut self, entity: &mut Entity, time: &FrameTime) -> Result<(), BuffError> {
        match self.state {
            BuffState::Expired => Ok(()),
            BuffState::Pending => self.activate(entity),
            BuffState::Active => {
                let target = target_of::<E::Target>(entity)?;
                self.effect.update(target, time);
                Ok(())
            }
        }
    }

    fn is_expired(&self) -> bool {
        self.state == BuffState::Expired
    }

    fn remove(&mut self, entity: &mut Entity) -> Result<(), BuffError> {
        if self.state == BuffState::Active {
            let target = target_of::<E::Target>(entity)?;
            self.effect.unset(target);
        }
        self.state = BuffState::Expired;
        Ok(())
    }
}

/// Per-entity buff slot: buffs currently running plus data for buffs granted
/// but not yet used.
pub struct BuffCarrier {
    pending: BuffDataContainer,
    active: Vec<Box<dyn UpdatingBuff>>,
}

impl BuffCarrier {
    pub fn new(max_pending: usize) -> Result<Self, BuffError> {
        Ok(Self {
            pending: BuffDataContainer::new(max_pending)?,
            active: Vec::new(),
        })
    }

    pub fn pending(&self) -> &BuffDataContainer {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut BuffDataContainer {
        &mut self.pending
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_names(&self) -> Vec<&'static str> {
        self.active.iter().map(|b| b.name()).collect()
    }

    /// Buff to attach to the next comment this carrier sends: the oldest granted
    /// one, consumed, or [`BuffKind::None`].
    pub fn take_for_comment(&mut self) -> BuffData {
        match self.pending.peek(Some(BuffData::NONE)) {
            Ok(data) if self.pending.has_buff() => {
                // has_buff guarantees pop succeeds
                let _ = self.pending.pop();
                data
            }
            _ => BuffData::NONE,
        }
    }

    pub(crate) fn push_active(&mut self, buff: Box<dyn UpdatingBuff>) {
        self.active.push(buff);
    }

    pub(crate) fn take_active(&mut self) -> Vec<Box<dyn UpdatingBuff>> {
        std::mem::take(&mut self.active)
    }

    pub(crate) fn restore_active(&mut self, mut active: Vec<Box<dyn UpdatingBuff>>) {
        // buffs applied while ticking were pushed onto the emptied list
        active.append(&mut self.active);
        self.active = active;
    }
}

impl fmt::Debug for BuffCarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuffCarrier")
            .field("pending", &self.pending)
            .field("active", &self.active_names())
            .finish()
    }
}
