use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use orbis_common::{EntityId, FrameTime, Point};

use crate::buff::{BuffCarrier, BuffError, UpdatingBuff};
use crate::component::{Blink, Chest, Comment, Display, Motion};

/// What an entity is; decides which component slots must be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Comment,
    /// A comment carrying buffs that update it every tick.
    UpdatingComment,
    Chest,
    /// A bare marker, such as a spawn point.
    Point,
    Sign,
}

impl EntityKind {
    /// Component slots an entity of this kind cannot exist without.
    pub fn required_components(&self) -> &'static [&'static str] {
        match self {
            Self::Player => &["display", "motion", "buffs"],
            Self::Comment => &["comment", "display", "blink"],
            Self::UpdatingComment => &["comment", "display", "blink", "buffs"],
            Self::Chest => &["display", "chest"],
            Self::Point => &[],
            Self::Sign => &["display"],
        }
    }
}

/// Errors from building entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("{kind:?} entity requires a {component} component")]
    MissingComponent {
        kind: EntityKind,
        component: &'static str,
    },
    #[error(transparent)]
    Buff(#[from] BuffError),
}

/// An identity, a mandatory position, and optional typed component slots.
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pub position: Point,
    pub display: Option<Display>,
    pub motion: Option<Motion>,
    pub comment: Option<Comment>,
    pub blink: Option<Blink>,
    pub chest: Option<Chest>,
    pub buffs: Option<BuffCarrier>,
}

impl Entity {
    pub fn builder(kind: EntityKind, position: Point) -> EntityBuilder {
        EntityBuilder::new(kind, position)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Activate a buff against this entity and keep it in the carrier.
    pub fn apply_buff(&mut self, mut buff: Box<dyn UpdatingBuff>) -> Result<(), BuffError> {
        if self.buffs.is_none() {
            return Err(BuffError::NoCarrier);
        }
        buff.activate(self)?;
        tracing::debug!(entity = %self.id, buff = buff.name(), "buff applied");
        if let Some(carrier) = self.buffs.as_mut() {
            carrier.push_active(buff);
        }
        Ok(())
    }

    /// Advance every active buff by one tick, dropping the ones that expired.
    /// Returns how many expired.
    pub fn tick_buffs(&mut self, time: &FrameTime) -> Result<usize, BuffError> {
        let Some(carrier) = self.buffs.as_mut() else {
            return Ok(0);
        };
        let mut active = carrier.take_active();
        let mut result = Ok(());
        for buff in active.iter_mut() {
            if let Err(e) = buff.tick(self, time) {
                result = Err(e);
                break;
            }
        }
        let before = active.len();
        active.retain(|buff| !buff.is_expired());
        let expired = before - active.len();
        if let Some(carrier) = self.buffs.as_mut() {
            carrier.restore_active(active);
        }
        result.map(|()| expired)
    }

    /// Revert and drop every active buff.
    pub fn clear_buffs(&mut self) -> Result<(), BuffError> {
        let Some(carrier) = self.buffs.as_mut() else {
            return Ok(());
        };
        let mut active = carrier.take_active();
        for buff in active.iter_mut() {
            buff.remove(self)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("display", &self.display)
            .field("motion", &self.motion)
            .field("comment", &self.comment)
            .field("blink", &self.blink)
            .field("chest", &self.chest)
            .field("buffs", &self.buffs)
            .finish()
    }
}

/// Assembles an [`Entity`] and checks that its kind's required components are present.
pub struct EntityBuilder {
    kind: EntityKind,
    position: Point,
    display: Option<Display>,
    motion: Option<Motion>,
    comment: Option<Comment>,
    blink: Option<Blink>,
    chest: Option<Chest>,
    buffs: Option<BuffCarrier>,
}

impl EntityBuilder {
    pub fn new(kind: EntityKind, position: Point) -> Self {
        Self {
            kind,
            position,
            display: None,
            motion: None,
            comment: None,
            blink: None,
            chest: None,
            buffs: None,
        }
    }

    pub fn display(mut self, display: Display) -> Self {
        self.display = Some(display);
        self
    }

    pub fn motion(mut self, motion: Motion) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn comment(mut self, comment: Comment) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn blink(mut self, blink: Blink) -> Self {
        self.blink = Some(blink);
        self
    }

    pub fn chest(mut self, chest: Chest) -> Self {
        self.chest = Some(chest);
        self
    }

    pub fn buffs(mut self, carrier: BuffCarrier) -> Self {
        self.buffs = Some(carrier);
        self
    }

    pub fn build(self) -> Result<Entity, EntityError> {
        for &component in self.kind.required_components() {
            let present = match component {
                "display" => self.display.is_some(),
                "motion" => self.motion.is_some(),
                "comment" => self.comment.is_some(),
                "blink" => self.blink.is_some(),
                "chest" => self.chest.is_some(),
                "buffs" => self.buffs.is_some(),
                _ => true,
            };
            if !present {
                return Err(EntityError::MissingComponent {
                    kind: self.kind,
                    component,
                });
            }
        }
        Ok(Entity {
            id: EntityId::new(),
            kind: self.kind,
            position: self.position,
            display: self.display,
            motion: self.motion,
            comment: self.comment,
            blink: self.blink,
            chest: self.chest,
            buffs: self.buffs,
        })
    }
}

/// Shared, mutable reference to a registered entity.
///
/// Storages, trackers, and systems all hold handles to the same entity. Equality
/// and hashing go by entity id.
#[derive(Clone)]
pub struct EntityHandle {
    id: EntityId,
    inner: Rc<RefCell<Entity>>,
}

impl EntityHandle {
    pub fn new(entity: Entity) -> Self {
        Self {
            id: entity.id(),
            inner: Rc::new(RefCell::new(entity)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.inner.borrow().position
    }

    pub fn borrow(&self) -> Ref<'_, Entity> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Entity> {
        self.inner.borrow_mut()
    }
}

impl From<Entity> for EntityHandle {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityHandle {}

impl std::hash::Hash for EntityHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(entity) => write!(f, "EntityHandle({} {:?})", self.id, entity.kind()),
            Err(_) => write!(f, "EntityHandle({} <borrowed>)", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_entity_needs_nothing() {
        let e = Entity::builder(EntityKind::Point, Point::new(1.0, 2.0))
            .build()
            .unwrap();
        assert_eq!(e.kind(), EntityKind::Point);
        assert_eq!(e.position, Point::new(1.0, 2.0));
    }

    #[test]
    fn comment_requires_display_and_blink() {
        let err = Entity::builder(EntityKind::Comment, Point::ZERO)
            .comment(Comment {
                size: 20,
                color: 0xffffff,
                text: "hi".into(),
            })
            .blink(Blink::default())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            EntityError::MissingComponent {
                kind: EntityKind::Comment,
                component: "display",
            }
        );
    }

    #[test]
    fn chest_builds_with_required_parts() {
        let e = Entity::builder(EntityKind::Chest, Point::ZERO)
            .display(Display::new(Point::new(8.0, 8.0), 0))
            .chest(Chest::default())
            .build();
        assert!(e.is_ok());
    }

    #[test]
    fn handles_compare_by_id() {
        let e = Entity::builder(EntityKind::Point, Point::ZERO).build().unwrap();
        let a = EntityHandle::new(e);
        let b = a.clone();
        let other =
            EntityHandle::new(Entity::builder(EntityKind::Point, Point::ZERO).build().unwrap());
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn handle_mutation_is_shared() {
        let a = EntityHandle::new(Entity::builder(EntityKind::Point, Point::ZERO).build().unwrap());
        let b = a.clone();
        a.borrow_mut().position = Point::new(3.0, 4.0);
        assert_eq!(b.position(), Point::new(3.0, 4.0));
    }

    #[test]
    fn apply_buff_without_carrier_fails() {
        use crate::buff::{Hasty, TimedBuff};
        use std::time::Duration;

        let mut e = Entity::builder(EntityKind::Point, Point::ZERO).build().unwrap();
        let buff = TimedBuff::new(Hasty::new(1.4), Duration::from_secs(1));
        assert_eq!(e.apply_buff(Box::new(buff)), Err(BuffError::NoCarrier));
    }
}
