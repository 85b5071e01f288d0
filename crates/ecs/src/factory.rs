use orbis_common::{Point, WorldConfig, wrap};
use serde::{Deserialize, Serialize};

use crate::buff::{BuffCarrier, BuffData, BuffFactory};
use crate::component::{Blink, Chest, Comment, Display, Motion};
use crate::entity::{Entity, EntityBuilder, EntityError, EntityKind};

const PLAYER_HALF_EXTENT: Point = Point::new(12.0, 16.0);
const CHEST_HALF_EXTENT: Point = Point::new(14.0, 12.0);
const PLAYER_COLOR: u32 = 0xffffff;
const CHEST_COLOR: u32 = 0xc8a040;

/// A comment as it arrives from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentData {
    pub position: Point,
    pub size: u32,
    pub color: u32,
    pub text: String,
    #[serde(default)]
    pub buff: Option<BuffData>,
}

/// Builds every kind of entity with its required components in place.
///
/// Positions are wrapped into the world before the entity is built.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    world_size: f32,
    max_pending_buffs: usize,
    maximum_comment_width: f32,
    buffs: BuffFactory,
}

impl EntityFactory {
    pub fn new(config: &WorldConfig, buffs: BuffFactory) -> Self {
        Self {
            world_size: config.world_size,
            max_pending_buffs: config.max_pending_buffs,
            maximum_comment_width: config.maximum_comment_width,
            buffs,
        }
    }

    pub fn buff_factory(&mut self) -> &mut BuffFactory {
        &mut self.buffs
    }

    pub fn create_player(&self, position: Point) -> Result<Entity, EntityError> {
        Entity::builder(EntityKind::Player, wrap(position, self.world_size))
            .display(Display::new(PLAYER_HALF_EXTENT, PLAYER_COLOR))
            .motion(Motion::default())
            .buffs(BuffCarrier::new(self.max_pending_buffs)?)
            .build()
    }

    /// A plain comment, or an updating one when the data carries a buff.
    pub fn create_comment(&mut self, data: &CommentData) -> Result<Entity, EntityError> {
        match data.buff.filter(|b| !b.is_none()) {
            Some(buff) => self.create_updating_comment(data, buff),
            None => self.comment_builder(data, EntityKind::Comment).build(),
        }
    }

    /// A comment sent by the owner of `carrier`. When `data` names no buff,
    /// the carrier's oldest pending buff is consumed and attached instead.
    /// Freshly sent comments start blinking.
    pub fn create_comment_from(
        &mut self,
        carrier: &mut BuffCarrier,
        data: &CommentData,
    ) -> Result<Entity, EntityError> {
        let buff = match data.buff.filter(|b| !b.is_none()) {
            Some(buff) => buff,
            None => carrier.take_for_comment(),
        };
        let mut entity = if buff.is_none() {
            self.comment_builder(data, EntityKind::Comment).build()?
        } else {
            self.create_updating_comment(data, buff)?
        };
        if let Some(blink) = entity.blink.as_mut() {
            blink.start();
        }
        Ok(entity)
    }

    pub fn create_updating_comment(
        &mut self,
        data: &CommentData,
        buff: BuffData,
    ) -> Result<Entity, EntityError> {
        let mut entity = self
            .comment_builder(data, EntityKind::UpdatingComment)
            .buffs(BuffCarrier::new(self.max_pending_buffs)?)
            .build()?;
        if let Some(running) = self.buffs.create(buff) {
            entity.apply_buff(running)?;
        }
        Ok(entity)
    }

    pub fn create_chest(&self, position: Point) -> Result<Entity, EntityError> {
        Entity::builder(EntityKind::Chest, wrap(position, self.world_size))
            .display(Display::new(CHEST_HALF_EXTENT, CHEST_COLOR))
            .chest(Chest::default())
            .build()
    }

    pub fn create_point(&self, position: Point) -> Result<Entity, EntityError> {
        Entity::builder(EntityKind::Point, wrap(position, self.world_size)).build()
    }

    pub fn create_sign(&self, position: Point, display: Display) -> Result<Entity, EntityError> {
        Entity::builder(EntityKind::Sign, wrap(position, self.world_size))
            .display(display)
            .build()
    }

    fn comment_builder(&self, data: &CommentData, kind: EntityKind) -> EntityBuilder {
        // rough glyph metrics: half a font size per character, capped at the maximum width
        let size = data.size as f32;
        let width = (data.text.chars().count() as f32 * size * 0.5).min(self.maximum_comment_width);
        let display = Display::new(Point::new(width / 2.0, size / 2.0), data.color);
        Entity::builder(kind, wrap(data.position, self.world_size))
            .comment(Comment {
                size: data.size,
                color: data.color,
                text: data.text.clone(),
            })
            .display(display)
            .blink(Blink::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::BuffKind;

    fn factory() -> EntityFactory {
        let config = WorldConfig::default();
        EntityFactory::new(&config, BuffFactory::new(&config, 9))
    }

    fn data(buff: Option<BuffData>) -> CommentData {
        CommentData {
            position: Point::new(-10.0, 40_010.0),
            size: 20,
            color: 0x00ff00,
            text: "hello".into(),
            buff,
        }
    }

    #[test]
    fn positions_are_wrapped() {
        let f = factory();
        let chest = f.create_chest(Point::new(-1.0, 0.0)).unwrap();
        assert_eq!(chest.position, Point::new(39_999.0, 0.0));
    }

    #[test]
    fn plain_comment() {
        let mut f = factory();
        let e = f.create_comment(&data(None)).unwrap();
        assert_eq!(e.kind(), EntityKind::Comment);
        assert_eq!(e.position, Point::new(39_990.0, 10.0));
        assert!(e.buffs.is_none());
        assert_eq!(e.display.unwrap().half_extent, Point::new(25.0, 10.0));
    }

    #[test]
    fn none_buff_makes_plain_comment() {
        let mut f = factory();
        let e = f.create_comment(&data(Some(BuffData::NONE))).unwrap();
        assert_eq!(e.kind(), EntityKind::Comment);
    }

    #[test]
    fn buffed_comment_runs_its_buff() {
        let mut f = factory();
        let e = f
            .create_comment(&data(Some(BuffData::new(BuffKind::Chromatic))))
            .unwrap();
        assert_eq!(e.kind(), EntityKind::UpdatingComment);
        assert_eq!(e.buffs.as_ref().unwrap().active_names(), vec!["chromatic"]);
    }

    #[test]
    fn sent_comment_consumes_pending_buff() {
        let mut f = factory();
        let mut carrier = BuffCarrier::new(1).unwrap();
        carrier.pending_mut().add(BuffData::new(BuffKind::Chromatic));

        let first = f.create_comment_from(&mut carrier, &data(None)).unwrap();
        assert_eq!(first.kind(), EntityKind::UpdatingComment);
        assert_eq!(first.buffs.as_ref().unwrap().active_names(), vec!["chromatic"]);
        assert!(first.blink.unwrap().blinking);
        assert!(!carrier.pending().has_buff());

        let second = f.create_comment_from(&mut carrier, &data(None)).unwrap();
        assert_eq!(second.kind(), EntityKind::Comment);
    }

    #[test]
    fn sent_comment_keeps_its_own_buff() {
        let mut f = factory();
        let mut carrier = BuffCarrier::new(1).unwrap();
        carrier.pending_mut().add(BuffData::new(BuffKind::Hasty));

        let e = f
            .create_comment_from(&mut carrier, &data(Some(BuffData::new(BuffKind::Chromatic))))
            .unwrap();
        assert_eq!(e.buffs.as_ref().unwrap().active_names(), vec!["chromatic"]);
        assert!(carrier.pending().has_buff());
    }

    #[test]
    fn player_has_carrier_and_motion() {
        let f = factory();
        let p = f.create_player(Point::ZERO).unwrap();
        assert_eq!(p.kind(), EntityKind::Player);
        assert_eq!(p.motion.unwrap().speed_boost_ratio, 1.0);
        assert_eq!(p.buffs.as_ref().unwrap().pending().max_size(), 1);
    }
}
