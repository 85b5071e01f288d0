use orbis_common::{ChunkId, Point};
use serde::{Deserialize, Serialize};

use crate::buff::BuffCarrier;
use crate::entity::Entity;

/// A component that lives in one of the entity's optional slots.
///
/// Buffs use this to reach the component they mutate without knowing the
/// rest of the entity.
pub trait Component: Sized + 'static {
    const NAME: &'static str;

    fn slot(entity: &mut Entity) -> Option<&mut Self>;
}

/// Visual state consumed by the rendering backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Display {
    /// Half of the rendered bounds, used for display-aware closeness.
    pub half_extent: Point,
    /// 0xRRGGBB tint.
    pub color: u32,
    pub visible: bool,
    /// Chunk the display is currently attached to, if any.
    pub parent: Option<ChunkId>,
    /// Offset from the parent chunk's origin.
    pub offset: Point,
}

impl Display {
    pub fn new(half_extent: Point, color: u32) -> Self {
        Self {
            half_extent,
            color,
            visible: false,
            parent: None,
            offset: Point::ZERO,
        }
    }

    pub fn attach(&mut self, parent: ChunkId, offset: Point) {
        self.parent = Some(parent);
        self.offset = offset;
        self.visible = true;
    }

    /// Show the display on its own, positioned in world coordinates rather
    /// than relative to a chunk.
    pub fn attach_to_world(&mut self, position: Point) {
        self.parent = None;
        self.offset = position;
        self.visible = true;
    }

    pub fn detach(&mut self) {
        self.parent = None;
        self.visible = false;
    }
}

impl Component for Display {
    const NAME: &'static str = "display";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.display.as_mut()
    }
}

/// Movement state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Units per second before boosts.
    pub velocity: Point,
    /// Product of every active speed multiplier.
    pub speed_boost_ratio: f64,
}

impl Motion {
    pub fn effective_velocity(&self) -> Point {
        self.velocity * self.speed_boost_ratio as f32
    }
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            velocity: Point::ZERO,
            speed_boost_ratio: 1.0,
        }
    }
}

impl Component for Motion {
    const NAME: &'static str = "motion";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.motion.as_mut()
    }
}

/// Text content of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub size: u32,
    pub color: u32,
    pub text: String,
}

impl Component for Comment {
    const NAME: &'static str = "comment";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.comment.as_mut()
    }
}

/// Highlight shown on freshly arrived comments until released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blink {
    pub blinking: bool,
}

impl Blink {
    pub fn start(&mut self) {
        self.blinking = true;
    }

    pub fn release(&mut self) {
        self.blinking = false;
    }
}

impl Component for Blink {
    const NAME: &'static str = "blink";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.blink.as_mut()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chest {
    pub is_open: bool,
}

impl Component for Chest {
    const NAME: &'static str = "chest";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.chest.as_mut()
    }
}

impl Component for BuffCarrier {
    const NAME: &'static str = "buffs";

    fn slot(entity: &mut Entity) -> Option<&mut Self> {
        entity.buffs.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_attach_detach() {
        let mut d = Display::new(Point::new(5.0, 2.0), 0xffffff);
        assert!(!d.visible);
        d.attach(ChunkId(3), Point::new(1.0, 1.0));
        assert_eq!(d.parent, Some(ChunkId(3)));
        assert!(d.visible);
        d.detach();
        assert_eq!(d.parent, None);
        assert!(!d.visible);
    }

    #[test]
    fn motion_applies_boost() {
        let m = Motion {
            velocity: Point::new(10.0, 0.0),
            speed_boost_ratio: 1.5,
        };
        assert_eq!(m.effective_velocity(), Point::new(15.0, 0.0));
    }

    #[test]
    fn blink_toggles() {
        let mut b = Blink::default();
        b.start();
        assert!(b.blinking);
        b.release();
        assert!(!b.blinking);
    }
}
