use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Axis-aligned rectangle given by its minimum corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The square `[0, size) x [0, size)`.
    pub fn square(size: f32) -> Self {
        Self::new(0.0, 0.0, size, size)
    }

    /// Square of half-side `radius` centered on `center`.
    pub fn inflate_from(center: Point, radius: f32) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            radius * 2.0,
            radius * 2.0,
        )
    }

    pub fn min(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn max(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment: the minimum edges are inside, the maximum edges are not.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    /// Closed overlap test; rectangles sharing only an edge count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }

    /// The four equal quadrants, in order NW, NE, SW, SE.
    pub fn quadrants(&self) -> [Rect; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            Rect::new(self.x, self.y, hw, hh),
            Rect::new(self.x + hw, self.y, hw, hh),
            Rect::new(self.x, self.y + hh, hw, hh),
            Rect::new(self.x + hw, self.y + hh, hw, hh),
        ]
    }

    /// Split a rectangle that crosses the edges of a torus of side `world_size`
    /// into at most four pieces lying inside `[0, world_size)`.
    pub fn wrapped_pieces(&self, world_size: f32) -> Vec<Rect> {
        let xs = wrap_span(self.x, self.width, world_size);
        let ys = wrap_span(self.y, self.height, world_size);
        let mut pieces = Vec::with_capacity(xs.len() * ys.len());
        for &(x, w) in &xs {
            for &(y, h) in &ys {
                pieces.push(Rect::new(x, y, w, h));
            }
        }
        pieces
    }
}

/// Fold the interval `[start, start + len]` onto `[0, size)`.
fn wrap_span(start: f32, len: f32, size: f32) -> Vec<(f32, f32)> {
    if len >= size {
        return vec![(0.0, size)];
    }
    let start = start.rem_euclid(size);
    let end = start + len;
    if end <= size {
        vec![(start, len)]
    } else {
        vec![(start, size - start), (0.0, end - size)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(9.99, 5.0)));
        assert!(!r.contains(Point::new(10.0, 5.0)));
    }

    #[test]
    fn intersects_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        let c = Rect::new(21.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn quadrants_cover_parent() {
        let r = Rect::square(8.0);
        let q = r.quadrants();
        assert_eq!(q[0], Rect::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(q[3], Rect::new(4.0, 4.0, 4.0, 4.0));
        let area: f32 = q.iter().map(|r| r.width * r.height).sum();
        assert_eq!(area, 64.0);
    }

    #[test]
    fn inside_rect_is_one_piece() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(r.wrapped_pieces(100.0), vec![r]);
    }

    #[test]
    fn corner_rect_wraps_into_four_pieces() {
        let r = Rect::inflate_from(Point::new(0.0, 0.0), 10.0);
        let pieces = r.wrapped_pieces(100.0);
        assert_eq!(pieces.len(), 4);
        assert!(pieces.contains(&Rect::new(90.0, 90.0, 10.0, 10.0)));
        assert!(pieces.contains(&Rect::new(0.0, 0.0, 10.0, 10.0)));
        let area: f32 = pieces.iter().map(|r| r.width * r.height).sum();
        assert_eq!(area, 400.0);
    }

    #[test]
    fn oversized_rect_covers_world() {
        let r = Rect::inflate_from(Point::new(50.0, 50.0), 80.0);
        assert_eq!(r.wrapped_pieces(100.0), vec![Rect::square(100.0)]);
    }
}
