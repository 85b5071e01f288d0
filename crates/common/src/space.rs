use crate::types::Point;

/// Errors raised by geometric validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("radius must be finite and non-negative, got {0}")]
    InvalidRadius(f32),
    #[error("position ({x}, {y}) lies outside the world [0, {world_size})")]
    OutOfBounds { x: f32, y: f32, world_size: f32 },
    #[error("invalid world configuration: {0}")]
    InvalidConfig(String),
}

/// Reject negative or non-finite radii. Zero is valid and means "nothing".
pub fn validate_radius(radius: f32) -> Result<(), SpaceError> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(SpaceError::InvalidRadius(radius))
    }
}

/// Distance between two coordinates on one wrapping axis.
pub fn axis_distance(a: f32, b: f32, world_size: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(world_size);
    d.min(world_size - d)
}

/// Map a point onto `[0, world_size)` on both axes.
pub fn wrap(p: Point, world_size: f32) -> Point {
    let x = p.x.rem_euclid(world_size);
    let y = p.y.rem_euclid(world_size);
    // rem_euclid may round up to exactly world_size for tiny negative inputs
    Point::new(
        if x >= world_size { 0.0 } else { x },
        if y >= world_size { 0.0 } else { y },
    )
}

/// Shortest signed offset from `origin` to `target` on the torus.
pub fn to_world_offset(target: Point, origin: Point, world_size: f32) -> Point {
    Point::new(
        wrapped_delta(origin.x, target.x, world_size),
        wrapped_delta(origin.y, target.y, world_size),
    )
}

fn wrapped_delta(origin: f32, target: f32, extent: f32) -> f32 {
    let mut delta = (target - origin).rem_euclid(extent);
    if delta > extent * 0.5 {
        delta -= extent;
    }
    delta
}

/// Closeness test on the torus for a fixed radius.
///
/// Membership is per axis: a point is close when its wrapped distance is within
/// the radius on both axes. The region described is therefore a square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    radius: f32,
    world_size: f32,
}

impl Distance {
    pub fn new(radius: f32, world_size: f32) -> Result<Self, SpaceError> {
        validate_radius(radius)?;
        if !(world_size.is_finite() && world_size > 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "world size must be positive, got {world_size}"
            )));
        }
        Ok(Self { radius, world_size })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    pub fn is_close(&self, a: Point, b: Point) -> bool {
        axis_distance(a.x, b.x, self.world_size) <= self.radius
            && axis_distance(a.y, b.y, self.world_size) <= self.radius
    }

    /// Like [`Distance::is_close`], but widened by the rendered half-extent of the
    /// entity at `position`, so wide visuals count as close before their center does.
    pub fn is_display_close(&self, position: Point, half_extent: Point, other: Point) -> bool {
        axis_distance(position.x, other.x, self.world_size) <= self.radius + half_extent.x
            && axis_distance(position.y, other.y, self.world_size) <= self.radius + half_extent.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: f32 = 40_000.0;

    #[test]
    fn negative_and_nan_radius_rejected() {
        assert_eq!(validate_radius(-1.0), Err(SpaceError::InvalidRadius(-1.0)));
        assert!(validate_radius(f32::NAN).is_err());
        assert!(validate_radius(0.0).is_ok());
    }

    #[test]
    fn opposite_edges_are_adjacent() {
        assert_eq!(axis_distance(0.0, W - 1.0, W), 1.0);
        assert_eq!(axis_distance(W - 1.0, 0.0, W), 1.0);
        let d = Distance::new(1.0, W).unwrap();
        assert!(d.is_close(Point::new(0.0, 0.0), Point::new(W - 1.0, 0.0)));
    }

    #[test]
    fn closeness_is_square_not_circle() {
        let d = Distance::new(10.0, W).unwrap();
        // corner of the square: euclidean distance ~14.1 but still close
        assert!(d.is_close(Point::new(100.0, 100.0), Point::new(110.0, 110.0)));
        assert!(!d.is_close(Point::new(100.0, 100.0), Point::new(111.0, 100.0)));
    }

    #[test]
    fn display_closeness_inflates_by_half_extent() {
        let d = Distance::new(10.0, W).unwrap();
        let pos = Point::new(100.0, 100.0);
        let observer = Point::new(125.0, 100.0);
        assert!(!d.is_close(pos, observer));
        assert!(d.is_display_close(pos, Point::new(20.0, 5.0), observer));
    }

    #[test]
    fn wrap_maps_into_world() {
        assert_eq!(wrap(Point::new(-1.0, W + 5.0), W), Point::new(W - 1.0, 5.0));
    }

    #[test]
    fn offset_takes_short_way_round() {
        let off = to_world_offset(Point::new(W - 10.0, 5.0), Point::new(10.0, 0.0), W);
        assert_eq!(off, Point::new(-20.0, 5.0));
    }

    #[test]
    fn distance_rejects_bad_world_size() {
        assert!(Distance::new(1.0, 0.0).is_err());
    }
}
