//! Intersection tests shared by combat and the forcefield.

use crate::components::Position;
use serde::{Deserialize, Serialize};

/// Signed area of the triangle (a, b, p), doubled.
///
/// Negative means `p` lies left of the directed line a -> b in screen
/// coordinates (y down).
#[inline]
pub fn cross(a: Position, b: Position, p: Position) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Whether `point` lies strictly left of the line from `start` to `end`.
#[inline]
pub fn left_of_line(start: Position, end: Position, point: Position) -> bool {
    cross(start, end, point) < 0.0
}

/// Closest point to `p` on the segment a-b.
pub fn closest_point_on_segment(a: Position, b: Position, p: Position) -> Position {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether a circle touches the segment a-b.
pub fn circle_segment_intersect(a: Position, b: Position, center: Position, radius: f32) -> bool {
    closest_point_on_segment(a, b, center).distance_sq(&center) <= radius * radius
}

/// Whether two circles overlap.
#[inline]
pub fn circles_overlap(a: Position, ra: f32, b: Position, rb: f32) -> bool {
    let r = ra + rb;
    a.distance_sq(&b) < r * r
}

/// Axis-aligned rectangle given by its min and max corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Position,
    pub max: Position,
}

impl Rect {
    pub fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    pub fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(Position::new(x, y), Position::new(x + width, y + height))
    }

    /// Corners in top-left, top-right, bottom-left, bottom-right order.
    pub fn corners(&self) -> [Position; 4] {
        [
            self.min,
            Position::new(self.max.x, self.min.y),
            Position::new(self.min.x, self.max.y),
            self.max,
        ]
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn intersects_circle(&self, center: Position, radius: f32) -> bool {
        let closest = Position::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
        );
        closest.distance_sq(&center) <= radius * radius
    }
}
