//! Forcefield hull - convex perimeter around every active tank.
//!
//! Rebuilt from scratch every tick with a gift-wrapping (Jarvis) march.
//! Rockets touching an edge are culled.

use crate::components::Position;
use crate::geometry::{closest_point_on_segment, cross, left_of_line};
use bevy_ecs::prelude::*;

/// Distance tolerance for [`ForcefieldHull::contains`].
const CONTAINS_TOLERANCE: f32 = 0.01;

/// Convex hull of `points` as a vertex sequence.
///
/// The seed is the leftmost point, the topmost of those on ties, so it is
/// always a corner of the hull. From the current vertex the march picks the
/// candidate with no point strictly left of it, preferring the farthest
/// among collinear candidates on the same side of the current vertex, and
/// stops on returning to the seed. Empty input gives an empty hull and
/// coincident input a single vertex. At most `points.len()` vertices are
/// emitted, so rounding can never make the march spin.
pub fn build_hull(points: &[Position]) -> Vec<Position> {
    let Some(seed) = leftmost(points) else {
        return Vec::new();
    };
    let seed_pos = points[seed];

    let mut hull = Vec::new();
    let mut current = seed;
    for _ in 0..points.len() {
        let here = points[current];
        hull.push(here);

        let Some(mut candidate) = points.iter().position(|p| *p != here) else {
            break;
        };
        for (i, &p) in points.iter().enumerate() {
            if p == here {
                continue;
            }
            let best = points[candidate];
            if left_of_line(here, best, p) || (cross(here, best, p) == 0.0 && ahead_and_farther(here, best, p)) {
                candidate = i;
            }
        }

        if points[candidate] == seed_pos {
            break;
        }
        current = candidate;
    }
    hull
}

/// Whether collinear `p` lies beyond `best` on the ray from `here`.
fn ahead_and_farther(here: Position, best: Position, p: Position) -> bool {
    let to_best = best - here;
    let to_p = p - here;
    let same_side = to_best.x * to_p.x + to_best.y * to_p.y > 0.0;
    same_side && here.distance_sq(&p) > here.distance_sq(&best)
}

fn leftmost(points: &[Position]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, p) in points.iter().enumerate() {
        let better = best.map_or(true, |b| {
            let q = points[b];
            p.x < q.x || (p.x == q.x && p.y < q.y)
        });
        if better {
            best = Some(i);
        }
    }
    best
}

/// Current perimeter polygon.
#[derive(Resource, Debug, Clone, Default)]
pub struct ForcefieldHull {
    points: Vec<Position>,
}

impl ForcefieldHull {
    pub fn rebuild(&mut self, positions: &[Position]) {
        self.points = build_hull(positions);
    }

    pub fn points(&self) -> &[Position] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Polygon edges, closing back to the first vertex. A single vertex is
    /// one zero-length edge and two vertices are one segment.
    pub fn edges(&self) -> impl Iterator<Item = (Position, Position)> + '_ {
        let n = self.points.len();
        let count = match n {
            0 => 0,
            1 => 1,
            2 => 1,
            _ => n,
        };
        (0..count).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Whether `p` lies on or inside the polygon.
    pub fn contains(&self, p: Position) -> bool {
        match self.points.len() {
            0 => false,
            1 => self.points[0].distance_to(&p) <= CONTAINS_TOLERANCE,
            _ => self.edges().all(|(a, b)| {
                let len = a.distance_to(&b);
                if len <= f32::EPSILON {
                    return a.distance_to(&p) <= CONTAINS_TOLERANCE;
                }
                if self.points.len() == 2 {
                    return closest_point_on_segment(a, b, p).distance_to(&p) <= CONTAINS_TOLERANCE;
                }
                cross(a, b, p) >= -CONTAINS_TOLERANCE * len
            }),
        }
    }
}
