//! Movement systems - routing, collision separation and waypoint following.
//!
//! Route planning and collision walk the grid cell by cell, so their
//! processing order is the grid order. Movement only touches each tank's
//! own components and visits tanks in query order.

use crate::components::*;
use crate::config::SimConfig;
use crate::spatial::{CellGrid, TankView};
use crate::terrain::TerrainResource;
use bevy_ecs::prelude::*;
use tracing::{debug, warn};

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Number of simulation steps run so far.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Computes one route per tank on the first tick it runs.
///
/// Tanks that already carry a route are left alone. An empty result means
/// the destination is unreachable and the tank stays where it is.
pub fn route_planning_system(
    mut planned: Local<bool>,
    terrain: Option<Res<TerrainResource>>,
    grid: Res<CellGrid>,
    mut tanks: Query<(&Position, &Destination, &Health, &mut Route)>,
) {
    if *planned {
        return;
    }
    *planned = true;

    let mut routed = 0usize;
    let mut unreachable = 0usize;
    for cell in grid.cells().iter().filter(|c| c.has_tanks()) {
        for member in cell.members() {
            let Ok((position, destination, health, mut route)) = tanks.get_mut(member.entity) else {
                continue;
            };
            if !health.is_alive() || !route.is_empty() {
                continue;
            }
            let waypoints = match &terrain {
                Some(terrain) => terrain.route(*position, destination.point()),
                None => vec![destination.point()],
            };
            if waypoints.is_empty() {
                unreachable += 1;
            } else {
                routed += 1;
            }
            *route = Route::new(waypoints);
        }
    }

    debug!(routed, unreachable, "routes planned");
    if unreachable > 0 {
        warn!(unreachable, "tanks without a route to their destination");
    }
}

/// Penalty separation between overlapping tanks of the same cell.
///
/// Each overlapping pair pushes both tanks apart along the line between
/// their centers by `collision_step`. Tanks in neighbouring cells never
/// push each other.
pub fn collision_system(
    config: Res<SimConfig>,
    grid: Res<CellGrid>,
    mut scratch: Local<Vec<(Entity, Position, f32)>>,
    mut tanks: Query<(&Position, &TankStats, &Health, &mut PushForce)>,
) {
    let step = config.collision_step;
    for cell in grid.cells() {
        if cell.members().len() < 2 {
            continue;
        }

        scratch.clear();
        for member in cell.members() {
            if let Ok((position, stats, health, _)) = tanks.get(member.entity) {
                if health.is_alive() {
                    scratch.push((member.entity, *position, stats.collision_radius));
                }
            }
        }

        for i in 0..scratch.len() {
            for j in (i + 1)..scratch.len() {
                let (a, pa, ra) = scratch[i];
                let (b, pb, rb) = scratch[j];
                let reach = ra + rb;
                let offset = pa - pb;
                if offset.distance_sq(&Position::default()) >= reach * reach {
                    continue;
                }
                // Coincident tanks split along x.
                let dir = if offset.x == 0.0 && offset.y == 0.0 {
                    Position::new(1.0, 0.0)
                } else {
                    offset.normalized()
                };
                if let Ok((_, _, _, mut push)) = tanks.get_mut(a) {
                    push.add(dir * step);
                }
                if let Ok((_, _, _, mut push)) = tanks.get_mut(b) {
                    push.add(dir * -step);
                }
            }
        }
    }
}

/// Applies collision pushes, follows waypoints and counts reload down.
///
/// A tank advances at most `max_speed * terrain multiplier * dt` toward its
/// next waypoint and never overshoots it. Positions are kept inside the
/// grid so every live tank always maps to a cell.
pub fn tank_movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    grid: Res<CellGrid>,
    terrain: Option<Res<TerrainResource>>,
    mut query: Query<(
        &mut Position,
        &mut Velocity,
        &mut Route,
        &mut PushForce,
        &mut Reload,
        &TankStats,
        &Health,
    )>,
) {
    let delta = dt.0;
    let dims = grid.dims();
    let tolerance = config.waypoint_tolerance;

    for (mut pos, mut vel, mut route, mut push, mut reload, stats, health) in query.iter_mut() {
        if !health.is_alive() {
            push.take();
            continue;
        }

        let mut next = *pos + push.take();

        while let Some(waypoint) = route.next() {
            if next.distance_to(&waypoint) <= tolerance {
                route.advance();
            } else {
                break;
            }
        }

        let mut moved = Position::default();
        if let Some(waypoint) = route.next() {
            let to_go = waypoint - next;
            let speed_mult = terrain
                .as_ref()
                .map(|t| t.speed_multiplier(next))
                .unwrap_or(1.0);
            let step = (stats.max_speed * speed_mult * delta).min(to_go.length());
            moved = to_go.normalized() * step;
            next += moved;
        }

        *pos = dims.clamp(next);
        *vel = Velocity::new(moved.x, moved.y);
        reload.tick(delta);
    }
}

/// Moves tanks that crossed a cell border and drops destroyed ones.
pub fn rebucket_system(mut grid: ResMut<CellGrid>, tanks: Query<(&Position, &Health)>) {
    let stats = grid.rebucket(|entity| {
        tanks.get(entity).ok().map(|(position, health)| TankView {
            position: *position,
            alive: health.is_alive(),
        })
    });
    if stats.moved > 0 || stats.evicted > 0 {
        debug!(moved = stats.moved, evicted = stats.evicted, "grid rebucketed");
    }
    if stats.out_of_range > 0 {
        warn!(count = stats.out_of_range, "tanks left the grid");
    }
}
