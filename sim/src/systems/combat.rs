//! Combat resolver - rockets, forcefield culling and particle beams.
//!
//! ## Locality
//!
//! Rocket hit tests only look at tanks in the cell the rocket is in after
//! moving, and beams only at the cells holding their four corners. A rocket
//! straddling a cell border can pass an enemy in the neighbouring cell.
//!
//! ## Kills
//!
//! A lethal hit spawns a smoke plume and evicts the tank from its cell right
//! away, so later tests in the same tick never see it again.

use crate::components::*;
use crate::config::SimConfig;
use crate::geometry::{circle_segment_intersect, circles_overlap, Rect};
use crate::hull::ForcefieldHull;
use crate::spatial::CellGrid;
use crate::systems::effects::Effects;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Smoke offset for tanks destroyed by a rocket.
const ROCKET_SMOKE_OFFSET: Position = Position { x: 7.0, y: 24.0 };
/// Smoke offset for tanks destroyed by a beam.
const BEAM_SMOKE_OFFSET: Position = Position { x: 0.0, y: 48.0 };

/// A projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rocket {
    pub position: Position,
    /// Displacement per tick.
    pub velocity: Position,
    pub radius: f32,
    pub faction: Faction,
    pub active: bool,
}

impl Rocket {
    pub fn new(position: Position, velocity: Position, radius: f32, faction: Faction) -> Self {
        Self {
            position,
            velocity,
            radius,
            faction,
            active: true,
        }
    }

    /// Rocket from `origin` heading for `target` at `speed` units per tick.
    pub fn aimed(origin: Position, target: Position, speed: f32, radius: f32, faction: Faction) -> Self {
        Self::new(origin, (target - origin).normalized() * speed, radius, faction)
    }

    pub fn advance(&mut self) {
        self.position += self.velocity;
    }

    pub fn intersects(&self, center: Position, radius: f32) -> bool {
        circles_overlap(self.position, self.radius, center, radius)
    }
}

/// Live rockets in firing order.
#[derive(Resource, Debug, Default, Clone)]
pub struct Rockets(pub Vec<Rocket>);

impl Rockets {
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|r| r.active).count()
    }
}

/// A fixed rectangle dealing damage every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleBeam {
    pub rect: Rect,
    pub damage: i32,
    /// Animation frame, cycling through `BEAM_FRAMES`.
    pub frame: u32,
}

impl ParticleBeam {
    pub const BEAM_FRAMES: u32 = 3;

    pub fn new(rect: Rect, damage: i32) -> Self {
        Self { rect, damage, frame: 0 }
    }

    pub fn animate(&mut self) {
        self.frame = (self.frame + 1) % Self::BEAM_FRAMES;
    }

    /// Grid cells holding the beam's corners, without repeats, in corner order.
    pub fn corner_cells(&self, grid: &CellGrid) -> Vec<usize> {
        let mut cells = Vec::with_capacity(4);
        for corner in self.rect.corners() {
            if let Some(id) = grid.cell_index_of(corner) {
                if !cells.contains(&id) {
                    cells.push(id);
                }
            }
        }
        cells
    }
}

#[derive(Resource, Debug, Default, Clone)]
pub struct ParticleBeams(pub Vec<ParticleBeam>);

/// Moves rockets and resolves hits against enemies in the same cell.
///
/// A rocket that leaves the world is deactivated without an explosion.
pub fn rocket_system(
    config: Res<SimConfig>,
    mut grid: ResMut<CellGrid>,
    mut rockets: ResMut<Rockets>,
    mut effects: ResMut<Effects>,
    mut tanks: Query<(&Faction, &Position, &TankStats, &mut Health)>,
) {
    for rocket in rockets.0.iter_mut().filter(|r| r.active) {
        rocket.advance();

        let Some(cell) = grid.cell_index_of(rocket.position).and_then(|id| grid.cell(id)) else {
            rocket.active = false;
            continue;
        };

        let hit = cell.members().iter().find_map(|member| {
            if member.faction == rocket.faction {
                return None;
            }
            let (_, position, stats, health) = tanks.get(member.entity).ok()?;
            (health.is_alive() && rocket.intersects(*position, stats.collision_radius))
                .then_some((member.entity, *position))
        });

        let Some((entity, position)) = hit else {
            continue;
        };
        rocket.active = false;
        effects.explosion(position, &config);

        let Ok((_, _, _, mut health)) = tanks.get_mut(entity) else {
            continue;
        };
        if health.hit(config.rocket_damage) {
            effects.smoke(position - ROCKET_SMOKE_OFFSET, &config);
            grid.remove(entity, position);
        }
    }
}

/// Deactivates rockets touching the forcefield perimeter.
pub fn forcefield_cull_system(
    config: Res<SimConfig>,
    hull: Res<ForcefieldHull>,
    mut rockets: ResMut<Rockets>,
    mut effects: ResMut<Effects>,
) {
    if hull.is_empty() {
        return;
    }
    for rocket in rockets.0.iter_mut().filter(|r| r.active) {
        let touching = hull
            .edges()
            .any(|(a, b)| circle_segment_intersect(a, b, rocket.position, rocket.radius));
        if touching {
            effects.explosion(rocket.position, &config);
            rocket.active = false;
        }
    }
}

/// Applies beam damage to every live tank overlapping a beam rectangle.
///
/// Damage is re-applied each tick a tank stays inside.
pub fn particle_beam_system(
    config: Res<SimConfig>,
    mut grid: ResMut<CellGrid>,
    mut beams: ResMut<ParticleBeams>,
    mut effects: ResMut<Effects>,
    mut tanks: Query<(&Position, &TankStats, &mut Health)>,
    mut killed: Local<Vec<(Entity, Position)>>,
) {
    for beam in beams.0.iter_mut() {
        beam.animate();

        killed.clear();
        for id in beam.corner_cells(&grid) {
            let Some(cell) = grid.cell(id) else {
                continue;
            };
            if !cell.has_tanks() {
                continue;
            }
            for member in cell.members() {
                let Ok((position, stats, mut health)) = tanks.get_mut(member.entity) else {
                    continue;
                };
                if !health.is_alive() || !beam.rect.intersects_circle(*position, stats.collision_radius) {
                    continue;
                }
                if health.hit(beam.damage) {
                    killed.push((member.entity, *position));
                }
            }
        }

        for &(entity, position) in killed.iter() {
            effects.smoke(position - BEAM_SMOKE_OFFSET, &config);
            grid.remove(entity, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::GridDims;

    fn setup() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(CellGrid::new(GridDims::new(16.0, 80, 45)));
        world.init_resource::<Rockets>();
        world.init_resource::<Effects>();
        world.init_resource::<ParticleBeams>();
        world.init_resource::<ForcefieldHull>();
        world
    }

    fn spawn(world: &mut World, faction: Faction, x: f32, y: f32, health: i32) -> Entity {
        let position = Position::new(x, y);
        let entity = world
            .spawn(TankBundle::new(0, faction, position, Destination::default()))
            .id();
        world.get_mut::<Health>(entity).unwrap().current = health;
        world.resource_mut::<CellGrid>().insert(entity, faction, position);
        entity
    }

    fn run<M>(world: &mut World, system: impl IntoSystemConfigs<M>) {
        let mut schedule = Schedule::default();
        schedule.add_systems(system);
        schedule.run(world);
    }

    #[test]
    fn test_rocket_hits_enemy_in_cell() {
        let mut world = setup();
        let target = spawn(&mut world, Faction::Red, 40.0, 40.0, 1000);
        world.resource_mut::<Rockets>().0.push(Rocket::new(
            Position::new(30.0, 40.0),
            Position::new(3.0, 0.0),
            5.0,
            Faction::Blue,
        ));

        run(&mut world, rocket_system);

        assert_eq!(world.get::<Health>(target).unwrap().current, 940);
        assert!(!world.resource::<Rockets>().0[0].active);
        let effects = world.resource::<Effects>();
        assert_eq!(effects.explosions.len(), 1);
        assert_eq!(effects.explosions[0].position, Position::new(40.0, 40.0));
        assert!(effects.smokes.is_empty());
    }

    #[test]
    fn test_rocket_ignores_friendly_tanks() {
        let mut world = setup();
        let friend = spawn(&mut world, Faction::Blue, 40.0, 40.0, 1000);
        world.resource_mut::<Rockets>().0.push(Rocket::new(
            Position::new(37.0, 40.0),
            Position::new(3.0, 0.0),
            5.0,
            Faction::Blue,
        ));

        run(&mut world, rocket_system);

        assert_eq!(world.get::<Health>(friend).unwrap().current, 1000);
        assert!(world.resource::<Rockets>().0[0].active);
    }

    #[test]
    fn test_lethal_rocket_smokes_and_evicts() {
        let mut world = setup();
        let target = spawn(&mut world, Faction::Red, 40.0, 40.0, 60);
        world.resource_mut::<Rockets>().0.push(Rocket::new(
            Position::new(37.0, 40.0),
            Position::new(3.0, 0.0),
            5.0,
            Faction::Blue,
        ));

        run(&mut world, rocket_system);

        assert_eq!(world.get::<Health>(target).unwrap().current, 0);
        let effects = world.resource::<Effects>();
        assert_eq!(effects.smokes.len(), 1);
        assert_eq!(effects.smokes[0].position, Position::new(33.0, 16.0));
        assert_eq!(world.resource::<CellGrid>().total_count(), 0);
    }

    #[test]
    fn test_rocket_leaving_world_is_dropped() {
        let mut world = setup();
        world.resource_mut::<Rockets>().0.push(Rocket::new(
            Position::new(1279.0, 40.0),
            Position::new(3.0, 0.0),
            5.0,
            Faction::Red,
        ));
        run(&mut world, rocket_system);
        assert!(!world.resource::<Rockets>().0[0].active);
        assert!(world.resource::<Effects>().explosions.is_empty());
    }

    #[test]
    fn test_rocket_on_hull_edge_is_culled() {
        let mut world = setup();
        world.resource_mut::<ForcefieldHull>().rebuild(&[
            Position::new(100.0, 100.0),
            Position::new(200.0, 100.0),
            Position::new(150.0, 200.0),
        ]);
        world.resource_mut::<Rockets>().0.extend([
            Rocket::new(Position::new(150.0, 100.0), Position::new(0.0, -3.0), 5.0, Faction::Red),
            Rocket::new(Position::new(150.0, 140.0), Position::new(0.0, -3.0), 5.0, Faction::Red),
        ]);

        run(&mut world, forcefield_cull_system);

        let rockets = world.resource::<Rockets>();
        assert!(!rockets.0[0].active);
        assert!(rockets.0[1].active);
        assert_eq!(world.resource::<Effects>().explosions.len(), 1);
    }

    #[test]
    fn test_beam_corner_cells_are_deduplicated() {
        let grid = CellGrid::new(GridDims::new(16.0, 80, 45));
        let small = ParticleBeam::new(Rect::from_origin_size(1.0, 1.0, 4.0, 4.0), 50);
        assert_eq!(small.corner_cells(&grid), vec![0]);
        let wide = ParticleBeam::new(Rect::from_origin_size(64.0, 64.0, 100.0, 50.0), 50);
        assert_eq!(wide.corner_cells(&grid).len(), 4);
    }

    #[test]
    fn test_beam_damages_each_tick_and_kills_once() {
        let mut world = setup();
        world
            .resource_mut::<ParticleBeams>()
            .0
            .push(ParticleBeam::new(Rect::from_origin_size(1.0, 1.0, 10.0, 10.0), 50));
        let inside = spawn(&mut world, Faction::Blue, 5.0, 5.0, 120);
        let enemy_inside = spawn(&mut world, Faction::Red, 8.0, 8.0, 1000);
        let outside = spawn(&mut world, Faction::Red, 15.0, 15.0, 1000);

        run(&mut world, particle_beam_system);
        assert_eq!(world.get::<Health>(inside).unwrap().current, 70);
        assert_eq!(world.get::<Health>(enemy_inside).unwrap().current, 950);
        assert_eq!(world.get::<Health>(outside).unwrap().current, 1000);

        run(&mut world, particle_beam_system);
        run(&mut world, particle_beam_system);
        assert_eq!(world.get::<Health>(inside).unwrap().current, 0);
        assert_eq!(world.resource::<Effects>().smokes.len(), 1);
        assert_eq!(world.resource::<Effects>().smokes[0].position, Position::new(5.0, -43.0));
        assert_eq!(world.get::<Health>(enemy_inside).unwrap().current, 850);
        assert_eq!(world.resource::<CellGrid>().total_count(), 2);
    }
}
