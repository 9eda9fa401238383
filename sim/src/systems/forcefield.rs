//! Forcefield system - rebuilds the perimeter hull every tick.

use crate::components::{Health, Position};
use crate::hull::ForcefieldHull;
use crate::spatial::CellGrid;
use bevy_ecs::prelude::*;

/// Rebuilds the hull from the positions of all live tanks, in grid order.
pub fn forcefield_system(
    grid: Res<CellGrid>,
    tanks: Query<(&Position, &Health)>,
    mut hull: ResMut<ForcefieldHull>,
    mut active: Local<Vec<Position>>,
) {
    active.clear();
    for cell in grid.cells().iter().filter(|c| c.has_tanks()) {
        for member in cell.members() {
            if let Ok((position, health)) = tanks.get(member.entity) {
                if health.is_alive() {
                    active.push(*position);
                }
            }
        }
    }
    hull.rebuild(&active);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Destination, Faction, TankBundle};
    use crate::spatial::GridDims;

    #[test]
    fn test_hull_skips_destroyed_tanks() {
        let mut world = World::new();
        world.insert_resource(CellGrid::new(GridDims::new(16.0, 20, 20)));
        world.init_resource::<ForcefieldHull>();

        let corners = [(10.0, 10.0), (200.0, 10.0), (200.0, 200.0), (10.0, 200.0)];
        for (x, y) in corners {
            let position = Position::new(x, y);
            let e = world
                .spawn(TankBundle::new(0, Faction::Blue, position, Destination::default()))
                .id();
            world.resource_mut::<CellGrid>().insert(e, Faction::Blue, position);
        }
        let far = Position::new(300.0, 100.0);
        let dead = world
            .spawn(TankBundle::new(0, Faction::Red, far, Destination::default()))
            .id();
        world.get_mut::<Health>(dead).unwrap().current = 0;
        world.resource_mut::<CellGrid>().insert(dead, Faction::Red, far);

        let mut schedule = Schedule::default();
        schedule.add_systems(forcefield_system);
        schedule.run(&mut world);

        let hull = world.resource::<ForcefieldHull>();
        assert_eq!(hull.points().len(), 4);
        assert!(!hull.points().contains(&far));
        assert!(hull.contains(Position::new(100.0, 100.0)));
    }

    #[test]
    fn test_no_tanks_gives_empty_hull() {
        let mut world = World::new();
        world.insert_resource(CellGrid::new(GridDims::new(16.0, 4, 4)));
        world.init_resource::<ForcefieldHull>();
        let mut schedule = Schedule::default();
        schedule.add_systems(forcefield_system);
        schedule.run(&mut world);
        assert!(world.resource::<ForcefieldHull>().is_empty());
    }
}
