//! Snapshot types.
//!
//! The `Snapshot` struct is a serializable, read-only view of the state
//! after a tick, used for dumping a battle or inspecting it from tests.

use crate::components::*;
use crate::hull::ForcefieldHull;
use crate::systems::{Effects, Rockets};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single tank's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub id: u32,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: i32,
    pub health_max: i32,
    pub waypoints_left: usize,
}

/// Snapshot of a rocket in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocketSnapshot {
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation steps run so far.
    pub tick: u64,
    /// Live tanks ordered by id.
    pub tanks: Vec<TankSnapshot>,
    pub blue_active: usize,
    pub red_active: usize,
    pub rockets: Vec<RocketSnapshot>,
    pub explosions: usize,
    pub smokes: usize,
    /// Forcefield hull vertices.
    pub hull: Vec<Position>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64) -> Self {
        let mut tanks = Vec::new();
        let mut query = world.query::<(&TankId, &Faction, &Position, &Velocity, &Health, &Route)>();
        for (id, faction, pos, vel, health, route) in query.iter(world) {
            if !health.is_alive() {
                continue;
            }
            tanks.push(TankSnapshot {
                id: id.0,
                faction: *faction,
                x: pos.x,
                y: pos.y,
                vx: vel.vx,
                vy: vel.vy,
                health: health.current,
                health_max: health.max,
                waypoints_left: route.len(),
            });
        }
        tanks.sort_by_key(|t| t.id);

        let blue_active = tanks.iter().filter(|t| t.faction == Faction::Blue).count();
        let red_active = tanks.len() - blue_active;

        let rockets = world
            .get_resource::<Rockets>()
            .map(|r| {
                r.0.iter()
                    .filter(|r| r.active)
                    .map(|r| RocketSnapshot {
                        faction: r.faction,
                        x: r.position.x,
                        y: r.position.y,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (explosions, smokes) = world
            .get_resource::<Effects>()
            .map(|e| (e.explosions.len(), e.smokes.len()))
            .unwrap_or_default();

        let hull = world
            .get_resource::<ForcefieldHull>()
            .map(|h| h.points().to_vec())
            .unwrap_or_default();

        Self {
            tick,
            tanks,
            blue_active,
            red_active,
            rockets,
            explosions,
            smokes,
            hull,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_live_tanks_only() {
        let mut world = World::new();
        world.init_resource::<Rockets>();
        world.spawn(TankBundle::new(2, Faction::Red, Position::new(5.0, 5.0), Destination::default()));
        world.spawn(TankBundle::new(1, Faction::Blue, Position::new(1.0, 1.0), Destination::default()));
        let dead = world
            .spawn(TankBundle::new(3, Faction::Blue, Position::new(9.0, 9.0), Destination::default()))
            .id();
        world.get_mut::<Health>(dead).unwrap().current = 0;

        let snapshot = Snapshot::from_world(&mut world, 7);
        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.tanks.len(), 2);
        assert_eq!(snapshot.tanks[0].id, 1);
        assert_eq!((snapshot.blue_active, snapshot.red_active), (1, 1));
        assert!(snapshot.hull.is_empty());

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"faction\":\"Red\""));
    }
}
