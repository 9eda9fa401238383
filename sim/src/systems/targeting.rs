//! Targeting - reloaded tanks pick the nearest enemy and fire a rocket.

use crate::components::*;
use crate::config::SimConfig;
use crate::spatial::{CellGrid, TankView};
use crate::systems::combat::{Rocket, Rockets};
use bevy_ecs::prelude::*;

/// Fires one rocket per reloaded tank at the nearest enemy.
///
/// Uses the grid's approximate nearest-enemy query. A tank that finds no
/// enemy keeps its loaded rocket and retries on the next tick.
pub fn targeting_system(
    config: Res<SimConfig>,
    grid: Res<CellGrid>,
    mut rockets: ResMut<Rockets>,
    views: Query<(&Position, &Health)>,
    mut shooters: Query<(&Faction, &Position, &Health, &mut Reload)>,
) {
    let lookup = |entity: Entity| {
        views.get(entity).ok().map(|(position, health)| TankView {
            position: *position,
            alive: health.is_alive(),
        })
    };

    for cell in grid.cells().iter().filter(|c| c.has_tanks()) {
        for member in cell.members() {
            let Ok((faction, position, health, mut reload)) = shooters.get_mut(member.entity) else {
                continue;
            };
            if !health.is_alive() || !reload.is_ready() {
                continue;
            }
            let Some(target) = grid.nearest_enemy(*position, *faction, lookup) else {
                continue;
            };
            rockets.0.push(Rocket::aimed(
                *position,
                target.position,
                config.rocket_speed,
                config.rocket_radius,
                *faction,
            ));
            reload.reset(config.reload_time);
        }
    }
}
