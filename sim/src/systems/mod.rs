//! ECS systems for the tank battle.
//!
//! One tick is a single chain, run on one thread in this order:
//!
//! - `route_planning_system` - first tick only, plans a route per tank
//! - `collision_system` - accumulates push-apart within each cell
//! - `tank_movement_system` - applies push, follows route, ticks reload
//! - `targeting_system` - ready tanks fire at the nearest enemy
//! - `rebucket_system` - moves tanks whose position left their cell
//! - `forcefield_system` - rebuilds the hull over live tanks
//! - `rocket_system` - advances rockets and resolves hits
//! - `forcefield_cull_system` - deactivates rockets outside the hull
//! - `particle_beam_system` - beam damage against tanks in corner cells
//! - `prune_system` - ages effects, drops finished effects and spent rockets

pub mod combat;
pub mod effects;
pub mod forcefield;
pub mod movement;
pub mod targeting;

pub use combat::*;
pub use effects::*;
pub use forcefield::*;
pub use movement::*;
pub use targeting::*;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

/// The per-tick schedule.
///
/// Cell membership is mutated by several systems, so the executor is forced
/// single-threaded and every system is chained after the previous one.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            route_planning_system,
            collision_system,
            tank_movement_system,
            targeting_system,
            rebucket_system,
            forcefield_system,
            rocket_system,
            forcefield_cull_system,
            particle_beam_system,
            prune_system,
        )
            .chain(),
    );
    schedule
}
