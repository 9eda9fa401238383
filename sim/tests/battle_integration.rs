//! End-to-end battle scenarios driven through `SimWorld`.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use tank_sim::{
    AssetLoader, BeamConfig, Effects, Faction, Health, Position, Rockets, SimConfig, SimError, SimWorld,
    SpriteHandle, TerrainGrid,
};

struct NullLoader;

impl AssetLoader for NullLoader {
    fn load_sprite(&mut self, _path: &str, _frames: u32) -> Result<SpriteHandle, SimError> {
        Ok(SpriteHandle(0))
    }
}

fn open_field(config: SimConfig) -> SimWorld {
    let mut sim = SimWorld::new(config, Arc::new(TerrainGrid::new(80, 45, 16.0)));
    sim.initialize(&mut NullLoader).unwrap();
    sim
}

/// An initialized world with no armies, no beams and tanks that never
/// reload, so only rockets fired by the test fly.
fn empty_field() -> SimWorld {
    open_field(SimConfig {
        tanks_per_faction: 0,
        worker_threads: Some(1),
        initial_reload: 1.0e9,
        beams: Vec::new(),
        ..Default::default()
    })
}

/// Four stationary blue tanks spanning a square forcefield.
fn fence(sim: &mut SimWorld) {
    for (i, (x, y)) in [(50.0, 50.0), (300.0, 50.0), (300.0, 300.0), (50.0, 300.0)]
        .into_iter()
        .enumerate()
    {
        let p = Position::new(x, y);
        sim.spawn_tank(i as u32, Faction::Blue, p, p).unwrap();
    }
}

fn live_tanks(sim: &mut SimWorld) -> Vec<(Entity, Faction, Position, Health)> {
    let world = sim.world_mut();
    let mut query = world.query::<(Entity, &Faction, &Position, &Health)>();
    query
        .iter(world)
        .map(|(e, f, p, h)| (e, *f, *p, *h))
        .collect()
}

fn assert_invariants(sim: &mut SimWorld) {
    let tanks = live_tanks(sim);
    let grid = sim.grid();

    let mut home: HashMap<Entity, usize> = HashMap::new();
    for cell in grid.cells() {
        for member in cell.members() {
            assert!(home.insert(member.entity, cell.id()).is_none(), "tank in two cells");
        }
        let blue = cell.members().iter().any(|m| m.faction == Faction::Blue);
        let red = cell.members().iter().any(|m| m.faction == Faction::Red);
        assert_eq!(cell.has_tanks(), !cell.members().is_empty());
        assert_eq!(cell.has_blue(), blue);
        assert_eq!(cell.has_red(), red);
    }

    for (entity, _, position, health) in &tanks {
        assert!(health.current >= 0);
        if health.is_alive() {
            let cell = home.get(entity).copied().expect("live tank without a cell");
            assert!(grid.cells()[cell].bounds().contains(*position), "{position:?} outside its cell");
            assert_eq!(Some(cell), grid.cell_index_of(*position));
        } else {
            assert!(!home.contains_key(entity), "destroyed tank still in a cell");
        }
    }

    let hull = sim.hull();
    for (_, _, position, health) in &tanks {
        if health.is_alive() {
            assert!(hull.contains(*position), "{position:?} outside the forcefield");
        }
    }
}

#[test]
fn test_armies_engage_and_keep_grid_consistent() {
    let mut sim = open_field(SimConfig {
        tanks_per_faction: 96,
        worker_threads: Some(4),
        blue_start: (300.0, 200.0),
        red_start: (340.0, 200.0),
        beams: Vec::new(),
        ..Default::default()
    });
    assert_eq!(sim.grid().total_count(), 192);

    sim.step(1.0).unwrap();
    let snapshot = sim.snapshot();
    assert!(snapshot.rockets.len() + snapshot.explosions > 0, "no shots fired");
    assert_invariants(&mut sim);

    for _ in 0..60 {
        sim.step(1.0).unwrap();
        assert_invariants(&mut sim);
    }
}

#[test]
fn test_rocket_hits_enemy_in_its_cell() {
    let mut sim = empty_field();
    fence(&mut sim);
    let target_pos = Position::new(170.0, 170.0);
    let target = sim.spawn_tank(10, Faction::Red, target_pos, target_pos).unwrap();
    sim.fire_rocket(Faction::Blue, Position::new(150.0, 170.0), target_pos);

    for _ in 0..4 {
        sim.step(1.0).unwrap();
        assert_eq!(sim.world().resource::<Rockets>().active_count(), 1);
    }
    sim.step(1.0).unwrap();

    let world = sim.world();
    assert!(world.resource::<Rockets>().0.is_empty());
    assert_eq!(world.resource::<Effects>().explosions.len(), 1);
    assert_eq!(world.resource::<Effects>().explosions[0].position, target_pos);
    assert_eq!(world.get::<Health>(target).unwrap().current, 940);
}

#[test]
fn test_lethal_rocket_leaves_smoke_and_frees_the_cell() {
    let mut sim = empty_field();
    fence(&mut sim);
    let target_pos = Position::new(170.0, 170.0);
    let target = sim.spawn_tank(10, Faction::Red, target_pos, target_pos).unwrap();
    sim.world_mut().get_mut::<Health>(target).unwrap().current = 60;
    sim.fire_rocket(Faction::Blue, Position::new(150.0, 170.0), target_pos);

    for _ in 0..5 {
        sim.step(1.0).unwrap();
    }

    assert_eq!(sim.active_counts(), (4, 0));
    assert_eq!(sim.grid().total_count(), 4);
    let smokes = &sim.world().resource::<Effects>().smokes;
    assert_eq!(smokes.len(), 1);
    assert_eq!(smokes[0].position, Position::new(163.0, 146.0));
    assert_invariants(&mut sim);
}

#[test]
fn test_rocket_touching_forcefield_is_culled() {
    let mut sim = empty_field();
    fence(&mut sim);
    sim.fire_rocket(Faction::Blue, Position::new(60.0, 170.0), Position::new(0.0, 170.0));

    sim.step(1.0).unwrap();
    assert_eq!(sim.world().resource::<Rockets>().active_count(), 1);
    sim.step(1.0).unwrap();

    let world = sim.world();
    assert!(world.resource::<Rockets>().0.is_empty());
    let explosions = &world.resource::<Effects>().explosions;
    assert_eq!(explosions.len(), 1);
    assert_eq!(explosions[0].position, Position::new(54.0, 170.0));
}

#[test]
fn test_beam_destroys_tank_in_corner_cell() {
    let mut sim = open_field(SimConfig {
        tanks_per_faction: 0,
        worker_threads: Some(1),
        beams: vec![BeamConfig { x: 200.0, y: 200.0, width: 100.0, height: 50.0 }],
        ..Default::default()
    });
    let p = Position::new(205.0, 205.0);
    let victim = sim.spawn_tank(0, Faction::Red, p, p).unwrap();
    sim.world_mut().get_mut::<Health>(victim).unwrap().current = 50;

    sim.step(1.0).unwrap();

    assert_eq!(sim.world().get::<Health>(victim).unwrap().current, 0);
    assert_eq!(sim.grid().total_count(), 0);
    let smokes = &sim.world().resource::<Effects>().smokes;
    assert_eq!(smokes.len(), 1);
    assert_eq!(smokes[0].position, Position::new(205.0, 157.0));
}

#[test]
fn test_snapshot_json_round_trips_counts() {
    let mut sim = empty_field();
    fence(&mut sim);
    sim.step(1.0).unwrap();
    let json = sim.snapshot_json();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["blue_active"], 4);
    assert_eq!(value["hull"].as_array().unwrap().len(), 4);
}
