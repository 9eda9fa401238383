//! Public API for the simulation.
//!
//! `SimWorld` is the interface a host drives: initialize once with an asset
//! loader, then call `tick` every frame with a draw surface. A measured run
//! ends with `complete_run`, which freezes the battle and shows the timing
//! overlay.
//!
//! ## Frame lifecycle
//!
//! `tick` = `step` (run the system chain once) + `draw` (issue draw
//! requests for the post-tick state). Both are timed by the profiler.

use crate::components::*;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::geometry::Rect;
use crate::hull::ForcefieldHull;
use crate::profiler::{PerformanceReport, Profiler};
use crate::render::{self, AssetLoader, SpriteSet, Surface};
use crate::spatial::{CellGrid, GridDims};
use crate::spawn::{spawn_armies, InitReport, TankTemplate};
use crate::systems::*;
use crate::terrain::{TerrainGrid, TerrainProvider, TerrainResource};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    /// Frames run through `tick` since initialization.
    frame: u64,
    /// While set, `step` leaves the world untouched.
    update_locked: bool,
    init_report: Option<InitReport>,
    sprites: Option<SpriteSet>,
    profiler: Profiler,
    report: Option<PerformanceReport>,
}

impl SimWorld {
    /// Create an empty simulation over the given terrain.
    pub fn new(config: SimConfig, terrain: Arc<dyn TerrainProvider>) -> Self {
        let mut world = World::new();

        let dims = GridDims::new(config.cell_size, config.terrain_width, config.terrain_height);
        world.insert_resource(DeltaTime(config.frame_delta));
        world.insert_resource(SimTick(0));
        world.insert_resource(CellGrid::new(dims));
        world.insert_resource(TerrainResource::new(terrain));
        world.init_resource::<Rockets>();
        world.init_resource::<Effects>();
        world.init_resource::<ParticleBeams>();
        world.init_resource::<ForcefieldHull>();
        world.insert_resource(config);

        Self {
            world,
            schedule: build_schedule(),
            frame: 0,
            update_locked: false,
            init_report: None,
            sprites: None,
            profiler: Profiler::new(),
            report: None,
        }
    }

    /// Create a simulation on the built-in battlefield, one tile per cell.
    pub fn with_default_terrain(config: SimConfig) -> Self {
        let terrain =
            TerrainGrid::new_with_features(config.terrain_width, config.terrain_height, config.cell_size);
        Self::new(config, Arc::new(terrain))
    }

    /// Load sprites, spawn both armies and place the particle beams.
    ///
    /// Updates are locked while this runs. Calling it twice returns the
    /// first report without spawning again.
    pub fn initialize(&mut self, loader: &mut dyn AssetLoader) -> Result<InitReport, SimError> {
        if let Some(report) = self.init_report {
            warn!("simulation already initialized");
            return Ok(report);
        }

        self.update_locked = true;
        let result = self.populate(loader);
        self.update_locked = false;

        let report = result?;
        self.init_report = Some(report);
        info!(
            blue = report.blue,
            red = report.red,
            skipped = report.skipped,
            tasks = report.tasks,
            workers = report.workers,
            "simulation initialized"
        );
        Ok(report)
    }

    fn populate(&mut self, loader: &mut dyn AssetLoader) -> Result<InitReport, SimError> {
        let sprites = SpriteSet::load(loader)?;
        let config = self.world.resource::<SimConfig>().clone();
        let report = spawn_armies(&mut self.world, &config)?;

        self.world.resource_mut::<ParticleBeams>().0 = config
            .beams
            .iter()
            .map(|b| ParticleBeam::new(Rect::from_origin_size(b.x, b.y, b.width, b.height), config.beam_damage))
            .collect();
        self.sprites = Some(sprites);
        Ok(report)
    }

    /// Run the system chain once with the given delta time.
    pub fn step(&mut self, dt: f32) -> Result<(), SimError> {
        if !self.is_initialized() {
            return Err(SimError::NotInitialized);
        }
        if self.update_locked {
            return Ok(());
        }

        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimTick>().increment();
        self.schedule.run(&mut self.world);
        Ok(())
    }

    /// One frame: update, then draw.
    pub fn tick(&mut self, dt: f32, surface: &mut dyn Surface) -> Result<(), SimError> {
        if !self.is_initialized() {
            return Err(SimError::NotInitialized);
        }

        if !self.update_locked {
            let start = Instant::now();
            self.step(dt)?;
            self.profiler.record("update", start.elapsed());
            self.frame += 1;
        }

        let start = Instant::now();
        self.draw(surface)?;
        self.profiler.record("draw", start.elapsed());
        self.profiler.tick();
        Ok(())
    }

    /// Issue draw requests for the current state.
    pub fn draw(&mut self, surface: &mut dyn Surface) -> Result<(), SimError> {
        let Some(sprites) = self.sprites.as_ref() else {
            return Err(SimError::NotInitialized);
        };
        render::draw_scene(&mut self.world, sprites, surface);
        render::draw_frame_counter(surface, self.frame);
        if let Some(report) = &self.report {
            render::draw_performance_overlay(surface, report);
        }
        Ok(())
    }

    /// Tick until the configured frame limit, then complete the run.
    pub fn run_to_completion(&mut self, surface: &mut dyn Surface) -> Result<PerformanceReport, SimError> {
        let (dt, max_frames, reference_ms) = {
            let config = self.config();
            (config.frame_delta, config.max_frames, config.reference_ms)
        };

        let start = Instant::now();
        while self.frame < max_frames && !self.update_locked {
            self.tick(dt, surface)?;
        }
        let report = PerformanceReport::new(start.elapsed(), self.frame, reference_ms);
        self.complete_run(report);
        Ok(report)
    }

    /// Freeze updates and show `report` on every following draw.
    pub fn complete_run(&mut self, report: PerformanceReport) {
        self.update_locked = true;
        self.report = Some(report);
        info!(%report, "run complete");
    }

    /// Release sprites. The world is kept for inspection.
    pub fn shutdown(&mut self, loader: &mut dyn AssetLoader) {
        if let Some(sprites) = self.sprites.take() {
            sprites.release(loader);
        }
        self.update_locked = true;
        debug!("profile\n{}", self.profiler);
        info!(frames = self.frame, "simulation shut down");
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let tick = self.current_tick();
        Snapshot::from_world(&mut self.world, tick)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Spawn one tank with the configured stats and register it with the
    /// grid. `None` when the position is off the grid.
    pub fn spawn_tank(&mut self, id: u32, faction: Faction, position: Position, destination: Position) -> Option<Entity> {
        let template = TankTemplate::from_config(self.config());
        let bundle = TankBundle::new(id, faction, position, Destination { x: destination.x, y: destination.y })
            .with_stats(template.max_health, template.stats, template.initial_reload);
        let entity = self.world.spawn(bundle).id();
        if self.world.resource_mut::<CellGrid>().insert(entity, faction, position).is_none() {
            self.world.despawn(entity);
            return None;
        }
        Some(entity)
    }

    /// Launch a rocket from `origin` toward `target`.
    pub fn fire_rocket(&mut self, faction: Faction, origin: Position, target: Position) {
        let (speed, radius) = {
            let config = self.config();
            (config.rocket_speed, config.rocket_radius)
        };
        self.world
            .resource_mut::<Rockets>()
            .0
            .push(Rocket::aimed(origin, target, speed, radius, faction));
    }

    pub fn is_initialized(&self) -> bool {
        self.init_report.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.update_locked
    }

    /// Frames run through `tick`.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulation steps run so far.
    pub fn current_tick(&self) -> u64 {
        self.world.get_resource::<SimTick>().map_or(0, |t| t.0)
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn grid(&self) -> &CellGrid {
        self.world.resource::<CellGrid>()
    }

    pub fn hull(&self) -> &ForcefieldHull {
        self.world.resource::<ForcefieldHull>()
    }

    pub fn report(&self) -> Option<&PerformanceReport> {
        self.report.as_ref()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Direct access to the ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Count of live tanks per faction as (blue, red).
    pub fn active_counts(&mut self) -> (usize, usize) {
        let mut query = self.world.query::<(&Faction, &Health)>();
        query
            .iter(&self.world)
            .filter(|(_, h)| h.is_alive())
            .fold((0, 0), |(blue, red), (faction, _)| match faction {
                Faction::Blue => (blue + 1, red),
                Faction::Red => (blue, red + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Color, SpriteHandle};
    use std::time::Duration;

    #[derive(Default)]
    struct StubLoader {
        loaded: Vec<String>,
        released: usize,
        fail_on: Option<&'static str>,
    }

    impl AssetLoader for StubLoader {
        fn load_sprite(&mut self, path: &str, _frames: u32) -> Result<SpriteHandle, SimError> {
            if self.fail_on.is_some_and(|p| path.contains(p)) {
                return Err(SimError::AssetLoad {
                    path: path.to_string(),
                    reason: "missing".to_string(),
                });
            }
            self.loaded.push(path.to_string());
            Ok(SpriteHandle(self.loaded.len() as u32))
        }

        fn release(&mut self, _handle: SpriteHandle) {
            self.released += 1;
        }
    }

    #[derive(Default)]
    struct CountingSurface {
        blits: usize,
        lines: usize,
        texts: Vec<String>,
    }

    impl Surface for CountingSurface {
        fn width(&self) -> i32 {
            1420
        }
        fn height(&self) -> i32 {
            720
        }
        fn clear(&mut self, _color: Color) {
            self.blits = 0;
            self.lines = 0;
            self.texts.clear();
        }
        fn blit(&mut self, _sprite: SpriteHandle, _frame: u32, _x: i32, _y: i32) {
            self.blits += 1;
        }
        fn line(&mut self, _from: Position, _to: Position, _color: Color) {
            self.lines += 1;
        }
        fn bar(&mut self, _x1: i32, _y1: i32, _x2: i32, _y2: i32, _color: Color) {}
        fn centre_text(&mut self, text: &str, _y: i32) {
            self.texts.push(text.to_string());
        }
        fn print_text(&mut self, text: &str, _x: i32, _y: i32) {
            self.texts.push(text.to_string());
        }
    }

    fn small_world() -> SimWorld {
        let config = SimConfig {
            tanks_per_faction: 48,
            worker_threads: Some(2),
            ..Default::default()
        };
        SimWorld::new(config, Arc::new(TerrainGrid::new(80, 45, 16.0)))
    }

    #[test]
    fn test_step_before_initialize_fails() {
        let mut sim = small_world();
        assert!(matches!(sim.step(1.0), Err(SimError::NotInitialized)));
        let mut surface = CountingSurface::default();
        assert!(matches!(sim.draw(&mut surface), Err(SimError::NotInitialized)));
    }

    #[test]
    fn test_initialize_spawns_armies_and_beams() {
        let mut sim = small_world();
        let mut loader = StubLoader::default();
        let report = sim.initialize(&mut loader).unwrap();

        assert_eq!(loader.loaded.len(), 7);
        assert_eq!((report.blue, report.red), (48, 48));
        assert_eq!(sim.grid().total_count(), 96);
        assert_eq!(sim.world().resource::<ParticleBeams>().0.len(), 3);
        assert!(!sim.is_locked());

        // A second call is a no-op.
        let again = sim.initialize(&mut loader).unwrap();
        assert_eq!(again, report);
        assert_eq!(sim.grid().total_count(), 96);
    }

    #[test]
    fn test_asset_failure_leaves_world_uninitialized() {
        let mut sim = small_world();
        let mut loader = StubLoader {
            fail_on: Some("Smoke"),
            ..Default::default()
        };
        let err = sim.initialize(&mut loader).unwrap_err();
        assert!(matches!(err, SimError::AssetLoad { .. }));
        assert!(!sim.is_initialized());
        assert_eq!(sim.grid().total_count(), 0);
    }

    #[test]
    fn test_ticks_move_tanks_and_draw() {
        let mut sim = small_world();
        sim.initialize(&mut StubLoader::default()).unwrap();
        let before = sim.snapshot();

        let mut surface = CountingSurface::default();
        for _ in 0..5 {
            sim.tick(1.0, &mut surface).unwrap();
        }
        assert_eq!(sim.frame(), 5);
        assert_eq!(sim.current_tick(), 5);
        assert!(surface.blits >= 96);
        assert!(surface.lines >= 3);
        assert!(surface.texts.contains(&"FRAME: 5".to_string()));

        let after = sim.snapshot();
        let moved = before
            .tanks
            .iter()
            .zip(&after.tanks)
            .filter(|(a, b)| a.x != b.x || a.y != b.y)
            .count();
        assert!(moved > 0);
        assert_eq!(sim.profiler().get_section("update").unwrap().call_count, 5);
    }

    #[test]
    fn test_complete_run_freezes_and_shows_overlay() {
        let mut sim = small_world();
        sim.initialize(&mut StubLoader::default()).unwrap();
        let mut surface = CountingSurface::default();
        sim.tick(1.0, &mut surface).unwrap();

        sim.complete_run(PerformanceReport::new(Duration::from_millis(20_000), 1, 40_000.0));
        let frozen = sim.snapshot();
        sim.tick(1.0, &mut surface).unwrap();
        assert_eq!(sim.frame(), 1);
        assert_eq!(sim.snapshot().tick, frozen.tick);
        assert!(surface.texts.contains(&"SPEEDUP:  2.0".to_string()));
    }

    #[test]
    fn test_run_to_completion_stops_at_frame_limit() {
        let config = SimConfig {
            tanks_per_faction: 24,
            worker_threads: Some(1),
            max_frames: 10,
            ..Default::default()
        };
        let mut sim = SimWorld::new(config, Arc::new(TerrainGrid::new(80, 45, 16.0)));
        sim.initialize(&mut StubLoader::default()).unwrap();
        let report = sim.run_to_completion(&mut CountingSurface::default()).unwrap();
        assert_eq!(report.frames, 10);
        assert!(sim.is_locked());
        assert_eq!(sim.report(), Some(&report));
    }

    #[test]
    fn test_shutdown_releases_sprites() {
        let mut sim = small_world();
        let mut loader = StubLoader::default();
        sim.initialize(&mut loader).unwrap();
        sim.shutdown(&mut loader);
        assert_eq!(loader.released, 7);
        assert!(sim.step(1.0).is_ok());
    }

    #[test]
    fn test_spawn_tank_off_grid_is_rejected() {
        let mut sim = small_world();
        assert!(sim.spawn_tank(0, Faction::Blue, Position::new(-5.0, 10.0), Position::default()).is_none());
        assert!(sim.spawn_tank(1, Faction::Blue, Position::new(5.0, 10.0), Position::default()).is_some());
        assert_eq!(sim.active_counts(), (1, 0));
    }
}
