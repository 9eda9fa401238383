//! Simulation configuration.
//!
//! Defaults reproduce the reference battle: two armies of 2048 tanks on an
//! 80x45 tile battlefield, three particle beams and a 2000 frame run.

use crate::error::SimError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Placement of one particle beam damage window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamConfig {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Configuration for the whole simulation.
///
/// Distances are world units (one unit is one pixel of the reference
/// screen). Tank speed and reload time are per unit of delta time; the
/// demo driver feeds `frame_delta = 1.0`, so they read as "per frame".
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Tanks spawned for each faction.
    pub tanks_per_faction: usize,
    /// Worker threads for the initializer (`None` = hardware concurrency).
    pub worker_threads: Option<usize>,

    /// Terrain width in tiles.
    pub terrain_width: usize,
    /// Terrain height in tiles.
    pub terrain_height: usize,
    /// Edge length of a terrain tile and of a grid cell.
    pub cell_size: f32,

    pub tank_max_health: i32,
    pub tank_radius: f32,
    pub tank_max_speed: f32,
    /// Delay before a tank's first shot.
    pub initial_reload: f32,
    /// Delay between shots.
    pub reload_time: f32,
    /// Displacement applied per overlapping neighbour.
    pub collision_step: f32,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_tolerance: f32,

    pub rocket_radius: f32,
    /// Rocket displacement per tick.
    pub rocket_speed: f32,
    pub rocket_damage: i32,

    pub beam_damage: i32,

    /// Ticks an explosion frame stays on screen.
    pub explosion_frame_ticks: u32,
    /// Ticks a smoke frame stays on screen.
    pub smoke_frame_ticks: u32,

    /// Spawn formation.
    pub max_rows: usize,
    pub spacing: f32,
    pub blue_start: (f32, f32),
    pub red_start: (f32, f32),
    /// X coordinate of each faction's destination line.
    pub blue_destination_x: f32,
    pub red_destination_x: f32,
    /// Vertical offset from a tank's spawn row to its destination.
    pub destination_y_offset: f32,

    /// Delta time the driver feeds each frame.
    pub frame_delta: f32,
    /// Frames in a measured run.
    pub max_frames: u64,
    /// Reference run duration in milliseconds for the speedup ratio.
    pub reference_ms: f64,

    /// Particle beam damage windows. Kept last so TOML writes them after
    /// the plain keys.
    pub beams: Vec<BeamConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tanks_per_faction: 2048,
            worker_threads: None,
            terrain_width: 80,
            terrain_height: 45,
            cell_size: 16.0,
            tank_max_health: 1000,
            tank_radius: 3.0,
            tank_max_speed: 1.0,
            initial_reload: 1.0,
            reload_time: 200.0,
            collision_step: 0.5,
            waypoint_tolerance: 1.0,
            rocket_radius: 5.0,
            rocket_speed: 3.0,
            rocket_damage: 60,
            beam_damage: 50,
            explosion_frame_ticks: 2,
            smoke_frame_ticks: 15,
            max_rows: 24,
            spacing: 7.5,
            blue_start: (47.0, 39.0),
            red_start: (1088.0, 39.0),
            blue_destination_x: 1100.0,
            red_destination_x: 100.0,
            destination_y_offset: 16.0,
            frame_delta: 1.0,
            max_frames: 2000,
            reference_ms: 40000.0,
            beams: vec![
                BeamConfig { x: 590.0, y: 327.0, width: 100.0, height: 50.0 },
                BeamConfig { x: 64.0, y: 64.0, width: 100.0, height: 50.0 },
                BeamConfig { x: 1200.0, y: 600.0, width: 100.0, height: 50.0 },
            ],
        }
    }
}

impl SimConfig {
    /// Parse a (possibly partial) TOML document. Missing keys keep defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, SimError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), tanks = config.tanks_per_faction, "loaded config");
        Ok(config)
    }

    /// Render the configuration as TOML (for writing a starter file).
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Number of worker threads the initializer should use.
    pub fn resolved_workers(&self) -> usize {
        self.worker_threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}
