//! Headless run of the reference battle.
//!
//! Run with: cargo run --release --example battle_demo [config.toml]
//!
//! Draw requests go to a surface that only counts them, so the timing
//! covers the simulation and the draw walk without any rasterizing.

use std::error::Error;
use std::time::Instant;

use tank_sim::render::Color;
use tank_sim::{AssetLoader, PerformanceReport, Position, SimConfig, SimError, SimWorld, SpriteHandle, Surface};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hands out sequential handles without touching the disk.
#[derive(Default)]
struct NullLoader {
    next: u32,
}

impl AssetLoader for NullLoader {
    fn load_sprite(&mut self, path: &str, frames: u32) -> Result<SpriteHandle, SimError> {
        self.next += 1;
        info!(path, frames, handle = self.next, "sprite registered");
        Ok(SpriteHandle(self.next))
    }
}

#[derive(Default)]
struct CountingSurface {
    blits: u64,
    lines: u64,
    bars: u64,
}

impl Surface for CountingSurface {
    fn width(&self) -> i32 {
        1420
    }
    fn height(&self) -> i32 {
        720
    }
    fn clear(&mut self, _color: Color) {}
    fn blit(&mut self, _sprite: SpriteHandle, _frame: u32, _x: i32, _y: i32) {
        self.blits += 1;
    }
    fn line(&mut self, _from: Position, _to: Position, _color: Color) {
        self.lines += 1;
    }
    fn bar(&mut self, _x1: i32, _y1: i32, _x2: i32, _y2: i32, _color: Color) {
        self.bars += 1;
    }
    fn centre_text(&mut self, text: &str, _y: i32) {
        println!("{text}");
    }
    fn print_text(&mut self, _text: &str, _x: i32, _y: i32) {}
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let max_frames = config.max_frames;
    let reference_ms = config.reference_ms;
    let dt = config.frame_delta;

    let mut loader = NullLoader::default();
    let mut surface = CountingSurface::default();
    let mut sim = SimWorld::with_default_terrain(config);

    let init_start = Instant::now();
    let init = sim.initialize(&mut loader)?;
    info!(tanks = init.total(), elapsed = ?init_start.elapsed(), "armies ready");

    let start = Instant::now();
    while sim.frame() < max_frames {
        sim.tick(dt, &mut surface)?;
        if sim.frame() % 500 == 0 {
            let (blue, red) = sim.active_counts();
            info!(frame = sim.frame(), blue, red, "progress");
        }
    }
    let report = PerformanceReport::new(start.elapsed(), sim.frame(), reference_ms);
    sim.complete_run(report);
    sim.draw(&mut surface)?;

    println!("{report}");
    println!("{}", sim.profiler());
    info!(
        blits = surface.blits,
        lines = surface.lines,
        bars = surface.bars,
        "draw requests issued"
    );

    let snapshot = sim.snapshot();
    println!(
        "tick {}: {} blue, {} red, {} rockets, hull of {} points",
        snapshot.tick,
        snapshot.blue_active,
        snapshot.red_active,
        snapshot.rockets.len(),
        snapshot.hull.len()
    );
    if std::env::var_os("TANK_SIM_DUMP").is_some() {
        println!("{}", snapshot.to_json_pretty()?);
    }

    sim.shutdown(&mut loader);
    Ok(())
}
