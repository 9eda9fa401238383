//! Draw requests issued to a host surface.
//!
//! The simulation owns no pixels. After a tick it walks the post-tick state
//! and calls a [`Surface`] supplied by the host, which may be a real frame
//! buffer or a recorder in tests.

use crate::components::{Faction, Health, Position, Velocity};
use crate::error::SimError;
use crate::hull::ForcefieldHull;
use crate::profiler::PerformanceReport;
use crate::spatial::CellGrid;
use crate::systems::{Effects, ParticleBeams, Rockets};
use bevy_ecs::prelude::*;
use std::f32::consts::TAU;

/// Packed 0xRRGGBB color.
pub type Color = u32;

pub const BACKGROUND: Color = 0x000000;
pub const HULL_COLOR: Color = 0x0000ff;
pub const HEALTH_LOST: Color = 0xff0000;
pub const HEALTH_LEFT: Color = 0x00ff00;
pub const OVERLAY_BACKGROUND: Color = 0x030000;

/// Width of each faction's health bar column.
pub const HEALTH_BAR_WIDTH: i32 = 70;
/// Horizontal shift of the battlefield, leaving room for the blue bars.
pub const PLAYFIELD_OFFSET: i32 = HEALTH_BAR_WIDTH;

/// Drawing primitives the host provides.
pub trait Surface {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn clear(&mut self, color: Color);
    /// Draw one frame of a sprite centered on (x, y).
    fn blit(&mut self, sprite: SpriteHandle, frame: u32, x: i32, y: i32);
    fn line(&mut self, from: Position, to: Position, color: Color);
    /// Filled rectangle from (x1, y1) to (x2, y2).
    fn bar(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color);
    /// Text horizontally centered on the surface.
    fn centre_text(&mut self, text: &str, y: i32);
    fn print_text(&mut self, text: &str, x: i32, y: i32);
}

/// Opaque id the host hands out for a loaded sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sprite {
    pub handle: SpriteHandle,
    pub frames: u32,
}

/// Loads sprite sheets for the simulation.
pub trait AssetLoader {
    fn load_sprite(&mut self, path: &str, frames: u32) -> Result<SpriteHandle, SimError>;

    /// Called once per handle at shutdown.
    fn release(&mut self, _handle: SpriteHandle) {}
}

/// Every sprite the battle draws.
#[derive(Debug, Clone)]
pub struct SpriteSet {
    pub tank_blue: Sprite,
    pub tank_red: Sprite,
    pub rocket_blue: Sprite,
    pub rocket_red: Sprite,
    pub smoke: Sprite,
    pub explosion: Sprite,
    pub particle_beam: Sprite,
}

impl SpriteSet {
    pub fn load(loader: &mut dyn AssetLoader) -> Result<Self, SimError> {
        let mut load = |path: &str, frames: u32| -> Result<Sprite, SimError> {
            Ok(Sprite {
                handle: loader.load_sprite(path, frames)?,
                frames,
            })
        };
        Ok(Self {
            tank_red: load("assets/Tank_Proj2.png", 12)?,
            tank_blue: load("assets/Tank_Blue_Proj2.png", 12)?,
            rocket_red: load("assets/Rocket_Proj2.png", 12)?,
            rocket_blue: load("assets/Rocket_Blue_Proj2.png", 12)?,
            particle_beam: load("assets/Particle_Beam.png", 3)?,
            smoke: load("assets/Smoke.png", 4)?,
            explosion: load("assets/Explosion.png", 9)?,
        })
    }

    pub fn tank(&self, faction: Faction) -> Sprite {
        match faction {
            Faction::Blue => self.tank_blue,
            Faction::Red => self.tank_red,
        }
    }

    pub fn rocket(&self, faction: Faction) -> Sprite {
        match faction {
            Faction::Blue => self.rocket_blue,
            Faction::Red => self.rocket_red,
        }
    }

    pub fn all(&self) -> [Sprite; 7] {
        [
            self.tank_blue,
            self.tank_red,
            self.rocket_blue,
            self.rocket_red,
            self.smoke,
            self.explosion,
            self.particle_beam,
        ]
    }

    pub fn release(self, loader: &mut dyn AssetLoader) {
        for sprite in self.all() {
            loader.release(sprite.handle);
        }
    }
}

/// Sprite frame for a heading; frame 0 faces +x and frames advance
/// clockwise on screen.
pub fn heading_frame(heading: Option<f32>, frames: u32) -> u32 {
    let (Some(angle), true) = (heading, frames > 0) else {
        return 0;
    };
    let turn = angle.rem_euclid(TAU) / TAU;
    (turn * frames as f32).round() as u32 % frames
}

/// Stable insertion sort, ascending by `health`. Equal keys keep their
/// input order.
pub fn sort_by_health<T: Copy>(items: &[T], health: impl Fn(&T) -> i32) -> Vec<T> {
    let mut sorted: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let key = health(item);
        let at = sorted.partition_point(|s| health(s) <= key);
        sorted.insert(at, *item);
    }
    sorted
}

/// One-pixel health bars for a faction, least healthy on top. Blue bars
/// drain from the left edge, red bars from the right.
pub fn draw_health_bars(surface: &mut dyn Surface, faction: Faction, sorted: &[Health]) {
    let start_x = match faction {
        Faction::Blue => 0,
        Faction::Red => surface.width() - HEALTH_BAR_WIDTH - 1,
    };
    let end_x = start_x + HEALTH_BAR_WIDTH;
    let rows = surface.height().max(0);

    for y in 0..rows {
        surface.bar(start_x, y, end_x, y + 1, HEALTH_LOST);
    }

    for (y, health) in (0..rows).zip(sorted) {
        let lost = (HEALTH_BAR_WIDTH as f32 * (1.0 - health.fraction())) as i32;
        match faction {
            Faction::Blue => surface.bar(start_x + lost, y, end_x, y + 1, HEALTH_LEFT),
            Faction::Red => surface.bar(start_x, y, end_x - lost, y + 1, HEALTH_LEFT),
        }
    }
}

/// End-of-run box with the elapsed clock and speedup.
pub fn draw_performance_overlay(surface: &mut dyn Surface, report: &PerformanceReport) {
    surface.bar(
        420 + PLAYFIELD_OFFSET,
        170,
        870 + PLAYFIELD_OFFSET,
        430,
        OVERLAY_BACKGROUND,
    );
    surface.centre_text(&report.clock_text(), 200);
    surface.centre_text(&report.speedup_text(), 340);
}

pub fn draw_frame_counter(surface: &mut dyn Surface, frame: u64) {
    surface.print_text(&format!("FRAME: {frame}"), 350, 580);
}

fn screen_point(p: Position) -> (i32, i32) {
    (p.x as i32 + PLAYFIELD_OFFSET, p.y as i32)
}

/// Draws the battlefield: tanks, rockets, smoke, beams, explosions, the
/// forcefield and both health bar columns.
pub fn draw_scene(world: &mut World, sprites: &SpriteSet, surface: &mut dyn Surface) {
    surface.clear(BACKGROUND);

    let mut blue_health = Vec::new();
    let mut red_health = Vec::new();
    {
        let mut tanks = world.query::<(&Faction, &Position, &Velocity, &Health)>();
        let grid = world.resource::<CellGrid>();
        for cell in grid.cells().iter().filter(|c| c.has_tanks()) {
            for member in cell.members() {
                let Ok((faction, position, velocity, health)) = tanks.get(world, member.entity) else {
                    continue;
                };
                if !health.is_alive() {
                    continue;
                }
                let sprite = sprites.tank(*faction);
                let (x, y) = screen_point(*position);
                surface.blit(sprite.handle, heading_frame(velocity.heading(), sprite.frames), x, y);
                match faction {
                    Faction::Blue => blue_health.push(*health),
                    Faction::Red => red_health.push(*health),
                }
            }
        }
    }

    if let Some(rockets) = world.get_resource::<Rockets>() {
        for rocket in rockets.0.iter().filter(|r| r.active) {
            let sprite = sprites.rocket(rocket.faction);
            let heading = Velocity::new(rocket.velocity.x, rocket.velocity.y).heading();
            let (x, y) = screen_point(rocket.position);
            surface.blit(sprite.handle, heading_frame(heading, sprite.frames), x, y);
        }
    }

    if let Some(effects) = world.get_resource::<Effects>() {
        for smoke in &effects.smokes {
            let (x, y) = screen_point(smoke.position);
            surface.blit(sprites.smoke.handle, smoke.frame(), x, y);
        }
    }

    if let Some(beams) = world.get_resource::<ParticleBeams>() {
        for beam in &beams.0 {
            let center = Position::new(
                (beam.rect.min.x + beam.rect.max.x) * 0.5,
                (beam.rect.min.y + beam.rect.max.y) * 0.5,
            );
            let (x, y) = screen_point(center);
            surface.blit(sprites.particle_beam.handle, beam.frame, x, y);
        }
    }

    if let Some(effects) = world.get_resource::<Effects>() {
        for explosion in &effects.explosions {
            let (x, y) = screen_point(explosion.position);
            surface.blit(sprites.explosion.handle, explosion.frame(), x, y);
        }
    }

    if let Some(hull) = world.get_resource::<ForcefieldHull>() {
        let shift = Position::new(PLAYFIELD_OFFSET as f32, 0.0);
        for (a, b) in hull.edges() {
            surface.line(a + shift, b + shift, HULL_COLOR);
        }
    }

    for (faction, healths) in [(Faction::Blue, blue_health), (Faction::Red, red_health)] {
        let sorted = sort_by_health(&healths, |h| h.current);
        draw_health_bars(surface, faction, &sorted);
    }
}
