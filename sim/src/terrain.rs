//! Terrain - tile kinds, passability and speed multipliers.
//!
//! The battlefield is a grid of square tiles. Tiles slow tanks down and
//! mountains and water block them entirely. The simulation only talks to
//! terrain through [`TerrainProvider`], so a host may plug in its own map.

use crate::components::Position;
use crate::pathfinding;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the simulation needs from a terrain map.
pub trait TerrainProvider: Send + Sync {
    /// Width in tiles.
    fn width(&self) -> usize;
    /// Height in tiles.
    fn height(&self) -> usize;
    /// Tile edge length in world units.
    fn tile_size(&self) -> f32;
    /// Whether tanks may enter tile (tx, ty). Off-map tiles are impassable.
    fn is_passable(&self, tx: usize, ty: usize) -> bool;
    /// Movement speed multiplier at a world position.
    fn speed_multiplier(&self, position: Position) -> f32;

    /// Tile containing a world position, `None` off the map.
    fn tile_of(&self, position: Position) -> Option<(usize, usize)> {
        let size = self.tile_size();
        if !(position.x >= 0.0 && position.y >= 0.0) || size <= 0.0 {
            return None;
        }
        let tx = (position.x / size).floor() as usize;
        let ty = (position.y / size).floor() as usize;
        (tx < self.width() && ty < self.height()).then_some((tx, ty))
    }

    /// World position of a tile's center.
    fn tile_center(&self, tx: usize, ty: usize) -> Position {
        let size = self.tile_size();
        Position::new((tx as f32 + 0.5) * size, (ty as f32 + 0.5) * size)
    }

    /// Waypoints from `from` to `to`, excluding the start. Empty when the
    /// destination cannot be reached.
    fn route(&self, from: Position, to: Position) -> Vec<Position> {
        pathfinding::bfs_route(self, from, to)
    }
}

/// Shared terrain handle for ECS systems.
#[derive(Resource, Clone)]
pub struct TerrainResource(pub Arc<dyn TerrainProvider>);

impl TerrainResource {
    pub fn new(terrain: Arc<dyn TerrainProvider>) -> Self {
        Self(terrain)
    }

    pub fn speed_multiplier(&self, position: Position) -> f32 {
        self.0.speed_multiplier(position)
    }

    pub fn route(&self, from: Position, to: Position) -> Vec<Position> {
        self.0.route(from, to)
    }
}

/// Terrain type of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Grass,
    Forest,
    Rocks,
    Mountains,
    Water,
}

impl TerrainType {
    /// Movement speed multiplier for this terrain type.
    pub fn movement_multiplier(&self) -> f32 {
        match self {
            TerrainType::Grass => 1.0,
            TerrainType::Forest => 0.6,
            TerrainType::Rocks => 0.8,
            TerrainType::Mountains => 0.4,
            TerrainType::Water => 0.4,
        }
    }

    pub fn passable(&self) -> bool {
        !matches!(self, TerrainType::Mountains | TerrainType::Water)
    }
}

/// Row-major tile map with its origin at world (0, 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub width: usize,
    pub height: usize,
    pub tile_size: f32,
    tiles: Vec<TerrainType>,
}

impl TerrainGrid {
    /// Open grassland.
    pub fn new(width: usize, height: usize, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            tiles: vec![TerrainType::Grass; width * height],
        }
    }

    /// Battlefield with obstacles in the middle band.
    ///
    /// Features are placed at fixed fractions of the map so the layout is
    /// deterministic. The outer fifth on each side (spawn areas and
    /// destination lines) stays clear, and every obstacle leaves open
    /// corridors so both sides can reach the far column.
    pub fn new_with_features(width: usize, height: usize, tile_size: f32) -> Self {
        let mut grid = Self::new(width, height, tile_size);
        if width < 10 || height < 10 {
            return grid;
        }

        // Two mountain ridges with a pass between them.
        let ridge_x = width * 2 / 5;
        for y in height / 8..height * 3 / 8 {
            grid.fill_rect(ridge_x, y, 2, 1, TerrainType::Mountains);
        }
        for y in height * 5 / 8..height * 7 / 8 {
            grid.fill_rect(ridge_x, y, 2, 1, TerrainType::Mountains);
        }

        // A lake off the pass, leaving the ridge ends open.
        grid.add_patch(width * 11 / 20, height / 2, height / 12, TerrainType::Water);

        // Forest and rocky ground that slow but never block.
        grid.add_patch(width * 3 / 10, height / 4, height / 10, TerrainType::Forest);
        grid.add_patch(width * 3 / 10, height * 3 / 4, height / 10, TerrainType::Forest);
        grid.add_patch(width * 13 / 20, height / 5, height / 12, TerrainType::Rocks);
        grid.add_patch(width * 13 / 20, height * 4 / 5, height / 12, TerrainType::Rocks);

        grid
    }

    fn add_patch(&mut self, cx: usize, cy: usize, radius: usize, kind: TerrainType) {
        for dy in 0..=radius * 2 {
            for dx in 0..=radius * 2 {
                let x = cx.saturating_sub(radius) + dx;
                let y = cy.saturating_sub(radius) + dy;

                let dist_sq = (x as i64 - cx as i64).pow(2) + (y as i64 - cy as i64).pow(2);
                if dist_sq <= (radius as i64).pow(2) {
                    if let Some(tile) = self.get_tile_mut(x, y) {
                        if *tile == TerrainType::Grass {
                            *tile = kind;
                        }
                    }
                }
            }
        }
    }

    /// Overwrite a rectangle of tiles (clipped to the map).
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, kind: TerrainType) {
        for ty in y..y.saturating_add(h) {
            for tx in x..x.saturating_add(w) {
                if let Some(tile) = self.get_tile_mut(tx, ty) {
                    *tile = kind;
                }
            }
        }
    }

    fn tile_index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get_tile(&self, x: usize, y: usize) -> Option<TerrainType> {
        self.tile_index(x, y).map(|i| self.tiles[i])
    }

    pub fn get_tile_mut(&mut self, x: usize, y: usize) -> Option<&mut TerrainType> {
        self.tile_index(x, y).map(|i| &mut self.tiles[i])
    }

    pub fn set_tile(&mut self, x: usize, y: usize, kind: TerrainType) {
        if let Some(tile) = self.get_tile_mut(x, y) {
            *tile = kind;
        }
    }

    /// Terrain at a world position. Off-map reads as grass.
    pub fn get_terrain_at(&self, position: Position) -> TerrainType {
        self.tile_of(position)
            .and_then(|(x, y)| self.get_tile(x, y))
            .unwrap_or_default()
    }

    /// Number of impassable tiles.
    pub fn blocked_count(&self) -> usize {
        self.tiles.iter().filter(|t| !t.passable()).count()
    }
}

impl TerrainProvider for TerrainGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn is_passable(&self, tx: usize, ty: usize) -> bool {
        self.get_tile(tx, ty).is_some_and(|t| t.passable())
    }

    fn speed_multiplier(&self, position: Position) -> f32 {
        self.get_terrain_at(position).movement_multiplier()
    }
}
