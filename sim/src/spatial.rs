//! Spatial partitioning for cell-local queries.
//!
//! The battlefield is split into uniform square cells stored in a flat,
//! direct-indexed array. Each cell owns the membership list of the tanks
//! inside it plus presence flags, giving O(1) position -> cell lookup and
//! letting whole-grid scans skip cells without enemies.
//!
//! Targeting and hit tests only look at a single cell. This is a locality
//! approximation: a tank just across a cell border is invisible to them.

use crate::components::{Faction, Position};
use crate::geometry::Rect;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Grid dimensions and the position -> cell mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    /// Cell edge length in world units.
    pub cell_size: f32,
    /// Cells per row.
    pub width: usize,
    /// Rows.
    pub height: usize,
}

impl GridDims {
    pub fn new(cell_size: f32, width: usize, height: usize) -> Self {
        Self {
            cell_size,
            width,
            height,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn world_width(&self) -> f32 {
        self.width as f32 * self.cell_size
    }

    pub fn world_height(&self) -> f32 {
        self.height as f32 * self.cell_size
    }

    /// `floor(x / size) + floor(y / size) * width`, or `None` outside
    /// `[0, world_width) x [0, world_height)` (NaN included).
    #[inline]
    pub fn cell_index_of(&self, x: f32, y: f32) -> Option<usize> {
        if !(x >= 0.0 && y >= 0.0 && x < self.world_width() && y < self.world_height()) {
            return None;
        }
        let cx = (x / self.cell_size).floor() as usize;
        let cy = (y / self.cell_size).floor() as usize;
        if cx >= self.width || cy >= self.height {
            return None;
        }
        Some(cx + cy * self.width)
    }

    pub fn cell_bounds(&self, id: usize) -> Option<Rect> {
        if id >= self.cell_count() {
            return None;
        }
        let x = (id % self.width) as f32 * self.cell_size;
        let y = (id / self.width) as f32 * self.cell_size;
        Some(Rect::from_origin_size(x, y, self.cell_size, self.cell_size))
    }

    pub fn cell_center(&self, id: usize) -> Option<Position> {
        self.cell_bounds(id).map(|b| {
            Position::new(
                b.min.x + self.cell_size * 0.5,
                b.min.y + self.cell_size * 0.5,
            )
        })
    }

    /// Clamp a position into the grid so it always maps to a cell.
    pub fn clamp(&self, p: Position) -> Position {
        let max_x = (self.world_width() - 0.001).max(0.0);
        let max_y = (self.world_height() - 0.001).max(0.0);
        Position::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y))
    }
}

/// Entry in a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMember {
    pub entity: Entity,
    pub faction: Faction,
}

/// One square of the grid and the tanks inside it.
#[derive(Debug, Clone)]
pub struct GridCell {
    id: usize,
    bounds: Rect,
    members: Vec<CellMember>,
    has_tanks: bool,
    has_blue: bool,
    has_red: bool,
}

impl GridCell {
    pub fn new(id: usize, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            members: Vec::new(),
            has_tanks: false,
            has_blue: false,
            has_red: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.bounds.min.x + self.bounds.max.x) * 0.5,
            (self.bounds.min.y + self.bounds.max.y) * 0.5,
        )
    }

    pub fn members(&self) -> &[CellMember] {
        &self.members
    }

    pub fn has_tanks(&self) -> bool {
        self.has_tanks
    }

    pub fn has_blue(&self) -> bool {
        self.has_blue
    }

    pub fn has_red(&self) -> bool {
        self.has_red
    }

    pub fn has_faction(&self, faction: Faction) -> bool {
        match faction {
            Faction::Blue => self.has_blue,
            Faction::Red => self.has_red,
        }
    }

    pub fn insert(&mut self, member: CellMember) {
        self.members.push(member);
        self.has_tanks = true;
        match member.faction {
            Faction::Blue => self.has_blue = true,
            Faction::Red => self.has_red = true,
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<CellMember> {
        let index = self.members.iter().position(|m| m.entity == entity)?;
        let member = self.members.remove(index);
        self.refresh_flags();
        Some(member)
    }

    /// Remove every member matching `predicate` and hand them back.
    /// Survivors keep their relative order.
    pub fn eject_where(&mut self, mut predicate: impl FnMut(&CellMember) -> bool) -> Vec<CellMember> {
        let mut ejected = Vec::new();
        self.members.retain(|m| {
            if predicate(m) {
                ejected.push(*m);
                false
            } else {
                true
            }
        });
        if !ejected.is_empty() {
            self.refresh_flags();
        }
        ejected
    }

    fn refresh_flags(&mut self) {
        self.has_tanks = !self.members.is_empty();
        self.has_blue = self.members.iter().any(|m| m.faction == Faction::Blue);
        self.has_red = self.members.iter().any(|m| m.faction == Faction::Red);
    }
}

/// Snapshot of a tank as seen by a grid query.
#[derive(Debug, Clone, Copy)]
pub struct TankView {
    pub position: Position,
    pub alive: bool,
}

/// Result of a nearest-enemy query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub entity: Entity,
    pub position: Position,
    pub cell: usize,
}

/// Outcome of one rebucketing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebucketStats {
    /// Members moved to another cell.
    pub moved: usize,
    /// Destroyed members dropped from the grid.
    pub evicted: usize,
    /// Live members whose position no longer maps to any cell.
    pub out_of_range: usize,
}

/// Uniform grid owning per-cell tank membership.
#[derive(Resource, Debug, Clone)]
pub struct CellGrid {
    dims: GridDims,
    cells: Vec<GridCell>,
}

impl Default for CellGrid {
    fn default() -> Self {
        Self::new(GridDims::new(16.0, 80, 45))
    }
}

impl CellGrid {
    pub fn new(dims: GridDims) -> Self {
        let cells = (0..dims.cell_count())
            .filter_map(|id| dims.cell_bounds(id).map(|bounds| GridCell::new(id, bounds)))
            .collect();
        Self { dims, cells }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    #[inline]
    pub fn cell_index_of(&self, position: Position) -> Option<usize> {
        self.dims.cell_index_of(position.x, position.y)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell(&self, id: usize) -> Option<&GridCell> {
        self.cells.get(id)
    }

    /// Total membership across all cells.
    pub fn total_count(&self) -> usize {
        self.cells.iter().map(|c| c.members.len()).sum()
    }

    /// Insert a tank at `position`. Returns the cell id, or `None` when the
    /// position is off the grid (nothing is inserted).
    pub fn insert(&mut self, entity: Entity, faction: Faction, position: Position) -> Option<usize> {
        let id = self.cell_index_of(position)?;
        self.insert_into(id, CellMember { entity, faction })
    }

    /// Insert a member into a known cell id.
    pub fn insert_into(&mut self, id: usize, member: CellMember) -> Option<usize> {
        let cell = self.cells.get_mut(id)?;
        cell.insert(member);
        Some(id)
    }

    /// Remove a tank from the cell that currently holds it.
    pub fn remove(&mut self, entity: Entity, position: Position) -> Option<CellMember> {
        if let Some(id) = self.cell_index_of(position) {
            if let Some(member) = self.cells[id].remove(entity) {
                return Some(member);
            }
        }
        // The tank may have moved since it was bucketed.
        self.cells.iter_mut().find_map(|cell| cell.remove(entity))
    }

    /// Move every member whose position now maps to another cell, and drop
    /// members that are destroyed or no longer resolvable.
    ///
    /// `locate` reports a member's current state, `None` if it is gone.
    pub fn rebucket(&mut self, locate: impl Fn(Entity) -> Option<TankView>) -> RebucketStats {
        let dims = self.dims;
        let mut stats = RebucketStats::default();
        let mut homeless = Vec::new();

        for cell in &mut self.cells {
            if cell.members.is_empty() {
                continue;
            }
            let id = cell.id;
            let ejected = cell.eject_where(|m| match locate(m.entity) {
                Some(view) => !view.alive || dims.cell_index_of(view.position.x, view.position.y) != Some(id),
                None => true,
            });
            homeless.extend(ejected);
        }

        for member in homeless {
            match locate(member.entity) {
                Some(view) if view.alive => {
                    match dims.cell_index_of(view.position.x, view.position.y) {
                        Some(id) => {
                            self.cells[id].insert(member);
                            stats.moved += 1;
                        }
                        None => stats.out_of_range += 1,
                    }
                }
                _ => stats.evicted += 1,
            }
        }
        stats
    }

    /// Two-phase approximate nearest-enemy search.
    ///
    /// Picks the cell with enemies whose *center* is nearest to `origin`,
    /// then the nearest live enemy inside that cell only. A geometrically
    /// closer enemy in another cell can be missed; the cost is bounded by
    /// O(cells) + O(cell population).
    ///
    /// Returns `None` when `origin` is off the grid or no live enemy is found.
    pub fn nearest_enemy(
        &self,
        origin: Position,
        faction: Faction,
        locate: impl Fn(Entity) -> Option<TankView>,
    ) -> Option<Target> {
        self.cell_index_of(origin)?;
        let enemy = faction.opponent();

        let mut closest_cell: Option<(usize, f32)> = None;
        for cell in &self.cells {
            if !cell.has_tanks || !cell.has_faction(enemy) {
                continue;
            }
            let dist = cell.center().distance_sq(&origin);
            if closest_cell.map_or(true, |(_, best)| dist < best) {
                closest_cell = Some((cell.id, dist));
            }
        }
        let (cell_id, _) = closest_cell?;

        let mut best: Option<(Target, f32)> = None;
        for member in &self.cells[cell_id].members {
            if member.faction != enemy {
                continue;
            }
            let Some(view) = locate(member.entity) else {
                continue;
            };
            if !view.alive {
                continue;
            }
            let dist = view.position.distance_sq(&origin);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((
                    Target {
                        entity: member.entity,
                        position: view.position,
                        cell: cell_id,
                    },
                    dist,
                ));
            }
        }
        best.map(|(target, _)| target)
    }
}
