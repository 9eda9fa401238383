//! Parallel army initializer.
//!
//! Spawning runs in two phases:
//!
//! 1. **Build** - each task lays out a slice of one faction's formation and
//!    computes every tank's grid cell. Tasks only read shared state, so with
//!    the `parallel` feature they run on a dedicated rayon pool.
//! 2. **Commit** - back on the calling thread, batches are spawned into the
//!    `World` and inserted into the `CellGrid` one after another. No cell is
//!    ever touched by more than one thread.
//!
//! Per-faction task ledgers sit behind a mutex each. They only hold
//! bookkeeping, never grid state.

use crate::components::{Destination, Faction, Position, TankBundle, TankStats};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::spatial::{CellGrid, CellMember, GridDims};
use bevy_ecs::prelude::*;
use std::sync::Mutex;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Formation and objective for one faction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPlan {
    pub faction: Faction,
    pub count: usize,
    /// First `TankId` handed out for this faction.
    pub id_offset: u32,
    pub origin: Position,
    /// Tanks per formation row.
    pub max_rows: usize,
    pub spacing: f32,
    pub destination_x: f32,
    pub destination_y_offset: f32,
}

impl SpawnPlan {
    pub fn for_faction(config: &SimConfig, faction: Faction, id_offset: u32) -> Self {
        let (origin, destination_x) = match faction {
            Faction::Blue => (config.blue_start, config.blue_destination_x),
            Faction::Red => (config.red_start, config.red_destination_x),
        };
        Self {
            faction,
            count: config.tanks_per_faction,
            id_offset,
            origin: Position::new(origin.0, origin.1),
            max_rows: config.max_rows.max(1),
            spacing: config.spacing,
            destination_x,
            destination_y_offset: config.destination_y_offset,
        }
    }

    /// Position of the `index`-th tank of the formation.
    pub fn slot_position(&self, index: usize) -> Position {
        let rows = self.max_rows.max(1);
        Position::new(
            self.origin.x + (index % rows) as f32 * self.spacing,
            self.origin.y + (index / rows) as f32 * self.spacing,
        )
    }

    /// Point on the destination line level with the spawn row.
    pub fn destination_for(&self, position: Position) -> Destination {
        Destination {
            x: self.destination_x,
            y: position.y + self.destination_y_offset,
        }
    }
}

/// Per-tank values copied into every spawned bundle.
#[derive(Debug, Clone, Copy)]
pub struct TankTemplate {
    pub max_health: i32,
    pub stats: TankStats,
    pub initial_reload: f32,
}

impl TankTemplate {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            max_health: config.tank_max_health,
            stats: TankStats {
                collision_radius: config.tank_radius,
                max_speed: config.tank_max_speed,
            },
            initial_reload: config.initial_reload,
        }
    }
}

/// One worker's share of a faction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnTask {
    pub plan: SpawnPlan,
    /// Task number within the faction.
    pub task: usize,
    /// First formation slot.
    pub start: usize,
    pub count: usize,
}

/// Split a faction evenly over `workers` tasks. The remainder goes to the
/// first tasks; tasks that would be empty are not created.
pub fn plan_tasks(plan: &SpawnPlan, workers: usize) -> Vec<SpawnTask> {
    let workers = workers.max(1);
    let base = plan.count / workers;
    let remainder = plan.count % workers;

    let mut tasks = Vec::with_capacity(workers);
    let mut start = 0;
    for task in 0..workers {
        let count = base + usize::from(task < remainder);
        if count == 0 {
            break;
        }
        tasks.push(SpawnTask {
            plan: *plan,
            task,
            start,
            count,
        });
        start += count;
    }
    tasks
}

/// Tanks built by one task, each paired with its target cell.
#[derive(Debug, Clone)]
pub struct SpawnBatch {
    pub faction: Faction,
    pub tanks: Vec<TankBundle>,
    /// `cells[i]` is the cell id for `tanks[i]`.
    pub cells: Vec<usize>,
}

/// Bookkeeping written by a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    pub task: usize,
    pub spawned: usize,
    /// Slots whose position fell outside the grid.
    pub skipped: usize,
}

/// Task reports, one mutex per faction.
#[derive(Debug, Default)]
pub struct FactionLedger {
    blue: Mutex<Vec<TaskReport>>,
    red: Mutex<Vec<TaskReport>>,
}

impl FactionLedger {
    fn slot(&self, faction: Faction) -> &Mutex<Vec<TaskReport>> {
        match faction {
            Faction::Blue => &self.blue,
            Faction::Red => &self.red,
        }
    }

    pub fn record(&self, faction: Faction, report: TaskReport) {
        self.slot(faction)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report);
    }

    /// Reports for a faction, ordered by task number.
    pub fn reports(&self, faction: Faction) -> Vec<TaskReport> {
        let mut reports = self.slot(faction).lock().unwrap_or_else(|e| e.into_inner()).clone();
        reports.sort_by_key(|r| r.task);
        reports
    }

    pub fn spawned(&self, faction: Faction) -> usize {
        self.reports(faction).iter().map(|r| r.spawned).sum()
    }

    pub fn skipped(&self) -> usize {
        [Faction::Blue, Faction::Red]
            .iter()
            .flat_map(|f| self.reports(*f))
            .map(|r| r.skipped)
            .sum()
    }
}

/// Build one task's batch without touching the grid.
pub fn run_task(task: &SpawnTask, template: &TankTemplate, dims: GridDims, ledger: &FactionLedger) -> SpawnBatch {
    let plan = &task.plan;
    let mut tanks = Vec::with_capacity(task.count);
    let mut cells = Vec::with_capacity(task.count);
    let mut skipped = 0;

    for slot in task.start..task.start + task.count {
        let position = plan.slot_position(slot);
        let Some(cell) = dims.cell_index_of(position.x, position.y) else {
            skipped += 1;
            continue;
        };
        let id = plan.id_offset + slot as u32;
        let bundle = TankBundle::new(id, plan.faction, position, plan.destination_for(position))
            .with_stats(template.max_health, template.stats, template.initial_reload);
        tanks.push(bundle);
        cells.push(cell);
    }

    ledger.record(
        plan.faction,
        TaskReport {
            task: task.task,
            spawned: tanks.len(),
            skipped,
        },
    );

    SpawnBatch {
        faction: plan.faction,
        tanks,
        cells,
    }
}

/// Run every task and join. Batches come back in task order.
pub fn spawn_batches(
    tasks: &[SpawnTask],
    template: &TankTemplate,
    dims: GridDims,
    workers: usize,
) -> Result<(Vec<SpawnBatch>, FactionLedger), SimError> {
    let ledger = FactionLedger::default();

    #[cfg(feature = "parallel")]
    let batches = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("spawn-worker-{i}"))
            .build()
            .map_err(|e| SimError::WorkerPool(e.to_string()))?;
        pool.install(|| {
            tasks
                .par_iter()
                .map(|task| run_task(task, template, dims, &ledger))
                .collect::<Vec<_>>()
        })
    };

    #[cfg(not(feature = "parallel"))]
    let batches = {
        let _ = workers;
        tasks
            .iter()
            .map(|task| run_task(task, template, dims, &ledger))
            .collect::<Vec<_>>()
    };

    Ok((batches, ledger))
}

/// Spawn each batch into the world and register its tanks with the grid.
/// Returns the number of tanks committed.
pub fn commit_batches(world: &mut World, batches: Vec<SpawnBatch>) -> usize {
    let mut committed = 0;
    for batch in batches {
        let faction = batch.faction;
        let entities: Vec<Entity> = world.spawn_batch(batch.tanks).collect();
        let mut grid = world.resource_mut::<CellGrid>();
        for (entity, cell) in entities.into_iter().zip(batch.cells) {
            if grid.insert_into(cell, CellMember { entity, faction }).is_some() {
                committed += 1;
            }
        }
    }
    committed
}

/// Summary of an initialization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    pub blue: usize,
    pub red: usize,
    pub skipped: usize,
    pub tasks: usize,
    pub workers: usize,
}

impl InitReport {
    pub fn total(&self) -> usize {
        self.blue + self.red
    }
}

/// Build and commit both armies. The world must already hold a `CellGrid`.
pub fn spawn_armies(world: &mut World, config: &SimConfig) -> Result<InitReport, SimError> {
    let workers = config.resolved_workers();
    let dims = world.resource::<CellGrid>().dims();
    let template = TankTemplate::from_config(config);

    let blue = SpawnPlan::for_faction(config, Faction::Blue, 0);
    let red = SpawnPlan::for_faction(config, Faction::Red, config.tanks_per_faction as u32);

    // Interleave factions so both armies share the pool from the start.
    let blue_tasks = plan_tasks(&blue, workers);
    let red_tasks = plan_tasks(&red, workers);
    let mut tasks = Vec::with_capacity(blue_tasks.len() + red_tasks.len());
    let mut blue_iter = blue_tasks.into_iter();
    let mut red_iter = red_tasks.into_iter();
    loop {
        match (blue_iter.next(), red_iter.next()) {
            (None, None) => break,
            (b, r) => tasks.extend(b.into_iter().chain(r)),
        }
    }

    let (batches, ledger) = spawn_batches(&tasks, &template, dims, workers)?;
    let committed = commit_batches(world, batches);

    let report = InitReport {
        blue: ledger.spawned(Faction::Blue),
        red: ledger.spawned(Faction::Red),
        skipped: ledger.skipped(),
        tasks: tasks.len(),
        workers,
    };
    debug!(committed, tasks = report.tasks, workers, "spawn batches committed");
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "tanks outside the grid were not spawned");
    }
    Ok(report)
}
