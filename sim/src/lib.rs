//! Tank Battle - Simulation Core
//!
//! Two armies of tanks cross a tiled battlefield, fire rockets at the
//! nearest enemy in their grid cell and are held inside a forcefield hull
//! rebuilt every frame. Uses `bevy_ecs` for the entity-component-system
//! architecture and a rayon pool to spawn the armies.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hull;
pub mod pathfinding;
pub mod profiler;
pub mod render;
pub mod spatial;
pub mod spawn;
pub mod systems;
pub mod terrain;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{BeamConfig, SimConfig};
pub use error::SimError;
pub use hull::{build_hull, ForcefieldHull};
pub use profiler::{PerformanceReport, Profiler};
pub use render::{AssetLoader, SpriteHandle, SpriteSet, Surface};
pub use spatial::{CellGrid, CellMember, GridCell, GridDims, Target};
pub use spawn::InitReport;
pub use systems::*;
pub use terrain::{TerrainGrid, TerrainProvider, TerrainResource, TerrainType};
pub use world::Snapshot;
