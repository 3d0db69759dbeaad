//! # stepwise_pathfinding
//!
//! An incremental [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) search on a
//! terrain grid, built for interactive visualization. Instead of computing a path in one call,
//! the [SearchEngine] performs a single relaxation per [step](SearchEngine::step), and can be
//! paused, resumed, reset or rebuilt at any point without corrupting the search state.
//!
//! Cells carry a [Terrain] with a traversal cost. The [HeuristicKind] both estimates the
//! remaining cost and selects the movement model: [Manhattan](HeuristicKind::Manhattan) restricts
//! moves to the four cardinal directions, all other heuristics also allow diagonal moves, which
//! are never allowed to cut the corner of a wall.
//!
//! ```
//! use stepwise_pathfinding::{HeuristicKind, MapConfig, SearchEngine, SearchStatus};
//!
//! let config = MapConfig::new(16, 16, 32)
//!     .with_heuristic(HeuristicKind::Octile)
//!     .with_seed(7)
//!     .into_shared();
//! let mut engine = SearchEngine::new(&config);
//! engine.rebuild().unwrap();
//! while !engine.status().is_terminal() {
//!     engine.step().unwrap();
//! }
//! assert!(matches!(
//!     engine.status(),
//!     SearchStatus::PathFound | SearchStatus::Exhausted
//! ));
//! ```
pub mod config;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod heuristic;
pub mod terrain_grid;

pub use config::{MapConfig, MapConfigHandle, SharedMapConfig, TerrainWeights};
pub use engine::{
    CellView, ControlEvent, SearchEngine, SearchSnapshot, SearchStats, SearchStatus, StepOutcome,
};
pub use error::{Result, SearchError};
pub use frontier::{ByFThenG, ByFThenH, Frontier, FrontierEntry, FrontierOrder};
pub use heuristic::{heuristic, HeuristicKind};
pub use terrain_grid::{terrain_cost, Cell, CellIndex, Terrain, TerrainGrid};

/// Cost type used throughout the search.
pub type Cost = f32;

/// Fraction of cells that random generation turns into walls by default.
pub const WALL_DENSITY: f64 = 0.3;
/// Seconds between two automatic steps at a simulation speed of 1.
pub const BASE_STEP_INTERVAL: f32 = 0.01;
/// Cost multiplier of a straight move.
pub const ORTHOGONAL_COST: Cost = 1.0;
/// Cost multiplier of a diagonal move, also used by the octile heuristic.
pub const DIAGONAL_COST: Cost = std::f32::consts::SQRT_2;
/// Cost reported for walls.
pub const IMPASSABLE_COST: Cost = Cost::INFINITY;
/// Inline capacity of neighbour lists, enough for a full Moore neighbourhood.
pub const N_SMALLVEC_SIZE: usize = 8;
