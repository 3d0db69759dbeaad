//! The externally owned map configuration and the weak handle the engine keeps to it.
use log::warn;
use rand::Rng;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{Result, SearchError};
use crate::heuristic::HeuristicKind;
use crate::terrain_grid::Terrain;
use crate::WALL_DENSITY;

/// Probabilities with which random generation assigns each terrain. Whatever is left over
/// becomes [Terrain::Open].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainWeights {
    pub wall: f64,
    pub water: f64,
    pub sand: f64,
    pub forest: f64,
}

impl Default for TerrainWeights {
    fn default() -> Self {
        TerrainWeights::walls_only(WALL_DENSITY)
    }
}

impl TerrainWeights {
    /// Open cells and walls only, walls appearing with probability `density`.
    pub fn walls_only(density: f64) -> TerrainWeights {
        TerrainWeights {
            wall: density,
            water: 0.0,
            sand: 0.0,
            forest: 0.0,
        }
    }

    /// Walls with probability `wall_density` plus a tenth each of water, sand and forest.
    pub fn mixed(wall_density: f64) -> TerrainWeights {
        TerrainWeights {
            wall: wall_density,
            water: 0.1,
            sand: 0.1,
            forest: 0.1,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Terrain {
        let roll: f64 = rng.gen();
        let mut threshold = 0.0;
        for (weight, terrain) in [
            (self.wall, Terrain::Wall),
            (self.water, Terrain::Water),
            (self.sand, Terrain::Sand),
            (self.forest, Terrain::Forest),
        ] {
            threshold += weight.max(0.0);
            if roll < threshold {
                return terrain;
            }
        }
        Terrain::Open
    }
}

/// Everything the engine reads from the outside world. The engine never writes to it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct MapConfig {
    pub rows: usize,
    pub columns: usize,
    /// Only used for rendering.
    pub cell_size: u32,
    pub start_row: usize,
    #[cfg_attr(feature = "serde", serde(rename = "startCol"))]
    pub start_column: usize,
    pub end_row: usize,
    #[cfg_attr(feature = "serde", serde(rename = "endCol"))]
    pub end_column: usize,
    #[cfg_attr(feature = "serde", serde(rename = "heuristicMethod"))]
    pub heuristic: HeuristicKind,
    pub simulation_speed: f32,
    pub terrain: TerrainWeights,
    /// Seed for terrain generation. Without one every rebuild draws a fresh layout.
    pub seed: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig::new(20, 20, 32)
    }
}

impl MapConfig {
    /// A map with the start in the top left corner and the end in the bottom right one.
    pub fn new(rows: usize, columns: usize, cell_size: u32) -> MapConfig {
        MapConfig {
            rows,
            columns,
            cell_size,
            start_row: 0,
            start_column: 0,
            end_row: rows.saturating_sub(1),
            end_column: columns.saturating_sub(1),
            heuristic: HeuristicKind::None,
            simulation_speed: 1.0,
            terrain: TerrainWeights::default(),
            seed: None,
        }
    }

    pub fn with_start(mut self, row: usize, column: usize) -> MapConfig {
        self.start_row = row;
        self.start_column = column;
        self
    }

    pub fn with_end(mut self, row: usize, column: usize) -> MapConfig {
        self.end_row = row;
        self.end_column = column;
        self
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicKind) -> MapConfig {
        self.heuristic = heuristic;
        self
    }

    pub fn with_terrain(mut self, terrain: TerrainWeights) -> MapConfig {
        self.terrain = terrain;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> MapConfig {
        self.seed = Some(seed);
        self
    }

    pub fn with_simulation_speed(mut self, simulation_speed: f32) -> MapConfig {
        self.simulation_speed = simulation_speed;
        self
    }

    pub fn start(&self) -> (usize, usize) {
        (self.start_row, self.start_column)
    }

    pub fn end(&self) -> (usize, usize) {
        (self.end_row, self.end_column)
    }

    pub fn into_shared(self) -> SharedMapConfig {
        Rc::new(RefCell::new(self))
    }
}

/// How the owner of a configuration holds it.
pub type SharedMapConfig = Rc<RefCell<MapConfig>>;

/// Non-owning reference to a [SharedMapConfig]. Every read checks that the owner still exists.
#[derive(Clone, Debug, Default)]
pub struct MapConfigHandle(Weak<RefCell<MapConfig>>);

impl MapConfigHandle {
    pub fn new(config: &SharedMapConfig) -> MapConfigHandle {
        MapConfigHandle(Rc::downgrade(config))
    }

    /// A handle that refers to nothing.
    pub fn detached() -> MapConfigHandle {
        MapConfigHandle(Weak::new())
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Copies the current configuration out. Fails if the owner has dropped it, or is in the
    /// middle of mutating it.
    pub fn read(&self) -> Result<MapConfig> {
        let config = self.0.upgrade().ok_or(SearchError::ConfigurationUnavailable)?;
        let config = match config.try_borrow() {
            Ok(config) => config.clone(),
            Err(_) => {
                warn!("Map configuration is mutably borrowed, treating it as unavailable");
                return Err(SearchError::ConfigurationUnavailable);
            }
        };
        Ok(config)
    }
}

impl From<&SharedMapConfig> for MapConfigHandle {
    fn from(config: &SharedMapConfig) -> Self {
        MapConfigHandle::new(config)
    }
}
