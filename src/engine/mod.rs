//! The incremental search. [SearchEngine] performs A* one relaxation per [step](SearchEngine::step)
//! call, so that a driver can pause, resume and inspect it at any point.
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{MapConfig, MapConfigHandle, SharedMapConfig};
use crate::error::{Result, SearchError};
use crate::frontier::{ByFThenH, Frontier, FrontierOrder};
use crate::heuristic::HeuristicKind;
use crate::terrain_grid::{CellIndex, Terrain, TerrainGrid};
use crate::{Cost, BASE_STEP_INTERVAL};

mod events;
mod snapshot;

pub use events::ControlEvent;
pub use snapshot::{CellView, SearchSnapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchStatus {
    /// No grid has been built yet.
    #[default]
    Idle,
    Paused,
    Running,
    PathFound,
    Exhausted,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchStatus::PathFound | SearchStatus::Exhausted)
    }
}

/// What a single call to [step](SearchEngine::step) did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The cell was closed and its neighbours relaxed.
    Expanded(CellIndex),
    /// A stale frontier entry for the cell was dropped. Step again to make progress.
    Discarded(CellIndex),
    PathFound,
    Exhausted,
    /// Nothing to do: no grid, or the search already finished.
    NoOp,
}

/// Counters for the current run. Cleared by every rebuild and reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub steps: usize,
    pub expansions: usize,
    pub discarded: usize,
    pub pushes: usize,
}

/// Start, goal and heuristic of the current run, captured when the run was seeded so that later
/// configuration edits cannot change the rules halfway through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct SearchTarget {
    start: CellIndex,
    goal: CellIndex,
    heuristic: HeuristicKind,
}

/// Step-driven A* over a [TerrainGrid]. The engine owns the grid and the frontier; the map
/// configuration is owned elsewhere and only referenced through a [MapConfigHandle].
pub struct SearchEngine<O = ByFThenH> {
    config: MapConfigHandle,
    grid: Option<TerrainGrid>,
    frontier: Frontier<Cost, O>,
    target: SearchTarget,
    status: SearchStatus,
    accumulated_time: f32,
    stats: SearchStats,
}

impl SearchEngine {
    /// An idle engine using the default [ByFThenH] frontier order.
    pub fn new(config: &SharedMapConfig) -> SearchEngine {
        SearchEngine::with_order(MapConfigHandle::new(config))
    }
}

impl<O: FrontierOrder<Cost>> SearchEngine<O> {
    /// An idle engine with a custom frontier order.
    pub fn with_order(config: MapConfigHandle) -> SearchEngine<O> {
        SearchEngine {
            config,
            grid: None,
            frontier: Frontier::new(),
            target: SearchTarget::default(),
            status: SearchStatus::Idle,
            accumulated_time: 0.0,
            stats: SearchStats::default(),
        }
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn grid(&self) -> Option<&TerrainGrid> {
        self.grid.as_ref()
    }

    pub fn frontier(&self) -> &Frontier<Cost, O> {
        &self.frontier
    }

    /// Heuristic of the current run.
    pub fn heuristic(&self) -> HeuristicKind {
        self.target.heuristic
    }

    pub fn start_cell(&self) -> Option<CellIndex> {
        self.grid.as_ref().map(|_| self.target.start)
    }

    pub fn goal_cell(&self) -> Option<CellIndex> {
        self.grid.as_ref().map(|_| self.target.goal)
    }

    pub fn config(&self) -> &MapConfigHandle {
        &self.config
    }

    fn live_config(&self, operation: &str) -> Result<MapConfig> {
        self.config.read().map_err(|e| {
            warn!("Ignoring {operation}: {e}");
            e
        })
    }

    /// Builds a fresh random grid from the configuration and seeds a new run on it.
    pub fn rebuild(&mut self) -> Result<SearchStatus> {
        let config = self.live_config("rebuild")?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let grid = TerrainGrid::generate(
            config.rows,
            config.columns,
            config.start(),
            config.end(),
            &config.terrain,
            &mut rng,
        )
        .map_err(|e| {
            warn!("Rebuild rejected: {e}");
            e
        })?;
        self.install(grid, &config)
    }

    /// Keeps the terrain and seeds a new run with the start, goal and heuristic currently in
    /// the configuration. Without a grid this is a [rebuild](Self::rebuild).
    pub fn reset(&mut self) -> Result<SearchStatus> {
        let config = self.live_config("reset")?;
        let target = match self.grid.as_ref() {
            Some(grid) => Self::target_for(grid, &config)?,
            None => return self.rebuild(),
        };
        self.seed(target);
        Ok(self.status)
    }

    /// Replaces the terrain with `grid`, e.g. one loaded from a saved map, and seeds a new run.
    pub fn load_terrain(&mut self, grid: TerrainGrid) -> Result<SearchStatus> {
        let config = self.live_config("load_terrain")?;
        self.install(grid, &config)
    }

    /// Points the engine at a different configuration and rebuilds from it.
    pub fn set_config(&mut self, config: MapConfigHandle) -> Result<SearchStatus> {
        self.config = config;
        self.rebuild()
    }

    fn install(&mut self, grid: TerrainGrid, config: &MapConfig) -> Result<SearchStatus> {
        let target = Self::target_for(&grid, config)?;
        self.grid = Some(grid);
        self.seed(target);
        Ok(self.status)
    }

    fn target_for(grid: &TerrainGrid, config: &MapConfig) -> Result<SearchTarget> {
        let checked = |(row, column): (usize, usize)| {
            grid.checked_index(row, column).map_err(|e| {
                warn!("Rejecting configuration: {e}");
                e
            })
        };
        Ok(SearchTarget {
            start: checked(config.start())?,
            goal: checked(config.end())?,
            heuristic: config.heuristic,
        })
    }

    /// Clears all per-cell search state and pushes the start cell.
    fn seed(&mut self, target: SearchTarget) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        grid.reset_search();
        let (start_row, start_column) = grid.position(target.start);
        let (goal_row, goal_column) = grid.position(target.goal);
        let h = target
            .heuristic
            .estimate(start_row, start_column, goal_row, goal_column);
        let start = grid.cell_mut(target.start);
        start.g_cost = 0.0;
        start.h_cost = h;

        grid.update(target.heuristic.allows_diagonal_movement());
        if grid.unreachable(target.start, target.goal) {
            info!(
                "({goal_row}, {goal_column}) is not reachable from ({start_row}, {start_column}), the search will exhaust"
            );
        }

        self.frontier.clear();
        self.frontier.push(target.start, h, h);
        self.target = target;
        self.status = SearchStatus::Paused;
        self.accumulated_time = 0.0;
        self.stats = SearchStats {
            pushes: 1,
            ..SearchStats::default()
        };
        info!(
            "Search seeded from ({start_row}, {start_column}) to ({goal_row}, {goal_column}) using {} heuristic",
            target.heuristic
        );
    }

    /// Starts auto-stepping through [tick](Self::tick). Only has an effect while paused.
    pub fn start(&mut self) -> Result<SearchStatus> {
        self.live_config("start")?;
        if self.status == SearchStatus::Paused {
            self.status = SearchStatus::Running;
        }
        Ok(self.status)
    }

    /// Stops auto-stepping. Pausing a paused search does nothing.
    pub fn pause(&mut self) -> Result<SearchStatus> {
        self.live_config("pause")?;
        if self.status == SearchStatus::Running {
            self.status = SearchStatus::Paused;
        }
        Ok(self.status)
    }

    pub fn is_running(&self) -> bool {
        self.status == SearchStatus::Running
    }

    /// Performs exactly one relaxation: pops the best frontier entry, closes its cell and relaxes
    /// the cell's neighbours. Stale entries are dropped without expanding anything.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.live_config("step")?;
        let grid = match self.grid.as_mut() {
            Some(grid) if !self.status.is_terminal() => grid,
            _ => return Ok(StepOutcome::NoOp),
        };
        self.stats.steps += 1;

        let entry = match self.frontier.pop_min() {
            Ok(entry) => entry,
            Err(SearchError::EmptyFrontier) => {
                self.status = SearchStatus::Exhausted;
                info!(
                    "Frontier exhausted after {} expansions, no path exists",
                    self.stats.expansions
                );
                return Ok(StepOutcome::Exhausted);
            }
            Err(e) => return Err(e),
        };

        let current_ix = entry.cell;
        let current = grid.cell_mut(current_ix);
        // We may have pushed a cell several times if we found a better way to reach it. Only
        // the entry matching the current cost counts, the others are discarded.
        if current.closed || entry.f_cost > current.f_cost() {
            self.stats.discarded += 1;
            trace!("Discarding stale entry for cell {current_ix}");
            return Ok(StepOutcome::Discarded(current_ix));
        }
        current.closed = true;
        let current_g = current.g_cost;
        let (row, column) = current.position();
        self.stats.expansions += 1;

        let target = self.target;
        if current_ix == target.goal {
            self.status = SearchStatus::PathFound;
            info!(
                "Path to ({row}, {column}) found with cost {current_g} after {} expansions",
                self.stats.expansions
            );
            return Ok(StepOutcome::PathFound);
        }
        debug!("Expanding ({row}, {column}) with g = {current_g}");

        let (goal_row, goal_column) = grid.position(target.goal);
        let allow_diagonals = target.heuristic.allows_diagonal_movement();
        for neighbor_ix in grid.neighbors(row, column, allow_diagonals) {
            let candidate_g = current_g + grid.step_cost(current_ix, neighbor_ix);
            let neighbor = grid.cell_mut(neighbor_ix);
            if !neighbor.is_walkable() || neighbor.closed || candidate_g >= neighbor.g_cost {
                continue;
            }
            let h = target
                .heuristic
                .estimate(neighbor.row(), neighbor.column(), goal_row, goal_column);
            neighbor.g_cost = candidate_g;
            neighbor.h_cost = h;
            neighbor.parent = Some(current_ix);
            self.frontier.push(neighbor_ix, candidate_g + h, h);
            self.stats.pushes += 1;
        }
        Ok(StepOutcome::Expanded(current_ix))
    }

    /// Advances the auto-stepping clock by `delta_time` seconds. Once
    /// [BASE_STEP_INTERVAL] divided by the simulation speed has elapsed, performs a single step.
    pub fn tick(&mut self, delta_time: f32) -> Result<Option<StepOutcome>> {
        let config = self.live_config("tick")?;
        if self.status != SearchStatus::Running || config.simulation_speed <= 0.0 {
            return Ok(None);
        }
        let interval = BASE_STEP_INTERVAL / config.simulation_speed;
        self.accumulated_time += delta_time;
        if self.accumulated_time < interval {
            return Ok(None);
        }
        self.accumulated_time = 0.0;
        self.step().map(Some)
    }

    /// Steps until the search finishes. Every step either closes a cell or drops one of the
    /// finitely many frontier entries, so this terminates.
    pub fn finish(&mut self) -> Result<SearchStatus> {
        while self.grid.is_some() && !self.status.is_terminal() {
            self.step()?;
        }
        Ok(self.status)
    }

    /// Flips a wall on or off and restarts the current run on the edited terrain.
    pub fn toggle_wall(&mut self, row: usize, column: usize) -> Result<Terrain> {
        let current = self
            .grid
            .as_ref()
            .and_then(|grid| grid.terrain(row, column));
        let terrain = match current {
            Some(Terrain::Wall) => Terrain::Open,
            _ => Terrain::Wall,
        };
        self.paint(row, column, terrain)?;
        Ok(terrain)
    }

    /// Sets the terrain of a cell and restarts the current run on the edited terrain. The start
    /// and goal cells cannot be edited.
    pub fn paint(&mut self, row: usize, column: usize, terrain: Terrain) -> Result<()> {
        self.live_config("paint")?;
        let Some(grid) = self.grid.as_mut() else {
            return Err(SearchError::InvalidCoordinates {
                row,
                column,
                rows: 0,
                columns: 0,
            });
        };
        let ix = grid.checked_index(row, column)?;
        if ix == self.target.start || ix == self.target.goal {
            warn!("Refusing to edit ({row}, {column}): it is the start or goal");
            return Err(SearchError::ProtectedCell { row, column });
        }
        grid.set_terrain(row, column, terrain)?;
        self.seed(self.target);
        Ok(())
    }

    /// Whether the goal shares a connected component with the start under the current movement
    /// model. `None` without a grid.
    pub fn goal_reachable(&mut self) -> Option<bool> {
        let target = self.target;
        let grid = self.grid.as_mut()?;
        grid.update(target.heuristic.allows_diagonal_movement());
        Some(grid.reachable(target.start, target.goal))
    }

    /// Cells from `cell` back to the start following parent links. Empty if `cell` has no parent.
    fn trace_back(&self, cell: CellIndex) -> Vec<(usize, usize)> {
        let Some(grid) = self.grid.as_ref() else {
            return Vec::new();
        };
        if grid.cell(cell).and_then(|c| c.parent()).is_none() {
            return Vec::new();
        }
        // Parent links form a tree, the bound only guards against a corrupted grid
        std::iter::successors(Some(cell), |&ix| grid.cell(ix).and_then(|c| c.parent()))
            .take(grid.len())
            .map(|ix| grid.position(ix))
            .collect()
    }

    /// The found path from goal to start, both included. Empty until the goal has been reached,
    /// and also empty when start and goal coincide.
    pub fn path(&self) -> Vec<(usize, usize)> {
        if self.status == SearchStatus::PathFound {
            self.trace_back(self.target.goal)
        } else {
            Vec::new()
        }
    }

    /// Path from the most promising frontier cell back to the start, i.e. the route the search
    /// is currently trying. The found path once the search is over.
    pub fn provisional_path(&self) -> Vec<(usize, usize)> {
        if self.status == SearchStatus::PathFound {
            return self.path();
        }
        self.frontier
            .peek_min()
            .map(|entry| self.trace_back(entry.cell))
            .unwrap_or_default()
    }

    /// Cost of the found path.
    pub fn path_cost(&self) -> Option<Cost> {
        if self.status != SearchStatus::PathFound {
            return None;
        }
        self.grid
            .as_ref()?
            .cell(self.target.goal)
            .map(|goal| goal.g_cost())
    }

    /// Closed cells of the current run, in row-major order.
    pub fn closed_cells(&self) -> Vec<CellIndex> {
        self.grid
            .as_ref()
            .map(|grid| {
                (0..grid.len())
                    .filter(|&ix| grid.cells()[ix].is_closed())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dispatches a control event to the matching operation and returns the resulting status.
    pub fn handle(&mut self, event: ControlEvent) -> Result<SearchStatus> {
        match event {
            ControlEvent::Start => self.start(),
            ControlEvent::Pause => self.pause(),
            ControlEvent::Reset => self.reset(),
            ControlEvent::Rebuild => self.rebuild(),
            ControlEvent::Step => self.step().map(|_| self.status),
            ControlEvent::Tick(delta_time) => self.tick(delta_time).map(|_| self.status),
            ControlEvent::MapConfigurationChanged(config) => self.set_config(config),
        }
    }

    /// Point-in-time copy of everything a renderer needs. `None` while idle.
    pub fn snapshot(&self) -> Option<SearchSnapshot> {
        let grid = self.grid.as_ref()?;
        Some(SearchSnapshot {
            rows: grid.rows(),
            columns: grid.columns(),
            cells: grid.cells().iter().map(CellView::from).collect(),
            frontier: self
                .frontier
                .members()
                .into_iter()
                .map(|ix| grid.position(ix))
                .collect(),
            path: self.path(),
            provisional_path: self.provisional_path(),
            start: grid.position(self.target.start),
            goal: grid.position(self.target.goal),
            heuristic: self.target.heuristic,
            status: self.status,
            stats: self.stats,
        })
    }

    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut TerrainGrid, &mut Frontier<Cost, O>) {
        let grid = self.grid.as_mut().expect("engine has a grid");
        (grid, &mut self.frontier)
    }
}
