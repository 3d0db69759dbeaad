use core::fmt;
use fxhash::FxHashSet;

use super::{SearchStats, SearchStatus};
use crate::heuristic::HeuristicKind;
use crate::terrain_grid::{Cell, Terrain};
use crate::Cost;

/// The parts of a [Cell] a renderer cares about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellView {
    pub row: usize,
    pub column: usize,
    pub terrain: Terrain,
    pub walkable: bool,
    pub closed: bool,
    pub g_cost: Cost,
}

impl From<&Cell> for CellView {
    fn from(cell: &Cell) -> Self {
        CellView {
            row: cell.row(),
            column: cell.column(),
            terrain: cell.terrain(),
            walkable: cell.is_walkable(),
            closed: cell.is_closed(),
            g_cost: cell.g_cost(),
        }
    }
}

/// An owned copy of the engine state at one point in time. Holding on to it never affects the
/// engine, and it stays valid after the engine rebuilds.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSnapshot {
    pub rows: usize,
    pub columns: usize,
    /// Row-major.
    pub cells: Vec<CellView>,
    /// Distinct frontier cells, best first.
    pub frontier: Vec<(usize, usize)>,
    /// Goal to start, empty unless a path was found.
    pub path: Vec<(usize, usize)>,
    pub provisional_path: Vec<(usize, usize)>,
    pub start: (usize, usize),
    pub goal: (usize, usize),
    pub heuristic: HeuristicKind,
    pub status: SearchStatus,
    pub stats: SearchStats,
}

impl SearchSnapshot {
    pub fn cell(&self, row: usize, column: usize) -> Option<&CellView> {
        if row < self.rows && column < self.columns {
            self.cells.get(row * self.columns + column)
        } else {
            None
        }
    }

    pub fn closed_cells(&self) -> impl Iterator<Item = &CellView> {
        self.cells.iter().filter(|cell| cell.closed)
    }
}

/// Draws the grid with the start `S`, goal `G`, path `*`, frontier `o` and closed cells `x` on
/// top of the terrain symbols.
impl fmt::Display for SearchSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let path = if self.path.is_empty() {
            &self.provisional_path
        } else {
            &self.path
        };
        let path: FxHashSet<(usize, usize)> = path.iter().copied().collect();
        let frontier: FxHashSet<(usize, usize)> = self.frontier.iter().copied().collect();
        for row in self.cells.chunks(self.columns) {
            for cell in row {
                let p = (cell.row, cell.column);
                let symbol = if p == self.start {
                    'S'
                } else if p == self.goal {
                    'G'
                } else if path.contains(&p) {
                    '*'
                } else if frontier.contains(&p) {
                    'o'
                } else if cell.closed {
                    'x'
                } else {
                    cell.terrain.symbol()
                };
                write!(f, "{symbol}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{:?} ({} heuristic)", self.status, self.heuristic)
    }
}
