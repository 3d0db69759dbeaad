use core::fmt;
use core::mem;
use itertools::{iproduct, Itertools};
use log::info;
use petgraph::unionfind::UnionFind;
use rand::Rng;
use smallvec::SmallVec;

use crate::config::TerrainWeights;
use crate::error::{Result, SearchError};
use crate::{Cost, DIAGONAL_COST, IMPASSABLE_COST, N_SMALLVEC_SIZE, ORTHOGONAL_COST};

/// Row-major position of a cell in its [TerrainGrid]. Only valid until the next rebuild.
pub type CellIndex = usize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terrain {
    #[default]
    Open,
    Wall,
    Water,
    Sand,
    Forest,
}

impl Terrain {
    pub const ALL: [Terrain; 5] = [
        Terrain::Open,
        Terrain::Wall,
        Terrain::Water,
        Terrain::Sand,
        Terrain::Forest,
    ];

    pub fn is_walkable(self) -> bool {
        self != Terrain::Wall
    }

    pub fn cost(self) -> Cost {
        terrain_cost(self)
    }

    /// Character used by [TerrainGrid::from_layout] and the [Display](fmt::Display) impl.
    pub fn symbol(self) -> char {
        match self {
            Terrain::Open => '.',
            Terrain::Wall => '#',
            Terrain::Water => '~',
            Terrain::Sand => ':',
            Terrain::Forest => 'T',
        }
    }

    /// Inverse of [symbol](Self::symbol). The start and goal markers `S` and `G` read as open.
    pub fn from_symbol(symbol: char) -> Option<Terrain> {
        match symbol {
            '.' | 'S' | 'G' => Some(Terrain::Open),
            '#' => Some(Terrain::Wall),
            '~' => Some(Terrain::Water),
            ':' => Some(Terrain::Sand),
            'T' => Some(Terrain::Forest),
            _ => None,
        }
    }
}

/// Cost of entering a cell of the given terrain with an orthogonal step. Never below
/// [ORTHOGONAL_COST], so the heuristics stay admissible.
pub fn terrain_cost(terrain: Terrain) -> Cost {
    match terrain {
        Terrain::Open => ORTHOGONAL_COST,
        Terrain::Sand => 1.5,
        Terrain::Forest => 2.0,
        Terrain::Water => 3.0,
        Terrain::Wall => IMPASSABLE_COST,
    }
}

/// A single grid position with its terrain and the search bookkeeping of the current run.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    row: usize,
    column: usize,
    pub(crate) terrain: Terrain,
    pub(crate) g_cost: Cost,
    pub(crate) h_cost: Cost,
    pub(crate) closed: bool,
    pub(crate) parent: Option<CellIndex>,
}

impl Cell {
    fn new(row: usize, column: usize, terrain: Terrain) -> Cell {
        Cell {
            row,
            column,
            terrain,
            g_cost: Cost::INFINITY,
            h_cost: 0.0,
            closed: false,
            parent: None,
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }
    pub fn column(&self) -> usize {
        self.column
    }
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.column)
    }
    pub fn terrain(&self) -> Terrain {
        self.terrain
    }
    pub fn g_cost(&self) -> Cost {
        self.g_cost
    }
    pub fn h_cost(&self) -> Cost {
        self.h_cost
    }
    pub fn f_cost(&self) -> Cost {
        self.g_cost + self.h_cost
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }
    pub fn parent(&self) -> Option<CellIndex> {
        self.parent
    }
    pub fn is_walkable(&self) -> bool {
        self.terrain.is_walkable()
    }

    /// Forgets everything the last search learned about this cell.
    pub(crate) fn reset(&mut self) {
        self.g_cost = Cost::INFINITY;
        self.h_cost = 0.0;
        self.closed = false;
        self.parent = None;
    }
}

/// [TerrainGrid] stores the cells of the map in a fixed-size row-major table, so that cells can
/// refer to each other by [CellIndex]. In addition it maintains connected components of the
/// walkable cells in a [UnionFind] structure, for a quick check whether a goal can be reached
/// at all.
#[derive(Clone, Debug)]
pub struct TerrainGrid {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
    pub components: UnionFind<usize>,
    pub components_dirty: bool,
    components_diagonal: bool,
}

impl TerrainGrid {
    /// A grid in which every cell has the same terrain.
    pub fn new(rows: usize, columns: usize, terrain: Terrain) -> Result<TerrainGrid> {
        // The cell table has to fit in a single allocation
        let len = rows
            .checked_mul(columns)
            .filter(|&len| len > 0)
            .filter(|&len| {
                len.checked_mul(mem::size_of::<Cell>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or(SearchError::InvalidDimensions { rows, columns })?;
        let mut cells = Vec::with_capacity(len);
        cells.extend(
            iproduct!(0..rows, 0..columns).map(|(row, column)| Cell::new(row, column, terrain)),
        );
        Ok(TerrainGrid {
            rows,
            columns,
            cells,
            components: UnionFind::new(len),
            components_dirty: true,
            components_diagonal: true,
        })
    }

    /// Draws every cell from `weights`, except `start` and `end` which are always open.
    pub fn generate<R: Rng + ?Sized>(
        rows: usize,
        columns: usize,
        start: (usize, usize),
        end: (usize, usize),
        weights: &TerrainWeights,
        rng: &mut R,
    ) -> Result<TerrainGrid> {
        let mut grid = TerrainGrid::new(rows, columns, Terrain::Open)?;
        let start_ix = grid.checked_index(start.0, start.1)?;
        let end_ix = grid.checked_index(end.0, end.1)?;
        for (ix, cell) in grid.cells.iter_mut().enumerate() {
            cell.terrain = if ix == start_ix || ix == end_ix {
                Terrain::Open
            } else {
                weights.sample(rng)
            };
        }
        info!(
            "Generated {}x{} grid with {} walls",
            rows,
            columns,
            grid.cells.iter().filter(|c| !c.is_walkable()).count()
        );
        Ok(grid)
    }

    /// Parses one line of terrain symbols per row. Blank lines and surrounding whitespace are
    /// ignored.
    pub fn from_layout(layout: &str) -> Result<TerrainGrid> {
        let lines = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        let rows = lines.len();
        let columns = lines.first().map_or(0, |line| line.chars().count());
        if lines.iter().any(|line| line.chars().count() != columns) {
            return Err(SearchError::InvalidDimensions { rows, columns });
        }
        let mut grid = TerrainGrid::new(rows, columns, Terrain::Open)?;
        for (row, line) in lines.iter().enumerate() {
            for (column, character) in line.chars().enumerate() {
                let terrain =
                    Terrain::from_symbol(character).ok_or(SearchError::InvalidLayout {
                        character,
                        row,
                        column,
                    })?;
                grid.cells[row * columns + column].terrain = terrain;
            }
        }
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn in_bounds(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns
    }

    pub fn index(&self, row: usize, column: usize) -> Option<CellIndex> {
        self.in_bounds(row, column).then_some(row * self.columns + column)
    }

    pub fn checked_index(&self, row: usize, column: usize) -> Result<CellIndex> {
        self.index(row, column).ok_or(SearchError::InvalidCoordinates {
            row,
            column,
            rows: self.rows,
            columns: self.columns,
        })
    }

    pub fn position(&self, ix: CellIndex) -> (usize, usize) {
        (ix / self.columns, ix % self.columns)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, ix: CellIndex) -> Option<&Cell> {
        self.cells.get(ix)
    }

    pub fn cell_at(&self, row: usize, column: usize) -> Option<&Cell> {
        self.index(row, column).map(|ix| &self.cells[ix])
    }

    pub(crate) fn cell_mut(&mut self, ix: CellIndex) -> &mut Cell {
        &mut self.cells[ix]
    }

    pub fn terrain(&self, row: usize, column: usize) -> Option<Terrain> {
        self.cell_at(row, column).map(Cell::terrain)
    }

    pub fn is_walkable(&self, row: usize, column: usize) -> bool {
        self.cell_at(row, column).is_some_and(Cell::is_walkable)
    }

    /// Flips a cell between [Terrain::Wall] and [Terrain::Open] and returns the new terrain.
    pub fn toggle_wall(&mut self, row: usize, column: usize) -> Result<Terrain> {
        let terrain = match self.terrain(row, column) {
            Some(Terrain::Wall) => Terrain::Open,
            _ => Terrain::Wall,
        };
        self.set_terrain(row, column, terrain)?;
        Ok(terrain)
    }

    /// Updates a position on the grid. Joins newly connected components and flags the components
    /// as dirty if components are (potentially) broken apart into multiple.
    pub fn set_terrain(&mut self, row: usize, column: usize, terrain: Terrain) -> Result<()> {
        let ix = self.checked_index(row, column)?;
        let was_walkable = self.cells[ix].is_walkable();
        self.cells[ix].terrain = terrain;
        if was_walkable && !terrain.is_walkable() {
            self.components_dirty = true;
        } else if !was_walkable && terrain.is_walkable() {
            for n in self.neighbors(row, column, self.components_diagonal) {
                if self.cells[n].is_walkable() {
                    self.components.union(ix, n);
                }
            }
        }
        Ok(())
    }

    /// Clears the search bookkeeping of every cell while keeping the terrain.
    pub fn reset_search(&mut self) {
        self.cells.iter_mut().for_each(Cell::reset);
    }

    /// In-bounds neighbours, orthogonal ones first (up, down, left, right), then the diagonals.
    /// Orthogonal neighbours are returned even when blocked. A diagonal neighbour is only
    /// returned if both orthogonal cells next to it are walkable, so paths never cut corners.
    pub fn neighbors(
        &self,
        row: usize,
        column: usize,
        allow_diagonals: bool,
    ) -> SmallVec<[CellIndex; N_SMALLVEC_SIZE]> {
        let mut neighbors = SmallVec::new();
        if !self.in_bounds(row, column) {
            return neighbors;
        }
        let up = row.checked_sub(1);
        let down = (row + 1 < self.rows).then_some(row + 1);
        let left = column.checked_sub(1);
        let right = (column + 1 < self.columns).then_some(column + 1);

        let orthogonal = [
            up.map(|r| (r, column)),
            down.map(|r| (r, column)),
            left.map(|c| (row, c)),
            right.map(|c| (row, c)),
        ];
        let [can_up, can_down, can_left, can_right] =
            orthogonal.map(|p| p.is_some_and(|(r, c)| self.is_walkable(r, c)));
        neighbors.extend(
            orthogonal
                .into_iter()
                .flatten()
                .map(|(r, c)| r * self.columns + c),
        );

        if allow_diagonals {
            let diagonal = [
                (can_up && can_left, up, left),
                (can_up && can_right, up, right),
                (can_down && can_left, down, left),
                (can_down && can_right, down, right),
            ];
            for (open, r, c) in diagonal {
                if let (true, Some(r), Some(c)) = (open, r, c) {
                    neighbors.push(r * self.columns + c);
                }
            }
        }
        neighbors
    }

    pub fn is_diagonal(&self, from: CellIndex, to: CellIndex) -> bool {
        let (from_row, from_column) = self.position(from);
        let (to_row, to_column) = self.position(to);
        from_row != to_row && from_column != to_column
    }

    /// Cost of stepping from `from` onto the neighbouring cell `to`. Diagonal steps cost the
    /// terrain cost times [DIAGONAL_COST] rather than the bare terrain cost of the target cell.
    /// Charging a diagonal like a straight move would make a diagonal cheaper than the Euclidean
    /// and octile estimates of it, so those heuristics would overestimate and the search could
    /// return a longer path than the optimum.
    pub fn step_cost(&self, from: CellIndex, to: CellIndex) -> Cost {
        let cost = terrain_cost(self.cells[to].terrain);
        if self.is_diagonal(from, to) {
            cost * DIAGONAL_COST
        } else {
            cost
        }
    }

    /// Generates a new [UnionFind] structure and links up walkable neighbours under the given
    /// movement model.
    pub fn generate_components(&mut self, allow_diagonals: bool) {
        self.components = UnionFind::new(self.cells.len());
        self.components_dirty = false;
        self.components_diagonal = allow_diagonals;
        for ix in 0..self.cells.len() {
            if !self.cells[ix].is_walkable() {
                continue;
            }
            let (row, column) = self.position(ix);
            for n in self.neighbors(row, column, allow_diagonals) {
                if n > ix && self.cells[n].is_walkable() {
                    self.components.union(ix, n);
                }
            }
        }
    }

    /// Regenerates the components if they are dirty or were built for the other movement model.
    pub fn update(&mut self, allow_diagonals: bool) {
        if self.components_dirty || self.components_diagonal != allow_diagonals {
            info!("Components are stale: regenerating components");
            self.generate_components(allow_diagonals);
        }
    }

    /// Checks if the two cells are on the same component. Call [update](Self::update) first.
    pub fn reachable(&self, a: CellIndex, b: CellIndex) -> bool {
        a < self.cells.len() && b < self.cells.len() && self.components.equiv(a, b)
    }

    pub fn unreachable(&self, a: CellIndex, b: CellIndex) -> bool {
        !self.reachable(a, b)
    }
}

impl fmt::Display for TerrainGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.cells.chunks(self.columns) {
            writeln!(f, "{}", row.iter().map(|c| c.terrain.symbol()).join(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn positions(grid: &TerrainGrid, cells: &[CellIndex]) -> Vec<(usize, usize)> {
        cells.iter().map(|&ix| grid.position(ix)).collect()
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert_eq!(
            TerrainGrid::new(0, 4, Terrain::Open).unwrap_err(),
            SearchError::InvalidDimensions { rows: 0, columns: 4 }
        );
        let mut rng = StdRng::seed_from_u64(0);
        let weights = TerrainWeights::default();
        assert!(TerrainGrid::generate(3, 0, (0, 0), (0, 0), &weights, &mut rng).is_err());
    }

    #[test]
    fn rejects_dimensions_that_do_not_fit_in_memory() {
        let rows = usize::MAX / 2;
        assert_eq!(
            TerrainGrid::new(rows, 3, Terrain::Open).unwrap_err(),
            SearchError::InvalidDimensions { rows, columns: 3 }
        );
        // No overflow in the product, but too many bytes
        let rows = usize::MAX / 4;
        assert_eq!(
            TerrainGrid::new(rows, 2, Terrain::Wall).unwrap_err(),
            SearchError::InvalidDimensions { rows, columns: 2 }
        );
    }

    #[test]
    fn generation_keeps_endpoints_open() {
        let mut rng = StdRng::seed_from_u64(3);
        let weights = TerrainWeights::walls_only(1.0);
        let grid = TerrainGrid::generate(4, 5, (1, 1), (3, 4), &weights, &mut rng).unwrap();
        for (row, column) in iproduct!(0..4, 0..5) {
            let expected = (row, column) == (1, 1) || (row, column) == (3, 4);
            assert_eq!(grid.is_walkable(row, column), expected);
        }
        assert_eq!(
            TerrainGrid::generate(4, 5, (0, 0), (4, 0), &weights, &mut rng).unwrap_err(),
            SearchError::InvalidCoordinates {
                row: 4,
                column: 0,
                rows: 4,
                columns: 5
            }
        );
    }

    #[test]
    fn generation_is_reproducible_with_a_seed() {
        let weights = TerrainWeights::mixed(0.3);
        let generate = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            TerrainGrid::generate(8, 8, (0, 0), (7, 7), &weights, &mut rng).unwrap()
        };
        assert_eq!(generate(9).to_string(), generate(9).to_string());
    }

    #[test]
    fn layout_round_trips_through_display() {
        let layout = "\
            S.#~\n\
            :T.G\n";
        let grid = TerrainGrid::from_layout(layout).unwrap();
        assert_eq!((grid.rows(), grid.columns()), (2, 4));
        assert_eq!(grid.terrain(0, 3), Some(Terrain::Water));
        assert_eq!(grid.terrain(1, 1), Some(Terrain::Forest));
        assert_eq!(grid.to_string(), "..#~\n:T..\n");
    }

    #[test]
    fn layout_errors() {
        assert_eq!(
            TerrainGrid::from_layout("..\n...").unwrap_err(),
            SearchError::InvalidDimensions { rows: 2, columns: 2 }
        );
        assert_eq!(
            TerrainGrid::from_layout("..\n.x").unwrap_err(),
            SearchError::InvalidLayout {
                character: 'x',
                row: 1,
                column: 1
            }
        );
        assert!(TerrainGrid::from_layout("\n  \n").is_err());
    }

    #[test]
    fn costs() {
        assert_eq!(terrain_cost(Terrain::Open), 1.0);
        assert!(terrain_cost(Terrain::Wall).is_infinite());
        for terrain in Terrain::ALL.into_iter().filter(|t| t.is_walkable()) {
            assert!(terrain.cost() >= ORTHOGONAL_COST);
        }
        let grid = TerrainGrid::from_layout("..\n.~").unwrap();
        assert_eq!(grid.step_cost(0, 1), 1.0);
        assert_eq!(grid.step_cost(1, 3), 3.0);
        assert!((grid.step_cost(0, 3) - 3.0 * DIAGONAL_COST).abs() < 1e-6);
    }

    #[test]
    fn toggling_flips_walls() {
        let mut grid = TerrainGrid::from_layout("~.\n..").unwrap();
        assert_eq!(grid.toggle_wall(0, 0), Ok(Terrain::Wall));
        assert!(!grid.is_walkable(0, 0));
        assert_eq!(grid.toggle_wall(0, 0), Ok(Terrain::Open));
        assert!(grid.is_walkable(0, 0));
        assert!(grid.toggle_wall(2, 0).is_err());
        assert!(!grid.is_walkable(2, 0));
    }

    #[test]
    fn orthogonal_neighbours_include_walls() {
        // .#.
        // ...
        let grid = TerrainGrid::from_layout(".#.\n...").unwrap();
        let n = grid.neighbors(1, 1, false);
        assert_eq!(positions(&grid, &n), vec![(0, 1), (1, 0), (1, 2)]);
        let corner = grid.neighbors(0, 0, false);
        assert_eq!(positions(&grid, &corner), vec![(1, 0), (0, 1)]);
    }

    #[test]
    fn diagonals_do_not_cut_corners() {
        // .#.
        // ...
        // ...
        let grid = TerrainGrid::from_layout(".#.\n...\n...").unwrap();
        let n = grid.neighbors(0, 0, true);
        assert_eq!(positions(&grid, &n), vec![(1, 0), (0, 1)]);
        // A blocked diagonal cell is still returned when both orthogonals are open
        let grid = TerrainGrid::from_layout("...\n.#.\n...").unwrap();
        let n = grid.neighbors(0, 0, true);
        assert_eq!(positions(&grid, &n), vec![(1, 0), (0, 1), (1, 1)]);
        let open = TerrainGrid::from_layout("...\n...\n...").unwrap();
        let n = open.neighbors(1, 1, true);
        assert_eq!(
            positions(&open, &n),
            vec![
                (0, 1),
                (2, 1),
                (1, 0),
                (1, 2),
                (0, 0),
                (0, 2),
                (2, 0),
                (2, 2)
            ]
        );
        assert!(open.neighbors(3, 0, true).is_empty());
    }

    /// Tests whether points are correctly mapped to different connected components
    #[test]
    fn test_component_generation() {
        // .#.
        // .#.
        let mut grid = TerrainGrid::from_layout(".#.\n.#.").unwrap();
        grid.generate_components(true);
        assert!(grid.reachable(0, 3));
        assert!(grid.unreachable(0, 2));
        assert!(grid.unreachable(0, 1));
    }

    // Tests whether allowing diagonals has the expected effect on diagonal reachability in a minimal setting.
    #[test]
    fn test_diagonal_switch_reachable() {
        // .#
        // #.
        let mut grid = TerrainGrid::from_layout(".#\n#.").unwrap();
        grid.update(false);
        assert!(grid.unreachable(0, 3));
        grid.update(true);
        // Corner cutting is not allowed, so the diagonal does not connect them either
        assert!(grid.unreachable(0, 3));
    }

    #[test]
    fn editing_keeps_components_consistent() {
        // ...
        // ###
        // ...
        let mut grid = TerrainGrid::from_layout("...\n###\n...").unwrap();
        grid.update(true);
        assert!(grid.unreachable(0, 8));
        grid.set_terrain(1, 1, Terrain::Sand).unwrap();
        assert!(!grid.components_dirty);
        assert!(grid.reachable(0, 8));
        grid.toggle_wall(1, 1).unwrap();
        assert!(grid.components_dirty);
        grid.update(true);
        assert!(grid.unreachable(0, 8));
    }
}
