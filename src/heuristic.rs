use core::fmt;
use std::str::FromStr;

use crate::error::SearchError;
use crate::DIAGONAL_COST;

/// The estimate used to order the frontier. The kind also selects the movement model: every
/// kind except [Manhattan](HeuristicKind::Manhattan) allows diagonal moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "HeuristicRepr")
)]
pub enum HeuristicKind {
    /// Always zero, which turns the search into Dijkstra's algorithm.
    #[default]
    None,
    Manhattan,
    Euclidean,
    Octile,
}

impl HeuristicKind {
    pub const ALL: [HeuristicKind; 4] = [
        HeuristicKind::None,
        HeuristicKind::Manhattan,
        HeuristicKind::Euclidean,
        HeuristicKind::Octile,
    ];

    /// Estimated remaining cost from `(row_a, col_a)` to `(row_b, col_b)`.
    pub fn estimate(self, row_a: usize, col_a: usize, row_b: usize, col_b: usize) -> f32 {
        let delta_row = row_a.abs_diff(row_b) as f32;
        let delta_col = col_a.abs_diff(col_b) as f32;
        match self {
            HeuristicKind::None => 0.0,
            HeuristicKind::Manhattan => delta_row + delta_col,
            HeuristicKind::Euclidean => (delta_row * delta_row + delta_col * delta_col).sqrt(),
            // Take as many diagonal steps as possible, then go straight
            HeuristicKind::Octile => {
                delta_row.min(delta_col) * DIAGONAL_COST + (delta_row - delta_col).abs()
            }
        }
    }

    /// Manhattan distance only makes sense on a 4-grid, so it restricts movement to the four
    /// cardinal directions.
    pub fn allows_diagonal_movement(self) -> bool {
        self != HeuristicKind::Manhattan
    }

    pub fn name(self) -> &'static str {
        match self {
            HeuristicKind::None => "None",
            HeuristicKind::Manhattan => "Manhattan",
            HeuristicKind::Euclidean => "Euclidean",
            HeuristicKind::Octile => "Octile",
        }
    }
}

/// Free-function form of [HeuristicKind::estimate].
pub fn heuristic(
    row_a: usize,
    col_a: usize,
    row_b: usize,
    col_b: usize,
    kind: HeuristicKind,
) -> f32 {
    kind.estimate(row_a, col_a, row_b, col_b)
}

/// Map files store the heuristic either by name or by its position in [HeuristicKind::ALL].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HeuristicRepr {
    Index(u64),
    Name(String),
}

#[cfg(feature = "serde")]
impl TryFrom<HeuristicRepr> for HeuristicKind {
    type Error = SearchError;

    fn try_from(repr: HeuristicRepr) -> Result<Self, Self::Error> {
        match repr {
            HeuristicRepr::Index(index) => usize::try_from(index)
                .ok()
                .and_then(|index| HeuristicKind::ALL.get(index).copied())
                .ok_or_else(|| SearchError::UnknownHeuristic(index.to_string())),
            HeuristicRepr::Name(name) => name.parse(),
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeuristicKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HeuristicKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SearchError::UnknownHeuristic(s.to_owned()))
    }
}
