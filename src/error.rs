use thiserror::Error;

/// Everything that can go wrong while building a grid or driving a search. All variants are
/// recoverable: the engine leaves its state untouched when it returns one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("grid dimensions {rows}x{columns} are empty or too large")]
    InvalidDimensions { rows: usize, columns: usize },
    #[error("cell ({row}, {column}) lies outside the {rows}x{columns} grid")]
    InvalidCoordinates {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    #[error("the frontier is empty")]
    EmptyFrontier,
    #[error("the map configuration is no longer available")]
    ConfigurationUnavailable,
    #[error("cell ({row}, {column}) is the start or goal and cannot be edited")]
    ProtectedCell { row: usize, column: usize },
    #[error("unexpected character {character:?} at row {row}, column {column} of the layout")]
    InvalidLayout {
        character: char,
        row: usize,
        column: usize,
    },
    #[error("unknown heuristic {0:?}")]
    UnknownHeuristic(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
