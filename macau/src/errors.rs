use std::fmt;

use thiserror::Error;

/// One of the two axes of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Column => write!(f, "column"),
        }
    }
}

/// Everything that can abort a sampling run.
#[derive(Error, Debug)]
pub enum MacauError {
    #[error("only 2 sides supported, but {found} priors were registered")]
    PriorCount { found: usize },

    #[error("{axis} index {index} is out of bounds for extent {extent}")]
    InvalidDimension {
        axis: Axis,
        index: usize,
        extent: usize,
    },

    #[error("triplet arrays have mismatched lengths: {rows} rows, {cols} cols, {values} values")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        values: usize,
    },

    #[error("entry ({row}, {col}) appears more than once")]
    DuplicateEntry { row: usize, col: usize },

    #[error("relation has no observed entries; mean rating is undefined")]
    EmptyRelation,

    #[error("relation data was not set before initialization")]
    MissingRelation,

    #[error("test relation has shape {found:?}, but the train relation has shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("prior for side {side} has {what} = {found}, expected {expected}")]
    PriorShape {
        side: usize,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("numerical failure: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, MacauError>;
