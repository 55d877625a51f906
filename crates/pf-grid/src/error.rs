//! Error types for grid construction.

use thiserror::Error;

/// Errors encountered while building a grid.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Grid needs at least {min} nodes, got {len}")]
    TooFewPoints { len: usize, min: usize },

    #[error("Grid coordinate at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("Grid coordinates must be strictly increasing (violated at index {index})")]
    NotMonotone { index: usize },

    #[error("Cylindrical grid requires non-negative coordinates (x[0] = {x0})")]
    NegativeRadius { x0: f64 },
}

pub type GridResult<T> = Result<T, GridError>;
