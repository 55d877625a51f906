//! One-dimensional flame-normal grid with geometric coefficients.
//!
//! The grid is owned by the outer driver and shared read-only with every
//! sub-system of a split step. All derived coefficients (cell widths, radial
//! metric, finite-difference weights) are computed once at construction; a
//! regrid builds a new grid.

pub mod error;
pub mod grid;

pub use error::{GridError, GridResult};
pub use grid::{Geometry, OneDimGrid};
