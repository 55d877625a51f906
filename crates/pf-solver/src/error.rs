//! Error types for ODE integration.

use thiserror::Error;

/// Errors encountered while advancing an ODE system.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Solver not initialized")]
    NotInitialized,

    #[error("Size mismatch: {what} has length {len}, expected {expected}")]
    SizeMismatch {
        what: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("Invalid solver configuration: {what}")]
    InvalidConfig { what: &'static str },

    #[error("Step size underflow at t = {t} (h = {h})")]
    StepSizeUnderflow { t: f64, h: f64 },

    #[error("Right-hand side kept failing near t = {t}")]
    RhsFailure { t: f64 },

    #[error("Exceeded {max_steps} steps at t = {t}")]
    MaxSteps { t: f64, max_steps: usize },
}

pub type SolverResult<T> = Result<T, SolverError>;
