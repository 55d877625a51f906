//! Error types for the convection split.

use pf_core::CoreError;
use pf_solver::SolverError;
use pf_thermo::ThermoError;
use thiserror::Error;

/// Errors surfaced by the convection coordinator and its sub-systems.
#[derive(Error, Debug)]
pub enum ConvectionError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Size mismatch: {what} has length {len}, expected {expected}")]
    SizeMismatch {
        what: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("Species {species} domain [{start}, {stop}] invalid for {len} nodes")]
    SpeciesDomain {
        species: usize,
        start: usize,
        stop: usize,
        len: usize,
    },

    #[error("Non-physical state: {what} at node {node}")]
    NonPhysical { what: &'static str, node: usize },

    #[error("Boundary condition update rejected: {what}")]
    BoundaryCondition { what: &'static str },

    #[error("State evaluation failed: {what}")]
    Evaluation { what: &'static str },

    #[error("Velocity field: {what}")]
    VelocityField { what: &'static str },

    #[error("Numeric check failed: {0}")]
    Numeric(#[from] CoreError),

    #[error("ODE solver failed: {0}")]
    Solver(#[from] SolverError),

    #[error("Mixture properties: {0}")]
    Thermo(#[from] ThermoError),
}

pub type ConvectionResult<T> = Result<T, ConvectionError>;
