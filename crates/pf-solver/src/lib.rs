//! Explicit adaptive ODE integration over a narrow system capability.
//!
//! Provides:
//! - The [`OdeSystem`] trait: `state_size()` plus `rhs(t, y, ydot) -> status`
//! - An embedded Cash–Karp 4(5) stepper with weighted-RMS error control,
//!   per-component absolute tolerances, and single-step advance
//! - Cubic-Hermite dense output over the last accepted step
//!
//! The right-hand side never panics or errors out of a trial evaluation;
//! it reports a recoverable failure and the stepper retries with a smaller
//! step. Only repeated failure surfaces as a solver error.

pub mod config;
pub mod error;
pub mod solver;
pub mod system;

pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use solver::{OdeSolver, SolverStats};
pub use system::{OdeSystem, RhsStatus};
