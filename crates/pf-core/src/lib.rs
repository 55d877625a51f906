//! Shared numeric primitives for the pyroflow workspace.
//!
//! Provides:
//! - Finiteness checks for scalar and nodal inputs
//! - Physical constants used across the flame solver
//! - Canonical SI unit aliases for API-boundary quantities
//! - Base error type

pub mod constants;
pub mod error;
pub mod numeric;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use numeric::{Real, ensure_all_finite, ensure_finite};
