//! Integrator configuration.

use crate::error::{SolverError, SolverResult};
use nalgebra::DVector;

/// Tolerances and step-size limits for an [`crate::OdeSolver`].
///
/// The absolute tolerance is per component, so packed multi-variable systems
/// can weight each block differently.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Relative tolerance shared by every component.
    pub reltol: f64,
    /// Per-component absolute tolerances.
    pub abstol: DVector<f64>,
    /// Initial step size; `0.0` selects one automatically from the initial
    /// derivative.
    pub h0: f64,
    /// Smallest step size before the solver gives up.
    pub hmin: f64,
    /// Largest step size.
    pub hmax: f64,
    /// Step budget for a single `integrate_to` call.
    pub max_steps: usize,
    /// Consecutive recoverable RHS failures tolerated within one step attempt.
    pub max_rhs_retries: usize,
}

impl SolverConfig {
    /// Uniform absolute tolerance across `n` components.
    pub fn uniform(n: usize, reltol: f64, abstol: f64) -> Self {
        Self::with_abstol(reltol, DVector::from_element(n, abstol))
    }

    /// Per-component absolute tolerances.
    pub fn with_abstol(reltol: f64, abstol: DVector<f64>) -> Self {
        Self {
            reltol,
            abstol,
            h0: 0.0,
            hmin: 1e-15,
            hmax: f64::INFINITY,
            max_steps: 100_000,
            max_rhs_retries: 10,
        }
    }

    /// Check internal consistency against a state size.
    pub fn validate(&self, state_size: usize) -> SolverResult<()> {
        if self.abstol.len() != state_size {
            return Err(SolverError::SizeMismatch {
                what: "abstol",
                len: self.abstol.len(),
                expected: state_size,
            });
        }
        if !(self.reltol > 0.0 && self.reltol.is_finite()) {
            return Err(SolverError::InvalidConfig {
                what: "reltol must be positive and finite",
            });
        }
        if self.abstol.iter().any(|&a| !(a >= 0.0) || a.is_nan()) {
            return Err(SolverError::InvalidConfig {
                what: "abstol entries must be non-negative",
            });
        }
        if !(self.hmin > 0.0) || self.hmax <= self.hmin {
            return Err(SolverError::InvalidConfig {
                what: "step size limits must satisfy 0 < hmin < hmax",
            });
        }
        if self.max_steps == 0 {
            return Err(SolverError::InvalidConfig {
                what: "max_steps must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_fills_every_component() {
        let cfg = SolverConfig::uniform(4, 1e-8, 1e-10);
        assert_eq!(cfg.abstol.len(), 4);
        assert!(cfg.validate(4).is_ok());
        assert!(cfg.validate(5).is_err());
    }

    #[test]
    fn validate_rejects_bad_tolerances() {
        let mut cfg = SolverConfig::uniform(2, 1e-8, 1e-10);
        cfg.reltol = 0.0;
        assert!(cfg.validate(2).is_err());

        let mut cfg = SolverConfig::uniform(2, 1e-8, 1e-10);
        cfg.abstol[1] = -1.0;
        assert!(cfg.validate(2).is_err());

        let mut cfg = SolverConfig::uniform(2, 1e-8, 1e-10);
        cfg.hmin = 0.0;
        assert!(cfg.validate(2).is_err());
    }
}
