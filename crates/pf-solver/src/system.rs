//! The ODE system capability the integrator is generic over.

use nalgebra::DVector;

/// Outcome of a right-hand-side evaluation.
///
/// A recoverable failure (non-finite intermediate, trial state outside the
/// physical domain) tells the stepper to cut the step and retry; it is not an
/// error by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhsStatus {
    Ok,
    RecoverableFailure,
}

/// An ODE system `ydot = f(t, y)`.
///
/// `rhs` takes `&mut self` so systems can keep scratch arrays and cache
/// derived quantities (density, velocity) from the last evaluation.
pub trait OdeSystem {
    /// Length of the packed state vector.
    fn state_size(&self) -> usize;

    /// Evaluate `ydot = f(t, y)`. Must write all of `ydot`.
    fn rhs(&mut self, t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> RhsStatus;
}
