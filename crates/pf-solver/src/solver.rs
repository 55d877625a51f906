//! Embedded Cash–Karp 4(5) stepper with weighted-RMS error control.

use crate::config::SolverConfig;
use crate::error::{SolverError, SolverResult};
use crate::system::{OdeSystem, RhsStatus};
use nalgebra::DVector;
use tracing::{debug, trace};

// Cash–Karp tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 3.0 / 5.0;
const C5: f64 = 1.0;
const C6: f64 = 7.0 / 8.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 3.0 / 10.0;
const A42: f64 = -9.0 / 10.0;
const A43: f64 = 6.0 / 5.0;
const A51: f64 = -11.0 / 54.0;
const A52: f64 = 5.0 / 2.0;
const A53: f64 = -70.0 / 27.0;
const A54: f64 = 35.0 / 27.0;
const A61: f64 = 1631.0 / 55296.0;
const A62: f64 = 175.0 / 512.0;
const A63: f64 = 575.0 / 13824.0;
const A64: f64 = 44275.0 / 110592.0;
const A65: f64 = 253.0 / 4096.0;

// Fifth-order solution weights.
const B1: f64 = 37.0 / 378.0;
const B3: f64 = 250.0 / 621.0;
const B4: f64 = 125.0 / 594.0;
const B6: f64 = 512.0 / 1771.0;

// Difference against the embedded fourth-order solution.
const D1: f64 = B1 - 2825.0 / 27648.0;
const D3: f64 = B3 - 18575.0 / 48384.0;
const D4: f64 = B4 - 13525.0 / 55296.0;
const D5: f64 = -277.0 / 14336.0;
const D6: f64 = B6 - 1.0 / 4.0;

// Step controller.
const SAFETY: f64 = 0.9;
const MAX_GROWTH: f64 = 5.0;
const MIN_SHRINK: f64 = 0.1;
const RHS_FAILURE_SHRINK: f64 = 0.25;

/// Work counters for one solver instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolverStats {
    /// Accepted steps.
    pub steps: u64,
    /// Steps rejected by the error test.
    pub rejected: u64,
    /// Right-hand-side evaluations.
    pub rhs_evals: u64,
}

/// Adaptive explicit integrator owning its [`OdeSystem`].
///
/// Advances one accepted step at a time so a caller can observe the system
/// after every step (the split coordinator samples the velocity field this
/// way). Keeps the previous accepted point for cubic-Hermite dense output.
pub struct OdeSolver<S: OdeSystem> {
    system: S,
    config: SolverConfig,
    initialized: bool,
    t: f64,
    y: DVector<f64>,
    ydot: DVector<f64>,
    t_prev: f64,
    y_prev: DVector<f64>,
    ydot_prev: DVector<f64>,
    /// Proposed size for the next step.
    h: f64,
    stats: SolverStats,
    // Stage and trial-state scratch.
    k2: DVector<f64>,
    k3: DVector<f64>,
    k4: DVector<f64>,
    k5: DVector<f64>,
    k6: DVector<f64>,
    ytmp: DVector<f64>,
    ynew: DVector<f64>,
    ydot_new: DVector<f64>,
    yerr: DVector<f64>,
}

impl<S: OdeSystem> OdeSolver<S> {
    pub fn new(system: S, config: SolverConfig) -> Self {
        let n = system.state_size();
        Self {
            system,
            config,
            initialized: false,
            t: 0.0,
            y: DVector::zeros(n),
            ydot: DVector::zeros(n),
            t_prev: 0.0,
            y_prev: DVector::zeros(n),
            ydot_prev: DVector::zeros(n),
            h: 0.0,
            stats: SolverStats::default(),
            k2: DVector::zeros(n),
            k3: DVector::zeros(n),
            k4: DVector::zeros(n),
            k5: DVector::zeros(n),
            k6: DVector::zeros(n),
            ytmp: DVector::zeros(n),
            ynew: DVector::zeros(n),
            ydot_new: DVector::zeros(n),
            yerr: DVector::zeros(n),
        }
    }

    /// (Re)start the integration at `(t0, y0)`.
    ///
    /// Evaluates the RHS once; the initial state must be evaluable.
    pub fn initialize(&mut self, t0: f64, y0: DVector<f64>) -> SolverResult<()> {
        let n = self.system.state_size();
        if y0.len() != n {
            return Err(SolverError::SizeMismatch {
                what: "initial state",
                len: y0.len(),
                expected: n,
            });
        }
        self.config.validate(n)?;

        // The system's size may have changed since the last initialization
        // (e.g. a transport window moved); re-size the work vectors to match.
        if self.ydot.len() != n {
            self.ydot = DVector::zeros(n);
            self.y_prev = DVector::zeros(n);
            self.ydot_prev = DVector::zeros(n);
            self.k2 = DVector::zeros(n);
            self.k3 = DVector::zeros(n);
            self.k4 = DVector::zeros(n);
            self.k5 = DVector::zeros(n);
            self.k6 = DVector::zeros(n);
            self.ytmp = DVector::zeros(n);
            self.ynew = DVector::zeros(n);
            self.ydot_new = DVector::zeros(n);
            self.yerr = DVector::zeros(n);
        }

        self.t = t0;
        self.y = y0;
        self.stats.rhs_evals += 1;
        if self.system.rhs(t0, &self.y, &mut self.ydot) != RhsStatus::Ok {
            return Err(SolverError::RhsFailure { t: t0 });
        }
        self.t_prev = t0;
        self.y_prev.copy_from(&self.y);
        self.ydot_prev.copy_from(&self.ydot);

        self.h = if self.config.h0 > 0.0 {
            self.config.h0
        } else {
            // Aim the first explicit-Euler increment at 1% of the error weight.
            let d = self.error_norm_of(&self.ydot);
            if d > 0.0 {
                (0.01 / d).clamp(self.config.hmin, self.config.hmax)
            } else {
                1e-6
            }
        };
        self.initialized = true;
        debug!(t0, h0 = self.h, n, "ode solver initialized");
        Ok(())
    }

    /// Replace the tolerances (state size must be unchanged).
    pub fn set_tolerances(&mut self, reltol: f64, abstol: DVector<f64>) -> SolverResult<()> {
        let n = self.system.state_size();
        self.config.reltol = reltol;
        self.config.abstol = abstol;
        self.config.validate(n)
    }

    /// Take one accepted step of adaptively chosen size.
    pub fn step(&mut self) -> SolverResult<()> {
        if !self.initialized {
            return Err(SolverError::NotInitialized);
        }
        let mut h = self.h.min(self.config.hmax);
        let mut rhs_failures = 0usize;

        loop {
            if !h.is_finite() || h < self.config.hmin {
                return Err(SolverError::StepSizeUnderflow { t: self.t, h });
            }

            let err = match self.try_stages(h) {
                Some(err) => err,
                None => {
                    rhs_failures += 1;
                    if rhs_failures > self.config.max_rhs_retries {
                        return Err(SolverError::RhsFailure { t: self.t });
                    }
                    h *= RHS_FAILURE_SHRINK;
                    continue;
                }
            };

            if !err.is_finite() {
                // Non-finite trial solution that the stages did not catch.
                self.stats.rejected += 1;
                h *= RHS_FAILURE_SHRINK;
                continue;
            }

            if err <= 1.0 {
                // Derivative at the accepted point, reused as the next k1 and
                // for dense output.
                self.stats.rhs_evals += 1;
                if self.system.rhs(self.t + h, &self.ynew, &mut self.ydot_new) != RhsStatus::Ok {
                    rhs_failures += 1;
                    if rhs_failures > self.config.max_rhs_retries {
                        return Err(SolverError::RhsFailure { t: self.t });
                    }
                    h *= RHS_FAILURE_SHRINK;
                    continue;
                }

                self.t_prev = self.t;
                self.y_prev.copy_from(&self.y);
                self.ydot_prev.copy_from(&self.ydot);
                self.t += h;
                self.y.copy_from(&self.ynew);
                self.ydot.copy_from(&self.ydot_new);
                self.stats.steps += 1;

                let growth = if err > 1e-12 {
                    (SAFETY * err.powf(-0.2)).min(MAX_GROWTH)
                } else {
                    MAX_GROWTH
                };
                self.h = (h * growth).min(self.config.hmax);
                trace!(t = self.t, h, err, "step accepted");
                return Ok(());
            }

            self.stats.rejected += 1;
            let shrink = (SAFETY * err.powf(-0.25)).max(MIN_SHRINK);
            trace!(t = self.t, h, err, "step rejected");
            h *= shrink;
        }
    }

    /// Advance until the internal time passes `tf`.
    ///
    /// The last step generally overshoots `tf`; use [`Self::interpolate`] to
    /// read the solution exactly at `tf`.
    pub fn integrate_to(&mut self, tf: f64) -> SolverResult<()> {
        if !self.initialized {
            return Err(SolverError::NotInitialized);
        }
        let mut steps = 0usize;
        while self.t < tf {
            self.step()?;
            steps += 1;
            if steps > self.config.max_steps {
                return Err(SolverError::MaxSteps {
                    t: self.t,
                    max_steps: self.config.max_steps,
                });
            }
        }
        Ok(())
    }

    /// Cubic-Hermite dense output over the last accepted step.
    pub fn interpolate(&self, t: f64) -> SolverResult<DVector<f64>> {
        if !self.initialized {
            return Err(SolverError::NotInitialized);
        }
        let h = self.t - self.t_prev;
        if h == 0.0 {
            return Ok(self.y.clone());
        }
        let theta = (t - self.t_prev) / h;
        let t2 = theta * theta;
        let t3 = t2 * theta;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + theta;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        let mut out = self.y_prev.clone();
        out *= h00;
        out.axpy(h10 * h, &self.ydot_prev, 1.0);
        out.axpy(h01, &self.y, 1.0);
        out.axpy(h11 * h, &self.ydot, 1.0);
        Ok(out)
    }

    /// Realign the solver at `(t, y)` (e.g. after interpolating to the target
    /// time). Re-evaluates the RHS at the new point.
    pub fn set_state(&mut self, t: f64, y: DVector<f64>) -> SolverResult<()> {
        if !self.initialized {
            return Err(SolverError::NotInitialized);
        }
        let n = self.system.state_size();
        if y.len() != n {
            return Err(SolverError::SizeMismatch {
                what: "state",
                len: y.len(),
                expected: n,
            });
        }
        self.t = t;
        self.y = y;
        self.stats.rhs_evals += 1;
        if self.system.rhs(t, &self.y, &mut self.ydot) != RhsStatus::Ok {
            return Err(SolverError::RhsFailure { t });
        }
        self.t_prev = t;
        self.y_prev.copy_from(&self.y);
        self.ydot_prev.copy_from(&self.ydot);
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn derivative(&self) -> &DVector<f64> {
        &self.ydot
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Run all six stages for step size `h`, filling `ynew`/`yerr`.
    ///
    /// Returns the weighted-RMS error norm, or `None` when a stage RHS
    /// reports a recoverable failure.
    fn try_stages(&mut self, h: f64) -> Option<f64> {
        let t = self.t;
        let k1 = &self.ydot;

        self.ytmp.copy_from(&self.y);
        self.ytmp.axpy(h * A21, k1, 1.0);
        self.stats.rhs_evals += 1;
        if self.system.rhs(t + C2 * h, &self.ytmp, &mut self.k2) != RhsStatus::Ok {
            return None;
        }

        self.ytmp.copy_from(&self.y);
        self.ytmp.axpy(h * A31, k1, 1.0);
        self.ytmp.axpy(h * A32, &self.k2, 1.0);
        self.stats.rhs_evals += 1;
        if self.system.rhs(t + C3 * h, &self.ytmp, &mut self.k3) != RhsStatus::Ok {
            return None;
        }

        self.ytmp.copy_from(&self.y);
        self.ytmp.axpy(h * A41, k1, 1.0);
        self.ytmp.axpy(h * A42, &self.k2, 1.0);
        self.ytmp.axpy(h * A43, &self.k3, 1.0);
        self.stats.rhs_evals += 1;
        if self.system.rhs(t + C4 * h, &self.ytmp, &mut self.k4) != RhsStatus::Ok {
            return None;
        }

        self.ytmp.copy_from(&self.y);
        self.ytmp.axpy(h * A51, k1, 1.0);
        self.ytmp.axpy(h * A52, &self.k2, 1.0);
        self.ytmp.axpy(h * A53, &self.k3, 1.0);
        self.ytmp.axpy(h * A54, &self.k4, 1.0);
        self.stats.rhs_evals += 1;
        if self.system.rhs(t + C5 * h, &self.ytmp, &mut self.k5) != RhsStatus::Ok {
            return None;
        }

        self.ytmp.copy_from(&self.y);
        self.ytmp.axpy(h * A61, k1, 1.0);
        self.ytmp.axpy(h * A62, &self.k2, 1.0);
        self.ytmp.axpy(h * A63, &self.k3, 1.0);
        self.ytmp.axpy(h * A64, &self.k4, 1.0);
        self.ytmp.axpy(h * A65, &self.k5, 1.0);
        self.stats.rhs_evals += 1;
        if self.system.rhs(t + C6 * h, &self.ytmp, &mut self.k6) != RhsStatus::Ok {
            return None;
        }

        self.ynew.copy_from(&self.y);
        self.ynew.axpy(h * B1, k1, 1.0);
        self.ynew.axpy(h * B3, &self.k3, 1.0);
        self.ynew.axpy(h * B4, &self.k4, 1.0);
        self.ynew.axpy(h * B6, &self.k6, 1.0);

        self.yerr.fill(0.0);
        self.yerr.axpy(h * D1, k1, 1.0);
        self.yerr.axpy(h * D3, &self.k3, 1.0);
        self.yerr.axpy(h * D4, &self.k4, 1.0);
        self.yerr.axpy(h * D5, &self.k5, 1.0);
        self.yerr.axpy(h * D6, &self.k6, 1.0);

        let mut acc = 0.0;
        for i in 0..self.yerr.len() {
            let w = self.config.reltol * self.y[i].abs() + self.config.abstol[i];
            let e = self.yerr[i] / w;
            acc += e * e;
        }
        Some((acc / self.yerr.len() as f64).sqrt())
    }

    /// Weighted-RMS norm of a vector against the current state's weights.
    fn error_norm_of(&self, v: &DVector<f64>) -> f64 {
        let mut acc = 0.0;
        for i in 0..v.len() {
            let w = self.config.reltol * self.y[i].abs() + self.config.abstol[i];
            let e = v[i] / w;
            acc += e * e;
        }
        (acc / v.len() as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl OdeSystem for Decay {
        fn state_size(&self) -> usize {
            1
        }
        fn rhs(&mut self, _t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> RhsStatus {
            ydot[0] = -y[0];
            RhsStatus::Ok
        }
    }

    struct AlwaysFails;

    impl OdeSystem for AlwaysFails {
        fn state_size(&self) -> usize {
            1
        }
        fn rhs(&mut self, _t: f64, _y: &DVector<f64>, _ydot: &mut DVector<f64>) -> RhsStatus {
            RhsStatus::RecoverableFailure
        }
    }

    #[test]
    fn decay_matches_analytic_solution() {
        let cfg = SolverConfig::uniform(1, 1e-10, 1e-12);
        let mut solver = OdeSolver::new(Decay, cfg);
        solver.initialize(0.0, DVector::from_element(1, 1.0)).unwrap();
        solver.integrate_to(1.0).unwrap();
        let y1 = solver.interpolate(1.0).unwrap();
        assert!((y1[0] - (-1.0f64).exp()).abs() < 1e-8);
        assert!(solver.stats().steps > 0);
    }

    #[test]
    fn step_errors_before_initialize() {
        let cfg = SolverConfig::uniform(1, 1e-8, 1e-10);
        let mut solver = OdeSolver::new(Decay, cfg);
        assert!(matches!(solver.step(), Err(SolverError::NotInitialized)));
        assert!(matches!(
            solver.interpolate(0.0),
            Err(SolverError::NotInitialized)
        ));
    }

    #[test]
    fn persistent_rhs_failure_is_reported() {
        let cfg = SolverConfig::uniform(1, 1e-8, 1e-10);
        let mut solver = OdeSolver::new(AlwaysFails, cfg);
        let err = solver
            .initialize(0.0, DVector::from_element(1, 1.0))
            .unwrap_err();
        assert!(matches!(err, SolverError::RhsFailure { .. }));
    }

    #[test]
    fn initial_state_size_is_checked() {
        let cfg = SolverConfig::uniform(1, 1e-8, 1e-10);
        let mut solver = OdeSolver::new(Decay, cfg);
        assert!(matches!(
            solver.initialize(0.0, DVector::zeros(3)),
            Err(SolverError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn dense_output_is_exact_for_cubics() {
        // y' = 3t², y = t³: a cubic, which Hermite interpolation reproduces.
        struct Cubic;
        impl OdeSystem for Cubic {
            fn state_size(&self) -> usize {
                1
            }
            fn rhs(&mut self, t: f64, _y: &DVector<f64>, ydot: &mut DVector<f64>) -> RhsStatus {
                ydot[0] = 3.0 * t * t;
                RhsStatus::Ok
            }
        }
        let cfg = SolverConfig::uniform(1, 1e-8, 1e-10);
        let mut solver = OdeSolver::new(Cubic, cfg);
        solver.initialize(0.0, DVector::zeros(1)).unwrap();
        solver.step().unwrap();
        let tm = 0.5 * (solver.time() + 0.0);
        let ym = solver.interpolate(tm).unwrap();
        assert!((ym[0] - tm.powi(3)).abs() < 1e-12);
    }
}
