//! Split-convection coordinator.
//!
//! Owns the UTW solver and one solver per species, drives them to a common
//! end time, and keeps continuity and species transport consistent: the UTW
//! phase runs first and publishes its mass-flux profile after every accepted
//! step; each species then integrates over the same interval reading that
//! series through linear interpolation in time.

use crate::bc::{ContinuityBc, ContinuityBcKind};
use crate::error::{ConvectionError, ConvectionResult};
use crate::species::SpeciesSystem;
use crate::utw::{UtwSystem, pack_state, state_slices};
use crate::velocity::{BilinearField, VelocitySource, VelocityTimeSeries};
use nalgebra::{DMatrix, DVector};
use pf_core::constants::STANDARD_PRESSURE;
use pf_solver::OdeSystem;
use pf_core::numeric::{ensure_all_finite, ensure_finite};
use pf_core::units::{Pressure, Temperature, pa};
use pf_grid::OneDimGrid;
use pf_solver::{OdeSolver, RhsStatus, SolverConfig, SolverError};
use pf_thermo::MixtureModel;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Tolerances and integration limits for one coordinator.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvectionConfig {
    /// Relative tolerance shared by every solver.
    pub reltol: f64,
    /// Absolute tolerance on tangential velocity.
    pub abstol_u: f64,
    /// Absolute tolerance on temperature.
    pub abstol_t: f64,
    /// Absolute tolerance on mixture molecular weight.
    pub abstol_w: f64,
    /// Absolute tolerance on species mass fractions.
    pub abstol_y: f64,
    /// Thermodynamic pressure, immutable for the coordinator's lifetime.
    pub pressure: Pressure,
    /// Step budget per solver per `integrate_to_time` call.
    pub max_steps: usize,
}

impl Default for ConvectionConfig {
    fn default() -> Self {
        Self {
            reltol: 1e-8,
            abstol_u: 1e-7,
            abstol_t: 1e-8,
            abstol_w: 1e-7,
            abstol_y: 1e-8,
            pressure: pa(STANDARD_PRESSURE),
            max_steps: 100_000,
        }
    }
}

/// Coordinator for one convection split step.
///
/// Lifecycle per outer splitting step: `set_state`, boundary/forcing setters,
/// optionally `update_continuity_bc`, then `integrate_to_time`; afterwards
/// the updated state and time derivatives are read back through the
/// accessors. `evaluate` recomputes every derived quantity at the current
/// state without advancing time.
pub struct SplitConvection {
    grid: Arc<OneDimGrid>,
    gas: Arc<dyn MixtureModel>,
    config: ConvectionConfig,
    utw: OdeSolver<UtwSystem>,
    species: Vec<OdeSolver<SpeciesSystem>>,
    quasi2d: Option<(Arc<BilinearField>, Arc<BilinearField>)>,
    t: f64,
    state_set: bool,
    u: Vec<f64>,
    temperature: Vec<f64>,
    wmx: Vec<f64>,
    v: Vec<f64>,
    /// Species mass fractions, one row per species.
    y: DMatrix<f64>,
    dudt: Vec<f64>,
    dtdt: Vec<f64>,
    dwdt: Vec<f64>,
    dydt: DMatrix<f64>,
}

impl SplitConvection {
    pub fn new(
        grid: Arc<OneDimGrid>,
        gas: Arc<dyn MixtureModel>,
        config: ConvectionConfig,
    ) -> ConvectionResult<Self> {
        let p = config.pressure.value;
        if !p.is_finite() || p <= 0.0 {
            return Err(ConvectionError::InvalidArg {
                what: "pressure must be positive and finite",
            });
        }
        if !(config.reltol > 0.0) {
            return Err(ConvectionError::InvalidArg {
                what: "reltol must be positive",
            });
        }

        let n = grid.len();
        let n_spec = gas.n_species();

        let utw_system = UtwSystem::new(grid.clone(), p);
        let mut utw_config =
            SolverConfig::with_abstol(config.reltol, Self::utw_abstol(&config, n));
        utw_config.max_steps = config.max_steps;
        let utw = OdeSolver::new(utw_system, utw_config);

        let species = (0..n_spec)
            .map(|k| {
                let mut cfg = SolverConfig::uniform(n, config.reltol, config.abstol_y);
                cfg.max_steps = config.max_steps;
                OdeSolver::new(SpeciesSystem::new(k, grid.clone()), cfg)
            })
            .collect();

        Ok(Self {
            grid,
            gas,
            config,
            utw,
            species,
            quasi2d: None,
            t: 0.0,
            state_set: false,
            u: vec![0.0; n],
            temperature: vec![0.0; n],
            wmx: vec![0.0; n],
            v: vec![0.0; n],
            y: DMatrix::zeros(n_spec, n),
            dudt: vec![0.0; n],
            dtdt: vec![0.0; n],
            dwdt: vec![0.0; n],
            dydt: DMatrix::zeros(n_spec, n),
        })
    }

    fn utw_abstol(config: &ConvectionConfig, n: usize) -> DVector<f64> {
        let mut abstol = DVector::zeros(3 * n);
        abstol.as_mut_slice()[..n].fill(config.abstol_u);
        abstol.as_mut_slice()[n..2 * n].fill(config.abstol_t);
        abstol.as_mut_slice()[2 * n..3 * n].fill(config.abstol_w);
        abstol
    }

    fn require_state(&self) -> ConvectionResult<()> {
        if self.state_set {
            Ok(())
        } else {
            Err(ConvectionError::InvalidArg {
                what: "state must be set before this operation",
            })
        }
    }

    /// Install the state the convection step starts from.
    ///
    /// The mixture molecular weight is derived from the mass fractions; left
    /// boundary values default to the node-0 state until `set_left_bc`
    /// prescribes them.
    pub fn set_state(
        &mut self,
        u: &[f64],
        temperature: &[f64],
        y: &DMatrix<f64>,
        t_initial: f64,
    ) -> ConvectionResult<()> {
        let n = self.grid.len();
        let n_spec = self.gas.n_species();
        if u.len() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "u",
                len: u.len(),
                expected: n,
            });
        }
        if temperature.len() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "temperature",
                len: temperature.len(),
                expected: n,
            });
        }
        if y.nrows() != n_spec || y.ncols() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "mass fraction table rows x cols",
                len: y.nrows() * y.ncols(),
                expected: n_spec * n,
            });
        }
        if !t_initial.is_finite() {
            return Err(ConvectionError::InvalidArg {
                what: "initial time must be finite",
            });
        }
        for (j, &tj) in temperature.iter().enumerate() {
            if !tj.is_finite() || tj <= 0.0 {
                return Err(ConvectionError::NonPhysical {
                    what: "temperature must be positive",
                    node: j,
                });
            }
        }
        for (j, &uj) in u.iter().enumerate() {
            if !uj.is_finite() {
                return Err(ConvectionError::NonPhysical {
                    what: "tangential velocity must be finite",
                    node: j,
                });
            }
        }

        // Derive the mixture weight column by column before mutating.
        let mut wmx = vec![0.0; n];
        let mut column = vec![0.0; n_spec];
        for j in 0..n {
            for k in 0..n_spec {
                column[k] = y[(k, j)];
            }
            wmx[j] = self.gas.mixture_weight(&column)?;
        }

        self.u.copy_from_slice(u);
        self.temperature.copy_from_slice(temperature);
        self.wmx = wmx;
        self.y.copy_from(y);
        self.t = t_initial;
        self.state_set = true;

        if !self.utw.system().has_left_bc() {
            let (t0, w0) = (self.temperature[0], self.wmx[0]);
            self.utw.system_mut().set_left_bc(t0, w0);
        }
        for solver in &mut self.species {
            if !solver.system().has_left_bc() {
                let k = solver.system().species_index();
                let y0 = y[(k, 0)];
                solver.system_mut().set_y_left(y0);
            }
        }
        Ok(())
    }

    /// Prescribe the left Dirichlet values: boundary temperature and species
    /// mass fractions. The boundary mixture weight is derived from the
    /// fractions.
    pub fn set_left_bc(&mut self, t_left: Temperature, y_left: &[f64]) -> ConvectionResult<()> {
        let n_spec = self.gas.n_species();
        if y_left.len() != n_spec {
            return Err(ConvectionError::SizeMismatch {
                what: "y_left",
                len: y_left.len(),
                expected: n_spec,
            });
        }
        let tl = t_left.value;
        if !tl.is_finite() || tl <= 0.0 {
            return Err(ConvectionError::NonPhysical {
                what: "boundary temperature must be positive",
                node: 0,
            });
        }
        let w_left = self.gas.mixture_weight(y_left)?;
        self.utw.system_mut().set_left_bc(tl, w_left);
        for solver in &mut self.species {
            let k = solver.system().species_index();
            solver.system_mut().set_y_left(y_left[k]);
        }
        Ok(())
    }

    /// Left-boundary mass flux for the `Left` continuity BC.
    pub fn set_rvzero(&mut self, r_vzero: f64) -> ConvectionResult<()> {
        ensure_finite(r_vzero, "rVzero")?;
        self.utw.system_mut().set_rvzero(r_vzero);
        Ok(())
    }

    /// Active node windows, one inclusive `(start, stop)` pair per species.
    pub fn set_species_domains(&mut self, domains: &[(usize, usize)]) -> ConvectionResult<()> {
        let n = self.grid.len();
        let n_spec = self.gas.n_species();
        if domains.len() != n_spec {
            return Err(ConvectionError::SizeMismatch {
                what: "species domains",
                len: domains.len(),
                expected: n_spec,
            });
        }
        for (k, &(start, stop)) in domains.iter().enumerate() {
            if start > stop || stop >= n {
                return Err(ConvectionError::SpeciesDomain {
                    species: k,
                    start,
                    stop,
                    len: n,
                });
            }
        }
        for (solver, &(start, stop)) in self.species.iter_mut().zip(domains) {
            solver.system_mut().set_domain(start, stop);
        }
        Ok(())
    }

    /// Install the additive split forcings carrying the other operators'
    /// contributions. The mixture-weight forcing is derived from the species
    /// forcings: dWmx/dt = −Wmx²·Σ_k c_k / W_k.
    pub fn set_split_constants(
        &mut self,
        split_u: &[f64],
        split_t: &[f64],
        split_y: &DMatrix<f64>,
    ) -> ConvectionResult<()> {
        self.require_state()?;
        let n = self.grid.len();
        let n_spec = self.gas.n_species();
        if split_u.len() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "split_u",
                len: split_u.len(),
                expected: n,
            });
        }
        if split_t.len() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "split_t",
                len: split_t.len(),
                expected: n,
            });
        }
        if split_y.nrows() != n_spec || split_y.ncols() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "split_y rows x cols",
                len: split_y.nrows() * split_y.ncols(),
                expected: n_spec * n,
            });
        }

        let weights = self.gas.species_weights();
        let mut split_w = vec![0.0; n];
        for (j, sw) in split_w.iter_mut().enumerate() {
            let mut moles = 0.0;
            for k in 0..n_spec {
                moles += split_y[(k, j)] / weights[k];
            }
            *sw = -self.wmx[j] * self.wmx[j] * moles;
        }
        self.utw
            .system_mut()
            .set_split_constants(split_u, split_t, &split_w);

        let mut row = vec![0.0; n];
        for solver in &mut self.species {
            let k = solver.system().species_index();
            for (j, r) in row.iter_mut().enumerate() {
                *r = split_y[(k, j)];
            }
            solver.system_mut().set_split_constants(&row);
        }
        Ok(())
    }

    /// Zero every split constant on the UTW and species sub-systems.
    pub fn reset_split_constants(&mut self) {
        self.utw.system_mut().reset_split_constants();
        for solver in &mut self.species {
            solver.system_mut().reset_split_constants();
        }
    }

    /// Install `∂ρ/∂t` as computed by the other split operators; continuity
    /// integrates against it.
    pub fn set_density_derivative(&mut self, drhodt: &[f64]) -> ConvectionResult<()> {
        let n = self.grid.len();
        if drhodt.len() != n {
            return Err(ConvectionError::SizeMismatch {
                what: "drhodt",
                len: drhodt.len(),
                expected: n,
            });
        }
        ensure_all_finite(drhodt, "drhodt")?;
        self.utw.system_mut().set_density_derivative(drhodt);
        Ok(())
    }

    /// Switch the continuity boundary condition between steps.
    ///
    /// Re-evaluates the UTW system first so the `Zero` anchor search sees the
    /// rV profile of the current state. On error the previous BC is kept.
    pub fn update_continuity_bc(
        &mut self,
        kind: ContinuityBcKind,
        qdot: &[f64],
    ) -> ConvectionResult<()> {
        self.require_state()?;
        let n = self.grid.len();
        let packed = pack_state(&self.u, &self.temperature, &self.wmx);
        let mut ydot = DVector::zeros(3 * n);
        if self.utw.system_mut().rhs(self.t, &packed, &mut ydot) != RhsStatus::Ok {
            return Err(ConvectionError::Evaluation {
                what: "state not evaluable for boundary condition update",
            });
        }
        self.utw.system_mut().update_continuity_bc(kind, qdot)?;
        debug!(?kind, anchor = ?self.utw.system().continuity_bc().anchor(), "continuity BC updated");
        Ok(())
    }

    /// Install externally supplied `(v_z, v_r)` fields and switch every
    /// species system to the quasi-2D velocity path.
    pub fn setup_quasi2d(&mut self, vz: Arc<BilinearField>, vr: Arc<BilinearField>) {
        self.quasi2d = Some((vz, vr));
    }

    /// Swap in a new grid after a regrid. Invalidates the state;
    /// `set_state` (and the per-step setters) must be called before the next
    /// step.
    pub fn set_grid(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.len();
        let n_spec = self.gas.n_species();
        self.grid = grid.clone();
        self.utw.system_mut().set_grid(grid.clone());
        for solver in &mut self.species {
            solver.system_mut().set_grid(grid.clone());
        }
        self.u = vec![0.0; n];
        self.temperature = vec![0.0; n];
        self.wmx = vec![0.0; n];
        self.v = vec![0.0; n];
        self.y = DMatrix::zeros(n_spec, n);
        self.dudt = vec![0.0; n];
        self.dtdt = vec![0.0; n];
        self.dwdt = vec![0.0; n];
        self.dydt = DMatrix::zeros(n_spec, n);
        self.state_set = false;
    }

    /// Advance the whole split sub-system from the current time to `tf`.
    pub fn integrate_to_time(&mut self, tf: f64) -> ConvectionResult<()> {
        self.require_state()?;
        let t0 = self.t;
        if !tf.is_finite() || tf < t0 {
            return Err(ConvectionError::InvalidArg {
                what: "target time must be finite and not before the current time",
            });
        }
        if tf == t0 {
            return self.evaluate();
        }
        let n = self.grid.len();

        // UTW phase: advance step by step, publishing the mass-flux profile
        // after every accepted step.
        self.utw
            .set_tolerances(self.config.reltol, Self::utw_abstol(&self.config, n))?;
        self.utw
            .initialize(t0, pack_state(&self.u, &self.temperature, &self.wmx))?;

        let mut series = VelocityTimeSeries::new();
        series.insert(t0, self.utw.system().v().to_vec());
        let mut steps = 0usize;
        while self.utw.time() < tf {
            self.utw.step()?;
            steps += 1;
            if steps > self.config.max_steps {
                return Err(ConvectionError::Solver(SolverError::MaxSteps {
                    t: self.utw.time(),
                    max_steps: self.config.max_steps,
                }));
            }
            series.insert(self.utw.time(), self.utw.system().v().to_vec());
        }
        let y_tf = self.utw.interpolate(tf)?;
        self.utw.set_state(tf, y_tf)?;
        series.insert(tf, self.utw.system().v().to_vec());
        debug!(steps, t0, tf, "utw phase complete");

        let (us, ts, ws) = state_slices(self.utw.state(), n);
        self.u.copy_from_slice(us);
        self.temperature.copy_from_slice(ts);
        self.wmx.copy_from_slice(ws);
        // The packed state keeps its initial boundary entries (their
        // derivatives are pinned); read back the prescribed values.
        self.temperature[0] = self.utw.system().t_left();
        self.wmx[0] = self.utw.system().w_left();

        // Species phase: every solver reads the published series (or the
        // quasi-2D fields), each on its own window.
        let source = match &self.quasi2d {
            Some((vz, vr)) => VelocitySource::Quasi2d {
                vz: vz.clone(),
                vr: vr.clone(),
            },
            None => VelocitySource::TimeSeries(Arc::new(series)),
        };
        let reltol = self.config.reltol;
        let abstol_y = self.config.abstol_y;
        let species = &mut self.species;
        let y_table = &self.y;
        species
            .par_iter_mut()
            .try_for_each(|solver| -> ConvectionResult<()> {
                let (start, stop) = solver.system().domain();
                let k = solver.system().species_index();
                let m = stop - start + 1;
                solver.system_mut().set_velocity(source.clone());
                solver.set_tolerances(reltol, DVector::from_element(m, abstol_y))?;
                let y0 = DVector::from_fn(m, |jj, _| y_table[(k, start + jj)]);
                solver.initialize(t0, y0)?;
                solver.integrate_to(tf)?;
                let y_end = solver.interpolate(tf)?;
                solver.set_state(tf, y_end)?;
                Ok(())
            })?;

        // Copy each active window back into its row.
        for i in 0..self.species.len() {
            let (start, _stop) = self.species[i].system().domain();
            let k = self.species[i].system().species_index();
            let window: Vec<f64> = self.species[i].state().iter().copied().collect();
            for (jj, &val) in window.iter().enumerate() {
                self.y[(k, start + jj)] = val;
            }
        }

        self.t = tf;
        self.evaluate()
    }

    /// Recompute V, ρ, and every time derivative at the current state
    /// without advancing time. Idempotent.
    pub fn evaluate(&mut self) -> ConvectionResult<()> {
        self.require_state()?;
        let n = self.grid.len();
        let t = self.t;

        let packed = pack_state(&self.u, &self.temperature, &self.wmx);
        let mut ydot = DVector::zeros(3 * n);
        if self.utw.system_mut().rhs(t, &packed, &mut ydot) != RhsStatus::Ok {
            return Err(ConvectionError::Evaluation {
                what: "utw state not evaluable",
            });
        }
        self.v.copy_from_slice(self.utw.system().v());
        let (du, dt, dw) = state_slices(&ydot, n);
        self.dudt.copy_from_slice(du);
        self.dtdt.copy_from_slice(dt);
        self.dwdt.copy_from_slice(dw);

        let source = match &self.quasi2d {
            Some((vz, vr)) => VelocitySource::Quasi2d {
                vz: vz.clone(),
                vr: vr.clone(),
            },
            None => {
                let mut series = VelocityTimeSeries::new();
                series.insert(t, self.v.clone());
                VelocitySource::TimeSeries(Arc::new(series))
            }
        };

        for i in 0..self.species.len() {
            let (start, stop) = self.species[i].system().domain();
            let k = self.species[i].system().species_index();
            let m = stop - start + 1;
            let yw = DVector::from_fn(m, |jj, _| self.y[(k, start + jj)]);
            let mut yd = DVector::zeros(m);
            self.dydt.row_mut(k).fill(0.0);
            let sys = self.species[i].system_mut();
            sys.set_velocity(source.clone());
            if sys.rhs(t, &yw, &mut yd) != RhsStatus::Ok {
                return Err(ConvectionError::Evaluation {
                    what: "species state not evaluable",
                });
            }
            for jj in 0..m {
                self.dydt[(k, start + jj)] = yd[jj];
            }
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn grid(&self) -> &Arc<OneDimGrid> {
        &self.grid
    }

    pub fn config(&self) -> &ConvectionConfig {
        &self.config
    }

    /// Tangential velocity.
    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn temperature(&self) -> &[f64] {
        &self.temperature
    }

    /// Mixture molecular weight.
    pub fn wmx(&self) -> &[f64] {
        &self.wmx
    }

    /// Mass flux from the last evaluation.
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// Density from the last evaluation.
    pub fn rho(&self) -> &[f64] {
        self.utw.system().rho()
    }

    /// `r^α V` from the last evaluation.
    pub fn rv(&self) -> &[f64] {
        self.utw.system().rv()
    }

    /// Species mass fractions, one row per species.
    pub fn mass_fractions(&self) -> &DMatrix<f64> {
        &self.y
    }

    pub fn dudt(&self) -> &[f64] {
        &self.dudt
    }

    pub fn dtdt(&self) -> &[f64] {
        &self.dtdt
    }

    pub fn dwdt(&self) -> &[f64] {
        &self.dwdt
    }

    pub fn dydt(&self) -> &DMatrix<f64> {
        &self.dydt
    }

    pub fn continuity_bc(&self) -> &ContinuityBc {
        self.utw.system().continuity_bc()
    }

    /// Stagnation anchor `(x, node)` when the BC carries one.
    pub fn stagnation_point(&self) -> Option<(f64, usize)> {
        match *self.utw.system().continuity_bc() {
            ContinuityBc::Zero { x_vzero, j_anchor } => Some((x_vzero, j_anchor)),
            ContinuityBc::Qdot { j_anchor } => Some((self.grid.x()[j_anchor], j_anchor)),
            ContinuityBc::Left => None,
        }
    }
}
