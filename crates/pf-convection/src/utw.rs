//! Coupled tangential-velocity / temperature / molecular-weight sub-system.
//!
//! The packed state is `[U | T | Wmx]`, node-major per variable. Every RHS
//! evaluation recomputes density from the ideal-gas law, integrates
//! continuity under the active boundary condition to obtain the mass flux,
//! and forms upwinded advective derivatives plus the installed split
//! constants.

use crate::bc::{self, ContinuityBc, ContinuityBcKind};
use crate::error::{ConvectionError, ConvectionResult};
use nalgebra::DVector;
use pf_core::constants::GAS_CONSTANT;
use pf_grid::OneDimGrid;
use pf_solver::{OdeSystem, RhsStatus};
use std::sync::Arc;

/// Split the packed state vector into its `(U, T, Wmx)` blocks.
pub fn state_slices(y: &DVector<f64>, n: usize) -> (&[f64], &[f64], &[f64]) {
    let s = y.as_slice();
    (&s[..n], &s[n..2 * n], &s[2 * n..3 * n])
}

/// Pack `(U, T, Wmx)` into the solver layout.
pub fn pack_state(u: &[f64], temperature: &[f64], wmx: &[f64]) -> DVector<f64> {
    let n = u.len();
    let mut y = DVector::zeros(3 * n);
    y.as_mut_slice()[..n].copy_from_slice(u);
    y.as_mut_slice()[n..2 * n].copy_from_slice(temperature);
    y.as_mut_slice()[2 * n..3 * n].copy_from_slice(wmx);
    y
}

/// The UTW convection sub-system.
pub struct UtwSystem {
    grid: Arc<OneDimGrid>,
    pressure: f64,
    t_left: f64,
    w_left: f64,
    r_vzero: f64,
    bc: ContinuityBc,
    drhodt: Vec<f64>,
    split_const_u: Vec<f64>,
    split_const_t: Vec<f64>,
    split_const_w: Vec<f64>,
    // Scratch from the most recent RHS evaluation.
    u: Vec<f64>,
    temperature: Vec<f64>,
    wmx: Vec<f64>,
    rho: Vec<f64>,
    rv: Vec<f64>,
    v: Vec<f64>,
}

impl UtwSystem {
    pub fn new(grid: Arc<OneDimGrid>, pressure: f64) -> Self {
        let n = grid.len();
        Self {
            grid,
            pressure,
            t_left: f64::NAN,
            w_left: f64::NAN,
            r_vzero: 0.0,
            bc: ContinuityBc::Left,
            drhodt: vec![0.0; n],
            split_const_u: vec![0.0; n],
            split_const_t: vec![0.0; n],
            split_const_w: vec![0.0; n],
            u: vec![0.0; n],
            temperature: vec![0.0; n],
            wmx: vec![0.0; n],
            rho: vec![0.0; n],
            rv: vec![0.0; n],
            v: vec![0.0; n],
        }
    }

    /// Swap in a new grid (regrid); all per-node arrays are reallocated and
    /// the boundary condition falls back to `Left` until updated.
    pub fn set_grid(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.len();
        self.grid = grid;
        self.bc = ContinuityBc::Left;
        self.drhodt = vec![0.0; n];
        self.split_const_u = vec![0.0; n];
        self.split_const_t = vec![0.0; n];
        self.split_const_w = vec![0.0; n];
        self.u = vec![0.0; n];
        self.temperature = vec![0.0; n];
        self.wmx = vec![0.0; n];
        self.rho = vec![0.0; n];
        self.rv = vec![0.0; n];
        self.v = vec![0.0; n];
    }

    pub fn grid(&self) -> &Arc<OneDimGrid> {
        &self.grid
    }

    /// Left Dirichlet values for temperature and mixture weight.
    pub fn set_left_bc(&mut self, t_left: f64, w_left: f64) {
        self.t_left = t_left;
        self.w_left = w_left;
    }

    /// Whether the left boundary values were ever prescribed.
    pub fn has_left_bc(&self) -> bool {
        self.t_left.is_finite() && self.w_left.is_finite()
    }

    pub fn t_left(&self) -> f64 {
        self.t_left
    }

    pub fn w_left(&self) -> f64 {
        self.w_left
    }

    /// Left-boundary mass flux used by the `Left` continuity BC.
    pub fn set_rvzero(&mut self, r_vzero: f64) {
        self.r_vzero = r_vzero;
    }

    pub fn set_density_derivative(&mut self, drhodt: &[f64]) {
        self.drhodt.copy_from_slice(drhodt);
    }

    pub fn set_split_constants(&mut self, u: &[f64], t: &[f64], w: &[f64]) {
        self.split_const_u.copy_from_slice(u);
        self.split_const_t.copy_from_slice(t);
        self.split_const_w.copy_from_slice(w);
    }

    pub fn reset_split_constants(&mut self) {
        self.split_const_u.fill(0.0);
        self.split_const_t.fill(0.0);
        self.split_const_w.fill(0.0);
    }

    pub fn continuity_bc(&self) -> &ContinuityBc {
        &self.bc
    }

    /// Switch the continuity boundary condition between steps.
    ///
    /// `Zero` anchors at the first sign change of the most recently evaluated
    /// rV profile; `Qdot` anchors at the peak of the supplied heat-release
    /// profile. On error the previous boundary condition is preserved.
    pub fn update_continuity_bc(
        &mut self,
        kind: ContinuityBcKind,
        qdot: &[f64],
    ) -> ConvectionResult<()> {
        let n = self.grid.len();
        match kind {
            ContinuityBcKind::Left => {
                self.bc = ContinuityBc::Left;
            }
            ContinuityBcKind::Zero => {
                let j = bc::first_sign_change(&self.rv).ok_or(
                    ConvectionError::BoundaryCondition {
                        what: "no sign change in rV to anchor the stagnation point",
                    },
                )?;
                let x = self.grid.x();
                let frac = self.rv[j] / (self.rv[j] - self.rv[j + 1]);
                let x_vzero = x[j] + frac * (x[j + 1] - x[j]);
                self.bc = ContinuityBc::Zero {
                    x_vzero,
                    j_anchor: j.clamp(1, n - 2),
                };
            }
            ContinuityBcKind::Qdot => {
                if qdot.len() != n {
                    return Err(ConvectionError::SizeMismatch {
                        what: "qdot",
                        len: qdot.len(),
                        expected: n,
                    });
                }
                let j = bc::argmax(qdot).ok_or(ConvectionError::BoundaryCondition {
                    what: "heat-release profile has no finite entries",
                })?;
                self.bc = ContinuityBc::Qdot {
                    j_anchor: j.clamp(1, n - 2),
                };
            }
        }
        Ok(())
    }

    /// Mass flux `V = rV / r^α` from the last evaluation.
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// `r^α V` from the last evaluation.
    pub fn rv(&self) -> &[f64] {
        &self.rv
    }

    /// Density from the last evaluation.
    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    /// Flux difference across cell `j` (between nodes `j` and `j+1`):
    /// `rV[j+1] = rV[j] − hh[j]·r[j]^α·(∂ρ/∂t[j] + α·ρ[j]·(U[j]+U[j+1])/2)`.
    fn flux_step(&self, j: usize) -> f64 {
        let alpha = self.grid.alpha();
        let strain = alpha * self.rho[j] * 0.5 * (self.u[j] + self.u[j + 1]);
        self.grid.hh()[j] * self.grid.r_alpha(j) * (self.drhodt[j] + strain)
    }

    /// Integrate continuity under the active boundary condition.
    fn integrate_continuity(&mut self) {
        let n = self.grid.len();
        match self.bc {
            ContinuityBc::Left => {
                self.rv[0] = self.r_vzero;
                for j in 0..n - 1 {
                    self.rv[j + 1] = self.rv[j] - self.flux_step(j);
                }
            }
            ContinuityBc::Zero { x_vzero, j_anchor } => {
                // rV vanishes at x_vzero inside the anchor cell. Distribute
                // that cell's flux difference so the linearly interpolated rV
                // is zero exactly there:
                // rv[ja] − (x_vzero − x[ja])/hh[ja] · Δ = 0.
                let frac =
                    (x_vzero - self.grid.x()[j_anchor]) / self.grid.hh()[j_anchor];
                self.rv[j_anchor] = frac * self.flux_step(j_anchor);
                self.outward_from(j_anchor);
            }
            ContinuityBc::Qdot { j_anchor } => {
                self.rv[j_anchor] = 0.0;
                self.outward_from(j_anchor);
            }
        }
    }

    fn outward_from(&mut self, j_anchor: usize) {
        let n = self.grid.len();
        for j in j_anchor..n - 1 {
            self.rv[j + 1] = self.rv[j] - self.flux_step(j);
        }
        for j in (0..j_anchor).rev() {
            self.rv[j] = self.rv[j + 1] + self.flux_step(j);
        }
    }
}

impl OdeSystem for UtwSystem {
    fn state_size(&self) -> usize {
        3 * self.grid.len()
    }

    fn rhs(&mut self, _t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> RhsStatus {
        let n = self.grid.len();
        let (u_in, t_in, w_in) = state_slices(y, n);
        self.u.copy_from_slice(u_in);
        self.temperature.copy_from_slice(t_in);
        self.wmx.copy_from_slice(w_in);

        // Left Dirichlet values.
        self.temperature[0] = self.t_left;
        self.wmx[0] = self.w_left;

        for j in 0..n {
            let tj = self.temperature[j];
            if !tj.is_finite() || tj <= 0.0 {
                return RhsStatus::RecoverableFailure;
            }
            self.rho[j] = self.pressure * self.wmx[j] / (GAS_CONSTANT * tj);
            if !self.rho[j].is_finite() {
                return RhsStatus::RecoverableFailure;
            }
        }

        self.integrate_continuity();

        for j in 0..n {
            let ra = self.grid.r_alpha(j);
            self.v[j] = if ra != 0.0 {
                self.rv[j] / ra
            } else {
                // Cylindrical axis: V = lim rV/r = d(rV)/dr at r = 0.
                (self.rv[j + 1] - self.rv[j]) / self.grid.hh()[j]
            };
        }

        let hh = self.grid.hh();
        let yd = ydot.as_mut_slice();
        let (du, rest) = yd.split_at_mut(n);
        let (dt, dw) = rest.split_at_mut(n);

        // Node 0: Dirichlet temperature and mixture weight; U follows its
        // split constant only.
        du[0] = self.split_const_u[0];
        dt[0] = 0.0;
        dw[0] = 0.0;

        for j in 1..n {
            let backward = j == n - 1 || self.v[j] >= 0.0;
            let (dudx, dtdx, dwdx) = if backward {
                let h = hh[j - 1];
                (
                    (self.u[j] - self.u[j - 1]) / h,
                    (self.temperature[j] - self.temperature[j - 1]) / h,
                    (self.wmx[j] - self.wmx[j - 1]) / h,
                )
            } else {
                let h = hh[j];
                (
                    (self.u[j + 1] - self.u[j]) / h,
                    (self.temperature[j + 1] - self.temperature[j]) / h,
                    (self.wmx[j + 1] - self.wmx[j]) / h,
                )
            };
            du[j] = -self.v[j] * dudx + self.split_const_u[j];
            dt[j] = -self.v[j] * dtdx + self.split_const_t[j];
            dw[j] = -self.v[j] * dwdx + self.split_const_w[j];
        }

        if ydot.iter().any(|d| !d.is_finite()) {
            return RhsStatus::RecoverableFailure;
        }
        RhsStatus::Ok
    }
}
