//! Single-species scalar transport on a node sub-range.
//!
//! Each species is advected by the velocity field the UTW phase published
//! (or by the quasi-2D fields), on its own active window of grid nodes with
//! its own integrator. Nodes outside the window are never touched.

use crate::velocity::VelocitySource;
use nalgebra::DVector;
use pf_grid::OneDimGrid;
use pf_solver::{OdeSystem, RhsStatus};
use std::sync::Arc;

/// Scalar transport sub-system for one species.
pub struct SpeciesSystem {
    species_index: usize,
    grid: Arc<OneDimGrid>,
    start: usize,
    /// Inclusive upper end of the active window.
    stop: usize,
    y_left: f64,
    /// Full-length split-constant row, indexed by global node.
    split_const: Vec<f64>,
    source: VelocitySource,
    // Window-sized scratch from the last evaluation.
    v: Vec<f64>,
    vr: Vec<f64>,
}

impl SpeciesSystem {
    pub fn new(species_index: usize, grid: Arc<OneDimGrid>) -> Self {
        let n = grid.len();
        Self {
            species_index,
            grid,
            start: 0,
            stop: n - 1,
            y_left: f64::NAN,
            split_const: vec![0.0; n],
            source: VelocitySource::default(),
            v: vec![0.0; n],
            vr: vec![0.0; n],
        }
    }

    pub fn species_index(&self) -> usize {
        self.species_index
    }

    /// Active window `(start, stop)`, inclusive.
    pub fn domain(&self) -> (usize, usize) {
        (self.start, self.stop)
    }

    /// Set the active window (validated by the coordinator).
    pub fn set_domain(&mut self, start: usize, stop: usize) {
        self.start = start;
        self.stop = stop;
        let m = stop - start + 1;
        self.v = vec![0.0; m];
        self.vr = vec![0.0; m];
    }

    /// Swap in a new grid and reset the window to the full domain.
    pub fn set_grid(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.len();
        self.grid = grid;
        self.split_const = vec![0.0; n];
        self.set_domain(0, n - 1);
    }

    pub fn set_y_left(&mut self, y_left: f64) {
        self.y_left = y_left;
    }

    pub fn y_left(&self) -> f64 {
        self.y_left
    }

    pub fn has_left_bc(&self) -> bool {
        self.y_left.is_finite()
    }

    pub fn set_velocity(&mut self, source: VelocitySource) {
        self.source = source;
    }

    pub fn set_split_constants(&mut self, split_const: &[f64]) {
        self.split_const.copy_from_slice(split_const);
    }

    pub fn reset_split_constants(&mut self) {
        self.split_const.fill(0.0);
    }

    /// Window velocity from the last evaluation.
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// Radial velocity samples from the last quasi-2D evaluation, for the
    /// outer diffusion operators.
    pub fn radial_velocity(&self) -> &[f64] {
        &self.vr
    }

    /// Fill the window velocity at time `t` from the installed source.
    fn update_v(&mut self, t: f64) -> bool {
        match &self.source {
            VelocitySource::TimeSeries(series) => series.sample_into(t, self.start, &mut self.v),
            VelocitySource::Quasi2d { vz, vr } => {
                let x = self.grid.x();
                for (jj, (vj, vrj)) in self.v.iter_mut().zip(self.vr.iter_mut()).enumerate() {
                    let xj = x[self.start + jj];
                    *vj = vz.at(xj, t);
                    *vrj = vr.at(xj, t);
                }
                true
            }
        }
    }
}

impl OdeSystem for SpeciesSystem {
    fn state_size(&self) -> usize {
        self.stop - self.start + 1
    }

    fn rhs(&mut self, t: f64, y: &DVector<f64>, ydot: &mut DVector<f64>) -> RhsStatus {
        let m = self.state_size();
        if m < 3 {
            // Too narrow to transport; the species is inert this step.
            ydot.fill(0.0);
            return RhsStatus::Ok;
        }
        if !self.update_v(t) {
            return RhsStatus::RecoverableFailure;
        }

        let hh = self.grid.hh();
        for jj in 0..m {
            let j = self.start + jj;
            let v = self.v[jj];
            let dydx = if jj == 0 {
                if self.start == 0 && v >= 0.0 {
                    // Left Dirichlet value as the upwind ghost.
                    (y[0] - self.y_left) / hh[0]
                } else {
                    // Interior left edge: fall back to forward differencing.
                    (y[1] - y[0]) / hh[j]
                }
            } else if jj == m - 1 || v >= 0.0 {
                (y[jj] - y[jj - 1]) / hh[j - 1]
            } else {
                (y[jj + 1] - y[jj]) / hh[j]
            };
            ydot[jj] = -v * dydx + self.split_const[j];
        }

        if ydot.iter().any(|d| !d.is_finite()) {
            return RhsStatus::RecoverableFailure;
        }
        RhsStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::velocity::VelocityTimeSeries;
    use pf_grid::Geometry;

    fn grid(n: usize) -> Arc<OneDimGrid> {
        Arc::new(OneDimGrid::uniform(0.0, 0.01, n, Geometry::Planar).unwrap())
    }

    fn uniform_series(n: usize, v: f64) -> VelocitySource {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![v; n]);
        VelocitySource::TimeSeries(Arc::new(series))
    }

    #[test]
    fn narrow_window_is_inert() {
        let mut sys = SpeciesSystem::new(0, grid(11));
        sys.set_domain(4, 5);
        let y = DVector::from_element(2, 0.7);
        let mut ydot = DVector::from_element(2, 1.0);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        assert!(ydot.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn positive_velocity_upwinds_backward() {
        let n = 11;
        let mut sys = SpeciesSystem::new(0, grid(n));
        sys.set_y_left(1.0);
        sys.set_velocity(uniform_series(n, 2.0));
        // Step profile: 1 on the left half, 0 on the right.
        let y = DVector::from_fn(n, |j, _| if j < 5 { 1.0 } else { 0.0 });
        let mut ydot = DVector::zeros(n);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        // Only node 5 sees the jump through its backward difference.
        let hh = 0.001;
        assert!((ydot[5] - 2.0 / hh).abs() < 1e-9);
        for j in 0..n {
            if j != 5 {
                assert!(ydot[j].abs() < 1e-12, "node {j}");
            }
        }
    }

    #[test]
    fn negative_velocity_upwinds_forward() {
        let n = 11;
        let mut sys = SpeciesSystem::new(0, grid(n));
        sys.set_y_left(1.0);
        sys.set_velocity(uniform_series(n, -2.0));
        let y = DVector::from_fn(n, |j, _| if j < 5 { 1.0 } else { 0.0 });
        let mut ydot = DVector::zeros(n);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        // The jump is seen from its left side going the other way.
        let hh = 0.001;
        assert!((ydot[4] + 2.0 / hh).abs() < 1e-9);
        assert!(ydot[5].abs() < 1e-12);
    }

    #[test]
    fn interior_window_ignores_outside_nodes_and_left_dirichlet() {
        let n = 11;
        let mut sys = SpeciesSystem::new(2, grid(n));
        sys.set_y_left(1.0);
        sys.set_domain(3, 8);
        sys.set_velocity(uniform_series(n, 2.0));
        assert_eq!(sys.state_size(), 6);
        // Uniform window: the interior left edge uses forward differencing,
        // so the Dirichlet ghost never enters.
        let y = DVector::from_element(6, 0.4);
        let mut ydot = DVector::zeros(6);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        assert!(ydot.iter().all(|&d| d.abs() < 1e-12));
    }

    #[test]
    fn split_constant_row_is_indexed_globally(){
        let n = 11;
        let mut sys = SpeciesSystem::new(0, grid(n));
        sys.set_domain(3, 8);
        sys.set_velocity(uniform_series(n, 0.0));
        let mut split = vec![0.0; n];
        split[5] = 2.5;
        sys.set_split_constants(&split);
        let y = DVector::zeros(6);
        let mut ydot = DVector::zeros(6);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        // Global node 5 is window offset 2.
        assert_eq!(ydot[2], 2.5);
        assert_eq!(ydot[0], 0.0);
    }

    #[test]
    fn missing_velocity_source_is_recoverable() {
        let n = 5;
        let mut sys = SpeciesSystem::new(0, grid(n));
        let y = DVector::zeros(n);
        let mut ydot = DVector::zeros(n);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::RecoverableFailure);
    }

    #[test]
    fn quasi2d_source_samples_both_fields() {
        use crate::velocity::BilinearField;
        let n = 5;
        let mut sys = SpeciesSystem::new(0, grid(n));
        sys.set_y_left(0.0);
        let vz = Arc::new(BilinearField::constant(1.0, (0.0, 0.01), (0.0, 1.0)).unwrap());
        let vr = Arc::new(BilinearField::constant(0.5, (0.0, 0.01), (0.0, 1.0)).unwrap());
        sys.set_velocity(VelocitySource::Quasi2d { vz, vr });
        let y = DVector::zeros(n);
        let mut ydot = DVector::zeros(n);
        assert_eq!(sys.rhs(0.0, &y, &mut ydot), RhsStatus::Ok);
        assert!(sys.v().iter().all(|&v| v == 1.0));
        assert!(sys.radial_velocity().iter().all(|&v| v == 0.5));
    }
}
