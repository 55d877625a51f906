//! Velocity interpolation between the UTW and species phases.
//!
//! The UTW phase publishes mass-flux profiles keyed by time; species solvers
//! read them back through linear interpolation in t. The quasi-2D variant
//! instead samples externally supplied `(v_z, v_r)` fields bilinearly in
//! `(x, t)`.

use crate::error::{ConvectionError, ConvectionResult};
use std::sync::Arc;

/// Time-keyed velocity profiles with linear interpolation in t.
///
/// Samples are kept sorted by time; inserting at an existing key replaces the
/// stored profile. Lookups clamp to the first/last sample outside the covered
/// interval.
#[derive(Clone, Debug, Default)]
pub struct VelocityTimeSeries {
    times: Vec<f64>,
    profiles: Vec<Vec<f64>>,
}

impl VelocityTimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sample times, ascending.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Insert a profile at time `t`, keeping the series sorted.
    pub fn insert(&mut self, t: f64, profile: Vec<f64>) {
        match self.times.binary_search_by(|probe| probe.total_cmp(&t)) {
            Ok(i) => self.profiles[i] = profile,
            Err(i) => {
                self.times.insert(i, t);
                self.profiles.insert(i, profile);
            }
        }
    }

    /// Interpolate the profile at `t` into `out`, reading stored profiles
    /// from node offset `start`.
    ///
    /// Returns `false` when the series is empty or a stored profile is too
    /// short for the requested window.
    pub fn sample_into(&self, t: f64, start: usize, out: &mut [f64]) -> bool {
        if self.times.is_empty() {
            return false;
        }
        let end = start + out.len();

        let copy_from = |profile: &[f64], out: &mut [f64]| -> bool {
            if profile.len() < end {
                return false;
            }
            out.copy_from_slice(&profile[start..end]);
            true
        };

        if t <= self.times[0] {
            return copy_from(&self.profiles[0], out);
        }
        let last = self.times.len() - 1;
        if t >= self.times[last] {
            return copy_from(&self.profiles[last], out);
        }

        let hi = self.times.partition_point(|&ti| ti < t);
        let lo = hi - 1;
        let (p0, p1) = (&self.profiles[lo], &self.profiles[hi]);
        if p0.len() < end || p1.len() < end {
            return false;
        }
        let frac = (t - self.times[lo]) / (self.times[hi] - self.times[lo]);
        for (i, o) in out.iter_mut().enumerate() {
            let j = start + i;
            *o = p0[j] + frac * (p1[j] - p0[j]);
        }
        true
    }
}

/// Externally supplied scalar field on a rectilinear `(x, t)` grid with
/// clamped bilinear sampling.
#[derive(Clone, Debug)]
pub struct BilinearField {
    x: Vec<f64>,
    t: Vec<f64>,
    /// Row-major: `values[ix * t.len() + it]`.
    values: Vec<f64>,
}

impl BilinearField {
    pub fn new(x: Vec<f64>, t: Vec<f64>, values: Vec<f64>) -> ConvectionResult<Self> {
        if x.len() < 2 || t.len() < 2 {
            return Err(ConvectionError::VelocityField {
                what: "need at least two coordinates per axis",
            });
        }
        if values.len() != x.len() * t.len() {
            return Err(ConvectionError::VelocityField {
                what: "value table size does not match the coordinate axes",
            });
        }
        if x.windows(2).any(|w| w[1] <= w[0]) || t.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConvectionError::VelocityField {
                what: "coordinate axes must be strictly increasing",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConvectionError::VelocityField {
                what: "non-finite value in table",
            });
        }
        Ok(Self { x, t, values })
    }

    /// Spatially and temporally constant field over the given ranges.
    pub fn constant(value: f64, x_range: (f64, f64), t_range: (f64, f64)) -> ConvectionResult<Self> {
        Self::new(
            vec![x_range.0, x_range.1],
            vec![t_range.0, t_range.1],
            vec![value; 4],
        )
    }

    /// Clamped bilinear sample at `(x, t)`.
    pub fn at(&self, x: f64, t: f64) -> f64 {
        let (ix, fx) = Self::locate(&self.x, x);
        let (it, ft) = Self::locate(&self.t, t);
        let nt = self.t.len();
        let v00 = self.values[ix * nt + it];
        let v01 = self.values[ix * nt + it + 1];
        let v10 = self.values[(ix + 1) * nt + it];
        let v11 = self.values[(ix + 1) * nt + it + 1];
        let v0 = v00 + ft * (v01 - v00);
        let v1 = v10 + ft * (v11 - v10);
        v0 + fx * (v1 - v0)
    }

    /// Cell index and clamped fraction along one axis.
    fn locate(axis: &[f64], value: f64) -> (usize, f64) {
        if value <= axis[0] {
            return (0, 0.0);
        }
        let last = axis.len() - 1;
        if value >= axis[last] {
            return (last - 1, 1.0);
        }
        let hi = axis.partition_point(|&a| a < value);
        let lo = hi - 1;
        (lo, (value - axis[lo]) / (axis[hi] - axis[lo]))
    }
}

/// Where a species sub-system gets its advecting velocity.
#[derive(Clone, Debug)]
pub enum VelocitySource {
    /// 1D mode: the series the UTW phase published.
    TimeSeries(Arc<VelocityTimeSeries>),
    /// Quasi-2D mode: externally prescribed axial/radial fields.
    Quasi2d {
        vz: Arc<BilinearField>,
        vr: Arc<BilinearField>,
    },
}

impl Default for VelocitySource {
    fn default() -> Self {
        VelocitySource::TimeSeries(Arc::new(VelocityTimeSeries::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_interpolates_linearly_in_time() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![0.0, 1.0, 2.0]);
        series.insert(1.0, vec![2.0, 3.0, 4.0]);

        let mut out = [0.0; 3];
        assert!(series.sample_into(0.5, 0, &mut out));
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn series_clamps_outside_covered_interval() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![1.0, 1.0]);
        series.insert(1.0, vec![3.0, 3.0]);

        let mut out = [0.0; 2];
        assert!(series.sample_into(-1.0, 0, &mut out));
        assert_eq!(out, [1.0, 1.0]);
        assert!(series.sample_into(5.0, 0, &mut out));
        assert_eq!(out, [3.0, 3.0]);
    }

    #[test]
    fn series_insert_keeps_order_and_replaces_duplicates() {
        let mut series = VelocityTimeSeries::new();
        series.insert(1.0, vec![10.0]);
        series.insert(0.0, vec![0.0]);
        series.insert(1.0, vec![20.0]);
        assert_eq!(series.times(), &[0.0, 1.0]);

        let mut out = [0.0; 1];
        assert!(series.sample_into(1.0, 0, &mut out));
        assert_eq!(out, [20.0]);
    }

    #[test]
    fn series_window_offset() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![0.0, 10.0, 20.0, 30.0]);

        let mut out = [0.0; 2];
        assert!(series.sample_into(0.0, 1, &mut out));
        assert_eq!(out, [10.0, 20.0]);

        let mut too_long = [0.0; 4];
        assert!(!series.sample_into(0.0, 1, &mut too_long));
    }

    #[test]
    fn empty_series_reports_failure() {
        let series = VelocityTimeSeries::new();
        let mut out = [0.0; 1];
        assert!(!series.sample_into(0.0, 0, &mut out));
    }

    #[test]
    fn bilinear_field_matches_corners_and_center() {
        let field = BilinearField::new(
            vec![0.0, 1.0],
            vec![0.0, 2.0],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert_eq!(field.at(0.0, 0.0), 1.0);
        assert_eq!(field.at(0.0, 2.0), 2.0);
        assert_eq!(field.at(1.0, 0.0), 3.0);
        assert_eq!(field.at(1.0, 2.0), 4.0);
        assert!((field.at(0.5, 1.0) - 2.5).abs() < 1e-15);
        // Clamped outside the table
        assert_eq!(field.at(-1.0, -1.0), 1.0);
        assert_eq!(field.at(2.0, 3.0), 4.0);
    }

    #[test]
    fn bilinear_field_validates_input() {
        assert!(BilinearField::new(vec![0.0], vec![0.0, 1.0], vec![1.0, 1.0]).is_err());
        assert!(BilinearField::new(vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(
            BilinearField::new(vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0; 4]).is_err()
        );
        assert!(
            BilinearField::new(vec![0.0, 1.0], vec![0.0, 1.0], vec![f64::NAN; 4]).is_err()
        );
    }

    #[test]
    fn constant_field_is_constant() {
        let field = BilinearField::constant(1.5, (0.0, 0.01), (0.0, 1.0)).unwrap();
        assert_eq!(field.at(0.005, 0.5), 1.5);
        assert_eq!(field.at(0.0, 0.0), 1.5);
    }
}
