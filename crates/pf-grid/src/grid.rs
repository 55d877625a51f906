//! Nonuniform 1D grid along the flame-normal coordinate.

use crate::error::{GridError, GridResult};

/// Flame geometry. Planar flames carry a unit radial metric; cylindrical
/// flames use the coordinate itself as the radius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    #[default]
    Planar,
    Cylindrical,
}

impl Geometry {
    /// Curvature factor multiplying radial metric terms (0 planar, 1 cylindrical).
    pub fn alpha(self) -> f64 {
        match self {
            Geometry::Planar => 0.0,
            Geometry::Cylindrical => 1.0,
        }
    }
}

/// Read-only geometric coefficients of a 1D grid.
///
/// Node coordinates `x` are strictly increasing. Derived arrays:
/// - `hh[j] = x[j+1] - x[j]` (n−1 entries)
/// - `r[j]` radial metric (=`x[j]` cylindrical, =1 planar)
/// - `rphalf[j] = (r[j] + r[j+1]) / 2` (n−1 entries)
/// - `cfm/cf/cfp` centered first-derivative weights, zero at the boundaries
#[derive(Clone, Debug)]
pub struct OneDimGrid {
    geometry: Geometry,
    x: Vec<f64>,
    hh: Vec<f64>,
    r: Vec<f64>,
    rphalf: Vec<f64>,
    cfm: Vec<f64>,
    cf: Vec<f64>,
    cfp: Vec<f64>,
}

impl OneDimGrid {
    /// Minimum number of nodes for the transport stencils to be meaningful.
    pub const MIN_POINTS: usize = 3;

    /// Build a grid from node coordinates, validating monotonicity.
    pub fn new(x: Vec<f64>, geometry: Geometry) -> GridResult<Self> {
        let n = x.len();
        if n < Self::MIN_POINTS {
            return Err(GridError::TooFewPoints {
                len: n,
                min: Self::MIN_POINTS,
            });
        }
        for (j, &xj) in x.iter().enumerate() {
            if !xj.is_finite() {
                return Err(GridError::NonFinite { index: j });
            }
        }
        for j in 1..n {
            if x[j] <= x[j - 1] {
                return Err(GridError::NotMonotone { index: j });
            }
        }
        if geometry == Geometry::Cylindrical && x[0] < 0.0 {
            return Err(GridError::NegativeRadius { x0: x[0] });
        }

        let hh: Vec<f64> = (0..n - 1).map(|j| x[j + 1] - x[j]).collect();
        let r: Vec<f64> = match geometry {
            Geometry::Planar => vec![1.0; n],
            Geometry::Cylindrical => x.clone(),
        };
        let rphalf: Vec<f64> = (0..n - 1).map(|j| 0.5 * (r[j] + r[j + 1])).collect();

        // Centered three-point first-derivative weights on the nonuniform
        // grid: (df/dx)[j] = cfm[j] f[j-1] + cf[j] f[j] + cfp[j] f[j+1].
        let mut cfm = vec![0.0; n];
        let mut cf = vec![0.0; n];
        let mut cfp = vec![0.0; n];
        for j in 1..n - 1 {
            let hm = hh[j - 1];
            let hp = hh[j];
            cfm[j] = -hp / (hm * (hm + hp));
            cf[j] = (hp - hm) / (hm * hp);
            cfp[j] = hm / (hp * (hm + hp));
        }

        Ok(Self {
            geometry,
            x,
            hh,
            r,
            rphalf,
            cfm,
            cf,
            cfp,
        })
    }

    /// Uniformly spaced grid over `[x0, x1]`.
    pub fn uniform(x0: f64, x1: f64, n: usize, geometry: Geometry) -> GridResult<Self> {
        if n < Self::MIN_POINTS {
            return Err(GridError::TooFewPoints {
                len: n,
                min: Self::MIN_POINTS,
            });
        }
        let dx = (x1 - x0) / (n - 1) as f64;
        let x = (0..n).map(|j| x0 + j as f64 * dx).collect();
        Self::new(x, geometry)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Curvature factor α ∈ {0, 1}.
    pub fn alpha(&self) -> f64 {
        self.geometry.alpha()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn hh(&self) -> &[f64] {
        &self.hh
    }

    pub fn r(&self) -> &[f64] {
        &self.r
    }

    pub fn rphalf(&self) -> &[f64] {
        &self.rphalf
    }

    pub fn cfm(&self) -> &[f64] {
        &self.cfm
    }

    pub fn cf(&self) -> &[f64] {
        &self.cf
    }

    pub fn cfp(&self) -> &[f64] {
        &self.cfp
    }

    /// `r[j]^α` without calling `powf` on the hot path.
    #[inline]
    pub fn r_alpha(&self, j: usize) -> f64 {
        match self.geometry {
            Geometry::Planar => 1.0,
            Geometry::Cylindrical => self.r[j],
        }
    }

    /// Centered first derivative at interior node `j`.
    pub fn centered_gradient(&self, f: &[f64], j: usize) -> f64 {
        debug_assert!(j >= 1 && j + 1 < self.len());
        self.cfm[j] * f[j - 1] + self.cf[j] * f[j] + self.cfp[j] * f[j + 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_short_and_nonmonotone_input() {
        assert!(matches!(
            OneDimGrid::new(vec![0.0, 1.0], Geometry::Planar),
            Err(GridError::TooFewPoints { .. })
        ));
        assert!(matches!(
            OneDimGrid::new(vec![0.0, 1.0, 1.0], Geometry::Planar),
            Err(GridError::NotMonotone { index: 2 })
        ));
        assert!(matches!(
            OneDimGrid::new(vec![0.0, f64::NAN, 1.0], Geometry::Planar),
            Err(GridError::NonFinite { index: 1 })
        ));
        assert!(matches!(
            OneDimGrid::new(vec![-1.0, 0.0, 1.0], Geometry::Cylindrical),
            Err(GridError::NegativeRadius { .. })
        ));
    }

    #[test]
    fn derived_arrays_planar() {
        let g = OneDimGrid::new(vec![0.0, 0.1, 0.3, 0.6], Geometry::Planar).unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.hh(), &[0.1, 0.2, 0.3]);
        assert_eq!(g.r(), &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(g.rphalf(), &[1.0, 1.0, 1.0]);
        assert_eq!(g.alpha(), 0.0);
    }

    #[test]
    fn derived_arrays_cylindrical() {
        let g = OneDimGrid::new(vec![0.0, 0.1, 0.3], Geometry::Cylindrical).unwrap();
        assert_eq!(g.r(), &[0.0, 0.1, 0.3]);
        assert!((g.rphalf()[0] - 0.05).abs() < 1e-15);
        assert!((g.rphalf()[1] - 0.2).abs() < 1e-15);
        assert_eq!(g.alpha(), 1.0);
        assert_eq!(g.r_alpha(2), 0.3);
    }

    #[test]
    fn centered_gradient_exact_for_quadratics() {
        // Nonuniform grid; the 3-point weights reproduce d/dx of x² exactly.
        let x = vec![0.0, 0.05, 0.13, 0.31, 0.4];
        let g = OneDimGrid::new(x.clone(), Geometry::Planar).unwrap();
        let f: Vec<f64> = x.iter().map(|&xi| 2.0 * xi * xi - xi + 3.0).collect();
        for j in 1..x.len() - 1 {
            let exact = 4.0 * x[j] - 1.0;
            assert!((g.centered_gradient(&f, j) - exact).abs() < 1e-12);
        }
    }

    #[test]
    fn uniform_grid_spacing() {
        let g = OneDimGrid::uniform(0.0, 0.01, 11, Geometry::Planar).unwrap();
        assert_eq!(g.len(), 11);
        for &h in g.hh() {
            assert!((h - 0.001).abs() < 1e-15);
        }
    }

    proptest! {
        #[test]
        fn gradient_exact_for_linear_on_random_grids(
            spacings in prop::collection::vec(1e-4..1e-2f64, 3..20),
            slope in -10.0..10.0f64,
            offset in -5.0..5.0f64,
        ) {
            let mut x = vec![0.0];
            for h in &spacings {
                x.push(x.last().unwrap() + h);
            }
            let g = OneDimGrid::new(x.clone(), Geometry::Planar).unwrap();
            let f: Vec<f64> = x.iter().map(|&xi| slope * xi + offset).collect();
            for j in 1..x.len() - 1 {
                prop_assert!((g.centered_gradient(&f, j) - slope).abs() < 1e-9);
            }
        }
    }
}
