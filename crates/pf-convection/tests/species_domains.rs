//! Integration tests: per-species sub-domains are isolated from the rest of
//! the grid, and narrow windows integrate trivially.

use nalgebra::DMatrix;
use pf_convection::{ConvectionConfig, SplitConvection};
use pf_core::units::k;
use pf_grid::{Geometry, OneDimGrid};
use pf_thermo::IdealGasMixture;
use std::sync::Arc;

const N: usize = 11;

/// Two equal-weight species so composition changes never feed back through
/// the mixture weight.
fn windowed_coordinator(y: &DMatrix<f64>) -> SplitConvection {
    let grid = Arc::new(OneDimGrid::uniform(0.0, 0.01, N, Geometry::Planar).unwrap());
    let gas = Arc::new(IdealGasMixture::new(vec![("F", 0.029), ("P", 0.029)]).unwrap());
    let mut coord = SplitConvection::new(grid, gas, ConvectionConfig::default()).unwrap();
    coord.set_state(&[0.0; N], &[300.0; N], y, 0.0).unwrap();
    coord.set_left_bc(k(300.0), &[0.8, 0.2]).unwrap();
    coord.set_rvzero(0.1).unwrap();
    coord.set_density_derivative(&[0.0; N]).unwrap();
    coord.set_species_domains(&[(3, 8), (3, 8)]).unwrap();
    coord
}

fn ramp_table() -> DMatrix<f64> {
    DMatrix::from_fn(2, N, |kk, j| {
        let f = 0.2 + 0.06 * j as f64;
        if kk == 0 { f } else { 1.0 - f }
    })
}

#[test]
fn nodes_outside_the_window_are_never_touched() {
    let y0 = ramp_table();
    let mut coord = windowed_coordinator(&y0);
    coord.integrate_to_time(2e-3).unwrap();

    let y = coord.mass_fractions();
    for kk in 0..2 {
        for j in (0..3).chain(9..N) {
            assert_eq!(y[(kk, j)], y0[(kk, j)], "species {kk} node {j}");
        }
    }
    // Inside the window the profile has moved.
    assert!((y[(0, 5)] - y0[(0, 5)]).abs() > 1e-6);
}

#[test]
fn perturbation_outside_the_window_does_not_reach_inside() {
    let y_base = ramp_table();
    let mut perturbed = y_base.clone();
    // Swap composition outside the window; equal weights keep Wmx unchanged.
    perturbed[(0, 0)] = y_base[(1, 0)];
    perturbed[(1, 0)] = y_base[(0, 0)];
    perturbed[(0, 10)] -= 0.3;
    perturbed[(1, 10)] += 0.3;

    let mut a = windowed_coordinator(&y_base);
    let mut b = windowed_coordinator(&perturbed);
    a.integrate_to_time(2e-3).unwrap();
    b.integrate_to_time(2e-3).unwrap();

    let (ya, yb) = (a.mass_fractions(), b.mass_fractions());
    for kk in 0..2 {
        for j in 3..=8 {
            assert_eq!(ya[(kk, j)], yb[(kk, j)], "species {kk} node {j}");
        }
    }
}

#[test]
fn narrow_window_leaves_the_species_inert() {
    let y0 = ramp_table();
    let grid = Arc::new(OneDimGrid::uniform(0.0, 0.01, N, Geometry::Planar).unwrap());
    let gas = Arc::new(IdealGasMixture::new(vec![("F", 0.029), ("P", 0.029)]).unwrap());
    let mut coord = SplitConvection::new(grid, gas, ConvectionConfig::default()).unwrap();
    coord.set_state(&[0.0; N], &[300.0; N], &y0, 0.0).unwrap();
    coord.set_left_bc(k(300.0), &[0.8, 0.2]).unwrap();
    coord.set_rvzero(0.1).unwrap();
    coord.set_density_derivative(&[0.0; N]).unwrap();
    // Species 0 transports on a two-node window (inert); species 1 on the
    // full grid.
    coord.set_species_domains(&[(4, 5), (0, N - 1)]).unwrap();
    coord.integrate_to_time(2e-3).unwrap();

    let y = coord.mass_fractions();
    for j in 0..N {
        assert!(
            (y[(0, j)] - y0[(0, j)]).abs() < 1e-12,
            "species 0 node {j}"
        );
    }
    // The dense species still moved.
    let moved = (0..N).any(|j| (y[(1, j)] - y0[(1, j)]).abs() > 1e-6);
    assert!(moved);
}

#[test]
fn derivatives_outside_the_window_are_zero() {
    let y0 = ramp_table();
    let mut coord = windowed_coordinator(&y0);
    coord.evaluate().unwrap();
    let dydt = coord.dydt();
    for kk in 0..2 {
        for j in (0..3).chain(9..N) {
            assert_eq!(dydt[(kk, j)], 0.0, "species {kk} node {j}");
        }
        let active = (3..=8).any(|j| dydt[(kk, j)].abs() > 1e-9);
        assert!(active, "species {kk} window never moves");
    }
}
