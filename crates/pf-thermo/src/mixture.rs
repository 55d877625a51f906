//! Mixture property model trait and the ideal-gas implementation.

use crate::error::{ThermoError, ThermoResult};
use pf_core::constants::GAS_CONSTANT;

/// Property contract the convection core needs from a kinetics package.
///
/// Mass-fraction slices are indexed by species; molecular weights are in
/// kg/mol, densities in kg/m³.
pub trait MixtureModel: Send + Sync {
    /// Number of species in the mechanism.
    fn n_species(&self) -> usize;

    /// Species molecular weights [kg/mol].
    fn species_weights(&self) -> &[f64];

    /// Mixture molecular weight from mass fractions: ΣY / Σ(Y_k / W_k).
    ///
    /// Normalizes internally so an unnormalized mass-fraction vector still
    /// yields the correct mixture weight.
    fn mixture_weight(&self, y: &[f64]) -> ThermoResult<f64> {
        let w = self.species_weights();
        if y.len() != w.len() {
            return Err(ThermoError::SizeMismatch {
                len: y.len(),
                n_species: w.len(),
            });
        }
        let mut sum_y = 0.0;
        let mut sum_moles = 0.0;
        for (yk, wk) in y.iter().zip(w) {
            if !yk.is_finite() {
                return Err(ThermoError::NonPhysical {
                    what: "non-finite mass fraction",
                });
            }
            if *yk < 0.0 {
                return Err(ThermoError::NonPhysical {
                    what: "negative mass fraction",
                });
            }
            sum_y += yk;
            sum_moles += yk / wk;
        }
        if sum_y <= 0.0 || sum_moles <= 0.0 {
            return Err(ThermoError::NonPhysical {
                what: "mass fractions sum to zero",
            });
        }
        Ok(sum_y / sum_moles)
    }

    /// Ideal-gas density ρ = p·Wmx / (R·T) [kg/m³].
    fn density(&self, pressure: f64, temperature: f64, mixture_weight: f64) -> f64 {
        pressure * mixture_weight / (GAS_CONSTANT * temperature)
    }
}

/// Ideal-gas mixture defined by a species list with molecular weights.
#[derive(Clone, Debug)]
pub struct IdealGasMixture {
    names: Vec<String>,
    weights: Vec<f64>,
}

impl IdealGasMixture {
    /// Create a mixture from `(name, weight)` pairs (weights in kg/mol).
    pub fn new<S: Into<String>>(species: Vec<(S, f64)>) -> ThermoResult<Self> {
        if species.is_empty() {
            return Err(ThermoError::InvalidMixture {
                what: "empty species list",
            });
        }
        let mut names = Vec::with_capacity(species.len());
        let mut weights = Vec::with_capacity(species.len());
        for (name, w) in species {
            if !w.is_finite() || w <= 0.0 {
                return Err(ThermoError::InvalidMixture {
                    what: "species weight must be positive and finite",
                });
            }
            names.push(name.into());
            weights.push(w);
        }
        Ok(Self { names, weights })
    }

    /// Species names, in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl MixtureModel for IdealGasMixture {
    fn n_species(&self) -> usize {
        self.weights.len()
    }

    fn species_weights(&self) -> &[f64] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn methane_air() -> IdealGasMixture {
        IdealGasMixture::new(vec![
            ("CH4", 0.016_04),
            ("O2", 0.032_00),
            ("N2", 0.028_01),
            ("CO2", 0.044_01),
            ("H2O", 0.018_02),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(IdealGasMixture::new(Vec::<(&str, f64)>::new()).is_err());
        assert!(IdealGasMixture::new(vec![("X", -1.0)]).is_err());
        assert!(IdealGasMixture::new(vec![("X", f64::NAN)]).is_err());
    }

    #[test]
    fn pure_species_weight() {
        let gas = methane_air();
        let y = [0.0, 0.0, 1.0, 0.0, 0.0];
        let w = gas.mixture_weight(&y).unwrap();
        assert!((w - 0.028_01).abs() < 1e-12);
    }

    #[test]
    fn mixture_weight_is_harmonic_mean() {
        let gas = IdealGasMixture::new(vec![("A", 0.002), ("B", 0.032)]).unwrap();
        // Equal mass fractions: W = 1 / (0.5/Wa + 0.5/Wb)
        let w = gas.mixture_weight(&[0.5, 0.5]).unwrap();
        let expected = 1.0 / (0.5 / 0.002 + 0.5 / 0.032);
        assert!((w - expected).abs() < 1e-15);
    }

    #[test]
    fn mixture_weight_rejects_bad_fractions() {
        let gas = methane_air();
        assert!(matches!(
            gas.mixture_weight(&[1.0, 0.0]),
            Err(ThermoError::SizeMismatch { .. })
        ));
        assert!(gas.mixture_weight(&[0.0; 5]).is_err());
        assert!(gas.mixture_weight(&[0.2, -0.1, 0.9, 0.0, 0.0]).is_err());
    }

    #[test]
    fn ideal_gas_density_air_at_stp() {
        let gas = methane_air();
        let rho = gas.density(101_325.0, 300.0, 0.029);
        assert!((rho - 101_325.0 * 0.029 / (8.314_462_618 * 300.0)).abs() < 1e-12);
        assert!((rho - 1.178).abs() < 1e-2);
    }

    proptest! {
        #[test]
        fn weight_invariant_under_scaling(
            y0 in 1e-6..1.0f64,
            y1 in 1e-6..1.0f64,
            scale in 0.1..10.0f64,
        ) {
            let gas = IdealGasMixture::new(vec![("A", 0.002), ("B", 0.032)]).unwrap();
            let w = gas.mixture_weight(&[y0, y1]).unwrap();
            let ws = gas.mixture_weight(&[y0 * scale, y1 * scale]).unwrap();
            prop_assert!((w - ws).abs() < 1e-9 * w);
        }
    }
}
