//! Ideal-gas mixture properties for the convection core.
//!
//! The convection split needs exactly two properties of the reacting mixture:
//! the mixture molecular weight from species mass fractions, and the ideal-gas
//! density from pressure, temperature, and molecular weight. The
//! [`MixtureModel`] trait is that contract; richer kinetics packages plug in
//! behind it.

pub mod error;
pub mod mixture;

pub use error::{ThermoError, ThermoResult};
pub use mixture::{IdealGasMixture, MixtureModel};
