//! Split-operator convection for a 1D strained premixed flame.
//!
//! The convection split advances a coupled (U, T, Wmx) sub-system whose
//! continuity equation determines the mass flux V, then a family of
//! single-species transport sub-systems that read the velocity field the UTW
//! phase published. Provides:
//! - Time-series and quasi-2D bilinear velocity interpolation
//! - The UTW sub-system with a switchable continuity boundary condition
//! - Per-species transport on independent node sub-domains
//! - The [`SplitConvection`] coordinator driving both phases to a common end
//!   time with independent integrator tolerances

pub mod bc;
pub mod coordinator;
pub mod error;
pub mod species;
pub mod utw;
pub mod velocity;

pub use bc::{ContinuityBc, ContinuityBcKind};
pub use coordinator::{ConvectionConfig, SplitConvection};
pub use error::{ConvectionError, ConvectionResult};
pub use species::SpeciesSystem;
pub use utw::UtwSystem;
pub use velocity::{BilinearField, VelocitySource, VelocityTimeSeries};
