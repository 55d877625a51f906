//! Error types for mixture property evaluation.

use thiserror::Error;

/// Errors from mixture definitions and property queries.
#[derive(Error, Debug)]
pub enum ThermoError {
    #[error("Invalid mixture definition: {what}")]
    InvalidMixture { what: &'static str },

    #[error("Non-physical composition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Mass fraction count mismatch: got {len}, mixture has {n_species} species")]
    SizeMismatch { len: usize, n_species: usize },
}

pub type ThermoResult<T> = Result<T, ThermoError>;
