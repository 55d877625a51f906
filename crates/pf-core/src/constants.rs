//! Physical constants.
//!
//! Mixture molecular weights are carried in kg/mol throughout the workspace,
//! so the matching universal gas constant is in J/(mol·K).

/// Universal gas constant [J/(mol·K)].
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Standard atmospheric pressure [Pa].
pub const STANDARD_PRESSURE: f64 = 101_325.0;
