use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of the shared numeric checks. Everything domain-specific lives
/// in the owning crate's error type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
