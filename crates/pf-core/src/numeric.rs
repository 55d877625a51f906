use crate::error::{CoreError, CoreResult};

/// Floating point type used throughout the solver.
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> CoreResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Check that every element of a slice is finite.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> CoreResult<()> {
    for &v in values {
        ensure_finite(v, what)?;
    }
    Ok(())
}
