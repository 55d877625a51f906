//! Continuity boundary condition for the UTW sub-system.
//!
//! The integrated continuity equation needs an anchor: either the left
//! boundary mass flux, a floating stagnation point where rV crosses zero, or
//! the heat-release peak. The active variant carries its anchor data and is
//! constant within one solver step; transitions happen only between steps
//! through the coordinator.

/// Requested anchor mode for a boundary-condition update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContinuityBcKind {
    /// Integrate rightward from the prescribed left mass flux.
    Left,
    /// Anchor rV = 0 at a floating stagnation point.
    Zero,
    /// Anchor rV = 0 at the heat-release peak.
    Qdot,
}

/// Active continuity boundary condition with its anchor data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContinuityBc {
    Left,
    Zero {
        /// Stagnation location, between `x[j_anchor]` and `x[j_anchor + 1]`.
        x_vzero: f64,
        j_anchor: usize,
    },
    Qdot { j_anchor: usize },
}

impl ContinuityBc {
    pub fn kind(&self) -> ContinuityBcKind {
        match self {
            ContinuityBc::Left => ContinuityBcKind::Left,
            ContinuityBc::Zero { .. } => ContinuityBcKind::Zero,
            ContinuityBc::Qdot { .. } => ContinuityBcKind::Qdot,
        }
    }

    /// Anchor node index, when the variant carries one.
    pub fn anchor(&self) -> Option<usize> {
        match *self {
            ContinuityBc::Left => None,
            ContinuityBc::Zero { j_anchor, .. } | ContinuityBc::Qdot { j_anchor } => Some(j_anchor),
        }
    }
}

/// First index `j` (from the left) where `rv[j]` and `rv[j + 1]` have
/// opposite signs.
pub(crate) fn first_sign_change(rv: &[f64]) -> Option<usize> {
    rv.windows(2).position(|w| w[0] * w[1] < 0.0)
}

/// Index of the largest finite entry.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (j, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, bv)| v > bv) {
            best = Some((j, v));
        }
    }
    best.map(|(j, _)| j)
}
