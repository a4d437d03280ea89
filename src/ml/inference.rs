//! Feature alignment before inference.
//!
//! A model fit on N ordered features only ever receives rows of exactly
//! those N features in that order. Missing features take the neutral fill,
//! extra inputs are dropped.

use serde::Serialize;
use tracing::debug;

use super::FeatureSpec;
use crate::forecast::features::{FeatureId, FeatureRow};

/// Value used for a feature the input row does not supply.
pub const NEUTRAL_FILL: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    ids: Vec<FeatureId>,
    values: Vec<f64>,
}

impl AlignedRow {
    pub fn ids(&self) -> &[FeatureId] {
        &self.ids
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Back to `(feature, value)` pairs, e.g. to re-align.
    pub fn pairs(&self) -> Vec<(FeatureId, f64)> {
        self.ids.iter().copied().zip(self.values.iter().copied()).collect()
    }
}

/// Reorder and fill `input` to match `spec` exactly.
///
/// The first occurrence of a feature wins; non-finite values count as
/// missing.
pub fn align(input: &[(FeatureId, f64)], spec: &FeatureSpec) -> AlignedRow {
    let mut filled = 0usize;
    let values: Vec<f64> = spec
        .ids()
        .iter()
        .map(|id| {
            input
                .iter()
                .find(|(k, _)| k == id)
                .map(|(_, v)| *v)
                .filter(|v| v.is_finite())
                .unwrap_or_else(|| {
                    filled += 1;
                    NEUTRAL_FILL
                })
        })
        .collect();

    if filled > 0 {
        debug!(filled, expected = spec.len(), "neutral fill applied during alignment");
    }

    AlignedRow {
        ids: spec.ids().to_vec(),
        values,
    }
}

pub fn align_row(row: &FeatureRow, spec: &FeatureSpec) -> AlignedRow {
    align(&row.named_values(), spec)
}
