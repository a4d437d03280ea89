//! Forecast Metrics and Evaluation
//!
//! Held-out accuracy of a trained model (MAE, RMSE, MAPE, R²) and the
//! coarse quality verdicts reported alongside forecasts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Held-out accuracy of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent, averaged over days with non-zero demand.
    pub mape: f64,
    pub r2: f64,
    pub sample_count: usize,
    pub max_error: f64,
}

impl ForecastMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::LengthMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        let n = actual.len();
        if n == 0 {
            return Err(ForecastMetricsError::NoSamples);
        }

        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
        let max_error = residuals.iter().fold(0.0f64, |m, r| m.max(r.abs()));

        // Days with zero demand carry no percentage error
        let (pct_sum, pct_n) = actual
            .iter()
            .zip(&residuals)
            .filter(|(a, _)| a.abs() > 1e-6)
            .fold((0.0, 0usize), |(s, c), (a, r)| (s + r.abs() / a.abs() * 100.0, c + 1));
        let mape = if pct_n == 0 { 0.0 } else { pct_sum / pct_n as f64 };

        let mean = actual.iter().sum::<f64>() / n as f64;
        let sst: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if sst > 1e-10 { 1.0 - sse / sst } else { 0.0 };

        Ok(ForecastMetrics {
            mae,
            rmse: (sse / n as f64).sqrt(),
            mape,
            r2,
            sample_count: n,
            max_error,
        })
    }

    /// Percentage confidence shown with a forecast: R² scaled to percent,
    /// clamped to `[floor, ceiling]`.
    pub fn confidence(&self, floor: f64, ceiling: f64) -> f64 {
        confidence_from_r2(Some(self.r2), floor, ceiling)
    }
}

/// Without held-out metrics the floor is reported.
pub fn confidence_from_r2(r2: Option<f64>, floor: f64, ceiling: f64) -> f64 {
    match r2.filter(|v| v.is_finite()) {
        Some(r2) => (r2 * 100.0).clamp(floor, ceiling.max(floor)),
        None => floor,
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mae={:.1} rmse={:.1} mape={:.2}% r2={:.3} ({:?})",
            self.sample_count,
            self.mae,
            self.rmse,
            self.mape,
            self.r2,
            ForecastQuality::from_r2(Some(self.r2))
        )
    }
}

/// Overall model quality verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastQuality {
    Good,    // R² > 0.8
    Fair,    // R² > 0.6
    Poor,
    Pending, // nothing evaluated yet
}

impl ForecastQuality {
    pub fn from_r2(r2: Option<f64>) -> Self {
        match r2 {
            Some(r) if r > 0.8 => ForecastQuality::Good,
            Some(r) if r > 0.6 => ForecastQuality::Fair,
            Some(_) => ForecastQuality::Poor,
            None => ForecastQuality::Pending,
        }
    }

    /// Worst verdict across all evaluated models.
    pub fn summarize<I>(r2s: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        r2s.into_iter()
            .map(|r| Self::from_r2(Some(r)))
            .max_by_key(|q| match q {
                ForecastQuality::Good => 0,
                ForecastQuality::Fair => 1,
                ForecastQuality::Poor => 2,
                ForecastQuality::Pending => 3,
            })
            .unwrap_or(ForecastQuality::Pending)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("{actual} actual values but {predicted} predictions")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("no samples to evaluate")]
    NoSamples,
}
