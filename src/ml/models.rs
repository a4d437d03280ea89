//! Regressor backends and the trained-model handle.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::inference::{align_row, AlignedRow};
use super::smartcore::SmartcoreRandomForest;
use super::{FeatureSpec, Target};
use crate::config::{ModelKind, TrainingConfig};
use crate::forecast::features::FeatureRow;
use crate::forecast::metrics::ForecastMetrics;
use crate::forecast::ForecastError;

/// Anything that maps aligned feature rows to predictions.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Predict one value per row. Rows are already aligned to the model's
    /// feature specification.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn kind(&self) -> ModelKind;
}

/// Hyperparameters for a single fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModelParams {
    pub kind: ModelKind,
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl ModelParams {
    pub fn from_config(cfg: &TrainingConfig) -> Self {
        Self {
            kind: cfg.model,
            n_trees: cfg.n_trees,
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            min_samples_leaf: cfg.min_samples_leaf,
            seed: cfg.seed,
        }
    }
}

/// Fit the backend selected by `params.kind`.
pub fn fit(params: &ModelParams, x: &[Vec<f64>], y: &[f64]) -> Result<Arc<dyn Regressor>> {
    Ok(match params.kind {
        ModelKind::RandomForest => Arc::new(SmartcoreRandomForest::train(x, y, params)?),
        ModelKind::Mean => Arc::new(MeanRegressor::fit(y)?),
    })
}

/// Predicts the training mean for every row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanRegressor {
    pub mean: f64,
}

impl MeanRegressor {
    pub fn fit(y: &[f64]) -> Result<Self> {
        if y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }
        Ok(Self {
            mean: y.iter().sum::<f64>() / y.len() as f64,
        })
    }
}

impl Regressor for MeanRegressor {
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(vec![self.mean; x.len()])
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Mean
    }
}

/// Metadata reported for a trained model
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub target: Target,
    pub params: ModelParams,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub train_start: Option<NaiveDate>,
    pub train_end: Option<NaiveDate>,
    pub feature_names: Vec<String>,
    /// Held-out metrics; `None` when the test window was empty.
    pub holdout: Option<ForecastMetrics>,
}

/// A fitted regressor bound to the exact feature list it was fit on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    spec: FeatureSpec,
    metadata: ModelMetadata,
    regressor: Arc<dyn Regressor>,
}

impl TrainedModel {
    pub fn new(spec: FeatureSpec, metadata: ModelMetadata, regressor: Arc<dyn Regressor>) -> Self {
        Self {
            spec,
            metadata,
            regressor,
        }
    }

    pub fn target(&self) -> Target {
        self.metadata.target
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn r2(&self) -> Option<f64> {
        self.metadata.holdout.as_ref().map(|m| m.r2)
    }

    pub fn predict_aligned(&self, row: &AlignedRow) -> Result<f64, ForecastError> {
        if row.ids() != self.spec.ids() {
            return Err(ForecastError::Prediction(format!(
                "row aligned to a different feature list than the {} model",
                self.target()
            )));
        }
        let x = vec![row.values().to_vec()];
        let out = self
            .regressor
            .predict(&x)
            .map_err(|e| ForecastError::Prediction(e.to_string()))?;
        match out.first() {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => Err(ForecastError::Prediction(format!("non-finite prediction {v}"))),
            None => Err(ForecastError::Prediction("model returned no prediction".to_string())),
        }
    }

    /// Align `row` to this model's features and predict.
    pub fn predict_row(&self, row: &FeatureRow) -> Result<f64, ForecastError> {
        self.predict_aligned(&align_row(row, &self.spec))
    }

    /// Batch prediction over already aligned rows.
    pub fn predict_matrix(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.regressor.predict(x)
    }
}
