//! ML Model Training Pipeline
//!
//! Chronological split, fit, held-out evaluation and optional grid search
//! over time-series folds.

use chrono::Utc;
use itertools::iproduct;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{fit, ModelMetadata, ModelParams, TrainedModel};
use super::split::{chronological_split, TimeSeriesSplit};
use super::{Dataset, FeatureSpec, Target};
use crate::config::{ModelKind, TrainingConfig};
use crate::forecast::metrics::ForecastMetrics;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("insufficient training data for {target}: {rows} usable rows")]
    InsufficientData { target: Target, rows: usize },

    #[error("insufficient training data for {0}: target is constant over the training window")]
    ConstantTarget(Target),

    #[error("model fit failed: {0}")]
    Fit(String),

    #[error("test fraction must be strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),
}

/// Model Trainer
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit `target` on the leading rows of `data` and score it on the
    /// trailing test window.
    pub fn train(
        &self,
        target: Target,
        spec: &FeatureSpec,
        data: &Dataset,
    ) -> Result<TrainedModel, TrainingError> {
        if spec.is_empty() {
            return Err(TrainingError::Fit(format!("no usable features for {target}")));
        }

        let split = chronological_split(&data.dates, self.config.test_fraction)?;
        let train = data.slice(split.train.clone());
        let test = data.slice(split.test.clone());
        self.check_trainable(target, &train)?;

        if target == Target::GasDemand
            && self.config.model == ModelKind::RandomForest
            && !self.config.gas_monotone.is_empty()
        {
            warn!(
                constraints = self.config.gas_monotone.len(),
                "random forest backend ignores monotone constraints"
            );
        }

        let base = ModelParams::from_config(&self.config);
        let params = if self.config.search.enabled && base.kind == ModelKind::RandomForest {
            self.search(target, base, &train)
        } else {
            base
        };

        let regressor = fit(&params, &train.x, &train.y)
            .map_err(|e| TrainingError::Fit(e.to_string()))?;

        let holdout = if test.is_empty() {
            warn!(%target, "empty test window, no held-out metrics");
            None
        } else {
            let predicted = regressor
                .predict(&test.x)
                .map_err(|e| TrainingError::Fit(e.to_string()))?;
            ForecastMetrics::calculate(&test.y, &predicted).ok()
        };

        info!(
            %target,
            train_rows = train.len(),
            test_rows = test.len(),
            mae = holdout.as_ref().map(|m| m.mae),
            r2 = holdout.as_ref().map(|m| m.r2),
            "model trained"
        );

        let metadata = ModelMetadata {
            model_id: format!("{}-{}", target, Utc::now().format("%Y%m%dT%H%M%S")),
            target,
            params,
            trained_at: Utc::now(),
            training_samples: train.len(),
            test_samples: test.len(),
            train_start: train.dates.first().copied(),
            train_end: train.dates.last().copied(),
            feature_names: spec.names(),
            holdout,
        };
        Ok(TrainedModel::new(spec.clone(), metadata, regressor))
    }

    fn check_trainable(&self, target: Target, train: &Dataset) -> Result<(), TrainingError> {
        let min_rows = self.config.min_training_rows.max(1);
        if train.len() < min_rows {
            return Err(TrainingError::InsufficientData {
                target,
                rows: train.len(),
            });
        }
        let first = train.y[0];
        if train.y.iter().all(|v| (v - first).abs() < f64::EPSILON) {
            return Err(TrainingError::ConstantTarget(target));
        }
        Ok(())
    }

    /// Grid search scored by mean MAE over expanding-window folds of the
    /// training block. Falls back to `base` when no fold can be formed.
    fn search(&self, target: Target, base: ModelParams, train: &Dataset) -> ModelParams {
        let search = &self.config.search;
        let folds = TimeSeriesSplit::new(search.n_splits).split(train.len());
        if folds.is_empty() {
            warn!(%target, rows = train.len(), "too few rows for time-series folds, skipping search");
            return base;
        }

        let mut best: Option<(f64, ModelParams)> = None;
        for (&n_trees, &max_depth, &min_samples_leaf) in
            iproduct!(&search.n_trees, &search.max_depth, &search.min_samples_leaf)
        {
            let candidate = ModelParams {
                n_trees,
                max_depth: Some(max_depth),
                min_samples_leaf,
                ..base
            };

            let mut total = 0.0;
            let mut scored = 0usize;
            for fold in &folds {
                let tr = train.slice(fold.train.clone());
                let te = train.slice(fold.test.clone());
                let Ok(model) = fit(&candidate, &tr.x, &tr.y) else {
                    continue;
                };
                let Ok(pred) = model.predict(&te.x) else {
                    continue;
                };
                if let Ok(m) = ForecastMetrics::calculate(&te.y, &pred) {
                    total += m.mae;
                    scored += 1;
                }
            }
            if scored == 0 {
                continue;
            }
            let score = total / scored as f64;
            debug!(%target, n_trees, max_depth, min_samples_leaf, score, "search candidate");
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, candidate));
            }
        }

        match best {
            Some((score, params)) => {
                info!(%target, ?params, cv_mae = score, "hyperparameters selected");
                params
            }
            None => base,
        }
    }
}
