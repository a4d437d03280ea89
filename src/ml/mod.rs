//! Machine Learning Module
//!
//! Model fitting and inference for the daily demand targets:
//! - Peak electricity demand
//! - Minimum electricity demand
//! - Gas demand
//!
//! # Architecture
//! - [`FeatureSpec`] is the single ordered feature list shared by training
//!   and inference
//! - Chronological splitting and time-series cross-validation in [`split`]
//! - Fitting, held-out evaluation and grid search in [`training`]
//! - Feature alignment before prediction in [`inference`]
//! - Memoised training in [`cache`]

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::forecast::features::FeatureId;

pub mod cache;
pub mod inference;
pub mod models;
pub mod smartcore;
pub mod split;
pub mod training;

pub use models::{ModelMetadata, ModelParams, TrainedModel};
pub use training::{ModelTrainer, TrainingError};

/// What a model predicts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    PeakDemand,
    MinDemand,
    GasDemand,
}

/// Ordered, duplicate-free list of features a model is fit on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSpec(Vec<FeatureId>);

impl FeatureSpec {
    /// Later duplicates are dropped; first-seen order is kept.
    pub fn new(ids: Vec<FeatureId>) -> Self {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    pub fn ids(&self) -> &[FeatureId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.0.contains(&id)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|id| id.to_string()).collect()
    }
}

/// Date-ordered design matrix for one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub dates: Vec<NaiveDate>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn slice(&self, range: Range<usize>) -> Dataset {
        Dataset {
            dates: self.dates[range.clone()].to_vec(),
            x: self.x[range.clone()].to_vec(),
            y: self.y[range].to_vec(),
        }
    }
}
