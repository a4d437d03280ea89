pub mod budget;
pub mod calendar;
pub mod engine;
pub mod features;
pub mod lookup;
pub mod metrics;

use thiserror::Error;

use crate::ml::Target;

pub use engine::{forecast_one, DayForecast, HistoricalContext, RecursiveForecaster};
pub use features::{DayInputs, FeatureId, FeaturePipeline, FeatureRow, FeatureTable};
pub use metrics::{ForecastMetrics, ForecastQuality};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("no trained model for {0}")]
    ModelUnavailable(Target),

    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}
