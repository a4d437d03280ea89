//! Everything one session needs to answer forecast requests.
//!
//! A [`PipelineContext`] is rebuilt whenever the dataset changes and is never
//! mutated afterwards, so handlers can share it behind an `Arc` while a
//! rebuild runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{
    DatasetStats, DayWeather, ForecastRequest, ForecastResult, GasForecastRequest,
    GasForecastResult, Observation, RecursiveForecastRequest, RecursiveForecastResult,
};
use crate::forecast::engine::{complete_temperatures, resolve_date};
use crate::forecast::features::{DayInputs, FeaturePipeline, FeatureTable, LagInputs};
use crate::forecast::metrics::confidence_from_r2;
use crate::forecast::{
    forecast_one, ForecastError, ForecastMetrics, ForecastQuality, HistoricalContext,
    RecursiveForecaster,
};
use crate::ml::cache::ModelCache;
use crate::ml::{ModelTrainer, Target, TrainedModel};

/// Observations, derived features and the models trained on them.
#[derive(Debug)]
pub struct PipelineContext {
    config: Arc<Config>,
    observations: Vec<Observation>,
    pipeline: FeaturePipeline,
    table: FeatureTable,
    models: BTreeMap<Target, TrainedModel>,
    unavailable: BTreeMap<Target, String>,
}

/// Per-target report for the models endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub target: Target,
    pub model_id: String,
    pub features: Vec<String>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub holdout: Option<ForecastMetrics>,
    pub quality: ForecastQuality,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsReport {
    pub quality: ForecastQuality,
    pub models: Vec<ModelSummary>,
    /// Targets without a model and why.
    pub unavailable: BTreeMap<Target, String>,
}

impl PipelineContext {
    /// Derive features from `observations` (ascending, unique dates) and train
    /// every target the data supports.
    ///
    /// Peak demand is always attempted; minimum demand needs its column and
    /// gas needs both gas and solar columns. A target that cannot be trained
    /// is recorded as unavailable rather than failing the whole build.
    pub fn build(
        config: Arc<Config>,
        observations: Vec<Observation>,
        cache: &mut ModelCache,
    ) -> Result<Self, ForecastError> {
        let pipeline = FeaturePipeline::new(&config.features);
        let table = pipeline.build(&observations, config.training.test_fraction)?;
        let trainer = ModelTrainer::new(config.training.clone());

        let mut models = BTreeMap::new();
        let mut unavailable = BTreeMap::new();
        for target in Target::iter() {
            let skip = match target {
                Target::PeakDemand => None,
                Target::MinDemand => (!table.presence.min_demand).then_some("min_demand column absent"),
                Target::GasDemand => {
                    (!table.presence.has_gas()).then_some("gas_demand or solar_peak column absent")
                }
            };
            if let Some(reason) = skip {
                info!(%target, reason, "model not trained");
                unavailable.insert(target, reason.to_string());
                continue;
            }

            let spec = pipeline.spec_for(target, &table.presence);
            let data = table.dataset(&spec, target);
            match cache.get_or_train(&trainer, target, &spec, &data) {
                Ok(model) => {
                    models.insert(target, model);
                }
                Err(e) => {
                    warn!(%target, error = %e, "model unavailable");
                    unavailable.insert(target, e.to_string());
                }
            }
        }

        Ok(Self {
            config,
            observations,
            pipeline,
            table,
            models,
            unavailable,
        })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn features(&self) -> &FeatureTable {
        &self.table
    }

    pub fn model(&self, target: Target) -> Result<&TrainedModel, ForecastError> {
        self.models
            .get(&target)
            .ok_or(ForecastError::ModelUnavailable(target))
    }

    pub fn unavailable(&self) -> &BTreeMap<Target, String> {
        &self.unavailable
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats::compute(&self.observations)
    }

    /// Day after the last observation, or today in the configured zone when
    /// there is no data.
    pub fn reference_date(&self) -> NaiveDate {
        match self.observations.last() {
            Some(o) => o.date + Duration::days(1),
            None => Utc::now()
                .with_timezone(&self.config.forecast.timezone)
                .date_naive(),
        }
    }

    fn confidence(&self, model: &TrainedModel) -> f64 {
        let fc = &self.config.forecast;
        confidence_from_r2(model.r2(), fc.confidence_floor, fc.confidence_ceiling)
    }

    /// History strictly before `date`, so back-dated requests never see
    /// their own actuals.
    fn history_before(&self, date: NaiveDate) -> HistoricalContext<'_> {
        let end = self.observations.partition_point(|o| o.date < date);
        HistoricalContext::from_history(
            &self.observations[..end],
            &self.table.lookup,
            self.config.forecast.history_buffer_days,
        )
    }

    fn day_inputs(&self, weather: &DayWeather, date: NaiveDate) -> DayInputs {
        let mut day = weather.day_inputs(date);
        complete_temperatures(&mut day, self.config.forecast.avg_temp_spread_c);
        day
    }

    pub fn forecast(&self, req: &ForecastRequest) -> Result<ForecastResult, ForecastError> {
        let peak = self.model(Target::PeakDemand)?;
        let date = resolve_date(req.date, req.weekday, req.month, self.reference_date())?;
        let day = self.day_inputs(&req.weather, date);
        let history = self.history_before(date);

        let peak_demand = forecast_one(peak, &self.pipeline, &day, &history, None)?;
        let (min_demand, min_confidence) = match self.models.get(&Target::MinDemand) {
            Some(model) => (
                Some(forecast_one(model, &self.pipeline, &day, &history, None)?),
                Some(self.confidence(model)),
            ),
            None => (None, None),
        };

        let row = self.pipeline.derive_row(&day, LagInputs::default(), None);
        Ok(ForecastResult {
            date,
            weekday: row.weekday,
            is_holiday: row.is_holiday,
            is_business_day: row.is_business_day,
            peak_demand,
            confidence: self.confidence(peak),
            min_demand,
            min_confidence,
        })
    }

    /// Chain one-day forecasts from `start_date` (default: the reference
    /// date), up to the configured horizon.
    pub fn forecast_recursive(
        &self,
        req: &RecursiveForecastRequest,
    ) -> Result<RecursiveForecastResult, ForecastError> {
        let horizon = self.config.forecast.max_horizon_days;
        if req.days.is_empty() || req.days.len() > horizon {
            return Err(ForecastError::InvalidInput(format!(
                "between 1 and {horizon} days can be forecast, got {}",
                req.days.len()
            )));
        }
        let peak = self.model(Target::PeakDemand)?;
        let min = self.models.get(&Target::MinDemand);

        let start = req.start_date.unwrap_or_else(|| self.reference_date());
        let inputs: Vec<DayInputs> = req
            .days
            .iter()
            .enumerate()
            .map(|(i, w)| self.day_inputs(w, start + Duration::days(i as i64)))
            .collect();

        let history = self.history_before(start);
        let days = RecursiveForecaster::new(&self.pipeline, peak, min).run(&inputs, &history)?;
        Ok(RecursiveForecastResult {
            days,
            confidence: self.confidence(peak),
        })
    }

    pub fn forecast_gas(&self, req: &GasForecastRequest) -> Result<GasForecastResult, ForecastError> {
        let model = self.model(Target::GasDemand)?;
        let date = req.date.unwrap_or_else(|| self.reference_date());
        let mut day = self.day_inputs(&req.weather, date);
        day.peak_demand = Some(req.peak_demand);
        day.solar_peak = Some(req.solar_peak);

        let history = self.history_before(date);
        let budget = self.table.budget.as_ref();
        let gas_demand = forecast_one(model, &self.pipeline, &day, &history, budget)?;

        let row = self.pipeline.derive_row(&day, LagInputs::default(), budget);
        Ok(GasForecastResult {
            date,
            gas_demand,
            budgeted_gas_target: row.budgeted_gas_target,
            confidence: self.confidence(model),
        })
    }

    pub fn models_report(&self) -> ModelsReport {
        let models: Vec<ModelSummary> = self
            .models
            .values()
            .map(|m| {
                let meta = m.metadata();
                ModelSummary {
                    target: m.target(),
                    model_id: meta.model_id.clone(),
                    features: meta.feature_names.clone(),
                    training_samples: meta.training_samples,
                    test_samples: meta.test_samples,
                    holdout: meta.holdout.clone(),
                    quality: ForecastQuality::from_r2(m.r2()),
                    confidence: self.confidence(m),
                }
            })
            .collect();

        ModelsReport {
            quality: ForecastQuality::summarize(self.models.values().filter_map(|m| m.r2())),
            models,
            unavailable: self.unavailable.clone(),
        }
    }
}
