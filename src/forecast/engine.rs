//! Single-day and recursive multi-day inference.
//!
//! Both paths build lags from a [`HistoricalContext`] and rows through
//! [`FeaturePipeline::derive_row`], so the first day of a recursive run is
//! exactly the standalone one-day forecast.

use std::collections::VecDeque;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use tracing::debug;

use super::budget::GasBudget;
use super::features::{DayInputs, FeatureId, FeaturePipeline, LagInputs};
use super::lookup::MonthWeekdayLookup;
use super::ForecastError;
use crate::domain::Observation;
use crate::ml::{TrainedModel, Target};

/// One day of actual or forecast demand kept for lag lookups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub peak_demand: f64,
    pub min_demand: Option<f64>,
    pub gas_demand: Option<f64>,
}

/// Rolling window of the most recent days, plus the last-year lookup.
#[derive(Debug, Clone)]
pub struct HistoricalContext<'a> {
    days: VecDeque<HistoryDay>,
    capacity: usize,
    lookup: &'a MonthWeekdayLookup,
}

impl<'a> HistoricalContext<'a> {
    pub fn new(lookup: &'a MonthWeekdayLookup, capacity: usize) -> Self {
        let capacity = capacity.max(7);
        Self {
            days: VecDeque::with_capacity(capacity),
            capacity,
            lookup,
        }
    }

    /// Seed from the tail of date-ordered observations.
    pub fn from_history(
        observations: &[Observation],
        lookup: &'a MonthWeekdayLookup,
        capacity: usize,
    ) -> Self {
        let mut ctx = Self::new(lookup, capacity);
        let skip = observations.len().saturating_sub(ctx.capacity);
        for o in &observations[skip..] {
            ctx.push(HistoryDay {
                date: o.date,
                peak_demand: o.peak_demand,
                min_demand: o.min_demand,
                gas_demand: o.gas_demand,
            });
        }
        ctx
    }

    pub fn push(&mut self, day: HistoryDay) {
        if self.days.len() == self.capacity {
            self.days.pop_front();
        }
        self.days.push_back(day);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.back().map(|d| d.date)
    }

    pub fn days(&self) -> impl Iterator<Item = &HistoryDay> {
        self.days.iter()
    }

    /// Lags for `date`, read from the buffer as it stands.
    pub fn lags_for(&self, date: NaiveDate) -> LagInputs {
        let n = self.days.len();
        let last = self.days.back();
        let before_last = n.checked_sub(2).and_then(|i| self.days.get(i));
        let week_ago = date - Duration::days(7);

        LagInputs {
            yesterday_peak_demand: last.map(|d| d.peak_demand),
            same_weekday_last_week_peak_demand: self
                .days
                .iter()
                .find(|d| d.date == week_ago)
                .map(|d| d.peak_demand),
            same_weekday_last_year_peak_demand: self.lookup.same_weekday_last_year(date),
            rolling7_peak_demand: (n >= 7)
                .then(|| self.days.iter().skip(n - 7).map(|d| d.peak_demand).sum::<f64>() / 7.0),
            yesterday_min_demand: last.and_then(|d| d.min_demand),
            yesterday_gas_demand: last.and_then(|d| d.gas_demand),
            day_before_gas_demand: before_last.and_then(|d| d.gas_demand),
        }
    }
}

/// Fill missing temperatures from the ones supplied.
///
/// Average only: high/low are `avg ± spread`. High and low without an
/// average: the average is their midpoint.
pub fn complete_temperatures(day: &mut DayInputs, spread: f64) {
    if let Some(avg) = day.avg_temp {
        if day.high_temp.is_none() && day.low_temp.is_none() {
            day.high_temp = Some(avg + spread);
            day.low_temp = Some(avg - spread);
        }
    } else if let (Some(h), Some(l)) = (day.high_temp, day.low_temp) {
        day.avg_temp = Some((h + l) / 2.0);
    }
}

/// Reject requests that lack an input the model needs for this season.
pub fn validate_inputs(
    pipeline: &FeaturePipeline,
    model: &TrainedModel,
    day: &DayInputs,
) -> Result<(), ForecastError> {
    let spec = model.spec();
    let month = day.date.month();

    for (name, value) in [
        ("high_temp", day.high_temp),
        ("avg_temp", day.avg_temp),
        ("low_temp", day.low_temp),
        ("feels_like_temp", day.feels_like_temp),
        ("peak_demand", day.peak_demand),
        ("solar_peak", day.solar_peak),
    ] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidInput(format!("{name} must be a finite number")));
        }
    }

    if pipeline.is_summer(month)
        && spec.contains(FeatureId::CoolingIntensity)
        && day.feels_like_temp.or(day.high_temp).is_none()
    {
        return Err(ForecastError::MissingInput(format!(
            "month {month} needs feels_like_temp or high_temp"
        )));
    }
    if pipeline.is_winter(month)
        && spec.contains(FeatureId::HeatingIntensity)
        && day.low_temp.is_none()
    {
        return Err(ForecastError::MissingInput(format!("month {month} needs low_temp")));
    }

    if model.target() == Target::GasDemand {
        if day.peak_demand.is_none() {
            return Err(ForecastError::MissingInput("peak_demand".to_string()));
        }
        if day.solar_peak.is_none() {
            return Err(ForecastError::MissingInput("solar_peak".to_string()));
        }
        if day.peak_demand.is_some_and(|p| p < 0.0) || day.solar_peak.is_some_and(|s| s < 0.0) {
            return Err(ForecastError::InvalidInput(
                "peak_demand and solar_peak must be non-negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn clip(target: Target, value: f64, day: &DayInputs) -> f64 {
    match target {
        Target::GasDemand => value.clamp(0.0, day.peak_demand.unwrap_or(f64::MAX).max(0.0)),
        Target::PeakDemand | Target::MinDemand => value.max(0.0),
    }
}

/// Point forecast for one day.
pub fn forecast_one(
    model: &TrainedModel,
    pipeline: &FeaturePipeline,
    day: &DayInputs,
    history: &HistoricalContext<'_>,
    budget: Option<&GasBudget>,
) -> Result<f64, ForecastError> {
    validate_inputs(pipeline, model, day)?;
    let row = pipeline.derive_row(day, history.lags_for(day.date), budget);
    let raw = model.predict_row(&row)?;
    let value = clip(model.target(), raw, day);
    debug!(target = %model.target(), date = %day.date, raw, value, "forecast");
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub is_business_day: bool,
    pub peak_demand: f64,
    pub min_demand: Option<f64>,
}

/// Chains one-day forecasts, feeding each day's output back as the next
/// day's lags.
pub struct RecursiveForecaster<'a> {
    pipeline: &'a FeaturePipeline,
    peak: &'a TrainedModel,
    min: Option<&'a TrainedModel>,
}

impl<'a> RecursiveForecaster<'a> {
    pub fn new(
        pipeline: &'a FeaturePipeline,
        peak: &'a TrainedModel,
        min: Option<&'a TrainedModel>,
    ) -> Self {
        Self { pipeline, peak, min }
    }

    /// Forecast each of `days` in order. The buffer is a private copy; the
    /// caller's history is not modified.
    pub fn run(
        &self,
        days: &[DayInputs],
        history: &HistoricalContext<'_>,
    ) -> Result<Vec<DayForecast>, ForecastError> {
        let mut buffer = history.clone();
        let mut out = Vec::with_capacity(days.len());

        for day in days {
            let peak = forecast_one(self.peak, self.pipeline, day, &buffer, None)?;
            let min = match self.min {
                Some(model) => Some(forecast_one(model, self.pipeline, day, &buffer, None)?),
                None => None,
            };

            let row = self
                .pipeline
                .derive_row(day, LagInputs::default(), None);
            out.push(DayForecast {
                date: day.date,
                weekday: row.weekday,
                is_business_day: row.is_business_day,
                peak_demand: peak,
                min_demand: min,
            });
            buffer.push(HistoryDay {
                date: day.date,
                peak_demand: peak,
                min_demand: min,
                gas_demand: None,
            });
        }
        Ok(out)
    }
}

/// Pick the forecast date.
///
/// An explicit date must agree with any weekday/month given alongside it.
/// Without one, the first date on or after `reference` matching the
/// requested weekday and month is used.
pub fn resolve_date(
    date: Option<NaiveDate>,
    weekday: Option<Weekday>,
    month: Option<u32>,
    reference: NaiveDate,
) -> Result<NaiveDate, ForecastError> {
    if let Some(m) = month {
        if !(1..=12).contains(&m) {
            return Err(ForecastError::InvalidInput(format!("month {m} out of range")));
        }
    }
    let matches = |d: NaiveDate| {
        weekday.map_or(true, |w| d.weekday() == w) && month.map_or(true, |m| d.month() == m)
    };

    if let Some(d) = date {
        if !matches(d) {
            return Err(ForecastError::InvalidInput(format!(
                "date {d} does not match the requested weekday/month"
            )));
        }
        return Ok(d);
    }

    (0..=372)
        .map(|i| reference + Duration::days(i))
        .find(|d| matches(*d))
        .ok_or_else(|| ForecastError::InvalidInput("no matching date within a year".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureConfig, LastYearFallback, ModelKind, TrainingConfig};
    use crate::ml::{FeatureSpec, ModelTrainer};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn history(n: usize) -> Vec<Observation> {
        (0..n)
            .map(|i| {
                let mut o = Observation::new(d(2024, 6, 1) + Duration::days(i as i64), 100.0 + i as f64);
                o.high_temp = Some(28.0 + (i % 3) as f64);
                o.min_demand = Some(50.0 + i as f64);
                o
            })
            .collect()
    }

    #[test]
    fn test_lags_from_buffer() {
        let obs = history(20);
        let lookup = MonthWeekdayLookup::build(&obs, LastYearFallback::AllData);
        let ctx = HistoricalContext::from_history(&obs, &lookup, 14);
        assert_eq!(ctx.len(), 14);

        let next = ctx.last_date().unwrap() + Duration::days(1);
        let lags = ctx.lags_for(next);
        assert_eq!(lags.yesterday_peak_demand, Some(119.0));
        assert_eq!(lags.same_weekday_last_week_peak_demand, Some(113.0));
        assert_eq!(lags.rolling7_peak_demand, Some(116.0));
        assert_eq!(lags.yesterday_min_demand, Some(69.0));
    }

    #[test]
    fn test_buffer_is_bounded() {
        let lookup = MonthWeekdayLookup::build(&[], LastYearFallback::AllData);
        let mut ctx = HistoricalContext::new(&lookup, 3);
        for i in 0..10 {
            ctx.push(HistoryDay {
                date: d(2024, 1, 1) + Duration::days(i),
                peak_demand: i as f64,
                min_demand: None,
                gas_demand: None,
            });
        }
        // Never below a week so the t-7 lag stays reachable
        assert_eq!(ctx.len(), 7);
    }

    #[test]
    fn test_complete_temperatures() {
        let mut day = DayInputs::new(d(2024, 7, 1));
        day.avg_temp = Some(27.0);
        complete_temperatures(&mut day, 5.0);
        assert_eq!((day.high_temp, day.low_temp), (Some(32.0), Some(22.0)));

        let mut day = DayInputs::new(d(2024, 7, 1));
        day.high_temp = Some(30.0);
        day.low_temp = Some(20.0);
        complete_temperatures(&mut day, 5.0);
        assert_eq!(day.avg_temp, Some(25.0));
    }

    fn mean_model(spec: Vec<FeatureId>, obs: &[Observation], target: Target) -> TrainedModel {
        let pipeline = FeaturePipeline::new(&FeatureConfig::default());
        let table = pipeline.build(obs, 0.2).unwrap();
        let spec = FeatureSpec::new(spec);
        let data = table.dataset(&spec, target);
        ModelTrainer::new(TrainingConfig {
            model: ModelKind::Mean,
            ..TrainingConfig::default()
        })
        .train(target, &spec, &data)
        .unwrap()
    }

    #[test]
    fn test_summer_forecast_requires_cooling_temperature() {
        let obs = history(20);
        let model = mean_model(vec![FeatureId::CoolingIntensity], &obs, Target::PeakDemand);
        let pipeline = FeaturePipeline::new(&FeatureConfig::default());
        let lookup = MonthWeekdayLookup::build(&obs, LastYearFallback::AllData);
        let ctx = HistoricalContext::from_history(&obs, &lookup, 14);

        let day = DayInputs::new(d(2024, 7, 1));
        assert!(matches!(
            forecast_one(&model, &pipeline, &day, &ctx, None),
            Err(ForecastError::MissingInput(_))
        ));

        let mut day = DayInputs::new(d(2024, 7, 1));
        day.high_temp = Some(f64::INFINITY);
        assert!(matches!(
            forecast_one(&model, &pipeline, &day, &ctx, None),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_recursive_first_day_matches_standalone() {
        let obs = history(20);
        let spec = vec![FeatureId::HighTemp, FeatureId::YesterdayPeakDemand];
        let peak = mean_model(spec.clone(), &obs, Target::PeakDemand);
        let min = mean_model(vec![FeatureId::YesterdayMinDemand], &obs, Target::MinDemand);
        let pipeline = FeaturePipeline::new(&FeatureConfig::default());
        let lookup = MonthWeekdayLookup::build(&obs, LastYearFallback::AllData);
        let ctx = HistoricalContext::from_history(&obs, &lookup, 14);

        let days: Vec<DayInputs> = (0..7)
            .map(|i| {
                let mut day = DayInputs::new(d(2024, 6, 21) + Duration::days(i));
                day.high_temp = Some(30.0);
                day
            })
            .collect();

        let single = forecast_one(&peak, &pipeline, &days[0], &ctx, None).unwrap();
        let run = RecursiveForecaster::new(&pipeline, &peak, Some(&min))
            .run(&days, &ctx)
            .unwrap();
        assert_eq!(run.len(), 7);
        assert_eq!(run[0].peak_demand, single);
        assert!(run.iter().all(|f| f.min_demand.is_some()));
        assert_eq!(ctx.len(), 14);
    }

    #[test]
    fn test_gas_forecast_is_clipped_to_peak() {
        let obs: Vec<Observation> = (0..20)
            .map(|i| {
                let mut o = Observation::new(d(2024, 4, 1) + Duration::days(i), 100.0);
                o.low_temp = Some(5.0);
                o.solar_peak = Some(10.0);
                o.gas_demand = Some(80.0 + i as f64);
                o
            })
            .collect();
        let gas = mean_model(vec![FeatureId::PeakDemand], &obs, Target::GasDemand);
        let pipeline = FeaturePipeline::new(&FeatureConfig::default());
        let lookup = MonthWeekdayLookup::build(&obs, LastYearFallback::AllData);
        let ctx = HistoricalContext::from_history(&obs, &lookup, 14);

        let mut day = DayInputs::new(d(2024, 4, 21));
        day.peak_demand = Some(50.0);
        day.solar_peak = Some(5.0);
        let v = forecast_one(&gas, &pipeline, &day, &ctx, None).unwrap();
        assert_eq!(v, 50.0);

        day.solar_peak = None;
        assert!(matches!(
            forecast_one(&gas, &pipeline, &day, &ctx, None),
            Err(ForecastError::MissingInput(_))
        ));
    }

    #[test]
    fn test_resolve_date() {
        let reference = d(2024, 7, 3); // Wednesday
        assert_eq!(resolve_date(None, None, None, reference).unwrap(), reference);
        assert_eq!(
            resolve_date(None, Some(Weekday::Mon), None, reference).unwrap(),
            d(2024, 7, 8)
        );
        assert_eq!(
            resolve_date(None, Some(Weekday::Fri), Some(9), reference).unwrap(),
            d(2024, 9, 6)
        );
        assert!(resolve_date(Some(d(2024, 7, 3)), Some(Weekday::Mon), None, reference).is_err());
        assert!(resolve_date(None, None, Some(13), reference).is_err());
    }
}
