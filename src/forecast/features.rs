//! Feature engineering for the demand models
//!
//! Turns typed observations into [`FeatureRow`]s: calendar fields, seasonal
//! degree intensities, shift-then-read demand lags and the gas-specific
//! fields. The same [`FeaturePipeline::derive_row`] is used for history and
//! for forecast requests, so training and inference cannot drift apart.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, warn};

use super::budget::{gas_growth_rate, gas_shares, BudgetSample, GasBudget, GasShares};
use super::calendar::{is_business_day, HolidayCalendar};
use super::lookup::MonthWeekdayLookup;
use super::ForecastError;
use crate::config::{CoolingDirection, FeatureConfig, WeekdayEncoding};
use crate::domain::observation::ColumnPresence;
use crate::domain::Observation;
use crate::ml::split::train_len;
use crate::ml::{Dataset, FeatureSpec, Target};

/// Every feature a model can be trained on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureId {
    // Calendar
    Month,
    Day,
    Year,
    IsHoliday,
    IsBusinessDay,
    WeekdayMon,
    WeekdayTue,
    WeekdayWed,
    WeekdayThu,
    WeekdayFri,
    WeekdaySat,
    WeekdaySun,

    // Weather
    HighTemp,
    AvgTemp,
    LowTemp,
    FeelsLikeTemp,
    CoolingIntensity,
    HeatingIntensity,
    DiurnalRange,

    // Demand lags
    YesterdayPeakDemand,
    SameWeekdayLastWeekPeakDemand,
    SameWeekdayLastYearPeakDemand,
    #[serde(rename = "rolling7_peak_demand")]
    #[strum(serialize = "rolling7_peak_demand")]
    Rolling7PeakDemand,
    YesterdayMinDemand,

    // Gas model
    PeakDemand,
    SolarPeak,
    ResidualLoad,
    SolarShare,
    ResidualShare,
    BudgetedGasTarget,
    YesterdayGasDemand,
    GasGrowthRate,
}

const WEEKDAY_INDICATORS: [FeatureId; 7] = [
    FeatureId::WeekdayMon,
    FeatureId::WeekdayTue,
    FeatureId::WeekdayWed,
    FeatureId::WeekdayThu,
    FeatureId::WeekdayFri,
    FeatureId::WeekdaySat,
    FeatureId::WeekdaySun,
];

impl FeatureId {
    pub fn weekday_indicator(weekday: Weekday) -> Self {
        WEEKDAY_INDICATORS[weekday.num_days_from_monday() as usize]
    }

    /// Monday is the dropped baseline under [`WeekdayEncoding::DropFirst`].
    pub fn weekday_indicators(encoding: WeekdayEncoding) -> &'static [FeatureId] {
        match encoding {
            WeekdayEncoding::DropFirst => &WEEKDAY_INDICATORS[1..],
            WeekdayEncoding::All => &WEEKDAY_INDICATORS,
        }
    }

    /// Computed from the same day's peak demand.
    pub fn uses_same_day_peak(self) -> bool {
        matches!(
            self,
            FeatureId::PeakDemand
                | FeatureId::ResidualLoad
                | FeatureId::SolarShare
                | FeatureId::ResidualShare
                | FeatureId::BudgetedGasTarget
        )
    }

    /// Whether the source columns this feature needs exist in the table.
    pub fn available(self, presence: &ColumnPresence) -> bool {
        match self {
            FeatureId::HighTemp => presence.high_temp,
            FeatureId::AvgTemp => presence.avg_temp,
            FeatureId::LowTemp | FeatureId::HeatingIntensity => presence.low_temp,
            FeatureId::FeelsLikeTemp => presence.feels_like_temp,
            FeatureId::CoolingIntensity => presence.high_temp || presence.feels_like_temp,
            FeatureId::DiurnalRange => presence.high_temp && presence.low_temp,
            FeatureId::YesterdayMinDemand => presence.min_demand,
            FeatureId::SolarPeak => presence.solar_peak,
            FeatureId::ResidualLoad
            | FeatureId::SolarShare
            | FeatureId::ResidualShare
            | FeatureId::BudgetedGasTarget
            | FeatureId::YesterdayGasDemand
            | FeatureId::GasGrowthRate => presence.has_gas(),
            _ => true,
        }
    }
}

/// Scalars describing one day, from an observation or a forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct DayInputs {
    pub date: NaiveDate,
    pub high_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub low_temp: Option<f64>,
    pub feels_like_temp: Option<f64>,
    pub is_holiday: Option<bool>,
    pub is_business_day: Option<bool>,
    pub peak_demand: Option<f64>,
    pub solar_peak: Option<f64>,
}

impl DayInputs {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            high_temp: None,
            avg_temp: None,
            low_temp: None,
            feels_like_temp: None,
            is_holiday: None,
            is_business_day: None,
            peak_demand: None,
            solar_peak: None,
        }
    }

    pub fn from_observation(o: &Observation) -> Self {
        Self {
            date: o.date,
            high_temp: o.high_temp,
            avg_temp: o.avg_temp,
            low_temp: o.low_temp,
            feels_like_temp: o.feels_like_temp,
            is_holiday: o.is_holiday,
            is_business_day: o.is_business_day,
            peak_demand: Some(o.peak_demand),
            solar_peak: o.solar_peak,
        }
    }
}

/// Values only known from days strictly before the row's date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LagInputs {
    pub yesterday_peak_demand: Option<f64>,
    pub same_weekday_last_week_peak_demand: Option<f64>,
    pub same_weekday_last_year_peak_demand: Option<f64>,
    pub rolling7_peak_demand: Option<f64>,
    pub yesterday_min_demand: Option<f64>,
    pub yesterday_gas_demand: Option<f64>,
    pub day_before_gas_demand: Option<f64>,
}

/// Derived, model-facing view of a single day. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub month: u32,
    pub day: u32,
    pub year: i32,
    pub weekday: Weekday,
    pub is_holiday: bool,
    pub is_business_day: bool,

    pub high_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub low_temp: Option<f64>,
    pub feels_like_temp: Option<f64>,
    pub cooling_intensity: Option<f64>,
    pub heating_intensity: Option<f64>,
    pub diurnal_range: Option<f64>,

    pub lags: LagInputs,

    pub peak_demand: Option<f64>,
    pub solar_peak: Option<f64>,
    pub gas: Option<GasShares>,
    pub budgeted_gas_target: Option<f64>,

    // Actuals for the non-peak targets; absent at inference time.
    pub min_demand: Option<f64>,
    pub gas_demand: Option<f64>,
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl FeatureRow {
    pub fn get(&self, id: FeatureId) -> Option<f64> {
        match id {
            FeatureId::Month => Some(self.month as f64),
            FeatureId::Day => Some(self.day as f64),
            FeatureId::Year => Some(self.year as f64),
            FeatureId::IsHoliday => Some(flag(self.is_holiday)),
            FeatureId::IsBusinessDay => Some(flag(self.is_business_day)),
            FeatureId::WeekdayMon
            | FeatureId::WeekdayTue
            | FeatureId::WeekdayWed
            | FeatureId::WeekdayThu
            | FeatureId::WeekdayFri
            | FeatureId::WeekdaySat
            | FeatureId::WeekdaySun => {
                Some(flag(FeatureId::weekday_indicator(self.weekday) == id))
            }
            FeatureId::HighTemp => self.high_temp,
            FeatureId::AvgTemp => self.avg_temp,
            FeatureId::LowTemp => self.low_temp,
            FeatureId::FeelsLikeTemp => self.feels_like_temp,
            FeatureId::CoolingIntensity => self.cooling_intensity,
            FeatureId::HeatingIntensity => self.heating_intensity,
            FeatureId::DiurnalRange => self.diurnal_range,
            FeatureId::YesterdayPeakDemand => self.lags.yesterday_peak_demand,
            FeatureId::SameWeekdayLastWeekPeakDemand => {
                self.lags.same_weekday_last_week_peak_demand
            }
            FeatureId::SameWeekdayLastYearPeakDemand => {
                self.lags.same_weekday_last_year_peak_demand
            }
            FeatureId::Rolling7PeakDemand => self.lags.rolling7_peak_demand,
            FeatureId::YesterdayMinDemand => self.lags.yesterday_min_demand,
            FeatureId::PeakDemand => self.peak_demand,
            FeatureId::SolarPeak => self.solar_peak,
            FeatureId::ResidualLoad => self.gas.map(|g| g.residual_load),
            FeatureId::SolarShare => self.gas.map(|g| g.solar_share),
            FeatureId::ResidualShare => self.gas.map(|g| g.residual_share),
            FeatureId::BudgetedGasTarget => self.budgeted_gas_target,
            FeatureId::YesterdayGasDemand => self.lags.yesterday_gas_demand,
            FeatureId::GasGrowthRate => {
                gas_growth_rate(self.lags.yesterday_gas_demand, self.lags.day_before_gas_demand)
            }
        }
    }

    pub fn target(&self, target: Target) -> Option<f64> {
        match target {
            Target::PeakDemand => self.peak_demand,
            Target::MinDemand => self.min_demand,
            Target::GasDemand => self.gas_demand,
        }
    }

    /// Every feature this row can supply, in declaration order.
    pub fn named_values(&self) -> Vec<(FeatureId, f64)> {
        FeatureId::iter()
            .filter_map(|id| self.get(id).map(|v| (id, v)))
            .collect()
    }
}

/// Output of [`FeaturePipeline::build`], plus the tables reused at inference.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub lookup: MonthWeekdayLookup,
    pub budget: Option<GasBudget>,
    pub presence: ColumnPresence,
}

impl FeatureTable {
    /// Rows that carry the target and every feature of `spec`, as a matrix.
    pub fn dataset(&self, spec: &FeatureSpec, target: Target) -> Dataset {
        let mut data = Dataset::default();
        let mut dropped = 0usize;
        for row in &self.rows {
            let y = row.target(target);
            let x: Option<Vec<f64>> = spec.ids().iter().map(|id| row.get(*id)).collect();
            match (x, y) {
                (Some(x), Some(y)) if y.is_finite() && x.iter().all(|v| v.is_finite()) => {
                    data.dates.push(row.date);
                    data.x.push(x);
                    data.y.push(y);
                }
                _ => dropped += 1,
            }
        }
        debug!(%target, kept = data.len(), dropped, "dataset assembled");
        data
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    calendar: HolidayCalendar,
}

impl FeaturePipeline {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            calendar: HolidayCalendar::new(&config.country, &config.extra_holidays),
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    pub fn is_summer(&self, month: u32) -> bool {
        self.config.summer_months.contains(&month)
    }

    pub fn is_winter(&self, month: u32) -> bool {
        self.config.winter_months.contains(&month)
    }

    /// Distance from the cooling reference on the configured side; 0 outside
    /// the summer months.
    pub fn cooling_intensity(&self, month: u32, temp: Option<f64>) -> Option<f64> {
        if !self.is_summer(month) {
            return Some(0.0);
        }
        let reference = self.config.cooling_reference_c;
        temp.map(|t| match self.config.cooling_direction {
            CoolingDirection::BelowReference => (reference - t).max(0.0),
            CoolingDirection::AboveReference => (t - reference).max(0.0),
        })
    }

    /// Degrees below the heating reference; 0 outside the winter months.
    pub fn heating_intensity(&self, month: u32, low: Option<f64>) -> Option<f64> {
        if !self.is_winter(month) {
            return Some(0.0);
        }
        low.map(|t| (self.config.heating_reference_c - t).max(0.0))
    }

    pub fn derive_row(
        &self,
        day: &DayInputs,
        lags: LagInputs,
        budget: Option<&GasBudget>,
    ) -> FeatureRow {
        let date = day.date;
        let month = date.month();
        let weekday = date.weekday();
        let is_holiday = day
            .is_holiday
            .unwrap_or_else(|| self.calendar.is_holiday(date));
        let is_business_day =
            day.is_business_day.unwrap_or(true) && is_business_day(weekday, is_holiday);

        let cooling_temp = day.feels_like_temp.or(day.high_temp);
        let diurnal_range = match (day.high_temp, day.low_temp) {
            (Some(h), Some(l)) => Some(h - l),
            _ => None,
        };

        let gas = match (day.peak_demand, day.solar_peak) {
            (Some(p), Some(s)) => Some(gas_shares(p, s)),
            _ => None,
        };
        let budgeted_gas_target = match (budget, day.peak_demand, day.solar_peak) {
            (Some(b), Some(p), Some(s)) => Some(b.budgeted_target(p, s, is_business_day)),
            _ => None,
        };

        FeatureRow {
            date,
            month,
            day: date.day(),
            year: date.year(),
            weekday,
            is_holiday,
            is_business_day,
            high_temp: day.high_temp,
            avg_temp: day.avg_temp,
            low_temp: day.low_temp,
            feels_like_temp: day.feels_like_temp,
            cooling_intensity: self.cooling_intensity(month, cooling_temp),
            heating_intensity: self.heating_intensity(month, day.low_temp),
            diurnal_range,
            lags,
            peak_demand: day.peak_demand,
            solar_peak: day.solar_peak,
            gas,
            budgeted_gas_target,
            min_demand: None,
            gas_demand: None,
        }
    }

    /// Derive the full feature table from date-ordered, duplicate-free
    /// observations.
    ///
    /// `test_fraction` bounds the rows the gas budget may learn from, so the
    /// held-out window never informs it.
    pub fn build(
        &self,
        observations: &[Observation],
        test_fraction: f64,
    ) -> Result<FeatureTable, ForecastError> {
        if let Some(w) = observations.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(ForecastError::InvalidInput(format!(
                "observations must be strictly ascending by date ({} then {})",
                w[0].date, w[1].date
            )));
        }

        let presence = ColumnPresence::scan(observations);
        let lookup = MonthWeekdayLookup::build(observations, self.config.last_year_fallback);
        let budget = if presence.has_gas() {
            self.fit_budget(observations, test_fraction)
        } else {
            None
        };

        let by_date: HashMap<NaiveDate, f64> = observations
            .iter()
            .map(|o| (o.date, o.peak_demand))
            .collect();

        let rows = observations
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let prev = i.checked_sub(1).map(|j| &observations[j]);
                let prev2 = i.checked_sub(2).map(|j| &observations[j]);
                let lags = LagInputs {
                    yesterday_peak_demand: prev.map(|p| p.peak_demand),
                    same_weekday_last_week_peak_demand: by_date
                        .get(&(o.date - Duration::days(7)))
                        .copied(),
                    same_weekday_last_year_peak_demand: lookup.same_weekday_last_year(o.date),
                    rolling7_peak_demand: (i >= 7).then(|| {
                        observations[i - 7..i]
                            .iter()
                            .map(|p| p.peak_demand)
                            .sum::<f64>()
                            / 7.0
                    }),
                    yesterday_min_demand: prev.and_then(|p| p.min_demand),
                    yesterday_gas_demand: prev.and_then(|p| p.gas_demand),
                    day_before_gas_demand: prev2.and_then(|p| p.gas_demand),
                };
                let mut row = self.derive_row(&DayInputs::from_observation(o), lags, budget.as_ref());
                row.min_demand = o.min_demand;
                row.gas_demand = o.gas_demand;
                row
            })
            .collect();

        Ok(FeatureTable {
            rows,
            lookup,
            budget,
            presence,
        })
    }

    fn fit_budget(&self, observations: &[Observation], test_fraction: f64) -> Option<GasBudget> {
        let n_train = train_len(observations.len(), test_fraction);
        let samples: Vec<BudgetSample> = observations[..n_train]
            .iter()
            .filter_map(|o| {
                let is_holiday = o
                    .is_holiday
                    .unwrap_or_else(|| self.calendar.is_holiday(o.date));
                Some(BudgetSample {
                    date: o.date,
                    is_business_day: o.is_business_day.unwrap_or(true)
                        && is_business_day(o.weekday(), is_holiday),
                    peak_demand: o.peak_demand,
                    gas_demand: o.gas_demand?,
                    solar_peak: o.solar_peak?,
                })
            })
            .collect();
        let budget = GasBudget::fit(&samples, self.config.gas_cutoff_date);
        if budget.is_none() {
            warn!("gas and solar columns present but no eligible rows for the budget ratio");
        }
        budget
    }

    /// Feature list for `target`: the configured override or the default,
    /// minus features whose source columns are absent or that would read
    /// the target day's own demand.
    pub fn spec_for(&self, target: Target, presence: &ColumnPresence) -> FeatureSpec {
        let configured = match target {
            Target::PeakDemand => self.config.peak_features.clone(),
            Target::MinDemand => self.config.min_features.clone(),
            Target::GasDemand => self.config.gas_features.clone(),
        };
        let requested = configured.unwrap_or_else(|| self.default_features(target));

        let mut kept = Vec::with_capacity(requested.len());
        for id in requested {
            if target != Target::GasDemand && id.uses_same_day_peak() {
                warn!(%target, feature = %id, "feature reads same-day demand, removed");
            } else if !id.available(presence) {
                warn!(%target, feature = %id, "source column missing, feature removed");
            } else {
                kept.push(id);
            }
        }
        FeatureSpec::new(kept)
    }

    fn default_features(&self, target: Target) -> Vec<FeatureId> {
        use FeatureId::*;
        let mut ids = match target {
            Target::PeakDemand => vec![
                Month,
                HighTemp,
                LowTemp,
                CoolingIntensity,
                HeatingIntensity,
                DiurnalRange,
                IsHoliday,
                IsBusinessDay,
                YesterdayPeakDemand,
                SameWeekdayLastWeekPeakDemand,
                SameWeekdayLastYearPeakDemand,
                Rolling7PeakDemand,
            ],
            Target::MinDemand => vec![
                Month,
                LowTemp,
                HeatingIntensity,
                CoolingIntensity,
                IsBusinessDay,
                IsHoliday,
                YesterdayMinDemand,
            ],
            Target::GasDemand => {
                return vec![
                    PeakDemand,
                    SolarPeak,
                    ResidualLoad,
                    SolarShare,
                    ResidualShare,
                    BudgetedGasTarget,
                    IsBusinessDay,
                    Month,
                    HeatingIntensity,
                    YesterdayGasDemand,
                    GasGrowthRate,
                ]
            }
        };
        ids.extend_from_slice(FeatureId::weekday_indicators(self.config.weekday_encoding));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn pipeline() -> FeaturePipeline {
        FeaturePipeline::new(&FeatureConfig::default())
    }

    fn series(start: NaiveDate, peaks: &[f64]) -> Vec<Observation> {
        peaks
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut o = Observation::new(start + Duration::days(i as i64), *p);
                o.high_temp = Some(30.0);
                o.low_temp = Some(20.0);
                o
            })
            .collect()
    }

    #[test]
    fn test_feature_id_names() {
        assert_eq!(FeatureId::Rolling7PeakDemand.to_string(), "rolling7_peak_demand");
        assert_eq!(
            FeatureId::from_str("same_weekday_last_week_peak_demand").unwrap(),
            FeatureId::SameWeekdayLastWeekPeakDemand
        );
        assert_eq!(FeatureId::WeekdayMon.as_ref(), "weekday_mon");
        let json = serde_json::to_string(&FeatureId::Rolling7PeakDemand).unwrap();
        assert_eq!(json, "\"rolling7_peak_demand\"");
    }

    #[test]
    fn test_lags_are_shifted() {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let peaks: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let table = pipeline().build(&series(start, &peaks), 0.2).unwrap();

        assert_eq!(table.rows[0].lags.yesterday_peak_demand, None);
        for t in 1..table.rows.len() {
            assert_eq!(table.rows[t].lags.yesterday_peak_demand, Some(peaks[t - 1]));
        }
        for t in 0..7 {
            assert_eq!(table.rows[t].lags.same_weekday_last_week_peak_demand, None);
            assert_eq!(table.rows[t].lags.rolling7_peak_demand, None);
        }
        assert_eq!(table.rows[7].lags.same_weekday_last_week_peak_demand, Some(100.0));
        // mean of 100..=106
        assert_eq!(table.rows[7].lags.rolling7_peak_demand, Some(103.0));
    }

    #[test]
    fn test_last_week_requires_exact_date_gap() {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut obs = series(start, &[1.0; 9]);
        obs.remove(1); // 07-02 missing
        let table = pipeline().build(&obs, 0.2).unwrap();
        let row = table
            .rows
            .iter()
            .find(|r| r.date == NaiveDate::from_ymd_opt(2024, 7, 9).unwrap())
            .unwrap();
        assert_eq!(row.lags.same_weekday_last_week_peak_demand, None);
    }

    #[test]
    fn test_rejects_unsorted_input() {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut obs = series(start, &[1.0, 2.0]);
        obs.swap(0, 1);
        assert!(matches!(
            pipeline().build(&obs, 0.2),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    fn with_direction(direction: CoolingDirection) -> FeaturePipeline {
        FeaturePipeline::new(&FeatureConfig {
            cooling_direction: direction,
            ..FeatureConfig::default()
        })
    }

    #[rstest]
    #[case(CoolingDirection::BelowReference, 20.0, 5.0)]
    #[case(CoolingDirection::BelowReference, 30.0, 0.0)]
    #[case(CoolingDirection::AboveReference, 20.0, 0.0)]
    #[case(CoolingDirection::AboveReference, 30.0, 5.0)]
    fn test_cooling_direction(
        #[case] direction: CoolingDirection,
        #[case] temp: f64,
        #[case] expected: f64,
    ) {
        let p = with_direction(direction);
        assert_eq!(p.cooling_intensity(7, Some(temp)), Some(expected));
        assert_eq!(p.cooling_intensity(11, Some(temp)), Some(0.0));
    }

    #[test]
    fn test_cooling_uses_feels_like_over_high() {
        let p = with_direction(CoolingDirection::AboveReference);
        let mut day = DayInputs::new(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap());
        day.high_temp = Some(30.0);
        day.feels_like_temp = Some(33.0);
        let row = p.derive_row(&day, LagInputs::default(), None);
        assert_eq!(row.cooling_intensity, Some(8.0));
        assert_eq!(row.heating_intensity, Some(0.0));

        day.feels_like_temp = None;
        let row = p.derive_row(&day, LagInputs::default(), None);
        assert_eq!(row.cooling_intensity, Some(5.0));

        // Default reads the gap below the reference
        day.feels_like_temp = Some(21.0);
        let row = pipeline().derive_row(&day, LagInputs::default(), None);
        assert_eq!(row.cooling_intensity, Some(4.0));
    }

    #[test]
    fn test_holiday_weekday_is_not_business_day() {
        // 2024-07-03 is a Wednesday
        let mut day = DayInputs::new(NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        day.is_holiday = Some(true);
        let row = pipeline().derive_row(&day, LagInputs::default(), None);
        assert!(row.is_holiday);
        assert!(!row.is_business_day);
        assert_eq!(row.get(FeatureId::WeekdayWed), Some(1.0));
        assert_eq!(row.get(FeatureId::WeekdayMon), Some(0.0));
    }

    #[test]
    fn test_calendar_holiday_applies_without_flag() {
        // Liberation Day 2024 fell on a Thursday
        let day = DayInputs::new(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap());
        let row = pipeline().derive_row(&day, LagInputs::default(), None);
        assert!(row.is_holiday);
        assert!(!row.is_business_day);
    }

    #[test]
    fn test_spec_drops_missing_columns_and_same_day_demand() {
        let mut cfg = FeatureConfig::default();
        cfg.peak_features = Some(vec![
            FeatureId::Month,
            FeatureId::PeakDemand,
            FeatureId::HighTemp,
            FeatureId::YesterdayMinDemand,
        ]);
        let p = FeaturePipeline::new(&cfg);
        let presence = ColumnPresence {
            high_temp: true,
            ..ColumnPresence::default()
        };
        let spec = p.spec_for(Target::PeakDemand, &presence);
        assert_eq!(spec.ids(), &[FeatureId::Month, FeatureId::HighTemp]);
    }

    #[test]
    fn test_default_peak_spec_weekday_encoding() {
        let presence = ColumnPresence {
            high_temp: true,
            low_temp: true,
            ..ColumnPresence::default()
        };
        let spec = pipeline().spec_for(Target::PeakDemand, &presence);
        assert!(!spec.contains(FeatureId::WeekdayMon));
        assert!(spec.contains(FeatureId::WeekdaySun));

        let mut cfg = FeatureConfig::default();
        cfg.weekday_encoding = WeekdayEncoding::All;
        let spec = FeaturePipeline::new(&cfg).spec_for(Target::PeakDemand, &presence);
        assert!(spec.contains(FeatureId::WeekdayMon));
    }

    #[test]
    fn test_dataset_drops_rows_missing_declared_features() {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let table = pipeline().build(&series(start, &[5.0; 10]), 0.2).unwrap();

        let lagged = FeatureSpec::new(vec![FeatureId::SameWeekdayLastWeekPeakDemand]);
        assert_eq!(table.dataset(&lagged, Target::PeakDemand).len(), 3);

        let plain = FeatureSpec::new(vec![FeatureId::Month]);
        assert_eq!(table.dataset(&plain, Target::PeakDemand).len(), 10);
        assert!(table.dataset(&plain, Target::MinDemand).is_empty());
    }

    #[test]
    fn test_gas_fields_and_budget() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let mut obs = series(start, &[100.0; 10]);
        for (i, o) in obs.iter_mut().enumerate() {
            o.gas_demand = Some(30.0 + i as f64);
            o.solar_peak = Some(10.0);
        }
        obs[4].peak_demand = 0.0;
        let table = pipeline().build(&obs, 0.2).unwrap();
        assert!(table.budget.is_some());

        let zero = &table.rows[4];
        assert_eq!(zero.get(FeatureId::SolarShare), Some(0.0));
        assert_eq!(zero.get(FeatureId::ResidualShare), Some(0.0));

        let row = &table.rows[3];
        assert_eq!(row.get(FeatureId::YesterdayGasDemand), Some(32.0));
        assert_eq!(row.get(FeatureId::GasGrowthRate), Some((32.0 - 31.0) / 31.0));
        assert_eq!(row.get(FeatureId::ResidualLoad), Some(90.0));
        assert!(row.get(FeatureId::BudgetedGasTarget).unwrap() >= 0.0);
    }

    proptest! {
        #[test]
        fn prop_degree_intensity_bounds(
            month in 1u32..=12,
            day in 1u32..=28,
            high in -30.0f64..45.0,
            low in -30.0f64..45.0,
            feels in proptest::option::of(-30.0f64..50.0),
        ) {
            let p = pipeline();
            let mut inputs = DayInputs::new(NaiveDate::from_ymd_opt(2024, month, day).unwrap());
            inputs.high_temp = Some(high);
            inputs.low_temp = Some(low);
            inputs.feels_like_temp = feels;
            let row = p.derive_row(&inputs, LagInputs::default(), None);

            let cooling = row.cooling_intensity.unwrap();
            let heating = row.heating_intensity.unwrap();
            prop_assert!(cooling >= 0.0);
            prop_assert!(heating >= 0.0);
            if !(5..=9).contains(&month) {
                prop_assert_eq!(cooling, 0.0);
            }
            if !matches!(month, 10 | 11 | 12 | 1 | 2 | 3 | 4) {
                prop_assert_eq!(heating, 0.0);
            }
        }
    }
}
