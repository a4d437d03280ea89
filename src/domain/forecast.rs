//! Forecast request and result value objects. Never persisted.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forecast::engine::DayForecast;
use crate::forecast::features::DayInputs;

/// Weather for one forecast day (°C).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DayWeather {
    #[validate(range(min = -60.0, max = 70.0))]
    pub high_temp: Option<f64>,
    #[validate(range(min = -60.0, max = 70.0))]
    pub avg_temp: Option<f64>,
    #[validate(range(min = -60.0, max = 70.0))]
    pub low_temp: Option<f64>,
    #[validate(range(min = -60.0, max = 80.0))]
    pub feels_like_temp: Option<f64>,
    pub is_holiday: Option<bool>,
}

impl DayWeather {
    pub fn day_inputs(&self, date: NaiveDate) -> DayInputs {
        DayInputs {
            high_temp: self.high_temp,
            avg_temp: self.avg_temp,
            low_temp: self.low_temp,
            feels_like_temp: self.feels_like_temp,
            is_holiday: self.is_holiday,
            ..DayInputs::new(date)
        }
    }
}

/// One-day peak (and minimum) demand forecast.
///
/// Without `date`, the first day on or after the day following the last
/// observation that matches `weekday` and `month` is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    pub date: Option<NaiveDate>,
    pub weekday: Option<Weekday>,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
    #[serde(flatten)]
    #[validate(nested)]
    pub weather: DayWeather,
}

/// Multi-day recursive forecast; one weather entry per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecursiveForecastRequest {
    pub start_date: Option<NaiveDate>,
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub days: Vec<DayWeather>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GasForecastRequest {
    pub date: Option<NaiveDate>,
    /// Expected peak electricity demand (MW)
    #[validate(range(min = 0.0))]
    pub peak_demand: f64,
    /// Expected solar peak output (MW)
    #[validate(range(min = 0.0))]
    pub solar_peak: f64,
    #[serde(flatten)]
    #[validate(nested)]
    pub weather: DayWeather,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub is_holiday: bool,
    pub is_business_day: bool,
    /// MW
    pub peak_demand: f64,
    /// Percent, from the peak model's held-out R²
    pub confidence: f64,
    pub min_demand: Option<f64>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecursiveForecastResult {
    pub days: Vec<DayForecast>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasForecastResult {
    pub date: NaiveDate,
    /// Clipped to `[0, peak_demand]`
    pub gas_demand: f64,
    pub budgeted_gas_target: Option<f64>,
    pub confidence: f64,
}
