use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// One calendar day of weather and demand measurements.
///
/// Only source-of-truth fields live here. Everything the feature pipeline
/// derives is kept in [`crate::forecast::features::FeatureRow`] and is never
/// written back to the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub high_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub low_temp: Option<f64>,
    pub feels_like_temp: Option<f64>,
    /// Daily peak electricity demand (MW)
    pub peak_demand: f64,
    /// Daily minimum electricity demand (MW)
    pub min_demand: Option<f64>,
    pub gas_demand: Option<f64>,
    pub solar_peak: Option<f64>,
    /// Holiday flag supplied by the source, if it carries one.
    pub is_holiday: Option<bool>,
    /// Business-day flag supplied by the source, if it carries one.
    pub is_business_day: Option<bool>,
}

impl Observation {
    pub fn new(date: NaiveDate, peak_demand: f64) -> Self {
        Self {
            date,
            high_temp: None,
            avg_temp: None,
            low_temp: None,
            feels_like_temp: None,
            peak_demand,
            min_demand: None,
            gas_demand: None,
            solar_peak: None,
            is_holiday: None,
            is_business_day: None,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Temperature driving cooling load: feels-like if recorded, else the high.
    pub fn cooling_temp(&self) -> Option<f64> {
        self.feels_like_temp.or(self.high_temp)
    }

    pub fn has_gas_inputs(&self) -> bool {
        self.gas_demand.is_some() && self.solar_peak.is_some()
    }
}

/// Column presence across a whole table. Decides which models can be trained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnPresence {
    pub high_temp: bool,
    pub avg_temp: bool,
    pub low_temp: bool,
    pub feels_like_temp: bool,
    pub min_demand: bool,
    pub gas_demand: bool,
    pub solar_peak: bool,
}

impl ColumnPresence {
    pub fn scan(observations: &[Observation]) -> Self {
        let mut p = Self::default();
        for o in observations {
            p.high_temp |= o.high_temp.is_some();
            p.avg_temp |= o.avg_temp.is_some();
            p.low_temp |= o.low_temp.is_some();
            p.feels_like_temp |= o.feels_like_temp.is_some();
            p.min_demand |= o.min_demand.is_some();
            p.gas_demand |= o.gas_demand.is_some();
            p.solar_peak |= o.solar_peak.is_some();
        }
        p
    }

    pub fn has_gas(&self) -> bool {
        self.gas_demand && self.solar_peak
    }
}

/// Monday-based index, 0..=6.
pub fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooling_temp_prefers_feels_like() {
        let mut o = Observation::new(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), 80_000.0);
        o.high_temp = Some(31.0);
        assert_eq!(o.cooling_temp(), Some(31.0));

        o.feels_like_temp = Some(34.5);
        assert_eq!(o.cooling_temp(), Some(34.5));
    }

    #[test]
    fn test_column_presence() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut a = Observation::new(d, 1.0);
        a.gas_demand = Some(3.0);
        let mut b = Observation::new(d.succ_opt().unwrap(), 1.0);
        b.solar_peak = Some(2.0);

        let p = ColumnPresence::scan(&[a.clone()]);
        assert!(!p.has_gas());

        let p = ColumnPresence::scan(&[a, b]);
        assert!(p.has_gas());
        assert!(!p.min_demand);
    }
}
