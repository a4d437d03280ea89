//! Month x weekday historical means for the "same weekday last year" lag.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::config::LastYearFallback;
use crate::domain::observation::weekday_index;
use crate::domain::Observation;

type Key = (u32, usize);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Date-ordered values with running sums, for means over a date prefix.
#[derive(Debug, Clone, Default, PartialEq)]
struct Expanding {
    dates: Vec<NaiveDate>,
    cumulative: Vec<f64>,
}

impl Expanding {
    fn push(&mut self, date: NaiveDate, v: f64) {
        let total = self.cumulative.last().copied().unwrap_or(0.0) + v;
        self.dates.push(date);
        self.cumulative.push(total);
    }

    /// Mean of every value dated strictly before `date`.
    fn mean_before(&self, date: NaiveDate) -> Option<f64> {
        let n = self.dates.partition_point(|d| *d < date);
        (n > 0).then(|| self.cumulative[n - 1] / n as f64)
    }
}

/// Built once from the observations and reused unchanged at inference time.
///
/// Every answer only uses days strictly before the queried date, so a
/// training row never sees its own demand or anything after it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthWeekdayLookup {
    by_year: BTreeMap<i32, HashMap<Key, Mean>>,
    by_key: HashMap<Key, Expanding>,
    global: Expanding,
    fallback: LastYearFallback,
}

impl MonthWeekdayLookup {
    pub fn build(observations: &[Observation], fallback: LastYearFallback) -> Self {
        let mut sorted: Vec<&Observation> = observations.iter().collect();
        sorted.sort_by_key(|o| o.date);

        let mut by_year: BTreeMap<i32, HashMap<Key, Mean>> = BTreeMap::new();
        let mut by_key: HashMap<Key, Expanding> = HashMap::new();
        let mut global = Expanding::default();

        for o in sorted {
            let key = (o.month(), weekday_index(o.weekday()));
            by_year
                .entry(o.date.year())
                .or_default()
                .entry(key)
                .or_default()
                .push(o.peak_demand);
            by_key.entry(key).or_default().push(o.date, o.peak_demand);
            global.push(o.date, o.peak_demand);
        }

        Self {
            by_year,
            by_key,
            global,
            fallback,
        }
    }

    /// Mean peak demand of the same month and weekday in the calendar year
    /// before `date`.
    ///
    /// Without a prior-year cell the configured fallback applies: the
    /// month x weekday mean of all earlier days, then the mean of all
    /// earlier days.
    pub fn same_weekday_last_year(&self, date: NaiveDate) -> Option<f64> {
        let key = (date.month(), weekday_index(date.weekday()));
        let prior = self
            .by_year
            .get(&(date.year() - 1))
            .and_then(|cells| cells.get(&key))
            .and_then(Mean::value);
        if prior.is_some() {
            return prior;
        }
        match self.fallback {
            LastYearFallback::AllData => self
                .by_key
                .get(&key)
                .and_then(|e| e.mean_before(date))
                .or_else(|| self.global.mean_before(date)),
            LastYearFallback::None => None,
        }
    }

    pub fn years(&self) -> Vec<i32> {
        self.by_year.keys().copied().collect()
    }

    pub fn global_mean(&self) -> Option<f64> {
        let n = self.global.dates.len();
        (n > 0).then(|| self.global.cumulative[n - 1] / n as f64)
    }
}
