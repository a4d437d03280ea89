//! Holiday calendar and the business-day rule.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::warn;

use crate::domain::observation::is_weekend;

/// Fixed-date public holidays for a country plus configured movable dates.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    country: String,
    fixed: Vec<(u32, u32)>,
    extra: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(country: &str, extra: &[NaiveDate]) -> Self {
        let code = country.trim().to_ascii_uppercase();
        let fixed = match code.as_str() {
            "KR" => vec![
                (1, 1),   // New Year's Day
                (3, 1),   // Independence Movement Day
                (5, 5),   // Children's Day
                (6, 6),   // Memorial Day
                (8, 15),  // Liberation Day
                (10, 3),  // National Foundation Day
                (10, 9),  // Hangul Day
                (12, 25), // Christmas
            ],
            "SE" => vec![
                (1, 1),
                (1, 6),
                (5, 1),
                (6, 6),
                (12, 24),
                (12, 25),
                (12, 26),
                (12, 31),
            ],
            "US" => vec![(1, 1), (6, 19), (7, 4), (11, 11), (12, 25)],
            other => {
                warn!(country = other, "no fixed holiday table, using configured dates only");
                Vec::new()
            }
        };
        // Lunar and Easter-based holidays are movable and come from `extra`.
        Self {
            country: code,
            fixed,
            extra: extra.iter().copied().collect(),
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.extra.contains(&date) || self.fixed.contains(&(date.month(), date.day()))
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        is_business_day(date.weekday(), self.is_holiday(date))
    }
}

/// A business day is a weekday that is not a holiday.
pub fn is_business_day(weekday: Weekday, is_holiday: bool) -> bool {
    !is_weekend(weekday) && !is_holiday
}
