//! Raw string tables and their strict conversion to typed observations.
//!
//! This is the only place cell strings are parsed. Spreadsheet cells arrive as
//! text (often with thousands separators or locale date formats); the rest of
//! the crate only sees [`Observation`].

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::observation::{is_weekend, Observation};
use crate::repo::DataError;

/// Header row plus data rows, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build from a 2-D value block whose first row is the header.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Result<Self, DataError> {
        if values.is_empty() {
            return Err(DataError::EmptySheet);
        }
        let headers = values.remove(0);
        let width = headers.len();
        let rows = values
            .into_iter()
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Ok(Self { headers, rows })
    }

    /// Header first, then data rows.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.headers.clone());
        out.extend(self.rows.iter().cloned());
        out
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Known columns. Each accepts an English and a Korean header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    HighTemp,
    AvgTemp,
    LowTemp,
    FeelsLikeTemp,
    PeakDemand,
    MinDemand,
    GasDemand,
    SolarPeak,
    Weekday,
    BusinessDay,
    Holiday,
    /// Helper column some sheets carry; recomputed from the date, never stored.
    Month,
}

impl Column {
    const ALL: [Column; 13] = [
        Column::Date,
        Column::HighTemp,
        Column::AvgTemp,
        Column::LowTemp,
        Column::FeelsLikeTemp,
        Column::PeakDemand,
        Column::MinDemand,
        Column::GasDemand,
        Column::SolarPeak,
        Column::Weekday,
        Column::BusinessDay,
        Column::Holiday,
        Column::Month,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Date => &["date", "날짜"],
            Column::HighTemp => &["high_temp", "최고기온"],
            Column::AvgTemp => &["avg_temp", "평균기온"],
            Column::LowTemp => &["low_temp", "최저기온"],
            Column::FeelsLikeTemp => &["feels_like_temp", "체감온도"],
            Column::PeakDemand => &["peak_demand", "최대수요"],
            Column::MinDemand => &["min_demand", "최저수요"],
            Column::GasDemand => &["gas_demand", "가스수요"],
            Column::SolarPeak => &["solar_peak", "태양광최대"],
            Column::Weekday => &["weekday", "요일"],
            Column::BusinessDay => &["is_business_day", "평일"],
            Column::Holiday => &["is_holiday", "공휴일"],
            Column::Month => &["month", "월"],
        }
    }

    pub fn english_name(self) -> &'static str {
        self.aliases()[0]
    }

    pub fn from_header(header: &str) -> Option<Self> {
        let h = header.trim().to_lowercase();
        Column::ALL
            .into_iter()
            .find(|c| c.aliases().iter().any(|a| *a == h))
    }
}

/// Column positions resolved against a concrete header row.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: Vec<Option<Column>>,
    korean: bool,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Result<Self, DataError> {
        let columns: Vec<Option<Column>> = headers.iter().map(|h| Column::from_header(h)).collect();

        let mut seen = HashSet::new();
        for c in columns.iter().flatten() {
            if !seen.insert(*c) {
                return Err(DataError::MalformedHeader(format!(
                    "column '{}' appears more than once",
                    c.english_name()
                )));
            }
        }

        let mut missing = Vec::new();
        for required in [Column::Date, Column::PeakDemand] {
            if !seen.contains(&required) {
                missing.push(required.english_name().to_string());
            }
        }
        if !missing.is_empty() {
            return Err(DataError::MissingColumns(missing));
        }

        let korean = headers.iter().any(|h| h.chars().any(|ch| !ch.is_ascii()));
        Ok(Self { columns, korean })
    }

    fn index_of(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == Some(column))
    }
}

/// Outcome of parsing a table: the observations plus row-level notes.
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub observations: Vec<Observation>,
    pub skipped: Vec<String>,
}

/// Strictly parse a raw table into observations sorted by date.
///
/// A blank peak demand marks a day that has not been measured yet; such rows
/// are skipped and reported. Any other malformed cell is an error.
pub fn parse_observations(table: &RawTable) -> Result<ParsedTable, DataError> {
    let map = ColumnMap::resolve(&table.headers)?;
    let mut out = ParsedTable::default();
    let mut dates = HashSet::new();

    for (i, row) in table.rows.iter().enumerate() {
        // 1-based sheet row including the header
        let sheet_row = i + 2;
        let cell = |c: Column| map.index_of(c).and_then(|idx| row.get(idx)).map(|s| s.trim());

        let date_str = cell(Column::Date).unwrap_or("");
        if date_str.is_empty() {
            out.skipped.push(format!("row {sheet_row}: empty date"));
            continue;
        }
        let date = parse_date(date_str).ok_or_else(|| DataError::InvalidCell {
            row: sheet_row,
            column: Column::Date.english_name().to_string(),
            value: date_str.to_string(),
        })?;

        let num = |c: Column| -> Result<Option<f64>, DataError> {
            match cell(c) {
                None | Some("") => Ok(None),
                Some(s) => parse_number(s).map(Some).ok_or_else(|| DataError::InvalidCell {
                    row: sheet_row,
                    column: c.english_name().to_string(),
                    value: s.to_string(),
                }),
            }
        };
        let flag = |c: Column| -> Result<Option<bool>, DataError> {
            match cell(c) {
                None | Some("") => Ok(None),
                Some(s) => parse_flag(s).map(Some).ok_or_else(|| DataError::InvalidCell {
                    row: sheet_row,
                    column: c.english_name().to_string(),
                    value: s.to_string(),
                }),
            }
        };

        let Some(peak_demand) = num(Column::PeakDemand)? else {
            out.skipped.push(format!("row {sheet_row}: {date} has no peak demand"));
            continue;
        };

        if !dates.insert(date) {
            return Err(DataError::DuplicateDate(date));
        }

        out.observations.push(Observation {
            date,
            high_temp: num(Column::HighTemp)?,
            avg_temp: num(Column::AvgTemp)?,
            low_temp: num(Column::LowTemp)?,
            feels_like_temp: num(Column::FeelsLikeTemp)?,
            peak_demand,
            min_demand: num(Column::MinDemand)?,
            gas_demand: num(Column::GasDemand)?,
            solar_peak: num(Column::SolarPeak)?,
            is_holiday: flag(Column::Holiday)?,
            is_business_day: flag(Column::BusinessDay)?,
        });
    }

    out.observations.sort_by_key(|o| o.date);
    if !out.skipped.is_empty() {
        warn!(skipped = out.skipped.len(), "rows skipped while parsing table");
    }
    Ok(out)
}

/// Render observations back into the layout of `headers`.
///
/// Derived values never appear here; a `month` helper column is dropped and
/// unknown columns are written blank.
pub fn render_observations(headers: &[String], observations: &[Observation]) -> Result<RawTable, DataError> {
    let map = ColumnMap::resolve(headers)?;
    let kept: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| map.columns[*i] != Some(Column::Month))
        .collect();

    let out_headers = kept.iter().map(|(_, h)| (*h).clone()).collect();
    let rows = observations
        .iter()
        .map(|o| {
            kept.iter()
                .map(|(i, _)| match map.columns[*i] {
                    Some(c) => render_cell(c, o, map.korean),
                    None => String::new(),
                })
                .collect()
        })
        .collect();

    Ok(RawTable::new(out_headers, rows))
}

/// Apply typed edits to the stored table without losing what the parser
/// does not model.
///
/// Rows are matched by date. A matched row gets its known columns rewritten
/// and keeps every other cell, including a `month` helper. A row that held an
/// observation missing from `edited` is removed. Rows the parser skips (no
/// peak demand yet, no date) stay as they are. New dates are inserted before
/// the first later-dated row.
pub fn merge_observations(base: &RawTable, edited: &[Observation]) -> Result<RawTable, DataError> {
    let map = ColumnMap::resolve(&base.headers)?;
    let (Some(date_idx), Some(peak_idx)) = (
        map.index_of(Column::Date),
        map.index_of(Column::PeakDemand),
    ) else {
        return Err(DataError::MissingColumns(vec!["date".into(), "peak_demand".into()]));
    };
    let width = base.width();
    let row_date = |row: &[String]| row.get(date_idx).and_then(|s| parse_date(s));

    let mut pending: HashMap<NaiveDate, &Observation> = HashMap::with_capacity(edited.len());
    for o in edited {
        if pending.insert(o.date, o).is_some() {
            return Err(DataError::DuplicateDate(o.date));
        }
    }

    let apply = |row: &[String], o: &Observation| -> Vec<String> {
        (0..width)
            .map(|i| match map.columns[i] {
                Some(Column::Month) | None => row.get(i).cloned().unwrap_or_default(),
                Some(c) => render_cell(c, o, map.korean),
            })
            .collect()
    };

    let mut rows = Vec::with_capacity(base.rows.len().max(edited.len()));
    for row in &base.rows {
        let date = row_date(row);
        match date.and_then(|d| pending.remove(&d)) {
            Some(o) => rows.push(apply(row, o)),
            None => {
                let measured = row.get(peak_idx).is_some_and(|c| !c.trim().is_empty());
                if date.is_none() || !measured {
                    rows.push(row.clone());
                }
            }
        }
    }

    let mut added: Vec<&Observation> = pending.into_values().collect();
    added.sort_by_key(|o| o.date);
    for o in added {
        let at = rows
            .iter()
            .position(|r| row_date(r).is_some_and(|d| d > o.date))
            .unwrap_or(rows.len());
        rows.insert(at, apply(&[], o));
    }

    Ok(RawTable::new(base.headers.clone(), rows))
}

fn render_cell(column: Column, o: &Observation, korean: bool) -> String {
    let num = |v: Option<f64>| v.map(format_number).unwrap_or_default();
    match column {
        Column::Date => o.date.format("%Y-%m-%d").to_string(),
        Column::HighTemp => num(o.high_temp),
        Column::AvgTemp => num(o.avg_temp),
        Column::LowTemp => num(o.low_temp),
        Column::FeelsLikeTemp => num(o.feels_like_temp),
        Column::PeakDemand => format_number(o.peak_demand),
        Column::MinDemand => num(o.min_demand),
        Column::GasDemand => num(o.gas_demand),
        Column::SolarPeak => num(o.solar_peak),
        Column::Weekday => weekday_label(o.weekday(), korean).to_string(),
        Column::BusinessDay => match o.is_business_day {
            Some(true) if korean => "평일".to_string(),
            Some(false) if korean => "휴일".to_string(),
            Some(v) => v.to_string(),
            None => String::new(),
        },
        Column::Holiday => o.is_holiday.map(|v| v.to_string()).unwrap_or_default(),
        Column::Month => String::new(),
    }
}

pub fn weekday_label(weekday: Weekday, korean: bool) -> &'static str {
    match (weekday, korean) {
        (Weekday::Mon, true) => "월요일",
        (Weekday::Tue, true) => "화요일",
        (Weekday::Wed, true) => "수요일",
        (Weekday::Thu, true) => "목요일",
        (Weekday::Fri, true) => "금요일",
        (Weekday::Sat, true) => "토요일",
        (Weekday::Sun, true) => "일요일",
        (Weekday::Mon, false) => "Monday",
        (Weekday::Tue, false) => "Tuesday",
        (Weekday::Wed, false) => "Wednesday",
        (Weekday::Thu, false) => "Thursday",
        (Weekday::Fri, false) => "Friday",
        (Weekday::Sat, false) => "Saturday",
        (Weekday::Sun, false) => "Sunday",
    }
}

/// Accepts ISO dates, `/` and `.` separators, the spaced Korean locale form
/// (`2024. 1. 5`) and timestamps, keeping only the date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_end_matches('.');
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y. %m. %d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "y" | "yes" | "o" | "평일" => Some(true),
        "0" | "false" | "n" | "no" | "x" | "주말" | "휴일" | "공휴일" => Some(false),
        _ => None,
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// English header row for a table with no stored layout: `date` and
/// `peak_demand` always, other columns only when some observation has them.
pub fn canonical_headers(observations: &[Observation]) -> Vec<String> {
    let any_num = |f: fn(&Observation) -> Option<f64>| observations.iter().any(|o| f(o).is_some());
    let any_flag = |f: fn(&Observation) -> Option<bool>| observations.iter().any(|o| f(o).is_some());

    let columns = [
        (Column::Date, true),
        (Column::HighTemp, any_num(|o| o.high_temp)),
        (Column::AvgTemp, any_num(|o| o.avg_temp)),
        (Column::LowTemp, any_num(|o| o.low_temp)),
        (Column::FeelsLikeTemp, any_num(|o| o.feels_like_temp)),
        (Column::PeakDemand, true),
        (Column::MinDemand, any_num(|o| o.min_demand)),
        (Column::GasDemand, any_num(|o| o.gas_demand)),
        (Column::SolarPeak, any_num(|o| o.solar_peak)),
        (Column::Holiday, any_flag(|o| o.is_holiday)),
        (Column::BusinessDay, any_flag(|o| o.is_business_day)),
    ];
    columns
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(c, _)| c.english_name().to_string())
        .collect()
}

/// Summary of one numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub name: &'static str,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    fn from_values(name: &'static str, values: impl Iterator<Item = Option<f64>>) -> Self {
        let mut present = Vec::new();
        let mut missing = 0;
        for v in values {
            match v {
                Some(x) => present.push(x),
                None => missing += 1,
            }
        }
        let count = present.len();
        if count == 0 {
            return Self { name, count, missing, mean: None, std: None, min: None, max: None };
        }
        let mean = present.iter().sum::<f64>() / count as f64;
        // Sample standard deviation, undefined for a single value
        let std = (count > 1).then(|| {
            (present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        });
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { name, count, missing, mean: Some(mean), std, min: Some(min), max: Some(max) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub rows: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub business_days: usize,
    pub weekend_days: usize,
    pub columns: Vec<ColumnStats>,
}

impl DatasetStats {
    pub fn compute(observations: &[Observation]) -> Self {
        let o = observations;
        let columns = vec![
            ColumnStats::from_values("high_temp", o.iter().map(|r| r.high_temp)),
            ColumnStats::from_values("avg_temp", o.iter().map(|r| r.avg_temp)),
            ColumnStats::from_values("low_temp", o.iter().map(|r| r.low_temp)),
            ColumnStats::from_values("feels_like_temp", o.iter().map(|r| r.feels_like_temp)),
            ColumnStats::from_values("peak_demand", o.iter().map(|r| Some(r.peak_demand))),
            ColumnStats::from_values("min_demand", o.iter().map(|r| r.min_demand)),
            ColumnStats::from_values("gas_demand", o.iter().map(|r| r.gas_demand)),
            ColumnStats::from_values("solar_peak", o.iter().map(|r| r.solar_peak)),
        ];
        let weekend_days = o.iter().filter(|r| is_weekend(r.weekday())).count();

        Self {
            rows: o.len(),
            start: o.first().map(|r| r.date),
            end: o.last().map(|r| r.date),
            business_days: o.len() - weekend_days,
            weekend_days,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[rstest]
    #[case("2024-03-05")]
    #[case("2024/03/05")]
    #[case("2024.03.05")]
    #[case("2024. 3. 5")]
    #[case("2024. 3. 5.")]
    #[case("2024-03-05T00:00:00")]
    #[case("2024-03-05 13:45:00")]
    fn test_parse_date_formats(#[case] input: &str) {
        assert_eq!(parse_date(input), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_parse_number_strips_separators() {
        assert_eq!(parse_number("75,432"), Some(75_432.0));
        assert_eq!(parse_number(" -3.5 "), Some(-3.5));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_parse_korean_headers() {
        let table = RawTable::new(
            s(&["날짜", "최고기온", "평균기온", "최저기온", "최대수요", "최저수요", "요일", "평일"]),
            vec![
                s(&["2024-01-02", "3.1", "-0.5", "-4", "88,000", "61,000", "화요일", "평일"]),
                s(&["2024-01-01", "2.0", "-1.0", "-5", "80,000", "60,000", "월요일", "휴일"]),
            ],
        );
        let parsed = parse_observations(&table).unwrap();
        assert_eq!(parsed.observations.len(), 2);
        // Sorted ascending
        assert_eq!(parsed.observations[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(parsed.observations[0].is_business_day, Some(false));
        assert_eq!(parsed.observations[1].peak_demand, 88_000.0);
        assert_eq!(parsed.observations[1].min_demand, Some(61_000.0));
    }

    #[test]
    fn test_missing_required_columns() {
        let table = RawTable::new(s(&["date", "high_temp"]), vec![]);
        match parse_observations(&table) {
            Err(DataError::MissingColumns(cols)) => assert_eq!(cols, vec!["peak_demand".to_string()]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_cell_reports_position() {
        let table = RawTable::new(
            s(&["date", "high_temp", "peak_demand"]),
            vec![s(&["2024-01-01", "warm", "100"])],
        );
        match parse_observations(&table) {
            Err(DataError::InvalidCell { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "high_temp");
                assert_eq!(value, "warm");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_blank_peak_is_skipped_and_duplicates_rejected() {
        let table = RawTable::new(
            s(&["date", "peak_demand"]),
            vec![s(&["2024-01-01", "100"]), s(&["2024-01-02", ""])],
        );
        let parsed = parse_observations(&table).unwrap();
        assert_eq!(parsed.observations.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);

        let dup = RawTable::new(
            s(&["date", "peak_demand"]),
            vec![s(&["2024-01-01", "100"]), s(&["2024/01/01", "101"])],
        );
        assert!(matches!(parse_observations(&dup), Err(DataError::DuplicateDate(_))));
    }

    #[test]
    fn test_canonical_headers_follow_present_columns() {
        let mut o = Observation::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10.0);
        o.low_temp = Some(-1.0);
        o.is_business_day = Some(false);
        assert_eq!(
            canonical_headers(&[o]),
            s(&["date", "low_temp", "peak_demand", "is_business_day"])
        );
        assert_eq!(canonical_headers(&[]), s(&["date", "peak_demand"]));
    }

    #[test]
    fn test_render_drops_month_and_keeps_layout() {
        let headers = s(&["날짜", "월", "최대수요", "요일", "비고"]);
        let mut o = Observation::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 91_000.0);
        o.high_temp = Some(1.5);
        let table = render_observations(&headers, &[o]).unwrap();

        assert_eq!(table.headers, s(&["날짜", "최대수요", "요일", "비고"]));
        assert_eq!(table.rows[0], s(&["2024-01-03", "91000", "수요일", ""]));
    }

    #[test]
    fn test_from_values_pads_and_drops_blank_rows() {
        let t = RawTable::from_values(vec![
            s(&["date", "peak_demand", "high_temp"]),
            s(&["2024-01-01", "1"]),
            s(&["", "", ""]),
        ])
        .unwrap();
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].len(), 3);
        assert!(matches!(RawTable::from_values(vec![]), Err(DataError::EmptySheet)));
    }

    #[test]
    fn test_dataset_stats() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(); // Saturday
        let mut a = Observation::new(d, 10.0);
        a.high_temp = Some(2.0);
        let b = Observation::new(d.succ_opt().unwrap().succ_opt().unwrap(), 30.0);
        let stats = DatasetStats::compute(&[a, b]);

        assert_eq!(stats.rows, 2);
        assert_eq!(stats.weekend_days, 1);
        let peak = stats.columns.iter().find(|c| c.name == "peak_demand").unwrap();
        assert_eq!(peak.mean, Some(20.0));
        assert_eq!(peak.min, Some(10.0));
        assert_eq!(peak.max, Some(30.0));
        let high = stats.columns.iter().find(|c| c.name == "high_temp").unwrap();
        assert_eq!(high.count, 1);
        assert_eq!(high.missing, 1);
        assert_eq!(high.std, None);
    }

    fn notes_table() -> RawTable {
        RawTable::new(
            s(&["date", "peak_demand", "note"]),
            vec![
                s(&["2024-07-01", "100", "keep-me"]),
                s(&["2024-07-02", "", "pending"]),
                s(&["2024-07-03", "120", "also"]),
            ],
        )
    }

    #[test]
    fn test_merge_keeps_unknown_cells_and_unmeasured_rows() {
        let base = notes_table();
        let mut edited = parse_observations(&base).unwrap().observations;
        edited[0].peak_demand = 101.0;

        let merged = merge_observations(&base, &edited).unwrap();
        assert_eq!(merged.headers, base.headers);
        assert_eq!(merged.rows[0], s(&["2024-07-01", "101", "keep-me"]));
        assert_eq!(merged.rows[1], base.rows[1]);
        assert_eq!(merged.rows[2], base.rows[2]);
    }

    #[test]
    fn test_merge_fills_inserts_and_removes_by_date() {
        let base = notes_table();
        let d = |day: u32| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        // 07-01 removed, 07-02 measured at last, 07-04 new
        let edited = vec![
            Observation::new(d(2), 110.0),
            Observation::new(d(3), 120.0),
            Observation::new(d(4), 130.0),
        ];

        let merged = merge_observations(&base, &edited).unwrap();
        assert_eq!(
            merged.rows,
            vec![
                s(&["2024-07-02", "110", "pending"]),
                s(&["2024-07-03", "120", "also"]),
                s(&["2024-07-04", "130", ""]),
            ]
        );
    }

    #[test]
    fn test_merge_rejects_duplicate_edits() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let edited = vec![Observation::new(d, 1.0), Observation::new(d, 2.0)];
        assert!(matches!(
            merge_observations(&notes_table(), &edited),
            Err(DataError::DuplicateDate(_))
        ));
    }
}
