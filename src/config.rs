use anyhow::Result;
use chrono::NaiveDate;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::forecast::features::FeatureId;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 60,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sheets,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub base_url: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// OAuth bearer token; obtaining it is left to the deployment.
    pub access_token: String,
    pub csv_path: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            base_url: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            access_token: String::new(),
            csv_path: "data/power_data.csv".to_string(),
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekdayEncoding {
    /// Monday is the baseline and gets no indicator column.
    DropFirst,
    All,
}

/// Which side of `cooling_reference_c` counts toward cooling intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingDirection {
    /// `max(0, reference - T)`: degrees short of the reference.
    BelowReference,
    /// `max(0, T - reference)`: degrees past the reference, the usual
    /// cooling-degree reading.
    AboveReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastYearFallback {
    /// Month x weekday mean of all earlier days, then the mean of all
    /// earlier days.
    AllData,
    /// Leave the feature empty when the prior year has no matching cell.
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// ISO 3166 alpha-2 code selecting the fixed-date holiday table.
    pub country: String,
    pub cooling_reference_c: f64,
    pub cooling_direction: CoolingDirection,
    pub heating_reference_c: f64,
    pub summer_months: Vec<u32>,
    pub winter_months: Vec<u32>,
    pub weekday_encoding: WeekdayEncoding,
    pub last_year_fallback: LastYearFallback,
    /// Rows before this date are ignored when computing gas budget ratios.
    pub gas_cutoff_date: Option<NaiveDate>,
    /// Movable holidays (lunar new year, Chuseok, substitutes, ...).
    pub extra_holidays: Vec<NaiveDate>,
    pub peak_features: Option<Vec<FeatureId>>,
    pub min_features: Option<Vec<FeatureId>>,
    pub gas_features: Option<Vec<FeatureId>>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            country: "KR".to_string(),
            cooling_reference_c: 25.0,
            cooling_direction: CoolingDirection::BelowReference,
            heating_reference_c: 10.0,
            summer_months: vec![5, 6, 7, 8, 9],
            winter_months: vec![10, 11, 12, 1, 2, 3, 4],
            weekday_encoding: WeekdayEncoding::DropFirst,
            last_year_fallback: LastYearFallback::AllData,
            gas_cutoff_date: None,
            extra_holidays: Vec::new(),
            peak_features: None,
            min_features: None,
            gas_features: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    /// Predicts the training mean. Baseline for sanity checks.
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Monotone {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct MonotoneConstraint {
    pub feature: FeatureId,
    pub direction: Monotone,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub n_splits: usize,
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<u16>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_splits: 3,
            n_trees: vec![50, 100],
            max_depth: vec![6, 10],
            min_samples_leaf: vec![1, 2],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub min_training_rows: usize,
    pub model: ModelKind,
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
    pub search: SearchConfig,
    /// Constraints requested for the gas model. Only honoured by backends
    /// that support them; the random forest logs and ignores them.
    pub gas_monotone: Vec<MonotoneConstraint>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            min_training_rows: 2,
            model: ModelKind::RandomForest,
            n_trees: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
            search: SearchConfig::default(),
            gas_monotone: vec![
                MonotoneConstraint {
                    feature: FeatureId::ResidualLoad,
                    direction: Monotone::Increasing,
                },
                MonotoneConstraint {
                    feature: FeatureId::SolarPeak,
                    direction: Monotone::Decreasing,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub max_horizon_days: usize,
    pub history_buffer_days: usize,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub avg_temp_spread_c: f64,
    pub timezone: chrono_tz::Tz,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_horizon_days: 7,
            history_buffer_days: 14,
            confidence_floor: 60.0,
            confidence_ceiling: 95.0,
            avg_temp_spread_c: 5.0,
            timezone: chrono_tz::Asia::Seoul,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("PDF__").split("__"));
        Ok(figment.extract()?)
    }
}
