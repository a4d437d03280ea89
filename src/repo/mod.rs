//! Data source adapters.
//!
//! The modelling core only needs "give me a table of named columns" and
//! "store this same shape back". Credentials, retries and transport live here.

pub mod csv_file;
pub mod diff;
pub mod sheets;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::config::{SourceConfig, SourceKind};
use crate::domain::RawTable;

pub use csv_file::CsvFileSource;
pub use diff::{changed_row_ranges, column_letter, RangeUpdate};
pub use sheets::GoogleSheetsSource;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("sheet contains no rows")]
    EmptySheet,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("invalid value '{value}' in row {row}, column '{column}'")]
    InvalidCell {
        row: usize,
        column: String,
        value: String,
    },

    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("data source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DataError {
    /// Failures worth retrying later (rate limits, outages, network).
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Http { status, .. } => *status == 429 || *status >= 500,
            DataError::Transport(_) | DataError::Io(_) => true,
            _ => false,
        }
    }
}

/// Read/write access to the tabular source of truth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Header row plus every data row, as strings.
    async fn read_table(&self) -> Result<RawTable, DataError>;

    /// Replace the whole sheet with `table`.
    async fn write_full(&self, table: &RawTable) -> Result<(), DataError>;

    /// Overwrite the given contiguous row blocks. No atomicity across blocks.
    async fn write_ranges(&self, updates: &[RangeUpdate]) -> Result<(), DataError>;

    fn describe(&self) -> String;
}

pub fn from_config(cfg: &SourceConfig) -> anyhow::Result<Box<dyn DataSource>> {
    Ok(match cfg.kind {
        SourceKind::Sheets => {
            if cfg.spreadsheet_id.is_empty() {
                anyhow::bail!("source.spreadsheet_id must be set for the sheets source");
            }
            Box::new(GoogleSheetsSource::new(cfg)?)
        }
        SourceKind::Csv => Box::new(CsvFileSource::new(&cfg.csv_path)),
    })
}
