//! Local CSV file source, for offline use and exports.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{DataError, DataSource, RangeUpdate};
use crate::domain::RawTable;

#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse CSV text (first record is the header) into a raw table.
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<RawTable, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        values.push(record.iter().map(str::to_string).collect());
    }
    RawTable::from_values(values)
}

/// Serialise a raw table, header first.
pub fn write_csv<W: std::io::Write>(writer: W, table: &RawTable) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn apply_updates(table: &mut RawTable, updates: &[RangeUpdate]) -> Result<(), DataError> {
    for u in updates {
        for (offset, values) in u.values.iter().enumerate() {
            let idx = (u.start_row + offset)
                .checked_sub(2)
                .filter(|i| *i < table.rows.len())
                .ok_or_else(|| {
                    DataError::Decode(format!("row {} outside table", u.start_row + offset))
                })?;
            table.rows[idx] = values.clone();
        }
    }
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T, DataError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DataError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DataError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

#[async_trait]
impl DataSource for CsvFileSource {
    async fn read_table(&self) -> Result<RawTable, DataError> {
        let path = self.path.clone();
        let table = blocking(move || read_csv(std::fs::File::open(&path)?)).await?;
        info!(path = %self.path.display(), rows = table.rows.len(), "csv loaded");
        Ok(table)
    }

    async fn write_full(&self, table: &RawTable) -> Result<(), DataError> {
        let path = self.path.clone();
        let table = table.clone();
        blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            write_csv(std::fs::File::create(&path)?, &table)
        })
        .await?;
        info!(path = %self.path.display(), "csv written");
        Ok(())
    }

    async fn write_ranges(&self, updates: &[RangeUpdate]) -> Result<(), DataError> {
        if updates.is_empty() {
            return Ok(());
        }
        // A file has no partial update; patch in memory and rewrite.
        let mut table = self.read_table().await?;
        apply_updates(&mut table, updates)?;
        self.write_full(&table).await
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawTable {
        RawTable::new(
            vec!["date".into(), "peak_demand".into()],
            vec![
                vec!["2024-01-01".into(), "70,000".into()],
                vec!["2024-01-02".into(), "71000".into()],
            ],
        )
    }

    #[test]
    fn test_write_then_read_preserves_quoted_cells() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\"70,000\""));

        let back = read_csv(buf.as_slice()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_apply_updates_rejects_out_of_range_rows() {
        let mut t = sample();
        let ok = RangeUpdate {
            start_row: 3,
            end_row: 3,
            values: vec![vec!["2024-01-02".into(), "99".into()]],
        };
        apply_updates(&mut t, &[ok]).unwrap();
        assert_eq!(t.rows[1][1], "99");

        let bad = RangeUpdate {
            start_row: 9,
            end_row: 9,
            values: vec![vec![]],
        };
        assert!(apply_updates(&mut t, &[bad]).is_err());
    }

    #[tokio::test]
    async fn test_file_round_trip_with_range_update() {
        let path = std::env::temp_dir().join(format!("pdf-csv-{}.csv", std::process::id()));
        let source = CsvFileSource::new(&path);
        source.write_full(&sample()).await.unwrap();

        source
            .write_ranges(&[RangeUpdate {
                start_row: 2,
                end_row: 2,
                values: vec![vec!["2024-01-01".into(), "65000".into()]],
            }])
            .await
            .unwrap();

        let table = source.read_table().await.unwrap();
        assert_eq!(table.rows[0][1], "65000");
        assert_eq!(table.rows[1][1], "71000");
        let _ = std::fs::remove_file(path);
    }
}
