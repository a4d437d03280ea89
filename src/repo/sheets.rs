//! Google Sheets (values API v4) adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::diff::{quote_sheet, stale_ranges};
use super::{DataError, DataSource, RangeUpdate};
use crate::config::SourceConfig;
use crate::domain::RawTable;

#[derive(Clone)]
pub struct GoogleSheetsSource {
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
    client: ClientWithMiddleware,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: String,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Serialize)]
struct BatchClearBody {
    ranges: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody<'a> {
    value_input_option: &'static str,
    data: Vec<ValueRangeBody<'a>>,
}

impl GoogleSheetsSource {
    pub fn new(cfg: &SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("peak-demand-forecaster/0.2"));
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .default_headers(headers)
            .build()?;

        let policy = ExponentialBackoff::builder().build_with_max_retries(cfg.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(policy))
            .build();

        Ok(Self {
            base_url: cfg.base_url.clone(),
            spreadsheet_id: cfg.spreadsheet_id.clone(),
            sheet_name: cfg.sheet_name.clone(),
            access_token: cfg.access_token.clone(),
            client,
        })
    }

    /// `{base}/v4/spreadsheets/{id}/{tail...}` with each tail item as one
    /// percent-encoded path segment.
    fn url(&self, tail: &[&str], query: Option<&str>) -> Result<Url, DataError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DataError::Transport(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DataError::Transport("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(tail);
        url.set_query(query);
        Ok(url)
    }

    fn values_url(&self, range: &str, suffix: &str, query: Option<&str>) -> Result<Url, DataError> {
        let segment = format!("{range}{suffix}");
        self.url(&["values", segment.as_str()], query)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn check(resp: reqwest::Response) -> Result<String, DataError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        url: Url,
        body: Vec<u8>,
    ) -> Result<String, DataError> {
        let resp = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, self.auth())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;
        Self::check(resp).await
    }

    async fn fetch_values(&self, range: &str) -> Result<Vec<Vec<String>>, DataError> {
        let url = self.values_url(range, "", None)?;
        debug!(%url, "reading sheet");

        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;
        let body = Self::check(resp).await?;
        let parsed: ValueRange =
            serde_json::from_str(&body).map_err(|e| DataError::Decode(e.to_string()))?;
        Ok(parsed.values)
    }
}

#[async_trait]
impl DataSource for GoogleSheetsSource {
    async fn read_table(&self) -> Result<RawTable, DataError> {
        let range = quote_sheet(&self.sheet_name);
        let table = RawTable::from_values(self.fetch_values(&range).await?)?;
        info!(range = %range, rows = table.rows.len(), "sheet loaded");
        Ok(table)
    }

    /// Overwrite from `A1`, then clear whatever the previous contents left
    /// below or to the right. A failed write leaves the old data in place.
    async fn write_full(&self, table: &RawTable) -> Result<(), DataError> {
        let sheet = quote_sheet(&self.sheet_name);
        let previous = self.fetch_values(&sheet).await?;
        let extent = |v: &[Vec<String>]| (v.len(), v.iter().map(Vec::len).max().unwrap_or(0));
        let old_extent = extent(&previous);

        let range = format!("{sheet}!A1");
        let values = table.to_values();
        let body = ValueRangeBody {
            range: range.clone(),
            major_dimension: "ROWS",
            values: &values,
        };
        let body = serde_json::to_vec(&body).map_err(|e| DataError::Decode(e.to_string()))?;
        let url = self.values_url(&range, "", Some("valueInputOption=RAW"))?;
        self.send_json(reqwest::Method::PUT, url, body).await?;

        let stale = stale_ranges(&self.sheet_name, old_extent, extent(&values));
        if !stale.is_empty() {
            let body = serde_json::to_vec(&BatchClearBody { ranges: stale })
                .map_err(|e| DataError::Decode(e.to_string()))?;
            let url = self.url(&["values:batchClear"], None)?;
            self.send_json(reqwest::Method::POST, url, body).await?;
        }

        info!(range = %range, rows = table.rows.len(), "sheet overwritten");
        Ok(())
    }

    async fn write_ranges(&self, updates: &[RangeUpdate]) -> Result<(), DataError> {
        if updates.is_empty() {
            return Ok(());
        }
        let data = updates
            .iter()
            .map(|u| ValueRangeBody {
                range: u.qualified(&self.sheet_name),
                major_dimension: "ROWS",
                values: &u.values,
            })
            .collect();
        let body = BatchUpdateBody {
            value_input_option: "RAW",
            data,
        };
        let body = serde_json::to_vec(&body).map_err(|e| DataError::Decode(e.to_string()))?;
        let url = self.url(&["values:batchUpdate"], None)?;
        self.send_json(reqwest::Method::POST, url, body).await?;

        info!(groups = updates.len(), "sheet ranges updated");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("google-sheets:{}/{}", self.spreadsheet_id, self.sheet_name)
    }
}
