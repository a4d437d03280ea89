//! Application state and the per-session store.
//!
//! Every caller works on its own copy of the dataset and its own models;
//! sessions are created on first use and loaded lazily from the data source.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{
    canonical_headers, merge_observations, parse_observations, render_observations, Observation,
    RawTable,
};
use crate::forecast::ForecastError;
use crate::ml::cache::ModelCache;
use crate::pipeline::PipelineContext;
use crate::repo::{self, changed_row_ranges, csv_file::write_csv, DataError, DataSource};

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// How an edited table reached the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SaveOutcome {
    Unchanged,
    Ranges { ranges: usize, rows: usize },
    Full { rows: usize },
}

#[derive(Debug, Default)]
struct Session {
    context: Option<Arc<PipelineContext>>,
    /// Table as last read from or written to the source; diff baseline.
    saved: Option<RawTable>,
    cache: ModelCache,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub source: Arc<dyn DataSource>,
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let source: Arc<dyn DataSource> = repo::from_config(&cfg.source)?.into();
        info!(source = %source.describe(), "data source configured");
        Ok(Self::with_source(cfg, source))
    }

    pub fn with_source(cfg: Config, source: Arc<dyn DataSource>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            source,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, id: &str) -> Arc<Mutex<Session>> {
        if let Some(s) = self.sessions.read().await.get(id) {
            return s.clone();
        }
        self.sessions
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Current context of session `id`, loading it from the source on first use.
    pub async fn context(&self, id: &str) -> Result<Arc<PipelineContext>, SessionError> {
        let session = self.session(id).await;
        let mut session = session.lock().await;
        if let Some(ctx) = &session.context {
            return Ok(ctx.clone());
        }
        self.load_into(id, &mut session).await
    }

    /// Re-read the source and retrain, discarding the session's current state.
    pub async fn reload(&self, id: &str) -> Result<Arc<PipelineContext>, SessionError> {
        let session = self.session(id).await;
        let mut session = session.lock().await;
        self.load_into(id, &mut session).await
    }

    async fn load_into(
        &self,
        id: &str,
        session: &mut Session,
    ) -> Result<Arc<PipelineContext>, SessionError> {
        let table = self.source.read_table().await?;
        let parsed = parse_observations(&table)?;
        info!(
            session = id,
            rows = parsed.observations.len(),
            skipped = parsed.skipped.len(),
            "dataset loaded"
        );
        session.saved = Some(table);
        self.rebuild(session, parsed.observations).await
    }

    /// Persist `observations` as the session's dataset and retrain.
    ///
    /// Edits are merged into the stored table by date, so columns and rows
    /// the parser does not model survive. Only changed rows are written when
    /// the row count is unchanged; otherwise the whole sheet is replaced.
    pub async fn save(
        &self,
        id: &str,
        mut observations: Vec<Observation>,
    ) -> Result<(Arc<PipelineContext>, SaveOutcome), SessionError> {
        observations.sort_by_key(|o| o.date);
        if let Some(w) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DataError::DuplicateDate(w[0].date).into());
        }

        let session = self.session(id).await;
        let mut session = session.lock().await;

        let base = match session.saved.clone() {
            Some(saved) => saved,
            None => match self.source.read_table().await {
                Ok(table) => table,
                Err(DataError::EmptySheet) => {
                    RawTable::new(canonical_headers(&observations), Vec::new())
                }
                Err(e) => return Err(e.into()),
            },
        };
        let edited = merge_observations(&base, &observations)?;

        let outcome = match changed_row_ranges(&base, &edited) {
            Some(updates) if updates.is_empty() => SaveOutcome::Unchanged,
            Some(updates) => {
                self.source.write_ranges(&updates).await?;
                SaveOutcome::Ranges {
                    ranges: updates.len(),
                    rows: updates.iter().map(|u| u.values.len()).sum(),
                }
            }
            None => {
                self.source.write_full(&edited).await?;
                SaveOutcome::Full {
                    rows: edited.rows.len(),
                }
            }
        };
        info!(session = id, ?outcome, "dataset saved");

        // Retrain on what is stored, not on what was sent
        let parsed = parse_observations(&edited)?;
        session.saved = Some(edited);
        let ctx = self.rebuild(&mut session, parsed.observations).await?;
        Ok((ctx, outcome))
    }

    /// The session's dataset as CSV, in the stored column layout.
    pub async fn export_csv(&self, id: &str) -> Result<String, SessionError> {
        let ctx = self.context(id).await?;
        let stored = {
            let session = self.session(id).await;
            let session = session.lock().await;
            session.saved.clone()
        };
        let table = match stored {
            Some(table) => table,
            None => render_observations(&canonical_headers(ctx.observations()), ctx.observations())?,
        };
        let mut buf = Vec::new();
        write_csv(&mut buf, &table)?;
        String::from_utf8(buf).map_err(|e| DataError::Decode(e.to_string()).into())
    }

    /// Feature derivation and training are CPU-bound; run them off the
    /// async workers.
    async fn rebuild(
        &self,
        session: &mut Session,
        observations: Vec<Observation>,
    ) -> Result<Arc<PipelineContext>, SessionError> {
        let cfg = self.cfg.clone();
        let mut cache = std::mem::take(&mut session.cache);
        let (built, cache) = tokio::task::spawn_blocking(move || {
            let built = PipelineContext::build(cfg, observations, &mut cache);
            (built, cache)
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "training task failed");
            SessionError::Task(e.to_string())
        })?;
        session.cache = cache;

        let ctx = Arc::new(built?);
        session.context = Some(ctx.clone());
        Ok(ctx)
    }
}
