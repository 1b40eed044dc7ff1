use super::{Job, JobCounts, JobKind};
use crate::data::properties;
use crate::tcad::TcadApi;
use crate::tcad::errors::ScrapeError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Job implementation for scraping all properties matching one search term.
#[derive(Debug, Clone)]
pub struct ScrapePropertiesJob {
    pub term: String,
}

impl ScrapePropertiesJob {
    pub fn new(term: String) -> Self {
        Self { term }
    }
}

#[async_trait::async_trait]
impl Job for ScrapePropertiesJob {
    fn kind(&self) -> JobKind {
        JobKind::ScrapeProperties
    }

    async fn process(
        &self,
        api: &TcadApi,
        pool: &PgPool,
        cancel: &CancellationToken,
    ) -> Result<JobCounts, ScrapeError> {
        debug!(term = %self.term, "Processing scrape job");

        let records = api.scrape(&self.term, cancel).await?;
        let fetched = records.len() as i32;

        if records.is_empty() {
            debug!(term = %self.term, "No matches upstream");
            return Ok(JobCounts::default());
        }

        // Storage failures are classified as transport so the queue retries
        // them; Postgres serializes conflicting upserts on the unique key.
        let flags = properties::batch_upsert(&records, &self.term, pool)
            .await
            .map_err(|e| ScrapeError::Transport(format!("storage: {e}")))?;
        let inserted = flags.iter().filter(|inserted| **inserted).count() as i32;

        info!(
            term = %self.term,
            fetched,
            inserted,
            updated = fetched - inserted,
            "Scrape job finished"
        );
        Ok(JobCounts { fetched, inserted })
    }

    fn description(&self) -> String {
        format!("Scrape properties matching: {}", self.term)
    }
}
