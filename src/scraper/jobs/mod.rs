pub mod term;

use crate::data::models::QueuedJob;
use crate::tcad::TcadApi;
use crate::tcad::errors::ScrapeError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Enumerated job payload kinds carried by the queue.
///
/// The queue stores the kind as a tag next to the payload so new job types
/// can be added without runtime shape-sniffing; workers reject unknown tags
/// terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ScrapeProperties,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ScrapeProperties => "scrape-properties",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "scrape-properties" => Some(JobKind::ScrapeProperties),
            _ => None,
        }
    }
}

/// Errors that can occur turning a queue row into a runnable job.
#[derive(Debug, thiserror::Error)]
pub enum JobParseError {
    #[error("unsupported job kind: {0}")]
    UnsupportedKind(String),
}

/// Row counts a completed job reports back to the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCounts {
    /// Total rows the upstream returned.
    pub fetched: i32,
    /// Rows that were newly inserted; the job's result-count.
    pub inserted: i32,
}

/// Common trait interface for all job types.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The payload kind this job handles.
    #[allow(dead_code)]
    fn kind(&self) -> JobKind;

    /// Run the job with the given API client and database pool.
    async fn process(
        &self,
        api: &TcadApi,
        pool: &PgPool,
        cancel: &CancellationToken,
    ) -> Result<JobCounts, ScrapeError>;

    /// Human-readable description for logging.
    fn description(&self) -> String;
}

/// Build the runnable job for a reserved queue row.
pub fn from_queued(job: &QueuedJob) -> Result<Box<dyn Job>, JobParseError> {
    match JobKind::parse(&job.kind) {
        Some(JobKind::ScrapeProperties) => Ok(Box::new(term::ScrapePropertiesJob::new(
            job.search_term.clone(),
        ))),
        None => Err(JobParseError::UnsupportedKind(job.kind.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        assert_eq!(
            JobKind::parse(JobKind::ScrapeProperties.as_str()),
            Some(JobKind::ScrapeProperties)
        );
        assert_eq!(JobKind::parse("reindex-everything"), None);
    }
}
