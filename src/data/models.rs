//! Row models for the database schema.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A stored property row.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Property {
    pub id: i32,
    pub property_id: String,
    pub owner_name: String,
    pub prop_type: Option<String>,
    pub city: Option<String>,
    pub street_primary: Option<String>,
    pub assessed_value: Option<f64>,
    pub appraised_value: f64,
    pub geo_id: Option<String>,
    pub legal_description: Option<String>,
    pub search_term: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live job in the queue.
///
/// State is structural: a set `locked_at` means active, a future `execute_at`
/// means delayed, otherwise pending. Terminal attempts move to
/// `scrape_job_results` and the queue row is deleted.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct QueuedJob {
    pub id: i32,
    /// Payload kind tag; workers dispatch on this and fail unknown kinds
    /// terminally instead of shape-sniffing.
    pub kind: String,
    pub search_term: String,
    pub priority: i32,
    pub execute_at: DateTime<Utc>,
    pub queued_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
}

/// Options for enqueueing a job. Lower priority numbers run earlier.
#[derive(Debug, Clone)]
pub struct EnqueueOpts {
    pub priority: i32,
    pub delay: Option<Duration>,
    pub max_retries: i32,
}

impl Default for EnqueueOpts {
    fn default() -> Self {
        Self {
            priority: 10,
            delay: None,
            max_retries: 3,
        }
    }
}

/// Durable record of one finished attempt, appended when a job reaches a
/// terminal state.
#[derive(Debug, Clone)]
pub struct JobResult<'a> {
    pub search_term: &'a str,
    pub success: bool,
    pub error_kind: Option<&'a str>,
    pub error_message: Option<&'a str>,
    /// Total rows returned by the upstream.
    pub properties_fetched: i32,
    /// Newly inserted rows only; what the optimizer attributes to the term.
    pub results_found: i32,
    pub retry_count: i32,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i32,
}

/// Counts by state across the queue and the result log.
#[derive(sqlx::FromRow, Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub pending: i64,
    pub active: i64,
    pub delayed: i64,
    pub completed: i64,
    pub failed: i64,
}

impl QueueStats {
    /// Jobs still in flight: everything not yet terminal.
    pub fn depth(&self) -> i64 {
        self.pending + self.active + self.delayed
    }
}
