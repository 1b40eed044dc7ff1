//! Aggregated historical outcomes per search term.
//!
//! Materializes the optimizer's view of the result log: how often a term ran,
//! how many new rows it produced, and how fast. All matching is done on the
//! lowercased term so re-enqueues with different casing fold together.

use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// One term's aggregate history.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct TermHistory {
    pub term: String,
    pub runs: i64,
    /// Sum of newly inserted rows across runs.
    pub total_results: i64,
    /// Fraction of runs that produced at least one new row.
    pub success_rate: f64,
    pub avg_results: f64,
    /// New rows per second of scrape time; falls back to `avg_results` when
    /// no durations were recorded.
    pub efficiency: f64,
    pub last_used_at: DateTime<Utc>,
}

/// Fetch aggregate history for every term in the result log.
pub async fn fetch_term_history(pool: &PgPool) -> Result<Vec<TermHistory>> {
    let rows = sqlx::query_as::<_, TermHistory>(
        r#"
        SELECT
            LOWER(search_term)::TEXT AS "term",
            COUNT(*)::BIGINT AS "runs",
            COALESCE(SUM(results_found), 0)::BIGINT AS "total_results",
            AVG(CASE WHEN results_found > 0 THEN 1.0 ELSE 0.0 END)::FLOAT8 AS "success_rate",
            (COALESCE(SUM(results_found), 0)::FLOAT8 / COUNT(*))::FLOAT8 AS "avg_results",
            COALESCE(
                SUM(results_found)::FLOAT8 / NULLIF(SUM(duration_ms)::FLOAT8 / 1000.0, 0),
                COALESCE(SUM(results_found), 0)::FLOAT8 / COUNT(*)
            )::FLOAT8 AS "efficiency",
            MAX(completed_at) AS "last_used_at"
        FROM scrape_job_results
        GROUP BY LOWER(search_term)
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
