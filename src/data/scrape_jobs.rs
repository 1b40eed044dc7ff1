//! Database operations for scrape job queue management.

use crate::data::models::{EnqueueOpts, JobResult, QueueStats, QueuedJob};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;

/// How long a lock can be held before it is considered expired and reclaimable.
///
/// This is the queue's visibility timeout: a worker that dies between reserve
/// and ack leaves its job locked, and the job becomes reservable again once
/// this much time has passed. Under normal operation the worker's own scrape
/// timeout fires well before this threshold.
const LOCK_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Force-unlock all jobs that have a non-NULL `locked_at`.
///
/// Intended to be called once at startup to recover jobs left locked by
/// a previous unclean shutdown (crash, OOM kill, etc.).
///
/// # Returns
/// The number of jobs that were unlocked.
pub async fn force_unlock_all(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE scrape_jobs SET locked_at = NULL, queued_at = NOW() WHERE locked_at IS NOT NULL",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete all unlocked jobs, regardless of readiness.
///
/// Used by the driver's clean-start mode to discard terms queued by a
/// previous generator configuration. Locked jobs are left for their workers.
pub async fn clear_pending(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM scrape_jobs WHERE locked_at IS NULL")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Atomically fetch and lock the next available scrape job.
///
/// Uses `FOR UPDATE SKIP LOCKED` to allow multiple workers to poll the queue
/// concurrently without conflicts. Considers jobs that are:
/// - Unlocked and ready to execute, OR
/// - Locked but past [`LOCK_EXPIRY`] (abandoned by a dead worker)
///
/// Ready jobs are ordered by priority (lower first), then by `execute_at`,
/// giving FIFO within a priority class.
///
/// # Returns
/// * `Ok(Some(job))` if a job was successfully fetched and locked
/// * `Ok(None)` if no jobs are available
pub async fn fetch_and_lock_job(pool: &PgPool) -> Result<Option<QueuedJob>> {
    let mut tx = pool.begin().await?;

    let lock_expiry_secs = LOCK_EXPIRY.as_secs() as i32;
    let job = sqlx::query_as::<_, QueuedJob>(
        "SELECT * FROM scrape_jobs \
         WHERE (locked_at IS NULL OR locked_at < NOW() - make_interval(secs => $1::double precision)) \
         AND execute_at <= NOW() \
         ORDER BY priority ASC, execute_at ASC \
         LIMIT 1 \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(lock_expiry_secs)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(ref job) = job {
        sqlx::query("UPDATE scrape_jobs SET locked_at = NOW() WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(job)
}

/// Enqueue a single term.
pub async fn enqueue(term: &str, opts: &EnqueueOpts, pool: &PgPool) -> Result<QueuedJob> {
    let delay_secs = opts.delay.map(|d| d.as_secs() as f64).unwrap_or(0.0);
    let job = sqlx::query_as::<_, QueuedJob>(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at, queued_at, max_retries)
         VALUES ($1, $2, NOW() + make_interval(secs => $3::double precision), NOW(), $4)
         RETURNING *",
    )
    .bind(term)
    .bind(opts.priority)
    .bind(delay_secs)
    .bind(opts.max_retries)
    .fetch_one(pool)
    .await?;
    Ok(job)
}

/// Batch insert jobs using UNNEST for a single round-trip.
///
/// All jobs share the same options; the delay (if any) applies uniformly.
pub async fn batch_enqueue(
    terms: &[String],
    opts: &EnqueueOpts,
    pool: &PgPool,
) -> Result<Vec<QueuedJob>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let delay_secs = opts.delay.map(|d| d.as_secs() as f64).unwrap_or(0.0);
    let inserted = sqlx::query_as::<_, QueuedJob>(
        r#"
        INSERT INTO scrape_jobs (search_term, priority, execute_at, queued_at, max_retries)
        SELECT v.search_term, $2, NOW() + make_interval(secs => $3::double precision), NOW(), $4
        FROM UNNEST($1::text[]) AS v(search_term)
        RETURNING *
        "#,
    )
    .bind(terms)
    .bind(opts.priority)
    .bind(delay_secs)
    .bind(opts.max_retries)
    .fetch_all(pool)
    .await?;

    Ok(inserted)
}

/// Find which of the candidate terms already have a live queue row.
///
/// Matching is case-insensitive; returns the lowercased forms found. Used to
/// avoid double-enqueueing a term that is already pending or in flight.
pub async fn find_existing_terms(
    candidates: &[String],
    pool: &PgPool,
) -> Result<HashSet<String>> {
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }

    let lowered: Vec<String> = candidates.iter().map(|t| t.to_lowercase()).collect();
    let existing: Vec<(String,)> = sqlx::query_as(
        "SELECT LOWER(search_term) FROM scrape_jobs WHERE LOWER(search_term) = ANY($1)",
    )
    .bind(&lowered)
    .fetch_all(pool)
    .await?;

    Ok(existing.into_iter().map(|(term,)| term).collect())
}

/// Delete a scrape job by ID.
///
/// Called after a job has reached a terminal state and its result row has
/// been recorded.
pub async fn delete_job(job_id: i32, pool: &PgPool) -> Result<()> {
    sqlx::query("DELETE FROM scrape_jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hard-delete a job that is not currently reserved.
///
/// Used for deduplication cleanup of pending or delayed jobs. Refuses to
/// touch an active job.
///
/// # Returns
/// `true` if a row was removed.
pub async fn remove_job(job_id: i32, pool: &PgPool) -> Result<bool> {
    let result = sqlx::query("DELETE FROM scrape_jobs WHERE id = $1 AND locked_at IS NULL")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Unlock a scrape job by clearing its `locked_at` timestamp.
///
/// Used to release a job back to the queue untouched, e.g. when a scrape was
/// cancelled by shutdown. The retry count is not incremented.
pub async fn unlock_job(job_id: i32, pool: &PgPool) -> Result<()> {
    sqlx::query("UPDATE scrape_jobs SET locked_at = NULL WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Atomically unlock a job, increment its retry count, and push `execute_at`
/// into the future by `backoff`.
///
/// Returns the new `execute_at` timestamp if retries remain, or `None` if
/// the job has exhausted its retries. This is determined atomically in the
/// database to avoid race conditions between workers.
pub async fn unlock_and_increment_retry(
    job_id: i32,
    max_retries: i32,
    backoff: Duration,
    pool: &PgPool,
) -> Result<Option<DateTime<Utc>>> {
    let result = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "UPDATE scrape_jobs
         SET locked_at = NULL,
             retry_count = retry_count + 1,
             queued_at = NOW(),
             execute_at = NOW() + make_interval(secs => $3::double precision)
         WHERE id = $1
         RETURNING CASE WHEN retry_count <= $2 THEN execute_at ELSE NULL END",
    )
    .bind(job_id)
    .bind(max_retries)
    .bind(backoff.as_secs_f64())
    .fetch_one(pool)
    .await?;

    Ok(result)
}

/// Insert a scrape job result log entry.
pub async fn insert_job_result(result: &JobResult<'_>, pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scrape_job_results (
            search_term, success, error_kind, error_message,
            properties_fetched, results_found, retry_count,
            queued_at, started_at, completed_at, duration_ms
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), $10)
        "#,
    )
    .bind(result.search_term)
    .bind(result.success)
    .bind(result.error_kind)
    .bind(result.error_message)
    .bind(result.properties_fetched)
    .bind(result.results_found)
    .bind(result.retry_count)
    .bind(result.queued_at)
    .bind(result.started_at)
    .bind(result.duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Counts by state across the live queue and the result log.
pub async fn queue_stats(pool: &PgPool) -> Result<QueueStats> {
    let stats = sqlx::query_as::<_, QueueStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM scrape_jobs
             WHERE locked_at IS NULL AND execute_at <= NOW())::BIGINT AS pending,
            (SELECT COUNT(*) FROM scrape_jobs
             WHERE locked_at IS NOT NULL)::BIGINT AS active,
            (SELECT COUNT(*) FROM scrape_jobs
             WHERE locked_at IS NULL AND execute_at > NOW())::BIGINT AS delayed,
            (SELECT COUNT(*) FROM scrape_job_results WHERE success)::BIGINT AS completed,
            (SELECT COUNT(*) FROM scrape_job_results WHERE NOT success)::BIGINT AS failed
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

/// Bound the result log: keep the most recent `keep_completed` successful and
/// `keep_failed` failed entries, delete the rest.
///
/// # Returns
/// The number of rows pruned.
pub async fn prune_results(keep_completed: i64, keep_failed: i64, pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM scrape_job_results WHERE id IN (
            SELECT id FROM (
                SELECT id,
                       ROW_NUMBER() OVER (PARTITION BY success ORDER BY completed_at DESC) AS rn,
                       success
                FROM scrape_job_results
            ) ranked
            WHERE (ranked.success AND ranked.rn > $1)
               OR (NOT ranked.success AND ranked.rn > $2)
        )
        "#,
    )
    .bind(keep_completed)
    .bind(keep_failed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Load every search term ever seen, from both the live queue and the result
/// log. Feeds the deduplicator's historical term cache.
pub async fn load_historical_terms(pool: &PgPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT LOWER(search_term) FROM scrape_jobs
         UNION
         SELECT DISTINCT LOWER(search_term) FROM scrape_job_results",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(term,)| term).collect())
}
