use crate::data::models::{JobResult, QueuedJob};
use crate::data::scrape_jobs;
use crate::scraper::jobs::{self, JobCounts};
use crate::tcad::TcadApi;
use crate::tcad::errors::ScrapeError;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// A single worker instance.
///
/// Each worker runs in its own asynchronous task and continuously polls the
/// database for scrape jobs to execute. Shutdown is checkpoint-based: the
/// cancellation token is observed between polls and inside the executor, so
/// a job in flight either finishes or unlocks cleanly.
pub struct Worker {
    id: usize, // For logging purposes
    pool: PgPool,
    api: Arc<TcadApi>,
    retry_base_delay: Duration,
}

impl Worker {
    pub fn new(id: usize, pool: PgPool, api: Arc<TcadApi>, retry_base_delay: Duration) -> Self {
        Self {
            id,
            pool,
            api,
            retry_base_delay,
        }
    }

    /// Runs the worker's main loop until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(worker_id = self.id, "Worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match scrape_jobs::fetch_and_lock_job(&self.pool).await {
                Ok(Some(job)) => {
                    self.execute(job, &cancel).await;
                }
                Ok(None) => {
                    trace!(worker_id = self.id, "No jobs available, waiting");
                    tokio::select! {
                        _ = time::sleep(Duration::from_secs(5)) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                Err(e) => {
                    warn!(worker_id = self.id, error = ?e, "Failed to fetch job");
                    // Wait before retrying to avoid spamming errors.
                    tokio::select! {
                        _ = time::sleep(Duration::from_secs(10)) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
        info!(worker_id = self.id, "Worker stopped");
    }

    /// Run one reserved job to a terminal state or back to the queue.
    async fn execute(&self, job: QueuedJob, cancel: &CancellationToken) {
        let started_at = Utc::now();
        let start = Instant::now();

        let runnable = match jobs::from_queued(&job) {
            Ok(runnable) => runnable,
            Err(e) => {
                // Unknown kinds can't succeed on retry; fail terminally.
                warn!(worker_id = self.id, job_id = job.id, error = %e, "Unparseable job");
                self.finish_failed(&job, "unsupported-kind", &e.to_string(), started_at, start)
                    .await;
                return;
            }
        };

        debug!(
            worker_id = self.id,
            job_id = job.id,
            description = runnable.description(),
            "Processing job"
        );

        match runnable.process(&self.api, &self.pool, cancel).await {
            Ok(counts) => {
                self.finish_completed(&job, counts, started_at, start).await;
            }
            Err(ScrapeError::Cancelled) => {
                // Not acked and not a failure: the job goes straight back to
                // pending for the next process lifetime.
                info!(worker_id = self.id, job_id = job.id, "Job cancelled, releasing");
                if let Err(e) = scrape_jobs::unlock_job(job.id, &self.pool).await {
                    error!(worker_id = self.id, job_id = job.id, error = ?e, "Failed to release job");
                }
            }
            Err(e) if e.is_retryable() => {
                let backoff = self.retry_base_delay * 2u32.pow(job.retry_count.clamp(0, 16) as u32);
                match scrape_jobs::unlock_and_increment_retry(
                    job.id,
                    job.max_retries,
                    backoff,
                    &self.pool,
                )
                .await
                {
                    Ok(Some(execute_at)) => {
                        debug!(
                            worker_id = self.id,
                            job_id = job.id,
                            error = %e,
                            retry_at = %execute_at,
                            "Job failed, retry scheduled"
                        );
                    }
                    Ok(None) => {
                        warn!(
                            worker_id = self.id,
                            job_id = job.id,
                            error = %e,
                            "Retries exhausted, failing job"
                        );
                        self.finish_failed(&job, e.kind(), &e.to_string(), started_at, start)
                            .await;
                    }
                    Err(db_error) => {
                        error!(
                            worker_id = self.id,
                            job_id = job.id,
                            error = ?db_error,
                            "Failed to schedule retry"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    worker_id = self.id,
                    job_id = job.id,
                    error = %e,
                    kind = e.kind(),
                    "Job failed terminally"
                );
                self.finish_failed(&job, e.kind(), &e.to_string(), started_at, start)
                    .await;
            }
        }
    }

    async fn finish_completed(
        &self,
        job: &QueuedJob,
        counts: JobCounts,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) {
        let result = JobResult {
            search_term: &job.search_term,
            success: true,
            error_kind: None,
            error_message: None,
            properties_fetched: counts.fetched,
            results_found: counts.inserted,
            retry_count: job.retry_count,
            queued_at: job.queued_at,
            started_at,
            duration_ms: start.elapsed().as_millis() as i32,
        };
        if let Err(e) = scrape_jobs::insert_job_result(&result, &self.pool).await {
            error!(worker_id = self.id, job_id = job.id, error = ?e, "Failed to record result");
        }
        if let Err(e) = scrape_jobs::delete_job(job.id, &self.pool).await {
            error!(worker_id = self.id, job_id = job.id, error = ?e, "Failed to delete job");
        }
        debug!(worker_id = self.id, job_id = job.id, "Job completed");
    }

    async fn finish_failed(
        &self,
        job: &QueuedJob,
        kind: &str,
        message: &str,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) {
        let result = JobResult {
            search_term: &job.search_term,
            success: false,
            error_kind: Some(kind),
            error_message: Some(message),
            properties_fetched: 0,
            results_found: 0,
            retry_count: job.retry_count,
            queued_at: job.queued_at,
            started_at,
            duration_ms: start.elapsed().as_millis() as i32,
        };
        if let Err(e) = scrape_jobs::insert_job_result(&result, &self.pool).await {
            error!(worker_id = self.id, job_id = job.id, error = ?e, "Failed to record failure");
        }
        if let Err(e) = scrape_jobs::delete_job(job.id, &self.pool).await {
            error!(worker_id = self.id, job_id = job.id, error = ?e, "Failed to delete job");
        }
    }
}
