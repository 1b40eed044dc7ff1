//! The continuous driver: keeps the queue fed until the property-count
//! target is reached.

use crate::config::ScraperConfig;
use crate::data::models::EnqueueOpts;
use crate::data::{properties, scrape_jobs};
use crate::error::Result;
use crate::generator::{self, TermGenerator};
use crate::utils::fmt_duration;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};

/// Result-log retention caps applied on each report tick. Historical detail
/// beyond these bounds has already been folded into term history by then.
const RESULT_RETENTION_COMPLETED: i64 = 5000;
const RESULT_RETENTION_FAILED: i64 = 2000;

/// Long-running controller that measures progress and refills the queue.
///
/// One refill cycle: read the property count, stop if the target is met,
/// otherwise top the queue up with a fresh generator batch when depth falls
/// below the threshold. A separate ticker logs a progress summary with an
/// ETA. Both timers run in one `select!` loop alongside the shutdown signal.
pub struct ContinuousDriver {
    pool: PgPool,
    generator: Arc<TermGenerator>,
    config: ScraperConfig,
}

impl ContinuousDriver {
    pub fn new(pool: PgPool, generator: Arc<TermGenerator>, config: ScraperConfig) -> Self {
        Self {
            pool,
            generator,
            config,
        }
    }

    /// Runs the driver loop with graceful shutdown support.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            target = self.config.target_properties,
            batch_size = self.config.batch_size,
            "Continuous driver started"
        );

        if self.config.clean_start {
            match scrape_jobs::clear_pending(&self.pool).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Clean start: cleared leftover pending jobs"),
                Err(e) => warn!(error = ?e, "Clean start: failed to clear pending jobs"),
            }
        }

        if let Err(e) = self.generator.warm_up().await {
            warn!(error = ?e, "Failed to preload historical terms, starting cold");
        }

        let started = Instant::now();
        let baseline = match properties::count(&self.pool).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = ?e, "Failed to read baseline property count");
                0
            }
        };

        let mut report = time::interval(self.config.check_interval);
        report.tick().await; // first tick is immediate; the loop logs on the next one
        let mut next_refill = time::Instant::now();

        loop {
            tokio::select! {
                _ = time::sleep_until(next_refill) => {
                    next_refill = time::Instant::now() + self.config.delay_between_batches;
                    match self.refill().await {
                        Ok(true) => {
                            info!("Target reached, driver stopping");
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => warn!(error = ?e, "Refill cycle failed"),
                    }
                }
                _ = report.tick() => {
                    self.report(started, baseline).await;
                    match scrape_jobs::prune_results(
                        RESULT_RETENTION_COMPLETED,
                        RESULT_RETENTION_FAILED,
                        &self.pool,
                    )
                    .await
                    {
                        Ok(0) => {}
                        Ok(pruned) => debug!(pruned, "Result log pruned"),
                        Err(e) => warn!(error = ?e, "Failed to prune result log"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Driver received shutdown signal");
                    break;
                }
            }
        }

        info!("Continuous driver exiting");
    }

    /// One refill cycle.
    ///
    /// # Returns
    /// `Ok(true)` when the property target has been reached.
    async fn refill(&self) -> Result<bool> {
        let count = properties::count(&self.pool).await?;
        if count >= self.config.target_properties {
            return Ok(true);
        }

        let stats = scrape_jobs::queue_stats(&self.pool).await?;
        let in_flight = stats.pending + stats.active;
        if in_flight >= self.config.queue_refill_threshold {
            debug!(in_flight, threshold = self.config.queue_refill_threshold, "Queue full enough");
            return Ok(false);
        }

        let batch = self.generator.next_batch(self.config.batch_size).await?;
        if batch.is_empty() {
            warn!("Generator produced an empty batch");
            return Ok(false);
        }

        let batch = generator::filter_already_queued(batch, &self.pool).await?;
        if batch.is_empty() {
            debug!("Entire batch already queued");
            return Ok(false);
        }

        let opts = EnqueueOpts {
            max_retries: self.config.max_attempts,
            ..EnqueueOpts::default()
        };
        let inserted = scrape_jobs::batch_enqueue(&batch, &opts, &self.pool).await?;
        info!(
            enqueued = inserted.len(),
            properties = count,
            queue_depth = in_flight + inserted.len() as i64,
            "Queue refilled"
        );
        Ok(false)
    }

    /// Log the periodic progress summary.
    async fn report(&self, started: Instant, baseline: i64) {
        let (count, stats) = match tokio::try_join!(
            properties::count(&self.pool),
            scrape_jobs::queue_stats(&self.pool),
        ) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = ?e, "Failed to gather progress stats");
                return;
            }
        };

        let elapsed = started.elapsed();
        let delta = count - baseline;
        let rate = delta as f64 / elapsed.as_secs_f64().max(1.0);
        let remaining = (self.config.target_properties - count).max(0);
        let eta = if rate > 0.0 {
            fmt_duration(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            "unknown".to_string()
        };

        info!(
            runtime = fmt_duration(elapsed),
            properties = count,
            target = self.config.target_properties,
            new_since_start = delta,
            rate_per_hour = (rate * 3600.0) as i64,
            pending = stats.pending,
            active = stats.active,
            delayed = stats.delayed,
            completed = stats.completed,
            failed = stats.failed,
            eta = eta,
            "Progress report"
        );
    }
}
