//! Search-term generation: weighted strategies, deduplication, and optimizer
//! feedback.

pub mod dedupe;
pub mod strategies;
pub mod vocab;

use crate::data::scrape_jobs;
use crate::error::Result;
use crate::optimizer::Optimizer;
use dedupe::{Decision, Deduplicator};
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Produces batches of deduplicated candidate search terms.
///
/// Each batch is assembled from optimizer hints first, then weighted-random
/// strategy draws, every candidate passing through the [`Deduplicator`].
/// Rejections do not count toward the batch size but are bounded; when the
/// attempt budget runs out the generator yields a short batch rather than
/// spinning.
pub struct TermGenerator {
    pool: PgPool,
    dedupe: Arc<Deduplicator>,
    optimizer: Optimizer,
    /// Hints from the last optimizer call, consumed from the front of the
    /// next batch.
    hints: Mutex<VecDeque<String>>,
    accepted_since_optimization: AtomicUsize,
    optimization_interval: usize,
}

impl TermGenerator {
    pub fn new(
        pool: PgPool,
        dedupe: Arc<Deduplicator>,
        optimizer: Optimizer,
        optimization_interval: usize,
    ) -> Self {
        Self {
            pool,
            dedupe,
            optimizer,
            hints: Mutex::new(VecDeque::new()),
            accepted_since_optimization: AtomicUsize::new(0),
            optimization_interval: optimization_interval.max(1),
        }
    }

    /// Load the historical term set before the first batch.
    pub async fn warm_up(&self) -> Result<()> {
        let loaded = self.dedupe.reload(&self.pool).await?;
        info!(terms = loaded, "Historical term set loaded");
        Ok(())
    }

    /// Produce up to `size` accepted terms, unique within the batch and
    /// against the historical set.
    pub async fn next_batch(&self, size: usize) -> Result<Vec<String>> {
        self.dedupe.refresh_if_stale(&self.pool).await?;

        let pending_hints: Vec<String> = {
            let mut hints = self.hints.lock().unwrap();
            let take = hints.len().min(size);
            hints.drain(..take).collect()
        };

        let batch = self.assemble(size, pending_hints);

        let accepted = self
            .accepted_since_optimization
            .fetch_add(batch.len(), Ordering::Relaxed)
            + batch.len();
        if accepted >= self.optimization_interval {
            self.accepted_since_optimization.store(0, Ordering::Relaxed);
            match self.optimizer.suggest(&self.pool).await {
                Ok(suggestions) => {
                    debug!(count = suggestions.len(), "Optimizer hints refreshed");
                    *self.hints.lock().unwrap() = suggestions.into();
                }
                Err(e) => warn!(error = ?e, "Optimizer call failed, keeping old hints"),
            }
        }

        Ok(batch)
    }

    /// Synchronous batch assembly; the deduplicator cache makes every check
    /// local, so no awaits are needed here.
    fn assemble(&self, size: usize, hints: Vec<String>) -> Vec<String> {
        let max_attempts = size.saturating_mul(10);
        let mut batch: Vec<String> = Vec::with_capacity(size);
        let mut attempts = 0usize;

        let mut consider = |candidate: String, batch: &mut Vec<String>| {
            if let Decision::Accept(normalized) = self.dedupe.check(&candidate) {
                // Marking the term used here gives batch-local uniqueness for
                // free: a second draw of the same term is an exact duplicate.
                self.dedupe.mark_used(&normalized);
                batch.push(normalized);
            }
        };

        for hint in hints {
            if batch.len() >= size || attempts >= max_attempts {
                break;
            }
            attempts += 1;
            consider(hint, &mut batch);
        }

        let mut rng = rand::rng();
        while batch.len() < size && attempts < max_attempts {
            attempts += 1;
            consider(strategies::draw(&mut rng), &mut batch);
        }

        let stats = self.dedupe.take_batch_stats();
        if batch.len() < size {
            warn!(
                requested = size,
                produced = batch.len(),
                attempts,
                rejections = ?stats,
                "Attempt budget exhausted, yielding short batch"
            );
        } else {
            debug!(size = batch.len(), attempts, rejections = ?stats, "Batch assembled");
        }

        batch
    }
}

/// Remove terms that already have a live queue row, preserving order.
///
/// The deduplicator covers history, but a term accepted minutes ago may still
/// be sitting unprocessed in the queue; this is the last filter before
/// enqueueing.
pub async fn filter_already_queued(
    terms: Vec<String>,
    pool: &PgPool,
) -> Result<Vec<String>> {
    let existing = scrape_jobs::find_existing_terms(&terms, pool).await?;
    if existing.is_empty() {
        return Ok(terms);
    }
    Ok(terms
        .into_iter()
        .filter(|term| !existing.contains(&term.to_lowercase()))
        .collect())
}
