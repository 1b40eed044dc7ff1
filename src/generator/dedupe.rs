//! Candidate-term deduplication against the historical term set.
//!
//! The deduplicator owns the in-memory view of every term ever enqueued and
//! is the single read path for it. Accepted terms are added at decision time;
//! the periodic refresh unions the database view into the cache (never
//! replaces it), so an accept can't be lost to a concurrent reload.

use crate::data::scrape_jobs;
use crate::error::Result;
use crate::generator::vocab::{BUSINESS_SUFFIXES, TOO_COMMON};
use dashmap::DashSet;
use sqlx::PgPool;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ExactDuplicate,
    TooCommon,
    BusinessSuperset,
    TwoWordSuperset,
    MultiWordSuperset,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ExactDuplicate => "exact-duplicate",
            RejectReason::TooCommon => "too-common",
            RejectReason::BusinessSuperset => "business-superset",
            RejectReason::TwoWordSuperset => "two-word-superset",
            RejectReason::MultiWordSuperset => "multi-word-superset",
        }
    }
}

/// Outcome of checking one candidate. `Accept` carries the normalized form
/// the rest of the pipeline should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept(String),
    Reject(RejectReason),
}

/// Per-batch rejection counters, drained by the generator for diagnostics.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub exact_duplicate: usize,
    pub too_common: usize,
    pub business_superset: usize,
    pub two_word_superset: usize,
    pub multi_word_superset: usize,
}

#[derive(Default)]
struct Counters {
    exact_duplicate: AtomicUsize,
    too_common: AtomicUsize,
    business_superset: AtomicUsize,
    two_word_superset: AtomicUsize,
    multi_word_superset: AtomicUsize,
}

/// Deduplicator over the historical term set.
pub struct Deduplicator {
    terms: DashSet<String>,
    counters: Counters,
    refresh_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl Deduplicator {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            terms: DashSet::new(),
            counters: Counters::default(),
            refresh_interval,
            last_refresh: Mutex::new(None),
        }
    }

    /// Evaluate a candidate against the historical set.
    ///
    /// Rules run in a fixed order: exact duplicate, denylist, business
    /// superset, two-word superset, multi-word superset. The check itself
    /// never mutates the set; callers record accepted terms via
    /// [`Deduplicator::mark_used`].
    pub fn check(&self, candidate: &str) -> Decision {
        let normalized = normalize(candidate);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

        if tokens.is_empty() {
            return self.reject(RejectReason::TooCommon);
        }

        if self.terms.contains(&normalized) {
            return self.reject(RejectReason::ExactDuplicate);
        }

        if tokens.len() == 1 && (tokens[0].len() <= 1 || TOO_COMMON.contains(&tokens[0])) {
            return self.reject(RejectReason::TooCommon);
        }

        // "<name> <legal-suffix>" where <name> alone is already known: the
        // upstream's full-text match on <name> already covered this term.
        if tokens.len() >= 2 && is_business_suffix(tokens[tokens.len() - 1]) {
            let name = tokens[..tokens.len() - 1].join(" ");
            if self.terms.contains(&name) {
                return self.reject(RejectReason::BusinessSuperset);
            }
        }

        if tokens.len() == 2
            && (self.terms.contains(tokens[0]) || self.terms.contains(tokens[1]))
        {
            return self.reject(RejectReason::TwoWordSuperset);
        }

        if tokens.len() >= 3 {
            for window_len in 1..tokens.len() {
                for window in tokens.windows(window_len) {
                    if self.terms.contains(&window.join(" ")) {
                        return self.reject(RejectReason::MultiWordSuperset);
                    }
                }
            }
        }

        Decision::Accept(normalized)
    }

    /// Record a normalized term as used. Called on accept and when jobs are
    /// enqueued from outside the generator.
    pub fn mark_used(&self, normalized: &str) {
        self.terms.insert(normalized.to_string());
    }

    /// Number of terms currently cached.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Union the database's historical term set into the cache.
    ///
    /// # Returns
    /// The cache size after the reload.
    pub async fn reload(&self, pool: &PgPool) -> Result<usize> {
        let terms = scrape_jobs::load_historical_terms(pool).await?;
        for term in terms {
            self.terms.insert(normalize(&term));
        }
        *self.last_refresh.lock().unwrap() = Some(Instant::now());
        Ok(self.terms.len())
    }

    /// Reload if the refresh interval has elapsed (or nothing was ever
    /// loaded).
    pub async fn refresh_if_stale(&self, pool: &PgPool) -> Result<()> {
        let stale = {
            let last = self.last_refresh.lock().unwrap();
            match *last {
                Some(at) => at.elapsed() >= self.refresh_interval,
                None => true,
            }
        };
        if stale {
            let total = self.reload(pool).await?;
            debug!(terms = total, "Historical term set refreshed");
        }
        Ok(())
    }

    /// Drain the per-batch rejection counters.
    pub fn take_batch_stats(&self) -> BatchStats {
        BatchStats {
            exact_duplicate: self.counters.exact_duplicate.swap(0, Ordering::Relaxed),
            too_common: self.counters.too_common.swap(0, Ordering::Relaxed),
            business_superset: self.counters.business_superset.swap(0, Ordering::Relaxed),
            two_word_superset: self.counters.two_word_superset.swap(0, Ordering::Relaxed),
            multi_word_superset: self.counters.multi_word_superset.swap(0, Ordering::Relaxed),
        }
    }

    fn reject(&self, reason: RejectReason) -> Decision {
        let counter = match reason {
            RejectReason::ExactDuplicate => &self.counters.exact_duplicate,
            RejectReason::TooCommon => &self.counters.too_common,
            RejectReason::BusinessSuperset => &self.counters.business_superset,
            RejectReason::TwoWordSuperset => &self.counters.two_word_superset,
            RejectReason::MultiWordSuperset => &self.counters.multi_word_superset,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Decision::Reject(reason)
    }
}

/// Canonical term form: NFKC, lowercased, whitespace collapsed to single
/// spaces, trimmed.
pub fn normalize(term: &str) -> String {
    term.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_business_suffix(token: &str) -> bool {
    BUSINESS_SUFFIXES
        .iter()
        .any(|suffix| token.starts_with(suffix))
}
