//! Search-term optimization from historical job outcomes.
//!
//! Ranks proven terms for re-scraping and mines their structure (prefixes,
//! suffix families, length buckets) for fresh candidates. Everything here is
//! advisory; the generator re-deduplicates whatever comes back.

use crate::data::term_history::{TermHistory, fetch_term_history};
use crate::error::Result;
use crate::generator::vocab::{
    FIRST_NAMES, GEOGRAPHIC_TERMS, HIGH_YIELD_SURNAMES, STREET_NAMES, SURNAMES,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How many top performers are mined for structural patterns.
const MINING_POOL: usize = 20;

/// Minimum occurrences before a prefix/suffix counts as a pattern.
const PATTERN_SUPPORT: usize = 2;

/// Thresholds and limits for the suggestion streams.
#[derive(Debug, Clone)]
pub struct OptimizerPolicy {
    /// Minimum results-per-second (or avg results) to qualify as a high performer.
    pub min_efficiency: f64,
    /// Minimum fraction of runs with at least one new row.
    pub min_success_rate: f64,
    /// Terms used within this many days are excluded from re-scraping.
    pub recent_days: i64,
    pub high_performer_limit: usize,
    pub suggestion_limit: usize,
}

impl Default for OptimizerPolicy {
    fn default() -> Self {
        Self {
            min_efficiency: 5.0,
            min_success_rate: 0.5,
            recent_days: 1,
            high_performer_limit: 30,
            suggestion_limit: 20,
        }
    }
}

/// Read-only analyzer over the scrape result log.
pub struct Optimizer {
    policy: OptimizerPolicy,
}

impl Optimizer {
    pub fn new(policy: OptimizerPolicy) -> Self {
        Self { policy }
    }

    /// Produce the two concatenated streams: proven high performers first,
    /// then pattern-mined new candidates.
    pub async fn suggest(&self, pool: &PgPool) -> Result<Vec<String>> {
        let history = fetch_term_history(pool).await?;
        let known: HashSet<String> = history.iter().map(|row| row.term.clone()).collect();

        let mut suggestions = rank_high_performers(&history, Utc::now(), &self.policy);
        let high_performers = suggestions.len();
        suggestions.extend(mine_suggestions(&history, &known, &self.policy));

        debug!(
            high_performers,
            mined = suggestions.len() - high_performers,
            "Optimizer suggestions ready"
        );
        Ok(suggestions)
    }
}

/// Terms worth re-scraping: efficient, reliable, and not touched recently.
/// Sorted by efficiency descending.
pub fn rank_high_performers(
    history: &[TermHistory],
    now: DateTime<Utc>,
    policy: &OptimizerPolicy,
) -> Vec<String> {
    let cutoff = now - chrono::Duration::days(policy.recent_days);

    let mut qualified: Vec<&TermHistory> = history
        .iter()
        .filter(|row| {
            row.efficiency >= policy.min_efficiency
                && row.success_rate >= policy.min_success_rate
                && row.last_used_at <= cutoff
        })
        .collect();

    qualified.sort_by(|a, b| {
        b.efficiency
            .partial_cmp(&a.efficiency)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    qualified
        .into_iter()
        .take(policy.high_performer_limit)
        .map(|row| row.term.clone())
        .collect()
}

/// Mine the structure of the best-yielding terms and propose unseen
/// vocabulary entries that share it.
///
/// Patterns considered: leading 3-grams, trailing 2- and 3-grams, and token
/// length, each requiring support from at least two top performers.
pub fn mine_suggestions(
    history: &[TermHistory],
    known: &HashSet<String>,
    policy: &OptimizerPolicy,
) -> Vec<String> {
    let mut top: Vec<&TermHistory> = history.iter().filter(|row| row.total_results > 0).collect();
    top.sort_by(|a, b| {
        b.efficiency
            .partial_cmp(&a.efficiency)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    top.truncate(MINING_POOL);

    let mut prefixes: HashMap<&str, usize> = HashMap::new();
    let mut suffixes: HashMap<&str, usize> = HashMap::new();
    let mut lengths: HashMap<usize, usize> = HashMap::new();

    // Only single-token performers carry minable shape; composites mostly
    // echo their components.
    for row in &top {
        let term = row.term.as_str();
        if term.contains(' ') || term.len() < 4 || !term.is_ascii() {
            continue;
        }
        *prefixes.entry(&term[..3]).or_default() += 1;
        *suffixes.entry(&term[term.len() - 2..]).or_default() += 1;
        if term.len() >= 5 {
            *suffixes.entry(&term[term.len() - 3..]).or_default() += 1;
        }
        *lengths.entry(term.len()).or_default() += 1;
    }

    let prefixes: HashSet<&str> = prefixes
        .into_iter()
        .filter(|(_, count)| *count >= PATTERN_SUPPORT)
        .map(|(pattern, _)| pattern)
        .collect();
    let suffixes: HashSet<&str> = suffixes
        .into_iter()
        .filter(|(_, count)| *count >= PATTERN_SUPPORT)
        .map(|(pattern, _)| pattern)
        .collect();
    let lengths: HashSet<usize> = lengths
        .into_iter()
        .filter(|(_, count)| *count >= PATTERN_SUPPORT)
        .map(|(length, _)| length)
        .collect();

    if prefixes.is_empty() && suffixes.is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut suggestions = Vec::new();

    let candidate_pools = [
        HIGH_YIELD_SURNAMES,
        SURNAMES,
        FIRST_NAMES,
        STREET_NAMES,
        GEOGRAPHIC_TERMS,
    ];
    for pool in candidate_pools {
        for raw in pool {
            if suggestions.len() >= policy.suggestion_limit {
                return suggestions;
            }
            let candidate = raw.to_lowercase();
            if candidate.len() < 4 || known.contains(&candidate) || seen.contains(&candidate) {
                continue;
            }

            let prefix_hit = prefixes.contains(&candidate[..3]);
            let suffix_hit = suffixes.contains(&candidate[candidate.len() - 2..])
                || (candidate.len() >= 5
                    && suffixes.contains(&candidate[candidate.len() - 3..]));
            let length_hit = lengths.is_empty() || lengths.contains(&candidate.len());

            if (prefix_hit || suffix_hit) && length_hit {
                seen.insert(candidate.clone());
                suggestions.push(candidate);
            }
        }
    }

    suggestions
}
