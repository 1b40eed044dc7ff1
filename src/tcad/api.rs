//! Main TCAD API client and scrape executor.
//!
//! One call to [`TcadApi::scrape`] runs the full per-term algorithm: token
//! acquisition (with a one-shot DOM capture when none is set), the retried
//! API path with adaptive page-size fallback and pagination, and finally the
//! DOM grid fallback. Cancellation is checkpoint-based: the token is checked
//! between attempts and before every network request.

use crate::config::Config;
use crate::tcad::errors::ScrapeError;
use crate::tcad::fallback;
use crate::tcad::json::parse_json_with_context;
use crate::tcad::models::{PropertyRecord, SearchResponse, is_truncated};
use crate::tcad::token::TokenProvider;
use anyhow::Context;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Hard cap on pages fetched for a single term, regardless of the reported
/// total. Terms that match more than `cap * page_size` rows are better split
/// by the generator than paginated to the end.
const MAX_PAGES: u32 = 100;

/// User agents rotated per attempt, drawn from current desktop browsers.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Outcome of fetching one page at one page size.
enum PageFetch {
    Parsed(SearchResponse),
    /// Truncated or unparseable body; the adaptive loop steps to the next
    /// smaller page size without consuming a retry.
    Malformed(String),
}

/// Main TCAD API client.
#[derive(Debug)]
pub struct TcadApi {
    client: Client,
    tokens: Arc<TokenProvider>,
    api_url: String,
    base_url: String,
    year: String,
    page_sizes: Vec<u32>,
    max_attempts: i32,
    retry_base_delay: Duration,
    fallback_row_cap: usize,
}

impl TcadApi {
    /// Creates a new TCAD API client.
    ///
    /// Both endpoint URLs are validated here so a bad configuration fails at
    /// startup instead of on the first job.
    pub fn new(config: &Config, tokens: Arc<TokenProvider>) -> crate::error::Result<Self> {
        url::Url::parse(&config.tcad_api_url).context("Invalid TCAD API URL")?;
        url::Url::parse(&config.tcad_base_url).context("Invalid TCAD base URL")?;

        let client = Client::builder()
            .cookie_store(true)
            .tcp_keepalive(Some(Duration::from_secs(60 * 5)))
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.scraper.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            tokens,
            api_url: config.tcad_api_url.clone(),
            base_url: config.tcad_base_url.clone(),
            year: config.year.clone(),
            page_sizes: config.scraper.page_sizes.clone(),
            max_attempts: config.scraper.max_attempts,
            retry_base_delay: config.scraper.retry_base_delay,
            fallback_row_cap: config.scraper.fallback_row_cap,
        })
    }

    /// The shared HTTP client, reused by the token refresher.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    /// Scrape all properties matching `term`.
    ///
    /// Runs the API path with retries and backoff; if every attempt fails,
    /// runs the DOM fallback exactly once. Returns the classified error of
    /// the last failing path.
    pub async fn scrape(
        &self,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PropertyRecord>, ScrapeError> {
        let mut token = match self.tokens.current() {
            Some(token) => token,
            None => self.capture_token_once().await?,
        };

        let mut last_error: Option<ScrapeError> = None;
        let mut auth_refresh_done = false;

        let mut attempt = 1;
        while attempt <= self.max_attempts {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            match self.api_scrape(term, &token, cancel).await {
                Ok(records) => {
                    debug!(term = term, count = records.len(), attempt, "API scrape succeeded");
                    return Ok(records);
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(ScrapeError::Auth(reason)) => {
                    // One refresh per job; a token that fails twice is dead.
                    if auth_refresh_done {
                        return Err(ScrapeError::Auth(reason));
                    }
                    auth_refresh_done = true;
                    warn!(term = term, reason = %reason, "Token rejected, attempting recapture");
                    token = self.capture_token_once().await?;
                }
                Err(e) => {
                    warn!(term = term, attempt, error = %e, "API scrape attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        let delay = self.retry_base_delay * 2u32.pow((attempt - 1) as u32);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                        }
                    }
                    attempt += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        // All API attempts failed; one shot at the rendered grid.
        info!(term = term, "API path exhausted, trying DOM fallback");
        match fallback::scrape_search_grid(&self.client, &self.base_url, term, self.fallback_row_cap)
            .await
        {
            Ok(records) => {
                info!(term = term, count = records.len(), "DOM fallback succeeded");
                Ok(records)
            }
            Err(fallback_error) => {
                let api_error = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no API attempt completed".to_string());
                Err(ScrapeError::FallbackExhausted(format!(
                    "api: {api_error}; dom: {fallback_error}"
                )))
            }
        }
    }

    /// One-shot token capture from the search UI, storing the result for
    /// subsequent jobs.
    async fn capture_token_once(&self) -> Result<String, ScrapeError> {
        match fallback::capture_token(&self.client, &self.base_url).await {
            Ok(token) => {
                self.tokens.set(token.clone());
                info!("Captured bearer token from search UI");
                Ok(token)
            }
            Err(e) => Err(ScrapeError::Auth(format!("token capture failed: {e}"))),
        }
    }

    /// One API attempt: walk the page-size sequence until a size parses, then
    /// paginate that size to completion.
    async fn api_scrape(
        &self,
        term: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PropertyRecord>, ScrapeError> {
        let mut last_malformed = String::new();

        for &page_size in &self.page_sizes {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            match self.fetch_page(term, token, 1, page_size).await? {
                PageFetch::Malformed(reason) => {
                    debug!(term = term, page_size, reason = %reason, "Stepping down page size");
                    last_malformed = reason;
                }
                PageFetch::Parsed(first) => {
                    return self.paginate(term, token, page_size, first, cancel).await;
                }
            }
        }

        Err(ScrapeError::Parse(format!(
            "all page sizes exhausted for '{term}': {last_malformed}"
        )))
    }

    /// Collect the remaining pages at a page size that already produced a
    /// well-formed first page. A malformed later page fails the whole attempt;
    /// re-running at a smaller size would double-count the rows already taken.
    async fn paginate(
        &self,
        term: &str,
        token: &str,
        page_size: u32,
        first: SearchResponse,
        cancel: &CancellationToken,
    ) -> Result<Vec<PropertyRecord>, ScrapeError> {
        let total = first.total_property.property_count.max(0) as usize;
        let mut last_page_len = first.results.len();
        let mut records: Vec<PropertyRecord> =
            first.results.into_iter().map(PropertyRecord::from).collect();

        let mut page: u32 = 2;
        while records.len() < total && last_page_len == page_size as usize && page <= MAX_PAGES {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            match self.fetch_page(term, token, page, page_size).await? {
                PageFetch::Parsed(response) => {
                    last_page_len = response.results.len();
                    records.extend(response.results.into_iter().map(PropertyRecord::from));
                }
                PageFetch::Malformed(reason) => {
                    return Err(ScrapeError::Parse(format!(
                        "page {page} at size {page_size} malformed: {reason}"
                    )));
                }
            }
            page += 1;
        }

        debug!(
            term = term,
            total_reported = total,
            fetched = records.len(),
            pages = page - 1,
            "Pagination complete"
        );
        Ok(records)
    }

    /// Fetch a single page of full-text search results.
    async fn fetch_page(
        &self,
        term: &str,
        token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageFetch, ScrapeError> {
        let url = format!("{}/searchfulltext", self.api_url);
        let body = serde_json::json!({
            "pYear": {"operator": "=", "value": self.year},
            "fullTextSearch": {"operator": "match", "value": term},
        });
        let user_agent = random_user_agent();

        let response = self
            .client
            .post(&url)
            .query(&[("page", page), ("pageSize", page_size)])
            .header("Authorization", token)
            .header("Accept", "application/json")
            .header("User-Agent", user_agent)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Transport(format!("request timed out: {e}"))
                } else {
                    ScrapeError::Transport(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ScrapeError::Auth(format!("upstream returned {status}")));
        }
        if !status.is_success() {
            return Err(ScrapeError::Transport(format!("upstream returned {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ScrapeError::Transport(format!("failed to read body: {e}")))?;

        if is_truncated(&text) {
            return Ok(PageFetch::Malformed(format!(
                "truncated body ({} bytes)",
                text.len()
            )));
        }

        match parse_json_with_context::<SearchResponse>(&text) {
            Ok(parsed) => Ok(PageFetch::Parsed(parsed)),
            Err(e) => Ok(PageFetch::Malformed(e.to_string())),
        }
    }
}

/// Pick a user agent for this attempt. Kept synchronous so the thread-local
/// RNG never crosses an await point.
fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_pool_nonempty() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }
}
