//! Configuration module for the scraper application.
//!
//! Handles loading and parsing configuration from environment variables using
//! the figment crate. Duration fields accept both numeric values (interpreted
//! as seconds) and duration strings with units; the adaptive page-size
//! sequence accepts a comma-separated list.

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Main application configuration containing all sub-configurations
#[derive(Deserialize, Clone)]
pub struct Config {
    /// Log level for the application
    ///
    /// This value is used to set the log level for this application's target specifically.
    /// e.g. "debug" would be similar to "warn,tcad=debug,..."
    ///
    /// Valid values are: "trace", "debug", "info", "warn", "error"
    /// Defaults to "info" if not specified
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Database connection URL
    pub database_url: String,
    /// Graceful shutdown timeout duration
    ///
    /// Accepts both numeric values (seconds) and duration strings
    /// Defaults to 8 seconds if not specified
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,

    /// Base URL of the upstream appraisal site (HTML search UI, token capture)
    #[serde(default = "default_tcad_base_url")]
    pub tcad_base_url: String,
    /// Base URL of the upstream appraisal JSON API
    #[serde(default = "default_tcad_api_url")]
    pub tcad_api_url: String,
    /// Tax year sent as the `pYear` filter on every search
    #[serde(default = "default_year")]
    pub year: String,

    /// Bearer token for the upstream API, if already known at startup
    #[serde(default)]
    pub tcad_token: Option<String>,
    /// Whether to run the periodic token refresher
    #[serde(default)]
    pub auto_refresh_token: bool,
    /// Refresher period
    #[serde(
        default = "default_token_refresh_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub token_refresh_interval: Duration,

    /// Scraper pipeline tuning; flattened so every knob is a plain
    /// environment variable.
    #[serde(flatten)]
    pub scraper: ScraperConfig,
}

/// Tuning knobs for the queue, workers, executor, and driver.
#[derive(Deserialize, Clone, Debug)]
pub struct ScraperConfig {
    /// Number of terms enqueued per refill cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Sleep between driver refill cycles
    #[serde(
        default = "default_delay_between_batches",
        deserialize_with = "deserialize_duration"
    )]
    pub delay_between_batches: Duration,
    /// Progress-report ticker period
    #[serde(
        default = "default_check_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub check_interval: Duration,
    /// Enqueue only while waiting + active is below this
    #[serde(default = "default_queue_refill_threshold")]
    pub queue_refill_threshold: i64,
    /// Stop when the property count reaches this
    #[serde(default = "default_target_properties")]
    pub target_properties: i64,
    /// Max parallel scrape jobs in this process
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-job retry cap
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Exponential backoff base delay
    #[serde(
        default = "default_retry_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_base_delay: Duration,
    /// Per-scrape hard deadline
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Adaptive page-size sequence, tried largest first
    #[serde(
        default = "default_page_sizes",
        deserialize_with = "deserialize_page_sizes"
    )]
    pub page_sizes: Vec<u32>,
    /// Accepted terms between optimizer calls
    #[serde(default = "default_optimization_interval")]
    pub optimization_interval: usize,
    /// Row cap for the DOM fallback grid
    #[serde(default = "default_fallback_row_cap")]
    pub fallback_row_cap: usize,
    /// How often the deduplicator reloads the historical term set
    #[serde(
        default = "default_dedupe_refresh_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub dedupe_refresh_interval: Duration,
    /// Clear leftover pending jobs on startup instead of resuming them
    #[serde(default)]
    pub clean_start: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_between_batches: default_delay_between_batches(),
            check_interval: default_check_interval(),
            queue_refill_threshold: default_queue_refill_threshold(),
            target_properties: default_target_properties(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_base_delay: default_retry_base_delay(),
            timeout: default_timeout(),
            page_sizes: default_page_sizes(),
            optimization_interval: default_optimization_interval(),
            fallback_row_cap: default_fallback_row_cap(),
            dedupe_refresh_interval: default_dedupe_refresh_interval(),
            clean_start: false,
        }
    }
}

/// Default log level of "info"
fn default_log_level() -> String {
    "info".to_string()
}

/// Default shutdown timeout of 8 seconds
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_tcad_base_url() -> String {
    "https://travis.prodigycad.com".to_string()
}

fn default_tcad_api_url() -> String {
    "https://prodigy-prod-api.trueprodigy.com/api".to_string()
}

/// Default to the current tax year
fn default_year() -> String {
    "2024".to_string()
}

/// Default token refresher period of 30 minutes
fn default_token_refresh_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_batch_size() -> usize {
    25
}

fn default_delay_between_batches() -> Duration {
    Duration::from_secs(30)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_queue_refill_threshold() -> i64 {
    100
}

fn default_target_properties() -> i64 {
    500_000
}

fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> i32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Page sizes tried largest-first; stepped down on truncated responses
fn default_page_sizes() -> Vec<u32> {
    vec![1000, 500, 100, 50]
}

fn default_optimization_interval() -> usize {
    50
}

fn default_fallback_row_cap() -> usize {
    20
}

fn default_dedupe_refresh_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Duration parser configured to handle various time units with seconds as default
///
/// Supports:
/// - Seconds (s) - default unit
/// - Milliseconds (ms)
/// - Minutes (m)
/// - Hours (h)
///
/// Does not support fractions, exponents, or infinity values
/// Allows for whitespace between the number and the time unit
/// Allows for multiple time units to be specified (summed together, e.g "10s 2m" = 120 + 10 = 130 seconds)
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[
        TimeUnit::Second,
        TimeUnit::MilliSecond,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Custom deserializer for duration fields that accepts both numeric and string values
///
/// This deserializer handles the flexible duration parsing by accepting:
/// - Unsigned integers (interpreted as seconds)
/// - Signed integers (interpreted as seconds, must be non-negative)
/// - Strings (parsed using the fundu duration parser)
///
/// # Examples
///
/// - `1` -> 1 second
/// - `"30s"` -> 30 seconds
/// - `"2 m"` -> 2 minutes
/// - `"1500ms"` -> 1.5 seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            DURATION_PARSER
                .parse(value)
                .map_err(|e| {
                    serde::de::Error::custom(format!(
                        "Invalid duration format '{}': {}. Examples: '5' (5 seconds), '3500ms', '30s', '2m'",
                        value, e
                    ))
                })?
                .try_into()
                .map_err(|e| serde::de::Error::custom(format!("Duration conversion error: {}", e)))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value < 0 {
                return Err(serde::de::Error::custom("Duration cannot be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

/// Deserializer for the page-size sequence accepting either a sequence or a
/// comma-separated string (the form environment variables arrive in).
///
/// Rejects empty sequences and sequences that are not strictly decreasing,
/// since the fallback algorithm steps downward through the list.
fn deserialize_page_sizes<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};

    struct PageSizesVisitor;

    fn validate<E: serde::de::Error>(sizes: Vec<u32>) -> Result<Vec<u32>, E> {
        if sizes.is_empty() {
            return Err(E::custom("page_sizes must not be empty"));
        }
        if !sizes.windows(2).all(|w| w[0] > w[1]) {
            return Err(E::custom(
                "page_sizes must be strictly decreasing, e.g. '1000,500,100,50'",
            ));
        }
        Ok(sizes)
    }

    impl<'de> Visitor<'de> for PageSizesVisitor {
        type Value = Vec<u32>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a comma-separated string or sequence of page sizes")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let sizes = value
                .split(',')
                .map(|s| s.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| E::custom(format!("Invalid page size in '{}': {}", value, e)))?;
            validate(sizes)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut sizes = Vec::new();
            while let Some(size) = seq.next_element::<u32>()? {
                sizes.push(size);
            }
            validate(sizes)
        }
    }

    deserializer.deserialize_any(PageSizesVisitor)
}
