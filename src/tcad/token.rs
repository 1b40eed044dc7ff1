//! Process-wide bearer token management for the TCAD API.
//!
//! The token is set by an operator (environment), by the one-shot capture
//! path in the executor, or by the optional periodic refresher started here.
//! Readers always see the last successfully captured value; a failed refresh
//! never invalidates it.

use crate::tcad::fallback;
use reqwest::Client;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long `shutdown` waits for the refresher task to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Holder of the current upstream bearer token.
#[derive(Debug)]
pub struct TokenProvider {
    current: Mutex<Option<String>>,
    refresh_failures: AtomicU64,
    refresher: tokio::sync::Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl TokenProvider {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            current: Mutex::new(initial),
            refresh_failures: AtomicU64::new(0),
            refresher: tokio::sync::Mutex::new(None),
        }
    }

    /// The current token, if one was ever set.
    pub fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    /// Replace the token. Swap is atomic under the lock; readers see either
    /// the old or the new value, never an absent one.
    pub fn set(&self, token: String) {
        *self.current.lock().unwrap() = Some(token);
    }

    /// Number of refresh attempts that failed since startup.
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Start the periodic refresher.
    ///
    /// Calling this while a refresher is already running warns and keeps the
    /// existing task. Each tick re-captures a token from the upstream HTML;
    /// failures increment the counter and leave the current token in place.
    pub async fn start_refresher(
        self: std::sync::Arc<Self>,
        client: Client,
        base_url: String,
        interval: Duration,
    ) {
        let mut guard = self.refresher.lock().await;
        if guard.is_some() {
            warn!("Token refresher already running, ignoring start request");
            return;
        }

        let cancel = CancellationToken::new();
        let provider = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // The first tick fires immediately; skip it so a startup token
            // from the environment isn't instantly overwritten.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match fallback::capture_token(&client, &base_url).await {
                            Ok(token) => {
                                provider.set(token);
                                debug!("Token refreshed");
                            }
                            Err(e) => {
                                let failures =
                                    provider.refresh_failures.fetch_add(1, Ordering::Relaxed) + 1;
                                warn!(error = ?e, failures, "Token refresh failed, keeping previous token");
                            }
                        }
                    }
                    _ = task_cancel.cancelled() => {
                        debug!("Token refresher cancelled");
                        break;
                    }
                }
            }
        });

        *guard = Some((handle, cancel));
        info!(interval = ?interval, "Token refresher started");
    }

    /// Stop the refresher, waiting up to a short grace period.
    ///
    /// A no-op when no refresher was started.
    pub async fn shutdown(&self) {
        let taken = self.refresher.lock().await.take();
        if let Some((handle, cancel)) = taken {
            cancel.cancel();
            if time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Token refresher did not stop within grace period, abandoning");
            } else {
                info!("Token refresher stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_returns_last_set() {
        let provider = TokenProvider::new(None);
        assert!(provider.current().is_none());

        provider.set("abc".to_string());
        assert_eq!(provider.current().as_deref(), Some("abc"));

        provider.set("def".to_string());
        assert_eq!(provider.current().as_deref(), Some("def"));
    }

    #[test]
    fn initial_token_visible() {
        let provider = TokenProvider::new(Some("seed".to_string()));
        assert_eq!(provider.current().as_deref(), Some("seed"));
        assert_eq!(provider.refresh_failures(), 0);
    }

    #[tokio::test]
    async fn shutdown_without_refresher_is_noop() {
        let provider = TokenProvider::new(None);
        provider.shutdown().await;
        assert!(provider.current().is_none());
    }
}
