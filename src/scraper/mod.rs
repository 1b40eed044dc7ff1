pub mod driver;
pub mod jobs;
pub mod worker;

use crate::config::Config;
use crate::data::scrape_jobs;
use crate::generator::TermGenerator;
use crate::services::Service;
use crate::tcad::TcadApi;
use crate::tcad::token::TokenProvider;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use self::driver::ContinuousDriver;
use self::worker::Worker;

/// The main service that will be managed by the application's `ServiceManager`.
///
/// It holds the shared resources (database pool, API client, token provider,
/// term generator) and manages the lifecycle of the continuous driver and the
/// worker pool.
pub struct ScraperService {
    pool: PgPool,
    api: Arc<TcadApi>,
    tokens: Arc<TokenProvider>,
    generator: Arc<TermGenerator>,
    config: Config,
    driver_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    cancel: CancellationToken,
}

impl ScraperService {
    /// Creates a new `ScraperService`.
    pub fn new(
        pool: PgPool,
        api: Arc<TcadApi>,
        tokens: Arc<TokenProvider>,
        generator: Arc<TermGenerator>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            api,
            tokens,
            generator,
            config,
            driver_handle: None,
            worker_handles: Vec::new(),
            shutdown_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the driver and a pool of workers.
    ///
    /// Force-unlocks any jobs left locked by a previous unclean shutdown
    /// before spawning workers, so those jobs re-enter the queue immediately.
    pub async fn start(&mut self) {
        // Recover jobs left locked by a previous crash/unclean shutdown
        match scrape_jobs::force_unlock_all(&self.pool).await {
            Ok(0) => {}
            Ok(count) => warn!(count, "Force-unlocked stale jobs from previous run"),
            Err(e) => warn!(error = ?e, "Failed to force-unlock stale jobs"),
        }

        info!("ScraperService starting");

        // Create shutdown channel for the driver; workers use the
        // cancellation token so in-flight scrapes stop at checkpoints.
        let (shutdown_tx, _) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx.clone());

        if self.config.auto_refresh_token {
            self.tokens
                .clone()
                .start_refresher(
                    self.api.http_client(),
                    self.config.tcad_base_url.clone(),
                    self.config.token_refresh_interval,
                )
                .await;
        }

        let driver = ContinuousDriver::new(
            self.pool.clone(),
            self.generator.clone(),
            self.config.scraper.clone(),
        );
        let shutdown_rx = shutdown_tx.subscribe();
        self.driver_handle = Some(tokio::spawn(async move {
            driver.run(shutdown_rx).await;
        }));
        info!("Driver task spawned");

        for i in 0..self.config.scraper.concurrency {
            let worker = Worker::new(
                i,
                self.pool.clone(),
                self.api.clone(),
                self.config.scraper.retry_base_delay,
            );
            let cancel = self.cancel.child_token();
            self.worker_handles.push(tokio::spawn(async move {
                worker.run(cancel).await;
            }));
        }
        info!(
            worker_count = self.worker_handles.len(),
            "Spawned worker tasks"
        );
    }
}

#[async_trait::async_trait]
impl Service for ScraperService {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        self.start().await;
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        info!("Shutting down scraper service");

        // Driver first (stop refilling), then workers, then the refresher
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        } else {
            warn!("No shutdown channel found for scraper service");
            return Err(anyhow::anyhow!("No shutdown channel available"));
        }
        self.cancel.cancel();
        self.tokens.shutdown().await;

        // Collect all handles
        let mut all_handles = Vec::new();
        if let Some(handle) = self.driver_handle.take() {
            all_handles.push(handle);
        }
        all_handles.append(&mut self.worker_handles);

        // Wait for all tasks to complete (no internal timeout - let ServiceManager handle it)
        let results = futures::future::join_all(all_handles).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(
                failed_count = failed,
                "Some scraper tasks panicked during shutdown"
            );
            return Err(anyhow::anyhow!("{} task(s) panicked", failed));
        }

        info!("All scraper tasks shutdown gracefully");
        Ok(())
    }
}
