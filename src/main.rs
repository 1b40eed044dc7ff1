use clap::Parser;
use figment::{Figment, providers::Env};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use tcad::cli::Args;
use tcad::config::Config;
use tcad::generator::TermGenerator;
use tcad::generator::dedupe::Deduplicator;
use tcad::logging::setup_logging;
use tcad::optimizer::{Optimizer, OptimizerPolicy};
use tcad::scraper::ScraperService;
use tcad::services::manager::ServiceManager;
use tcad::signals::handle_shutdown_signals;
use tcad::tcad::{TcadApi, TokenProvider};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load configuration first to get log level
    let config: Config = Figment::new()
        .merge(Env::raw())
        .extract()
        .expect("Failed to load config");

    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting tcad scraper"
    );

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .min_connections(0)
        .max_connections((config.scraper.concurrency + 4) as u32)
        .acquire_timeout(Duration::from_secs(4))
        .idle_timeout(Duration::from_secs(60 * 2))
        .max_lifetime(Duration::from_secs(60 * 30))
        .connect(&config.database_url)
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Failed to run migrations");

    info!(
        shutdown_timeout = format!("{:.2?}", config.shutdown_timeout),
        tcad_base_url = config.tcad_base_url,
        tcad_api_url = config.tcad_api_url,
        year = config.year,
        target = config.scraper.target_properties,
        concurrency = config.scraper.concurrency,
        "configuration loaded"
    );

    // Assemble the pipeline: token provider, API client, deduplicator,
    // optimizer, generator, and the service that runs them.
    let tokens = Arc::new(TokenProvider::new(config.tcad_token.clone()));
    let api = Arc::new(TcadApi::new(&config, tokens.clone()).expect("Failed to create TcadApi"));
    let dedupe = Arc::new(Deduplicator::new(config.scraper.dedupe_refresh_interval));
    let generator = Arc::new(TermGenerator::new(
        db_pool.clone(),
        dedupe,
        Optimizer::new(OptimizerPolicy::default()),
        config.scraper.optimization_interval,
    ));

    let shutdown_timeout = config.shutdown_timeout;

    let mut service_manager = ServiceManager::new();
    let scraper_service = Box::new(ScraperService::new(
        db_pool,
        api,
        tokens,
        generator,
        config,
    ));
    service_manager.register_service("scraper", scraper_service);
    service_manager.spawn_all();

    handle_shutdown_signals(service_manager, shutdown_timeout).await
}
