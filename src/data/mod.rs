pub mod models;
pub mod properties;
pub mod scrape_jobs;
pub mod term_history;
