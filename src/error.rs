/// Crate-wide result alias; components that need a typed error (the scrape
/// executor) define their own.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
