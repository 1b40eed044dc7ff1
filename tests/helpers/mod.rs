use chrono::Utc;
use sqlx::PgPool;
use tcad::tcad::models::PropertyRecord;

/// Build a test `PropertyRecord` with sensible defaults.
///
/// Only the identity and money fields matter to most tests; the rest are
/// filled with harmless placeholders.
pub fn make_record(property_id: &str, owner: &str, appraised: f64) -> PropertyRecord {
    PropertyRecord {
        property_id: property_id.to_owned(),
        owner_name: owner.to_owned(),
        prop_type: Some("Real".to_owned()),
        city: Some("Austin".to_owned()),
        street_primary: Some("100 Congress Ave".to_owned()),
        assessed_value: Some(appraised * 0.8),
        appraised_value: appraised,
        geo_id: Some("0204050607".to_owned()),
        legal_description: Some("LOT 1 BLK A".to_owned()),
    }
}

/// Insert a scrape job row directly via SQL, returning the generated ID.
pub async fn insert_job(
    pool: &PgPool,
    term: &str,
    priority: i32,
    locked: bool,
    retry_count: i32,
    max_retries: i32,
) -> i32 {
    let locked_at = if locked { Some(Utc::now()) } else { None };

    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at, locked_at, retry_count, max_retries)
         VALUES ($1, $2, NOW(), $3, $4, $5)
         RETURNING id",
    )
    .bind(term)
    .bind(priority)
    .bind(locked_at)
    .bind(retry_count)
    .bind(max_retries)
    .fetch_one(pool)
    .await
    .expect("insert scrape job");

    id
}

/// Insert a job result row with its completion timestamp pushed `days_ago`
/// into the past.
pub async fn insert_result(
    pool: &PgPool,
    term: &str,
    success: bool,
    results_found: i32,
    duration_ms: i32,
    days_ago: f64,
) {
    sqlx::query(
        "INSERT INTO scrape_job_results
            (search_term, success, results_found, properties_fetched, retry_count,
             queued_at, started_at, completed_at, duration_ms)
         VALUES ($1, $2, $3, $3, 0,
             NOW() - make_interval(secs => $4::double precision * 86400),
             NOW() - make_interval(secs => $4::double precision * 86400),
             NOW() - make_interval(secs => $4::double precision * 86400), $5)",
    )
    .bind(term)
    .bind(success)
    .bind(results_found)
    .bind(days_ago)
    .bind(duration_ms)
    .execute(pool)
    .await
    .expect("insert job result");
}
