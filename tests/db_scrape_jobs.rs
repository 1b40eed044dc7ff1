#[allow(dead_code)]
mod helpers;

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tcad::data::models::{EnqueueOpts, JobResult};
use tcad::data::scrape_jobs;

// ── fetch_and_lock_job ──────────────────────────────────────────────

#[sqlx::test]
async fn fetch_and_lock_empty_queue(pool: PgPool) {
    let result = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    assert!(result.is_none());
}

#[sqlx::test]
async fn fetch_and_lock_returns_job_and_sets_locked_at(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, false, 0, 3).await;

    let job = scrape_jobs::fetch_and_lock_job(&pool)
        .await
        .unwrap()
        .expect("should return a job");

    assert_eq!(job.id, id);
    assert_eq!(job.search_term, "grove");
    assert_eq!(job.kind, "scrape-properties");

    // Verify locked_at was set in the database
    let (locked_at,): (Option<chrono::DateTime<Utc>>,) =
        sqlx::query_as("SELECT locked_at FROM scrape_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(locked_at.is_some(), "locked_at should be set after fetch");
}

#[sqlx::test]
async fn fetch_and_lock_skips_locked_jobs(pool: PgPool) {
    helpers::insert_job(&pool, "grove", 10, true, 0, 3).await;

    let result = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    assert!(result.is_none(), "locked jobs should be skipped");
}

#[sqlx::test]
async fn fetch_and_lock_reclaims_expired_lock(pool: PgPool) {
    // A worker died holding this job 11 minutes ago; past the visibility
    // timeout it becomes reservable again.
    sqlx::query(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at, locked_at)
         VALUES ('stale', 10, NOW() - INTERVAL '1 hour', NOW() - INTERVAL '11 minutes')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let job = scrape_jobs::fetch_and_lock_job(&pool)
        .await
        .unwrap()
        .expect("expired lock should be reclaimed");
    assert_eq!(job.search_term, "stale");
}

#[sqlx::test]
async fn fetch_and_lock_skips_future_execute_at(pool: PgPool) {
    sqlx::query(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at)
         VALUES ('delayed', 10, NOW() + INTERVAL '1 hour')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    assert!(result.is_none(), "future execute_at jobs should be skipped");
}

#[sqlx::test]
async fn fetch_and_lock_lower_priority_number_first(pool: PgPool) {
    helpers::insert_job(&pool, "low-urgency", 20, false, 0, 3).await;
    helpers::insert_job(&pool, "urgent", 1, false, 0, 3).await;

    let job = scrape_jobs::fetch_and_lock_job(&pool)
        .await
        .unwrap()
        .expect("should return a job");

    assert_eq!(
        job.search_term, "urgent",
        "priority 1 should be fetched before priority 20"
    );
}

#[sqlx::test]
async fn fetch_and_lock_fifo_within_priority(pool: PgPool) {
    sqlx::query(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at)
         VALUES ('older', 10, NOW() - INTERVAL '2 hours')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at)
         VALUES ('newer', 10, NOW() - INTERVAL '1 hour')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let job = scrape_jobs::fetch_and_lock_job(&pool)
        .await
        .unwrap()
        .expect("should return a job");

    assert_eq!(job.search_term, "older", "older execute_at should be fetched first");
}

#[sqlx::test]
async fn fetch_and_lock_at_most_one_holder(pool: PgPool) {
    // With one ready job, a second reservation must come up empty.
    helpers::insert_job(&pool, "solo", 10, false, 0, 3).await;

    let first = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    let second = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none(), "job must not be reserved twice");
}

// ── enqueue / batch_enqueue ─────────────────────────────────────────

#[sqlx::test]
async fn enqueue_applies_defaults(pool: PgPool) {
    let job = scrape_jobs::enqueue("grove", &EnqueueOpts::default(), &pool)
        .await
        .unwrap();

    assert_eq!(job.priority, 10);
    assert_eq!(job.max_retries, 3);
    assert_eq!(job.retry_count, 0);
    assert!(job.locked_at.is_none());
    assert!(job.execute_at <= Utc::now());
}

#[sqlx::test]
async fn enqueue_with_delay_is_not_reservable(pool: PgPool) {
    let opts = EnqueueOpts {
        delay: Some(Duration::from_secs(3600)),
        ..EnqueueOpts::default()
    };
    let job = scrape_jobs::enqueue("later", &opts, &pool).await.unwrap();
    assert!(job.execute_at > Utc::now());

    let result = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    assert!(result.is_none(), "delayed job must not be reservable yet");
}

#[sqlx::test]
async fn batch_enqueue_inserts_all(pool: PgPool) {
    let terms = vec!["grove".to_string(), "walnut".to_string(), "pecan".to_string()];
    let inserted = scrape_jobs::batch_enqueue(&terms, &EnqueueOpts::default(), &pool)
        .await
        .unwrap();
    assert_eq!(inserted.len(), 3);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scrape_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[sqlx::test]
async fn batch_enqueue_empty_slice(pool: PgPool) {
    let inserted = scrape_jobs::batch_enqueue(&[], &EnqueueOpts::default(), &pool)
        .await
        .unwrap();
    assert!(inserted.is_empty());
}

// ── find_existing_terms ─────────────────────────────────────────────

#[sqlx::test]
async fn find_existing_terms_case_insensitive(pool: PgPool) {
    helpers::insert_job(&pool, "Grove", 10, false, 0, 3).await;

    let candidates = vec!["GROVE".to_string(), "walnut".to_string()];
    let existing = scrape_jobs::find_existing_terms(&candidates, &pool)
        .await
        .unwrap();

    assert!(existing.contains("grove"));
    assert!(!existing.contains("walnut"));
}

#[sqlx::test]
async fn find_existing_terms_includes_locked(pool: PgPool) {
    helpers::insert_job(&pool, "grove", 10, true, 0, 3).await;

    let candidates = vec!["grove".to_string()];
    let existing = scrape_jobs::find_existing_terms(&candidates, &pool)
        .await
        .unwrap();

    assert!(
        existing.contains("grove"),
        "in-flight jobs should still block re-enqueueing"
    );
}

// ── delete_job / remove_job / unlock_job ────────────────────────────

#[sqlx::test]
async fn delete_job_removes_row(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, false, 0, 3).await;

    scrape_jobs::delete_job(id, &pool).await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scrape_jobs WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "row should be deleted");
}

#[sqlx::test]
async fn delete_job_nonexistent_id_no_error(pool: PgPool) {
    scrape_jobs::delete_job(999_999, &pool).await.unwrap();
}

#[sqlx::test]
async fn remove_job_refuses_active(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, true, 0, 3).await;

    let removed = scrape_jobs::remove_job(id, &pool).await.unwrap();
    assert!(!removed, "active jobs must not be removed");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scrape_jobs WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test]
async fn remove_job_deletes_pending(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, false, 0, 3).await;

    let removed = scrape_jobs::remove_job(id, &pool).await.unwrap();
    assert!(removed);
}

#[sqlx::test]
async fn unlock_job_clears_locked_at(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, true, 2, 3).await;

    scrape_jobs::unlock_job(id, &pool).await.unwrap();

    let (locked_at, retry_count): (Option<chrono::DateTime<Utc>>, i32) =
        sqlx::query_as("SELECT locked_at, retry_count FROM scrape_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(locked_at.is_none(), "locked_at should be cleared");
    assert_eq!(retry_count, 2, "plain unlock must not consume a retry");
}

// ── unlock_and_increment_retry ──────────────────────────────────────

#[sqlx::test]
async fn retry_with_retries_remaining(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, true, 0, 3).await;

    let result = scrape_jobs::unlock_and_increment_retry(id, 3, Duration::from_secs(60), &pool)
        .await
        .unwrap();
    assert!(result.is_some(), "should have retries remaining (0→1, max=3)");

    let (retry_count, locked_at, execute_at): (
        i32,
        Option<chrono::DateTime<Utc>>,
        chrono::DateTime<Utc>,
    ) = sqlx::query_as("SELECT retry_count, locked_at, execute_at FROM scrape_jobs WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(retry_count, 1);
    assert!(locked_at.is_none(), "should be unlocked");
    assert!(
        execute_at > Utc::now() + chrono::Duration::seconds(30),
        "backoff should push execute_at into the future"
    );
}

#[sqlx::test]
async fn retry_exhausted(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, true, 3, 3).await;

    let result = scrape_jobs::unlock_and_increment_retry(id, 3, Duration::from_secs(60), &pool)
        .await
        .unwrap();
    assert!(result.is_none(), "should NOT have retries remaining (3→4, max=3)");
}

#[sqlx::test]
async fn retried_job_not_reservable_until_backoff_elapses(pool: PgPool) {
    let id = helpers::insert_job(&pool, "grove", 10, true, 0, 3).await;

    scrape_jobs::unlock_and_increment_retry(id, 3, Duration::from_secs(3600), &pool)
        .await
        .unwrap();

    let result = scrape_jobs::fetch_and_lock_job(&pool).await.unwrap();
    assert!(result.is_none(), "delayed retry must wait out its backoff");
}

// ── queue_stats ─────────────────────────────────────────────────────

#[sqlx::test]
async fn queue_stats_counts_by_state(pool: PgPool) {
    helpers::insert_job(&pool, "pending-1", 10, false, 0, 3).await;
    helpers::insert_job(&pool, "pending-2", 10, false, 0, 3).await;
    helpers::insert_job(&pool, "active-1", 10, true, 0, 3).await;
    sqlx::query(
        "INSERT INTO scrape_jobs (search_term, priority, execute_at)
         VALUES ('delayed-1', 10, NOW() + INTERVAL '1 hour')",
    )
    .execute(&pool)
    .await
    .unwrap();
    helpers::insert_result(&pool, "done", true, 5, 1000, 0.5).await;
    helpers::insert_result(&pool, "broken", false, 0, 1000, 0.5).await;

    let stats = scrape_jobs::queue_stats(&pool).await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.delayed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.depth(), 4);
}

// ── startup recovery ────────────────────────────────────────────────

#[sqlx::test]
async fn force_unlock_all_recovers_locked_jobs(pool: PgPool) {
    helpers::insert_job(&pool, "a", 10, true, 0, 3).await;
    helpers::insert_job(&pool, "b", 10, true, 0, 3).await;
    helpers::insert_job(&pool, "c", 10, false, 0, 3).await;

    let unlocked = scrape_jobs::force_unlock_all(&pool).await.unwrap();
    assert_eq!(unlocked, 2);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM scrape_jobs WHERE locked_at IS NOT NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test]
async fn clear_pending_spares_active_jobs(pool: PgPool) {
    helpers::insert_job(&pool, "pending", 10, false, 0, 3).await;
    helpers::insert_job(&pool, "active", 10, true, 0, 3).await;

    let cleared = scrape_jobs::clear_pending(&pool).await.unwrap();
    assert_eq!(cleared, 1);

    let (term,): (String,) = sqlx::query_as("SELECT search_term FROM scrape_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(term, "active");
}

// ── result log ──────────────────────────────────────────────────────

#[sqlx::test]
async fn insert_job_result_persists(pool: PgPool) {
    let now = Utc::now();
    let result = JobResult {
        search_term: "grove",
        success: false,
        error_kind: Some("transport"),
        error_message: Some("upstream returned 503"),
        properties_fetched: 0,
        results_found: 0,
        retry_count: 3,
        queued_at: now,
        started_at: now,
        duration_ms: 1234,
    };
    scrape_jobs::insert_job_result(&result, &pool).await.unwrap();

    let (kind, message): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT error_kind, error_message FROM scrape_job_results")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(kind.as_deref(), Some("transport"));
    assert_eq!(message.as_deref(), Some("upstream returned 503"));
}

#[sqlx::test]
async fn load_historical_terms_unions_queue_and_results(pool: PgPool) {
    helpers::insert_job(&pool, "Queued", 10, false, 0, 3).await;
    helpers::insert_result(&pool, "Finished", true, 3, 1000, 1.0).await;
    helpers::insert_result(&pool, "finished", true, 1, 1000, 0.5).await;

    let mut terms = scrape_jobs::load_historical_terms(&pool).await.unwrap();
    terms.sort();
    assert_eq!(terms, vec!["finished".to_string(), "queued".to_string()]);
}

#[sqlx::test]
async fn prune_results_keeps_most_recent(pool: PgPool) {
    for day in 0..5 {
        helpers::insert_result(&pool, "old-success", true, 1, 100, day as f64).await;
    }
    for day in 0..4 {
        helpers::insert_result(&pool, "old-failure", false, 0, 100, day as f64).await;
    }

    let pruned = scrape_jobs::prune_results(3, 2, &pool).await.unwrap();
    assert_eq!(pruned, 4, "2 extra successes + 2 extra failures");

    let (successes, failures): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE success), COUNT(*) FILTER (WHERE NOT success)
         FROM scrape_job_results",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(successes, 3);
    assert_eq!(failures, 2);
}
