#[allow(dead_code)]
mod helpers;

use sqlx::PgPool;
use tcad::data::term_history;

#[sqlx::test]
async fn empty_log_yields_no_history(pool: PgPool) {
    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert!(rows.is_empty());
}

#[sqlx::test]
async fn aggregates_runs_and_results(pool: PgPool) {
    helpers::insert_result(&pool, "grove", true, 3, 1000, 2.0).await;
    helpers::insert_result(&pool, "grove", true, 0, 1000, 1.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);

    let grove = &rows[0];
    assert_eq!(grove.term, "grove");
    assert_eq!(grove.runs, 2);
    assert_eq!(grove.total_results, 3);
    assert_eq!(grove.success_rate, 0.5);
    assert_eq!(grove.avg_results, 1.5);
}

#[sqlx::test]
async fn casing_folds_into_one_term(pool: PgPool) {
    helpers::insert_result(&pool, "Grove", true, 3, 1000, 2.0).await;
    helpers::insert_result(&pool, "GROVE", true, 2, 1000, 1.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].runs, 2);
    assert_eq!(rows[0].total_results, 5);
}

#[sqlx::test]
async fn efficiency_is_results_per_second(pool: PgPool) {
    // 10 new rows over 2 seconds of scrape time
    helpers::insert_result(&pool, "grove", true, 10, 2000, 1.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert_eq!(rows[0].efficiency, 5.0);
}

#[sqlx::test]
async fn efficiency_falls_back_to_avg_without_durations(pool: PgPool) {
    helpers::insert_result(&pool, "grove", true, 10, 0, 1.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert_eq!(rows[0].efficiency, rows[0].avg_results);
    assert_eq!(rows[0].efficiency, 10.0);
}

#[sqlx::test]
async fn failed_runs_count_against_success_rate(pool: PgPool) {
    helpers::insert_result(&pool, "grove", true, 4, 1000, 3.0).await;
    helpers::insert_result(&pool, "grove", false, 0, 1000, 2.0).await;
    helpers::insert_result(&pool, "grove", false, 0, 1000, 1.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    assert_eq!(rows[0].runs, 3);
    assert!((rows[0].success_rate - 1.0 / 3.0).abs() < 1e-9);
}

#[sqlx::test]
async fn last_used_at_is_most_recent_run(pool: PgPool) {
    helpers::insert_result(&pool, "grove", true, 1, 1000, 5.0).await;
    helpers::insert_result(&pool, "grove", true, 1, 1000, 2.0).await;

    let rows = term_history::fetch_term_history(&pool).await.unwrap();
    let age = chrono::Utc::now() - rows[0].last_used_at;
    assert!(age < chrono::Duration::days(3), "latest run should win");
}
