#[allow(dead_code)]
mod helpers;

use chrono::Utc;
use sqlx::PgPool;
use tcad::data::properties;

// ── insert/update discrimination ────────────────────────────────────

#[sqlx::test]
async fn fresh_records_all_report_inserted(pool: PgPool) {
    let records = vec![
        helpers::make_record("A", "ALPHA LLC", 100_000.0),
        helpers::make_record("B", "BRAVO TRUST", 200_000.0),
        helpers::make_record("C", "CHARLIE", 300_000.0),
    ];

    let flags = properties::batch_upsert(&records, "grove", &pool).await.unwrap();
    assert_eq!(flags, vec![true, true, true]);
    assert_eq!(properties::count(&pool).await.unwrap(), 3);
}

#[sqlx::test]
async fn rescrape_reports_no_inserts(pool: PgPool) {
    let records = vec![
        helpers::make_record("A", "ALPHA LLC", 100_000.0),
        helpers::make_record("B", "BRAVO TRUST", 200_000.0),
        helpers::make_record("C", "CHARLIE", 300_000.0),
    ];
    properties::batch_upsert(&records, "grove", &pool).await.unwrap();

    let flags = properties::batch_upsert(&records, "grove", &pool).await.unwrap();
    assert_eq!(flags, vec![false, false, false]);
    assert_eq!(properties::count(&pool).await.unwrap(), 3);
}

#[sqlx::test]
async fn mixed_batch_flags_in_input_order(pool: PgPool) {
    properties::batch_upsert(
        &[helpers::make_record("A", "ALPHA", 100_000.0)],
        "grove",
        &pool,
    )
    .await
    .unwrap();

    let records = vec![
        helpers::make_record("B", "BRAVO", 200_000.0),
        helpers::make_record("A", "ALPHA", 150_000.0),
        helpers::make_record("C", "CHARLIE", 300_000.0),
    ];
    let flags = properties::batch_upsert(&records, "walnut", &pool).await.unwrap();
    assert_eq!(flags, vec![true, false, true]);
}

#[sqlx::test]
async fn update_refreshes_fields_and_preserves_created_at(pool: PgPool) {
    properties::batch_upsert(
        &[helpers::make_record("A", "OLD OWNER", 100_000.0)],
        "grove",
        &pool,
    )
    .await
    .unwrap();

    let (created_before, updated_before): (chrono::DateTime<Utc>, chrono::DateTime<Utc>) =
        sqlx::query_as("SELECT created_at, updated_at FROM properties WHERE property_id = 'A'")
            .fetch_one(&pool)
            .await
            .unwrap();

    // Backdate the timestamps so the refresh is observable
    sqlx::query(
        "UPDATE properties SET created_at = created_at - INTERVAL '1 day',
                               updated_at = updated_at - INTERVAL '1 day'",
    )
    .execute(&pool)
    .await
    .unwrap();

    properties::batch_upsert(
        &[helpers::make_record("A", "NEW OWNER", 175_000.0)],
        "walnut",
        &pool,
    )
    .await
    .unwrap();

    let (owner, appraised, term, created_after, updated_after): (
        String,
        f64,
        String,
        chrono::DateTime<Utc>,
        chrono::DateTime<Utc>,
    ) = sqlx::query_as(
        "SELECT owner_name, appraised_value, search_term, created_at, updated_at
         FROM properties WHERE property_id = 'A'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(owner, "NEW OWNER");
    assert_eq!(appraised, 175_000.0);
    assert_eq!(term, "walnut");
    assert!(
        created_after < created_before,
        "created_at must keep the (backdated) original value"
    );
    assert!(updated_after > updated_before, "updated_at must advance");
}

#[sqlx::test]
async fn in_batch_duplicate_counts_once(pool: PgPool) {
    let records = vec![
        helpers::make_record("A", "FIRST PASS", 100_000.0),
        helpers::make_record("A", "SECOND PASS", 120_000.0),
    ];
    let flags = properties::batch_upsert(&records, "grove", &pool).await.unwrap();

    assert_eq!(
        flags,
        vec![true, false],
        "only the first occurrence of a pid may count as inserted"
    );
    assert_eq!(properties::count(&pool).await.unwrap(), 1);

    // Last write wins within the batch
    let (owner,): (String,) =
        sqlx::query_as("SELECT owner_name FROM properties WHERE property_id = 'A'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(owner, "SECOND PASS");
}

#[sqlx::test]
async fn large_batch_spans_chunks(pool: PgPool) {
    // 120 records cross the 50-row chunk boundary twice
    let records: Vec<_> = (0..120)
        .map(|i| helpers::make_record(&format!("P{i:04}"), "OWNER", 1_000.0 + i as f64))
        .collect();

    let flags = properties::batch_upsert(&records, "grove", &pool).await.unwrap();
    assert_eq!(flags.len(), 120);
    assert!(flags.iter().all(|f| *f));
    assert_eq!(properties::count(&pool).await.unwrap(), 120);
}

#[sqlx::test]
async fn empty_batch_is_noop(pool: PgPool) {
    let flags = properties::batch_upsert(&[], "grove", &pool).await.unwrap();
    assert!(flags.is_empty());
    assert_eq!(properties::count(&pool).await.unwrap(), 0);
}

// ── identity invariant ──────────────────────────────────────────────

#[sqlx::test]
async fn property_id_stays_unique_across_terms(pool: PgPool) {
    properties::batch_upsert(
        &[helpers::make_record("A", "ALPHA", 100_000.0)],
        "grove",
        &pool,
    )
    .await
    .unwrap();
    properties::batch_upsert(
        &[helpers::make_record("A", "ALPHA", 100_000.0)],
        "walnut",
        &pool,
    )
    .await
    .unwrap();

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM properties WHERE property_id = 'A'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1, "no two rows may share a property_id");
}

#[sqlx::test]
async fn nullable_money_fields_round_trip(pool: PgPool) {
    let mut record = helpers::make_record("A", "ALPHA", 0.0);
    record.assessed_value = None;
    record.geo_id = None;
    record.legal_description = None;

    properties::batch_upsert(&[record], "grove", &pool).await.unwrap();

    let (assessed, appraised): (Option<f64>, f64) =
        sqlx::query_as("SELECT assessed_value, appraised_value FROM properties WHERE property_id = 'A'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(assessed, None);
    assert_eq!(appraised, 0.0);
}
