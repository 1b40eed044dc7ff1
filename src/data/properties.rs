//! Batch property upserts with insert/update discrimination.

use crate::error::Result;
use crate::tcad::models::PropertyRecord;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Rows per upsert statement. Each chunk is one statement and therefore one
/// atomic unit.
const CHUNK_SIZE: usize = 50;

/// Bulk upsert scraped records, returning one flag per input record in input
/// order: `true` iff that record created a new row.
///
/// The flag comes from `RETURNING (xmax = 0)` on the upsert statement itself;
/// a freshly inserted row has no previous version, an updated one does. No
/// existence precheck is made, so the result stays correct when concurrent
/// workers race on the same property id.
///
/// Records repeating a property id within the call are collapsed (last write
/// wins); only the first occurrence can report an insert.
pub async fn batch_upsert(
    records: &[PropertyRecord],
    search_term: &str,
    pool: &PgPool,
) -> Result<Vec<bool>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let start = Instant::now();
    let mut inserted_by_pid: HashMap<String, bool> = HashMap::with_capacity(records.len());

    for chunk in records.chunks(CHUNK_SIZE) {
        // Collapse in-chunk duplicates; ON CONFLICT cannot touch the same
        // row twice in one statement.
        let mut deduped: Vec<&PropertyRecord> = Vec::with_capacity(chunk.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(chunk.len());
        for record in chunk.iter().rev() {
            if seen.insert(record.property_id.as_str()) {
                deduped.push(record);
            }
        }
        deduped.reverse();

        let flags = upsert_chunk(&deduped, search_term, pool).await?;
        for (record, inserted) in deduped.iter().zip(flags) {
            inserted_by_pid
                .entry(record.property_id.clone())
                .or_insert(inserted);
        }
    }

    // Map back to input order; repeated pids after the first occurrence are
    // never counted as inserts.
    let mut counted: HashSet<&str> = HashSet::with_capacity(records.len());
    let flags: Vec<bool> = records
        .iter()
        .map(|record| {
            counted.insert(record.property_id.as_str())
                && inserted_by_pid
                    .get(record.property_id.as_str())
                    .copied()
                    .unwrap_or(false)
        })
        .collect();

    let inserted_count = flags.iter().filter(|f| **f).count();
    info!(
        records = records.len(),
        inserted = inserted_count,
        updated = records.len() - inserted_count,
        duration_ms = start.elapsed().as_millis(),
        "Batch upserted properties"
    );

    Ok(flags)
}

/// Upsert one chunk in a single UNNEST statement, returning the per-row
/// inserted flag in statement order.
async fn upsert_chunk(
    records: &[&PropertyRecord],
    search_term: &str,
    pool: &PgPool,
) -> Result<Vec<bool>> {
    let property_ids: Vec<&str> = records.iter().map(|r| r.property_id.as_str()).collect();
    let owner_names: Vec<&str> = records.iter().map(|r| r.owner_name.as_str()).collect();
    let prop_types: Vec<Option<&str>> = records.iter().map(|r| r.prop_type.as_deref()).collect();
    let cities: Vec<Option<&str>> = records.iter().map(|r| r.city.as_deref()).collect();
    let streets: Vec<Option<&str>> = records
        .iter()
        .map(|r| r.street_primary.as_deref())
        .collect();
    let assessed: Vec<Option<f64>> = records.iter().map(|r| r.assessed_value).collect();
    let appraised: Vec<f64> = records.iter().map(|r| r.appraised_value).collect();
    let geo_ids: Vec<Option<&str>> = records.iter().map(|r| r.geo_id.as_deref()).collect();
    let legals: Vec<Option<&str>> = records
        .iter()
        .map(|r| r.legal_description.as_deref())
        .collect();

    let rows = sqlx::query_as::<_, (String, bool)>(
        r#"
        INSERT INTO properties (
            property_id, owner_name, prop_type, city, street_primary,
            assessed_value, appraised_value, geo_id, legal_description,
            search_term, scraped_at, created_at, updated_at
        )
        SELECT
            v.property_id, v.owner_name, v.prop_type, v.city, v.street_primary,
            v.assessed_value, v.appraised_value, v.geo_id, v.legal_description,
            $10, NOW(), NOW(), NOW()
        FROM UNNEST(
            $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
            $6::float8[], $7::float8[], $8::text[], $9::text[]
        ) AS v(
            property_id, owner_name, prop_type, city, street_primary,
            assessed_value, appraised_value, geo_id, legal_description
        )
        ON CONFLICT (property_id)
        DO UPDATE SET
            owner_name = EXCLUDED.owner_name,
            prop_type = EXCLUDED.prop_type,
            city = EXCLUDED.city,
            street_primary = EXCLUDED.street_primary,
            assessed_value = EXCLUDED.assessed_value,
            appraised_value = EXCLUDED.appraised_value,
            geo_id = EXCLUDED.geo_id,
            legal_description = EXCLUDED.legal_description,
            search_term = EXCLUDED.search_term,
            scraped_at = EXCLUDED.scraped_at,
            updated_at = EXCLUDED.updated_at
        RETURNING property_id, (xmax = 0) AS inserted
        "#,
    )
    .bind(&property_ids)
    .bind(&owner_names)
    .bind(&prop_types)
    .bind(&cities)
    .bind(&streets)
    .bind(&assessed)
    .bind(&appraised)
    .bind(&geo_ids)
    .bind(&legals)
    .bind(search_term)
    .fetch_all(pool)
    .await
    .map_err(|e| anyhow::anyhow!("Failed to batch upsert properties: {e}"))?;

    // RETURNING preserves statement order for UNNEST inserts, but map by id
    // anyway; the contract is per-pid, not positional.
    let by_pid: HashMap<String, bool> = rows.into_iter().collect();
    debug!(chunk = records.len(), "Chunk upserted");

    Ok(records
        .iter()
        .map(|record| by_pid.get(&record.property_id).copied().unwrap_or(false))
        .collect())
}

/// Total properties stored.
pub async fn count(pool: &PgPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM properties")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
