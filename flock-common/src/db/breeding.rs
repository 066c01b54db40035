//! Breeding record queries
//!
//! Newest `date_started` first, ties broken by newest id.

use crate::db::models::{BreedingInput, BreedingRecord, BreedingStatus};
use crate::db::search;
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SELECT_BREEDING: &str = r#"
    SELECT br.id, br.ewe_id, ewe.tag_number AS ewe_tag, ewe.name AS ewe_name,
           br.ram_id, ram.tag_number AS ram_tag, ram.name AS ram_name,
           br.date_started, br.date_ended, br.expected_lambing_date,
           br.status, br.notes
    FROM breeding_records br
    JOIN sheep ewe ON ewe.id = br.ewe_id
    JOIN sheep ram ON ram.id = br.ram_id
"#;

const COUNT_BREEDING: &str = r#"
    SELECT COUNT(*)
    FROM breeding_records br
    JOIN sheep ewe ON ewe.id = br.ewe_id
    JOIN sheep ram ON ram.id = br.ram_id
"#;

const ORDER_BREEDING: &str = " ORDER BY br.date_started DESC, br.id DESC";

#[derive(Debug, Clone, Default)]
pub struct BreedingFilter {
    pub status: Option<BreedingStatus>,
    pub ewe_id: Option<i64>,
    pub ram_id: Option<i64>,
    /// Substring of the ewe's or ram's tag or name
    pub search: Option<String>,
}

impl BreedingFilter {
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut sep = " WHERE ";
        if let Some(status) = self.status {
            qb.push(sep).push("br.status = ").push_bind(status);
            sep = " AND ";
        }
        if let Some(ewe_id) = self.ewe_id {
            qb.push(sep).push("br.ewe_id = ").push_bind(ewe_id);
            sep = " AND ";
        }
        if let Some(ram_id) = self.ram_id {
            qb.push(sep).push("br.ram_id = ").push_bind(ram_id);
            sep = " AND ";
        }
        if let Some(term) = search::term(self.search.as_deref()) {
            qb.push(sep);
            search::push_contains(qb, &["ewe.tag_number", "ewe.name", "ram.tag_number", "ram.name"], term);
        }
    }
}

pub async fn count(pool: &SqlitePool, filter: &BreedingFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new(COUNT_BREEDING);
    filter.apply(&mut qb);
    let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(total)
}

pub async fn list(
    pool: &SqlitePool,
    filter: &BreedingFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<BreedingRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_BREEDING);
    filter.apply(&mut qb);
    qb.push(ORDER_BREEDING)
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let records = qb.build_query_as::<BreedingRecord>().fetch_all(pool).await?;
    Ok(records)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<BreedingRecord> {
    sqlx::query_as::<_, BreedingRecord>(&format!("{} WHERE br.id = ?", SELECT_BREEDING))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Breeding record {}", id)))
}

pub async fn create(pool: &SqlitePool, input: &BreedingInput) -> Result<BreedingRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO breeding_records (
            ewe_id, ram_id, date_started, date_ended, expected_lambing_date, status, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.ewe_id)
    .bind(input.ram_id)
    .bind(input.date_started)
    .bind(input.date_ended)
    .bind(input.expected_lambing_date)
    .bind(input.status)
    .bind(&input.notes)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, input: &BreedingInput) -> Result<BreedingRecord> {
    let result = sqlx::query(
        r#"
        UPDATE breeding_records SET
            ewe_id = ?, ram_id = ?, date_started = ?, date_ended = ?,
            expected_lambing_date = ?, status = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(input.ewe_id)
    .bind(input.ram_id)
    .bind(input.date_started)
    .bind(input.date_ended)
    .bind(input.expected_lambing_date)
    .bind(input.status)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Breeding record {}", id)));
    }

    get(pool, id).await
}

/// Delete a breeding record and its linked lambing record
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<BreedingRecord> {
    let record = get(pool, id).await?;

    sqlx::query("DELETE FROM breeding_records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(record)
}

/// Copy a breeding record into a new `PLANNED` one
///
/// Ewe, ram, dates and notes are carried over; the linked lambing record
/// is not.
pub async fn duplicate(pool: &SqlitePool, id: i64) -> Result<BreedingRecord> {
    let source = get(pool, id).await?;

    let copy = BreedingInput {
        ewe_id: source.ewe_id,
        ram_id: source.ram_id,
        date_started: source.date_started,
        date_ended: source.date_ended,
        expected_lambing_date: source.expected_lambing_date,
        status: BreedingStatus::Planned,
        notes: source.notes,
    };

    create(pool, &copy).await
}

/// Most recent breedings with `sheep_id` as ewe
pub async fn recent_as_ewe(pool: &SqlitePool, sheep_id: i64, limit: i64) -> Result<Vec<BreedingRecord>> {
    let filter = BreedingFilter {
        ewe_id: Some(sheep_id),
        ..Default::default()
    };
    list(pool, &filter, limit, 0).await
}

/// Most recent breedings with `sheep_id` as ram
pub async fn recent_as_ram(pool: &SqlitePool, sheep_id: i64, limit: i64) -> Result<Vec<BreedingRecord>> {
    let filter = BreedingFilter {
        ram_id: Some(sheep_id),
        ..Default::default()
    };
    list(pool, &filter, limit, 0).await
}
