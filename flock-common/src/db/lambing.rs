//! Lambing record queries

use crate::db::models::{LambingInput, LambingRecord};
use crate::db::search;
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SELECT_LAMBING: &str = r#"
    SELECT lr.id, lr.breeding_record_id, lr.ewe_id,
           ewe.tag_number AS ewe_tag, ewe.name AS ewe_name,
           lr.date, lr.assisted, lr.complications,
           lr.total_born, lr.born_alive, lr.born_dead,
           lr.primary_image, lr.notes
    FROM lambing_records lr
    JOIN sheep ewe ON ewe.id = lr.ewe_id
"#;

#[derive(Debug, Clone, Default)]
pub struct LambingFilter {
    pub assisted: Option<bool>,
    pub ewe_id: Option<i64>,
    /// Substring of the ewe's tag or name
    pub search: Option<String>,
}

impl LambingFilter {
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut sep = " WHERE ";
        if let Some(assisted) = self.assisted {
            qb.push(sep).push("lr.assisted = ").push_bind(assisted);
            sep = " AND ";
        }
        if let Some(ewe_id) = self.ewe_id {
            qb.push(sep).push("lr.ewe_id = ").push_bind(ewe_id);
            sep = " AND ";
        }
        if let Some(term) = search::term(self.search.as_deref()) {
            qb.push(sep);
            search::push_contains(qb, &["ewe.tag_number", "ewe.name"], term);
        }
    }
}

pub async fn count(pool: &SqlitePool, filter: &LambingFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM lambing_records lr JOIN sheep ewe ON ewe.id = lr.ewe_id",
    );
    filter.apply(&mut qb);
    let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(total)
}

/// One page of lambing records, newest first
pub async fn list(
    pool: &SqlitePool,
    filter: &LambingFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<LambingRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_LAMBING);
    filter.apply(&mut qb);
    qb.push(" ORDER BY lr.date DESC, lr.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let records = qb.build_query_as::<LambingRecord>().fetch_all(pool).await?;
    Ok(records)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<LambingRecord> {
    sqlx::query_as::<_, LambingRecord>(&format!("{} WHERE lr.id = ?", SELECT_LAMBING))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Lambing record {}", id)))
}

/// Lambing record produced by a breeding record, if any
pub async fn for_breeding_record(pool: &SqlitePool, breeding_record_id: i64) -> Result<Option<LambingRecord>> {
    let record = sqlx::query_as::<_, LambingRecord>(&format!(
        "{} WHERE lr.breeding_record_id = ?",
        SELECT_LAMBING
    ))
    .bind(breeding_record_id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub async fn create(pool: &SqlitePool, input: &LambingInput) -> Result<LambingRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO lambing_records (
            breeding_record_id, ewe_id, date, assisted, complications,
            total_born, born_alive, born_dead, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.breeding_record_id)
    .bind(input.ewe_id)
    .bind(input.date)
    .bind(input.assisted)
    .bind(&input.complications)
    .bind(input.total_born)
    .bind(input.born_alive)
    .bind(input.born_dead)
    .bind(&input.notes)
    .execute(pool)
    .await
    .map_err(already_linked)?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, input: &LambingInput) -> Result<LambingRecord> {
    let result = sqlx::query(
        r#"
        UPDATE lambing_records SET
            breeding_record_id = ?, ewe_id = ?, date = ?, assisted = ?,
            complications = ?, total_born = ?, born_alive = ?, born_dead = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(input.breeding_record_id)
    .bind(input.ewe_id)
    .bind(input.date)
    .bind(input.assisted)
    .bind(&input.complications)
    .bind(input.total_born)
    .bind(input.born_alive)
    .bind(input.born_dead)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await
    .map_err(already_linked)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Lambing record {}", id)));
    }

    get(pool, id).await
}

/// Replace the primary image path, returning the previous one
pub async fn set_primary_image(pool: &SqlitePool, id: i64, path: &str) -> Result<Option<String>> {
    let previous = get(pool, id).await?.primary_image;

    sqlx::query("UPDATE lambing_records SET primary_image = ? WHERE id = ?")
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(previous)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<LambingRecord> {
    let record = get(pool, id).await?;

    sqlx::query("DELETE FROM lambing_records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(record)
}

/// Most recent lambings of a ewe
pub async fn recent_for_ewe(pool: &SqlitePool, ewe_id: i64, limit: i64) -> Result<Vec<LambingRecord>> {
    let filter = LambingFilter {
        ewe_id: Some(ewe_id),
        ..Default::default()
    };
    list(pool, &filter, limit, 0).await
}

fn already_linked(err: sqlx::Error) -> Error {
    Error::from_unique_violation(err, "That breeding record already has a lambing record")
}
