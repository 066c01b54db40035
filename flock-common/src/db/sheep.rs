//! Sheep queries
//!
//! Lists are ordered by tag number. Filters compose with AND.

use crate::db::models::{Gender, Sheep, SheepInput, SheepRef, SheepStatus};
use crate::db::search;
use crate::{Error, Result};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const SELECT_SHEEP: &str = r#"
    SELECT s.id, s.tag_number, s.name, s.uuid, s.gender, s.date_of_birth,
           s.breed_id, b.name AS breed_name, s.weight_birth, s.weight_current,
           s.color, s.markings, s.primary_image, s.mother_id, s.father_id,
           s.status, s.date_acquired, s.date_removed, s.removal_reason, s.notes
    FROM sheep s
    JOIN breeds b ON b.id = s.breed_id
"#;

/// List filters
#[derive(Debug, Clone, Default)]
pub struct SheepFilter {
    pub status: Option<SheepStatus>,
    pub gender: Option<Gender>,
    pub breed_id: Option<i64>,
    /// Substring match on tag number or name
    pub search: Option<String>,
}

impl SheepFilter {
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut sep = " WHERE ";

        if let Some(status) = self.status {
            qb.push(sep).push("s.status = ").push_bind(status);
            sep = " AND ";
        }
        if let Some(gender) = self.gender {
            qb.push(sep).push("s.gender = ").push_bind(gender);
            sep = " AND ";
        }
        if let Some(breed_id) = self.breed_id {
            qb.push(sep).push("s.breed_id = ").push_bind(breed_id);
            sep = " AND ";
        }
        if let Some(term) = search::term(self.search.as_deref()) {
            qb.push(sep);
            search::push_contains(qb, &["s.tag_number", "s.name"], term);
        }
    }
}

pub async fn count(pool: &SqlitePool, filter: &SheepFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sheep s");
    filter.apply(&mut qb);
    let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(total)
}

/// One page of sheep; `limit = None` returns every match
pub async fn list(
    pool: &SqlitePool,
    filter: &SheepFilter,
    limit: Option<i64>,
    offset: i64,
) -> Result<Vec<Sheep>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_SHEEP);
    filter.apply(&mut qb);
    qb.push(" ORDER BY s.tag_number");
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    }

    let sheep = qb.build_query_as::<Sheep>().fetch_all(pool).await?;
    Ok(sheep)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Sheep> {
    sqlx::query_as::<_, Sheep>(&format!("{} WHERE s.id = ?", SELECT_SHEEP))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Sheep {}", id)))
}

/// Tag, name and gender of a sheep, `None` when it does not exist
pub async fn find_ref(pool: &SqlitePool, id: i64) -> Result<Option<SheepRef>> {
    let found = sqlx::query_as::<_, SheepRef>(
        "SELECT id, tag_number, name, gender FROM sheep WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(found)
}

/// Sheep whose mother or father is `id`
pub async fn offspring(pool: &SqlitePool, id: i64) -> Result<Vec<SheepRef>> {
    let children = sqlx::query_as::<_, SheepRef>(
        r#"
        SELECT id, tag_number, name, gender FROM sheep
        WHERE mother_id = ? OR father_id = ?
        ORDER BY date_of_birth DESC, tag_number
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(children)
}

pub async fn create(pool: &SqlitePool, input: &SheepInput) -> Result<Sheep> {
    let id = sqlx::query(
        r#"
        INSERT INTO sheep (
            tag_number, name, uuid, gender, date_of_birth, breed_id,
            weight_birth, weight_current, color, markings, mother_id, father_id,
            status, date_acquired, date_removed, removal_reason, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.tag_number)
    .bind(&input.name)
    .bind(Uuid::new_v4())
    .bind(input.gender)
    .bind(input.date_of_birth)
    .bind(input.breed_id)
    .bind(input.weight_birth)
    .bind(input.weight_current)
    .bind(&input.color)
    .bind(&input.markings)
    .bind(input.mother_id)
    .bind(input.father_id)
    .bind(input.status)
    .bind(input.date_acquired)
    .bind(input.date_removed)
    .bind(&input.removal_reason)
    .bind(&input.notes)
    .execute(pool)
    .await
    .map_err(|e| duplicate_tag(e, &input.tag_number))?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, input: &SheepInput) -> Result<Sheep> {
    let result = sqlx::query(
        r#"
        UPDATE sheep SET
            tag_number = ?, name = ?, gender = ?, date_of_birth = ?, breed_id = ?,
            weight_birth = ?, weight_current = ?, color = ?, markings = ?,
            mother_id = ?, father_id = ?, status = ?, date_acquired = ?,
            date_removed = ?, removal_reason = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.tag_number)
    .bind(&input.name)
    .bind(input.gender)
    .bind(input.date_of_birth)
    .bind(input.breed_id)
    .bind(input.weight_birth)
    .bind(input.weight_current)
    .bind(&input.color)
    .bind(&input.markings)
    .bind(input.mother_id)
    .bind(input.father_id)
    .bind(input.status)
    .bind(input.date_acquired)
    .bind(input.date_removed)
    .bind(&input.removal_reason)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| duplicate_tag(e, &input.tag_number))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Sheep {}", id)));
    }

    get(pool, id).await
}

/// Replace the primary image path, returning the previous one
pub async fn set_primary_image(pool: &SqlitePool, id: i64, path: &str) -> Result<Option<String>> {
    let previous = get(pool, id).await?.primary_image;

    sqlx::query("UPDATE sheep SET primary_image = ? WHERE id = ?")
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(previous)
}

/// Delete a sheep
///
/// Health, breeding and lambing records go with it; offspring keep their
/// record with the parent reference cleared.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<Sheep> {
    let sheep = get(pool, id).await?;

    sqlx::query("DELETE FROM sheep WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(sheep)
}

fn duplicate_tag(err: sqlx::Error, tag: &str) -> Error {
    Error::from_unique_violation(err, format!("Tag number '{}' is already in use", tag))
}

/// Sheep born in one calendar year
#[derive(Debug, Clone, Serialize)]
pub struct BirthYearGroup {
    pub year: i32,
    pub sheep: Vec<Sheep>,
}

/// Group sheep by year of birth, newest year first
///
/// Order within a group is preserved from the input.
pub fn group_by_birth_year(sheep: Vec<Sheep>) -> Vec<BirthYearGroup> {
    use chrono::Datelike;
    use std::collections::BTreeMap;

    let mut by_year: BTreeMap<i32, Vec<Sheep>> = BTreeMap::new();
    for s in sheep {
        by_year.entry(s.date_of_birth.year()).or_default().push(s);
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, sheep)| BirthYearGroup { year, sheep })
        .collect()
}
