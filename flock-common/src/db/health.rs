//! Health record queries

use crate::db::models::{HealthInput, HealthRecord, HealthRecordType};
use crate::db::search;
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SELECT_HEALTH: &str = r#"
    SELECT hr.id, hr.sheep_id, s.tag_number AS sheep_tag, s.name AS sheep_name,
           hr.date, hr.record_type, hr.treatment, hr.dosage, hr.administered_by,
           hr.requires_followup, hr.followup_date, hr.notes
    FROM health_records hr
    JOIN sheep s ON s.id = hr.sheep_id
"#;

#[derive(Debug, Clone, Default)]
pub struct HealthFilter {
    pub record_type: Option<HealthRecordType>,
    pub requires_followup: Option<bool>,
    pub sheep_id: Option<i64>,
    /// Substring of the sheep's tag or name, or of the treatment
    pub search: Option<String>,
}

impl HealthFilter {
    fn apply(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut sep = " WHERE ";
        if let Some(record_type) = self.record_type {
            qb.push(sep).push("hr.record_type = ").push_bind(record_type);
            sep = " AND ";
        }
        if let Some(followup) = self.requires_followup {
            qb.push(sep).push("hr.requires_followup = ").push_bind(followup);
            sep = " AND ";
        }
        if let Some(sheep_id) = self.sheep_id {
            qb.push(sep).push("hr.sheep_id = ").push_bind(sheep_id);
            sep = " AND ";
        }
        if let Some(term) = search::term(self.search.as_deref()) {
            qb.push(sep);
            search::push_contains(qb, &["s.tag_number", "s.name", "hr.treatment"], term);
        }
    }
}

pub async fn count(pool: &SqlitePool, filter: &HealthFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM health_records hr JOIN sheep s ON s.id = hr.sheep_id",
    );
    filter.apply(&mut qb);
    let total: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(total)
}

/// One page of health records, newest first
pub async fn list(
    pool: &SqlitePool,
    filter: &HealthFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<HealthRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_HEALTH);
    filter.apply(&mut qb);
    qb.push(" ORDER BY hr.date DESC, hr.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let records = qb.build_query_as::<HealthRecord>().fetch_all(pool).await?;
    Ok(records)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<HealthRecord> {
    sqlx::query_as::<_, HealthRecord>(&format!("{} WHERE hr.id = ?", SELECT_HEALTH))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Health record {}", id)))
}

pub async fn create(pool: &SqlitePool, input: &HealthInput) -> Result<HealthRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO health_records (
            sheep_id, date, record_type, treatment, dosage, administered_by,
            requires_followup, followup_date, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.sheep_id)
    .bind(input.date)
    .bind(input.record_type)
    .bind(&input.treatment)
    .bind(&input.dosage)
    .bind(&input.administered_by)
    .bind(input.requires_followup)
    .bind(input.followup_date)
    .bind(&input.notes)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, input: &HealthInput) -> Result<HealthRecord> {
    let result = sqlx::query(
        r#"
        UPDATE health_records SET
            sheep_id = ?, date = ?, record_type = ?, treatment = ?, dosage = ?,
            administered_by = ?, requires_followup = ?, followup_date = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(input.sheep_id)
    .bind(input.date)
    .bind(input.record_type)
    .bind(&input.treatment)
    .bind(&input.dosage)
    .bind(&input.administered_by)
    .bind(input.requires_followup)
    .bind(input.followup_date)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Health record {}", id)));
    }

    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<HealthRecord> {
    let record = get(pool, id).await?;

    sqlx::query("DELETE FROM health_records WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(record)
}

pub async fn recent_for_sheep(pool: &SqlitePool, sheep_id: i64, limit: i64) -> Result<Vec<HealthRecord>> {
    let filter = HealthFilter {
        sheep_id: Some(sheep_id),
        ..Default::default()
    };
    list(pool, &filter, limit, 0).await
}
