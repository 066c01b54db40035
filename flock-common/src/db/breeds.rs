//! Breed queries

use crate::db::models::{Breed, BreedInput};
use crate::db::search;
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Breeds by name, optionally narrowed to a name or description substring
pub async fn list(pool: &SqlitePool, search: Option<&str>) -> Result<Vec<Breed>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, description FROM breeds");
    if let Some(term) = search::term(search) {
        qb.push(" WHERE ");
        search::push_contains(&mut qb, &["name", "description"], term);
    }
    qb.push(" ORDER BY name");

    let breeds = qb.build_query_as::<Breed>().fetch_all(pool).await?;
    Ok(breeds)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Breed> {
    sqlx::query_as::<_, Breed>("SELECT id, name, description FROM breeds WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Breed {}", id)))
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM breeds WHERE id = ?)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(found)
}

pub async fn create(pool: &SqlitePool, input: &BreedInput) -> Result<Breed> {
    let id = sqlx::query("INSERT INTO breeds (name, description) VALUES (?, ?)")
        .bind(&input.name)
        .bind(&input.description)
        .execute(pool)
        .await
        .map_err(|e| duplicate_name(e, &input.name))?
        .last_insert_rowid();

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, input: &BreedInput) -> Result<Breed> {
    let result = sqlx::query("UPDATE breeds SET name = ?, description = ? WHERE id = ?")
        .bind(&input.name)
        .bind(&input.description)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| duplicate_name(e, &input.name))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Breed {}", id)));
    }

    get(pool, id).await
}

/// Number of sheep recorded with this breed
pub async fn sheep_count(pool: &SqlitePool, id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sheep WHERE breed_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete a breed that no sheep references
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<Breed> {
    let breed = get(pool, id).await?;

    let in_use = sheep_count(pool, id).await?;
    if in_use > 0 {
        return Err(Error::Conflict(format!(
            "Breed '{}' is used by {} sheep and cannot be deleted",
            breed.name, in_use
        )));
    }

    sqlx::query("DELETE FROM breeds WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match e {
            // A sheep was added between the count and the delete
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => Error::Conflict(format!(
                "Breed '{}' is in use and cannot be deleted",
                breed.name
            )),
            other => Error::Database(other),
        })?;

    Ok(breed)
}

fn duplicate_name(err: sqlx::Error, name: &str) -> Error {
    Error::from_unique_violation(err, format!("A breed named '{}' already exists", name))
}
