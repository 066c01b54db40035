//! Image rows and their many-to-many links
//!
//! Sheep and lambing records each own a set of images through a link
//! table. The image's `tag_number` is never written here on attach: the
//! link triggers installed by migration v1 copy it from the sheep (or the
//! lambing ewe) when the link row is inserted.

use crate::db::models::StoredImage;
use crate::{Error, Result};
use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Kind of record an image is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOwner {
    Sheep,
    Lambing,
}

impl ImageOwner {
    fn image_table(self) -> &'static str {
        match self {
            ImageOwner::Sheep => "sheep_images",
            ImageOwner::Lambing => "lambing_images",
        }
    }

    fn link_table(self) -> &'static str {
        match self {
            ImageOwner::Sheep => "sheep_additional_images",
            ImageOwner::Lambing => "lambing_additional_images",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            ImageOwner::Sheep => "sheep_id",
            ImageOwner::Lambing => "lambing_record_id",
        }
    }

    /// Singular noun for messages
    pub fn noun(self) -> &'static str {
        match self {
            ImageOwner::Sheep => "Sheep image",
            ImageOwner::Lambing => "Lambing image",
        }
    }
}

/// New image to store
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Path relative to the media root
    pub image: String,
    pub caption: String,
    pub date_added: NaiveDate,
    /// Explicit tag number; empty lets the link trigger fill it
    pub tag_number: String,
}

async fn insert_image(tx: &mut Transaction<'_, Sqlite>, owner: ImageOwner, new: &NewImage) -> Result<i64> {
    let sql = format!(
        "INSERT INTO {} (image, tag_number, caption, date_added) VALUES (?, ?, ?, ?)",
        owner.image_table()
    );
    let id = sqlx::query(&sql)
        .bind(&new.image)
        .bind(&new.tag_number)
        .bind(&new.caption)
        .bind(new.date_added)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();
    Ok(id)
}

async fn link(tx: &mut Transaction<'_, Sqlite>, owner: ImageOwner, owner_id: i64, image_id: i64) -> Result<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, image_id) VALUES (?, ?)",
        owner.link_table(),
        owner.owner_column()
    );
    sqlx::query(&sql)
        .bind(owner_id)
        .bind(image_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Store an image row and attach it to `owner_id` in one transaction
///
/// Returns the row as read back after the link, i.e. with the tag number
/// filled in by the trigger.
pub async fn attach_new(
    pool: &SqlitePool,
    owner: ImageOwner,
    owner_id: i64,
    new: &NewImage,
) -> Result<StoredImage> {
    let mut tx = pool.begin().await?;
    let image_id = insert_image(&mut tx, owner, new).await?;
    link(&mut tx, owner, owner_id, image_id).await?;
    tx.commit().await?;

    get(pool, owner, image_id).await
}

/// Attach an existing image to another record of the same kind
pub async fn attach_existing(pool: &SqlitePool, owner: ImageOwner, owner_id: i64, image_id: i64) -> Result<()> {
    get(pool, owner, image_id).await?;

    let mut tx = pool.begin().await?;
    link(&mut tx, owner, owner_id, image_id).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, owner: ImageOwner, image_id: i64) -> Result<StoredImage> {
    let sql = format!(
        "SELECT id, image, tag_number, caption, date_added FROM {} WHERE id = ?",
        owner.image_table()
    );
    sqlx::query_as::<_, StoredImage>(&sql)
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", owner.noun(), image_id)))
}

/// Images attached to one record, oldest first
pub async fn list_for(pool: &SqlitePool, owner: ImageOwner, owner_id: i64) -> Result<Vec<StoredImage>> {
    let sql = format!(
        r#"
        SELECT i.id, i.image, i.tag_number, i.caption, i.date_added
        FROM {images} i
        JOIN {links} l ON l.image_id = i.id
        WHERE l.{owner_col} = ?
        ORDER BY i.date_added, i.id
        "#,
        images = owner.image_table(),
        links = owner.link_table(),
        owner_col = owner.owner_column()
    );
    let images = sqlx::query_as::<_, StoredImage>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
    Ok(images)
}

/// Delete an image row; its links go with it
pub async fn delete(pool: &SqlitePool, owner: ImageOwner, image_id: i64) -> Result<StoredImage> {
    let image = get(pool, owner, image_id).await?;

    let sql = format!("DELETE FROM {} WHERE id = ?", owner.image_table());
    sqlx::query(&sql).bind(image_id).execute(pool).await?;

    Ok(image)
}

/// Id of the first record an image is linked to
pub async fn owner_of(pool: &SqlitePool, owner: ImageOwner, image_id: i64) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE image_id = ? ORDER BY id LIMIT 1",
        owner.owner_column(),
        owner.link_table()
    );
    let id: Option<i64> = sqlx::query_scalar(&sql)
        .bind(image_id)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}
