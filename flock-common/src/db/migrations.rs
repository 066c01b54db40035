//! Versioned schema migrations
//!
//! Each migration runs once and is recorded in `schema_version`. Every
//! migration must also be idempotent: a crash between the migration and
//! the version insert re-runs it on the next start.
//!
//! Never edit a released migration; add a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Latest applied version, 0 for a database that never ran migrations
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: image tag-number triggers
///
/// When an image is linked to a sheep (or a lambing record), copy the
/// sheep's (or the ewe's) tag number onto the image unless it already has
/// one. Runs inside SQLite, so no application code re-enters on update.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS sheep_image_tag_on_link
        AFTER INSERT ON sheep_additional_images
        BEGIN
            UPDATE sheep_images
            SET tag_number = (SELECT tag_number FROM sheep WHERE id = NEW.sheep_id)
            WHERE id = NEW.image_id
              AND (tag_number IS NULL OR tag_number = '');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS lambing_image_tag_on_link
        AFTER INSERT ON lambing_additional_images
        BEGIN
            UPDATE lambing_images
            SET tag_number = (
                SELECT s.tag_number
                FROM sheep s
                JOIN lambing_records lr ON s.id = lr.ewe_id
                WHERE lr.id = NEW.lambing_record_id
            )
            WHERE id = NEW.image_id
              AND (tag_number IS NULL OR tag_number = '');
        END
        "#,
    )
    .execute(pool)
    .await?;

    info!("Migration v1: installed image tag-number triggers");
    Ok(())
}

/// Migration v2: back-fill tag numbers of images linked before the triggers
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let sheep = sqlx::query(
        r#"
        UPDATE sheep_images
        SET tag_number = (
            SELECT s.tag_number
            FROM sheep s
            JOIN sheep_additional_images sa ON s.id = sa.sheep_id
            WHERE sa.image_id = sheep_images.id
            ORDER BY sa.id
            LIMIT 1
        )
        WHERE (tag_number IS NULL OR tag_number = '')
          AND id IN (SELECT image_id FROM sheep_additional_images)
        "#,
    )
    .execute(pool)
    .await?;

    let lambing = sqlx::query(
        r#"
        UPDATE lambing_images
        SET tag_number = (
            SELECT s.tag_number
            FROM sheep s
            JOIN lambing_records lr ON s.id = lr.ewe_id
            JOIN lambing_additional_images la ON lr.id = la.lambing_record_id
            WHERE la.image_id = lambing_images.id
            ORDER BY la.id
            LIMIT 1
        )
        WHERE (tag_number IS NULL OR tag_number = '')
          AND id IN (SELECT image_id FROM lambing_additional_images)
        "#,
    )
    .execute(pool)
    .await?;

    info!(
        "Migration v2: back-filled {} sheep image tags, {} lambing image tags",
        sheep.rows_affected(),
        lambing.rows_affected()
    );
    Ok(())
}
