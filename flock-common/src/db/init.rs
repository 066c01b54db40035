//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and brings its schema up
//! to date: create tables, sync late-added columns, run versioned
//! migrations, write default settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the database at `db_path` and prepare its schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys are a per-connection setting, so they go on the connect
    // options rather than a one-off PRAGMA against the pool.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and apply schema sync, migrations and default settings
///
/// Idempotent: safe on a fresh database and on every restart.
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    crate::db::settings::create_settings_table(pool).await?;

    create_breeds_table(pool).await?;
    create_sheep_table(pool).await?;
    create_sheep_images_tables(pool).await?;
    create_breeding_records_table(pool).await?;
    create_lambing_records_table(pool).await?;
    create_lambing_images_tables(pool).await?;
    create_health_records_table(pool).await?;

    crate::db::table_schemas::sync_all_table_schemas(pool).await?;
    crate::db::migrations::run_migrations(pool).await?;
    crate::db::settings::init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_breeds_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS breeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE DEFAULT 'Dorper',
            description TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Sheep, original layout
///
/// `date_removed` and `removal_reason` are added by schema sync.
async fn create_sheep_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sheep (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_number TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            uuid BLOB NOT NULL UNIQUE,
            gender TEXT NOT NULL CHECK (gender IN ('M', 'F')),
            date_of_birth DATE NOT NULL,
            breed_id INTEGER NOT NULL REFERENCES breeds(id) ON DELETE RESTRICT,
            weight_birth REAL,
            weight_current REAL,
            color TEXT NOT NULL DEFAULT '',
            markings TEXT NOT NULL DEFAULT '',
            primary_image TEXT,
            mother_id INTEGER REFERENCES sheep(id) ON DELETE SET NULL,
            father_id INTEGER REFERENCES sheep(id) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            date_acquired DATE NOT NULL,
            notes TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sheep_tag_number ON sheep(tag_number)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sheep_status ON sheep(status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_sheep_images_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sheep_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image TEXT NOT NULL,
            tag_number TEXT NOT NULL DEFAULT '',
            caption TEXT NOT NULL DEFAULT '',
            date_added DATE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sheep_additional_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheep_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
            image_id INTEGER NOT NULL REFERENCES sheep_images(id) ON DELETE CASCADE,
            UNIQUE (sheep_id, image_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_breeding_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS breeding_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ewe_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
            ram_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
            date_started DATE NOT NULL,
            date_ended DATE,
            expected_lambing_date DATE,
            status TEXT NOT NULL DEFAULT 'PLANNED',
            notes TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_breeding_date_started ON breeding_records(date_started)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_breeding_status ON breeding_records(status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_lambing_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lambing_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            breeding_record_id INTEGER UNIQUE REFERENCES breeding_records(id) ON DELETE CASCADE,
            ewe_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            assisted INTEGER NOT NULL DEFAULT 0,
            complications TEXT NOT NULL DEFAULT '',
            total_born INTEGER NOT NULL DEFAULT 1 CHECK (total_born >= 0),
            born_alive INTEGER NOT NULL DEFAULT 1 CHECK (born_alive >= 0),
            born_dead INTEGER NOT NULL DEFAULT 0 CHECK (born_dead >= 0),
            primary_image TEXT,
            notes TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lambing_date ON lambing_records(date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_lambing_images_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lambing_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image TEXT NOT NULL,
            tag_number TEXT NOT NULL DEFAULT '',
            caption TEXT NOT NULL DEFAULT '',
            date_added DATE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lambing_additional_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lambing_record_id INTEGER NOT NULL REFERENCES lambing_records(id) ON DELETE CASCADE,
            image_id INTEGER NOT NULL REFERENCES lambing_images(id) ON DELETE CASCADE,
            UNIQUE (lambing_record_id, image_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_health_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS health_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheep_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            record_type TEXT NOT NULL,
            treatment TEXT NOT NULL DEFAULT '',
            dosage TEXT NOT NULL DEFAULT '',
            administered_by TEXT NOT NULL DEFAULT '',
            requires_followup INTEGER NOT NULL DEFAULT 0,
            followup_date DATE,
            notes TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_health_date ON health_records(date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_health_record_type ON health_records(record_type)")
        .execute(pool)
        .await?;

    Ok(())
}
