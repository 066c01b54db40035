//! Runtime settings stored in the `settings` table
//!
//! Missing values are written with their built-in default on startup, so
//! the table always documents the effective configuration.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const LIST_PAGE_SIZE_KEY: &str = "list_page_size";
pub const DETAIL_RECENT_LIMIT_KEY: &str = "detail_recent_limit";
pub const MAX_UPLOAD_BYTES_KEY: &str = "max_upload_bytes";

const DEFAULT_LIST_PAGE_SIZE: i64 = 100;
const DEFAULT_DETAIL_RECENT_LIMIT: i64 = 5;
const DEFAULT_MAX_UPLOAD_BYTES: i64 = 20 * 1024 * 1024;

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value.flatten())
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write `default` when the key is missing or NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<()> {
    if get_setting(pool, key).await?.is_none() {
        info!("Setting '{}' missing, writing default '{}'", key, default);
        set_setting(pool, key, default).await?;
    }
    Ok(())
}

pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, LIST_PAGE_SIZE_KEY, &DEFAULT_LIST_PAGE_SIZE.to_string()).await?;
    ensure_setting(pool, DETAIL_RECENT_LIMIT_KEY, &DEFAULT_DETAIL_RECENT_LIMIT.to_string()).await?;
    ensure_setting(pool, MAX_UPLOAD_BYTES_KEY, &DEFAULT_MAX_UPLOAD_BYTES.to_string()).await?;
    Ok(())
}

/// Settings consumed by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Rows per page on list endpoints
    pub list_page_size: i64,
    /// Related records shown on a sheep's detail view
    pub detail_recent_limit: i64,
    /// Largest accepted request body (image uploads)
    pub max_upload_bytes: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            detail_recent_limit: DEFAULT_DETAIL_RECENT_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES as usize,
        }
    }
}

impl RuntimeSettings {
    /// Load settings; unparsable or non-positive values fall back to defaults
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        async fn positive(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
            let Some(raw) = get_setting(pool, key).await? else {
                return Ok(default);
            };
            match raw.trim().parse::<i64>() {
                Ok(v) if v > 0 => Ok(v),
                _ => {
                    warn!("Invalid value '{}' for setting '{}', using default {}", raw, key, default);
                    Ok(default)
                }
            }
        }

        Ok(Self {
            list_page_size: positive(pool, LIST_PAGE_SIZE_KEY, DEFAULT_LIST_PAGE_SIZE).await?,
            detail_recent_limit: positive(pool, DETAIL_RECENT_LIMIT_KEY, DEFAULT_DETAIL_RECENT_LIMIT)
                .await?,
            max_upload_bytes: positive(pool, MAX_UPLOAD_BYTES_KEY, DEFAULT_MAX_UPLOAD_BYTES).await?
                as usize,
        })
    }
}
