//! Declared schemas for tables whose columns grew after the first release
//!
//! `CREATE TABLE` statements in [`crate::db::init`] describe the original
//! layout; anything listed here but missing from an existing database is
//! added on startup by [`crate::db::schema_sync`].

use crate::db::schema_sync::{sync_table, ColumnDefinition, TableSchema};
use crate::Result;
use sqlx::SqlitePool;

/// `sheep`, including the cull/removal columns
pub struct SheepTableSchema;

impl TableSchema for SheepTableSchema {
    fn table_name() -> &'static str {
        "sheep"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("tag_number", "TEXT").not_null().unique(),
            ColumnDefinition::new("name", "TEXT").not_null().default("''"),
            ColumnDefinition::new("uuid", "BLOB").not_null().unique(),
            ColumnDefinition::new("gender", "TEXT").not_null(),
            ColumnDefinition::new("date_of_birth", "DATE").not_null(),
            ColumnDefinition::new("breed_id", "INTEGER").not_null(),
            ColumnDefinition::new("weight_birth", "REAL"),
            ColumnDefinition::new("weight_current", "REAL"),
            ColumnDefinition::new("color", "TEXT").not_null().default("''"),
            ColumnDefinition::new("markings", "TEXT").not_null().default("''"),
            ColumnDefinition::new("primary_image", "TEXT"),
            ColumnDefinition::new("mother_id", "INTEGER"),
            ColumnDefinition::new("father_id", "INTEGER"),
            ColumnDefinition::new("status", "TEXT").not_null().default("'ACTIVE'"),
            ColumnDefinition::new("date_acquired", "DATE").not_null(),
            // Cull / removal metadata
            ColumnDefinition::new("date_removed", "DATE"),
            ColumnDefinition::new("removal_reason", "TEXT").not_null().default("''"),
            ColumnDefinition::new("notes", "TEXT").not_null().default("''"),
        ]
    }
}

fn image_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("id", "INTEGER").primary_key(),
        ColumnDefinition::new("image", "TEXT").not_null(),
        // Denormalised tag of the owning sheep / ewe, filled by triggers
        ColumnDefinition::new("tag_number", "TEXT").not_null().default("''"),
        ColumnDefinition::new("caption", "TEXT").not_null().default("''"),
        ColumnDefinition::new("date_added", "DATE").not_null(),
    ]
}

pub struct SheepImagesTableSchema;

impl TableSchema for SheepImagesTableSchema {
    fn table_name() -> &'static str {
        "sheep_images"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        image_columns()
    }
}

pub struct LambingImagesTableSchema;

impl TableSchema for LambingImagesTableSchema {
    fn table_name() -> &'static str {
        "lambing_images"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        image_columns()
    }
}

/// Add missing columns to every declared table
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    sync_table::<SheepTableSchema>(pool).await?;
    sync_table::<SheepImagesTableSchema>(pool).await?;
    sync_table::<LambingImagesTableSchema>(pool).await?;
    Ok(())
}
