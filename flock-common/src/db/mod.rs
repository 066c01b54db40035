//! Database access
//!
//! One module per table group. Repository functions take a `&SqlitePool`
//! and return [`crate::Result`].

pub mod breeding;
pub mod breeds;
pub mod health;
pub mod images;
pub mod init;
pub mod lambing;
pub mod migrations;
pub mod models;
pub mod schema_sync;
pub mod search;
pub mod settings;
pub mod sheep;
pub mod table_schemas;

pub use init::init_database;
pub use models::*;
