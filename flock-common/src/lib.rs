//! # Flock Common Library
//!
//! Shared code for the flock record-keeping service:
//! - Database initialisation, schema sync and migrations
//! - Domain models (breeds, sheep, breeding/lambing/health records, images)
//! - Repository queries for each entity
//! - Configuration loading
//! - Request signing for mutating API calls

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
