//! HTTP API handlers for flock-web

pub mod auth;
pub mod breeding;
pub mod breeds;
pub mod health;
pub mod health_records;
pub mod images;
pub mod lambing;
pub mod response;
pub mod sheep;

pub use auth::auth_middleware;
pub use health::health_routes;
