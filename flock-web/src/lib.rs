//! flock-web library - HTTP service for flock records
//!
//! JSON endpoints for breeds, sheep, breeding, lambing and health records,
//! image uploads, and the stored media files.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use flock_common::db::settings::RuntimeSettings;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod forms;
pub mod media;
pub mod pagination;

use media::MediaStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Shared secret for request signing, 0 disables checking
    pub shared_secret: i64,
    /// Runtime settings loaded at startup
    pub settings: RuntimeSettings,
    /// Where uploaded images are written
    pub media: MediaStore,
}

impl AppState {
    pub fn new(db: SqlitePool, shared_secret: i64, settings: RuntimeSettings, media: MediaStore) -> Self {
        Self {
            db,
            shared_secret,
            settings,
            media,
        }
    }
}

/// Build application router
///
/// Every route passes the signing middleware, which lets read-only methods
/// through. `/health` and `/media` are outside it.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    let records = Router::new()
        // Breeds
        .route("/breeds", get(api::breeds::list).post(api::breeds::create))
        .route(
            "/breeds/:id",
            get(api::breeds::detail)
                .put(api::breeds::update)
                .delete(api::breeds::remove),
        )
        // Sheep
        .route("/sheep", get(api::sheep::list).post(api::sheep::create))
        .route(
            "/sheep/:id",
            get(api::sheep::detail)
                .put(api::sheep::update)
                .delete(api::sheep::remove),
        )
        .route("/sheep/:id/images", post(api::images::upload_sheep_image))
        .route("/sheep/:id/primary-image", post(api::images::upload_sheep_primary))
        .route("/sheep-images/:id", delete(api::images::delete_sheep_image))
        // Breeding
        .route("/breeding", get(api::breeding::list).post(api::breeding::create))
        .route(
            "/breeding/:id",
            get(api::breeding::detail)
                .put(api::breeding::update)
                .delete(api::breeding::remove),
        )
        .route("/breeding/:id/duplicate", post(api::breeding::duplicate))
        // Lambing
        .route("/lambing", get(api::lambing::list).post(api::lambing::create))
        .route(
            "/lambing/:id",
            get(api::lambing::detail)
                .put(api::lambing::update)
                .delete(api::lambing::remove),
        )
        .route("/lambing/:id/images", post(api::images::upload_lambing_image))
        .route("/lambing/:id/primary-image", post(api::images::upload_lambing_primary))
        .route("/lambing-images/:id", delete(api::images::delete_lambing_image))
        // Health records
        .route(
            "/health-records",
            get(api::health_records::list).post(api::health_records::create),
        )
        .route(
            "/health-records/:id",
            get(api::health_records::detail)
                .put(api::health_records::update)
                .delete(api::health_records::remove),
        )
        .layer(middleware::from_fn_with_state(state.clone(), api::auth_middleware));

    let media = ServeDir::new(state.media.root());

    Router::new()
        .merge(records)
        .merge(api::health_routes())
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::max(state.settings.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
