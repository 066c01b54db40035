//! Health record endpoints
//!
//! Mounted under `/health-records`; `/health` is the liveness check.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use flock_common::db::health;
use flock_common::db::models::{choices, ChoiceOption, HealthRecord, HealthRecordType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::response::{created, done, Mutation};
use crate::error::ApiResult;
use crate::forms::HealthForm;
use crate::pagination::{calculate_pagination, Pagination};
use crate::AppState;

const LIST_PATH: &str = "/health-records";

fn detail_path(id: i64) -> String {
    format!("/health-records/{}", id)
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthListQuery {
    pub record_type: Option<String>,
    pub requires_followup: Option<bool>,
    pub sheep_id: Option<i64>,
    /// Sheep tag number or name, or treatment substring
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HealthListResponse {
    pub records: Vec<HealthRecord>,
    pub pagination: Pagination,
    pub record_type_choices: Vec<ChoiceOption>,
}

#[derive(Debug, Serialize)]
pub struct HealthDetailResponse {
    pub record: HealthRecord,
    pub label: String,
}

/// GET /health-records
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<HealthListQuery>, QueryRejection>,
) -> ApiResult<Json<HealthListResponse>> {
    let Query(query) = query?;

    let record_type = match query.record_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<HealthRecordType>()?),
    };
    let filter = health::HealthFilter {
        record_type,
        requires_followup: query.requires_followup,
        sheep_id: query.sheep_id,
        search: query.q,
    };

    let total = health::count(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.settings.list_page_size);
    let records = health::list(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(HealthListResponse {
        records,
        pagination,
        record_type_choices: choices::<HealthRecordType>(),
    }))
}

/// GET /health-records/:id
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<HealthDetailResponse>> {
    let Path(id) = path?;
    let record = health::get(&state.db, id).await?;
    Ok(Json(HealthDetailResponse {
        label: record.to_string(),
        record,
    }))
}

/// POST /health-records
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<HealthForm>, JsonRejection>,
) -> ApiResult<Mutation<HealthRecord>> {
    let Json(form) = payload?;
    let input = form.validate(&state.db).await?;

    let record = health::create(&state.db, &input).await?;
    info!("Created health record {}", record.id);

    Ok(created(
        format!("Health record '{}' created successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}

/// PUT /health-records/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<HealthForm>, JsonRejection>,
) -> ApiResult<Mutation<HealthRecord>> {
    let Path(id) = path?;
    let Json(form) = payload?;
    health::get(&state.db, id).await?;
    let input = form.validate(&state.db).await?;

    let record = health::update(&state.db, id, &input).await?;
    info!("Updated health record {}", record.id);

    Ok(done(
        format!("Health record '{}' updated successfully!", record),
        detail_path(id),
        record,
    ))
}

/// DELETE /health-records/:id
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<HealthRecord>> {
    let Path(id) = path?;
    let record = health::delete(&state.db, id).await?;
    info!("Deleted health record {}", record.id);

    Ok(done(
        format!("Health record '{}' deleted successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}
