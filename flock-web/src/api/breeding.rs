//! Breeding record endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use flock_common::db::models::{choices, BreedingRecord, BreedingStatus, ChoiceOption, LambingRecord};
use flock_common::db::{breeding, lambing};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::response::{created, done, Mutation};
use crate::error::ApiResult;
use crate::forms::BreedingForm;
use crate::pagination::{calculate_pagination, Pagination};
use crate::AppState;

const LIST_PATH: &str = "/breeding";

fn detail_path(id: i64) -> String {
    format!("/breeding/{}", id)
}

#[derive(Debug, Default, Deserialize)]
pub struct BreedingListQuery {
    pub status: Option<String>,
    pub ewe_id: Option<i64>,
    pub ram_id: Option<i64>,
    /// Ewe or ram tag number or name substring
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BreedingListResponse {
    pub records: Vec<BreedingRecord>,
    pub pagination: Pagination,
    pub status_choices: Vec<ChoiceOption>,
    pub current_status: String,
}

#[derive(Debug, Serialize)]
pub struct BreedingDetailResponse {
    pub record: BreedingRecord,
    pub label: String,
    /// Lambing that resulted from this breeding, if recorded
    pub lambing: Option<LambingRecord>,
}

/// GET /breeding
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<BreedingListQuery>, QueryRejection>,
) -> ApiResult<Json<BreedingListResponse>> {
    let Query(query) = query?;

    let current_status = query.status.unwrap_or_default().trim().to_string();
    let filter = breeding::BreedingFilter {
        status: if current_status.is_empty() {
            None
        } else {
            Some(current_status.parse::<BreedingStatus>()?)
        },
        ewe_id: query.ewe_id,
        ram_id: query.ram_id,
        search: query.q,
    };

    let total = breeding::count(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.settings.list_page_size);
    let records = breeding::list(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(BreedingListResponse {
        records,
        pagination,
        status_choices: choices::<BreedingStatus>(),
        current_status,
    }))
}

/// GET /breeding/:id
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<BreedingDetailResponse>> {
    let Path(id) = path?;
    let record = breeding::get(&state.db, id).await?;
    let lambing = lambing::for_breeding_record(&state.db, id).await?;

    Ok(Json(BreedingDetailResponse {
        label: record.to_string(),
        record,
        lambing,
    }))
}

/// POST /breeding
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<BreedingForm>, JsonRejection>,
) -> ApiResult<Mutation<BreedingRecord>> {
    let Json(form) = payload?;
    let input = form.validate(&state.db, None).await?;

    let record = breeding::create(&state.db, &input).await?;
    info!("Created breeding record {}", record.id);

    Ok(created(
        format!("{} created successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}

/// PUT /breeding/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BreedingForm>, JsonRejection>,
) -> ApiResult<Mutation<BreedingRecord>> {
    let Path(id) = path?;
    let Json(form) = payload?;
    breeding::get(&state.db, id).await?;
    let input = form.validate(&state.db, Some(id)).await?;

    let record = breeding::update(&state.db, id, &input).await?;
    info!("Updated breeding record {}", record.id);

    Ok(done(
        format!("{} updated successfully!", record),
        detail_path(id),
        record,
    ))
}

/// DELETE /breeding/:id
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<BreedingRecord>> {
    let Path(id) = path?;
    let record = breeding::delete(&state.db, id).await?;
    info!("Deleted breeding record {}", record.id);

    Ok(done(
        format!("{} deleted successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}

/// POST /breeding/:id/duplicate
///
/// Copies ewe, ram, dates and notes into a new PLANNED record and points the
/// client at the copy.
pub async fn duplicate(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<BreedingRecord>> {
    let Path(id) = path?;
    let copy = breeding::duplicate(&state.db, id).await?;
    info!("Duplicated breeding record {} as {}", id, copy.id);

    Ok(created(
        format!("{} duplicated successfully!", copy),
        detail_path(copy.id),
        copy,
    ))
}
