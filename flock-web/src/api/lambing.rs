//! Lambing record endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use flock_common::db::images::{self, ImageOwner};
use flock_common::db::models::{BreedingRecord, LambingRecord, StoredImage};
use flock_common::db::{breeding, lambing};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::response::{created, done, Mutation};
use crate::error::ApiResult;
use crate::forms::LambingForm;
use crate::pagination::{calculate_pagination, Pagination};
use crate::AppState;

const LIST_PATH: &str = "/lambing";

pub fn detail_path(id: i64) -> String {
    format!("/lambing/{}", id)
}

#[derive(Debug, Default, Deserialize)]
pub struct LambingListQuery {
    pub assisted: Option<bool>,
    pub ewe_id: Option<i64>,
    /// Ewe tag number or name substring
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LambingListResponse {
    pub records: Vec<LambingRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct LambingDetailResponse {
    pub record: LambingRecord,
    pub label: String,
    pub breeding_record: Option<BreedingRecord>,
    pub images: Vec<StoredImage>,
}

/// GET /lambing
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<LambingListQuery>, QueryRejection>,
) -> ApiResult<Json<LambingListResponse>> {
    let Query(query) = query?;

    let filter = lambing::LambingFilter {
        assisted: query.assisted,
        ewe_id: query.ewe_id,
        search: query.q,
    };
    let total = lambing::count(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.settings.list_page_size);
    let records = lambing::list(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(LambingListResponse { records, pagination }))
}

/// GET /lambing/:id
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<LambingDetailResponse>> {
    let Path(id) = path?;
    let record = lambing::get(&state.db, id).await?;
    let breeding_record = match record.breeding_record_id {
        Some(breeding_id) => Some(breeding::get(&state.db, breeding_id).await?),
        None => None,
    };
    let images = images::list_for(&state.db, ImageOwner::Lambing, id).await?;

    Ok(Json(LambingDetailResponse {
        label: record.to_string(),
        record,
        breeding_record,
        images,
    }))
}

/// POST /lambing
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<LambingForm>, JsonRejection>,
) -> ApiResult<Mutation<LambingRecord>> {
    let Json(form) = payload?;
    let input = form.validate(&state.db, None).await?;

    let record = lambing::create(&state.db, &input).await?;
    info!("Created lambing record {}", record.id);

    Ok(created(
        format!("{} created successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}

/// PUT /lambing/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<LambingForm>, JsonRejection>,
) -> ApiResult<Mutation<LambingRecord>> {
    let Path(id) = path?;
    let Json(form) = payload?;
    lambing::get(&state.db, id).await?;
    let input = form.validate(&state.db, Some(id)).await?;

    let record = lambing::update(&state.db, id, &input).await?;
    info!("Updated lambing record {}", record.id);

    Ok(done(
        format!("{} updated successfully!", record),
        detail_path(id),
        record,
    ))
}

/// DELETE /lambing/:id
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<LambingRecord>> {
    let Path(id) = path?;
    let record = lambing::delete(&state.db, id).await?;
    info!("Deleted lambing record {}", record.id);

    Ok(done(
        format!("{} deleted successfully!", record),
        LIST_PATH.to_string(),
        record,
    ))
}
