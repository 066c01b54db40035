//! Sheep endpoints
//!
//! The list view filters by status and gender and searches tag/name; with
//! `group_by=birth_year` it returns every match grouped by year of birth
//! instead of a page.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use flock_common::db::images::{self, ImageOwner};
use flock_common::db::models::{
    choices, BreedingRecord, ChoiceOption, Gender, HealthRecord, LambingRecord, SheepRef,
    SheepStatus, StoredImage,
};
use flock_common::db::{breeding, health, lambing, sheep};
use flock_common::time::today;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::response::{created, done, BirthYearView, Mutation, SheepView};
use crate::error::{ApiError, ApiResult};
use crate::forms::SheepForm;
use crate::pagination::{calculate_pagination, Pagination};
use crate::AppState;

const LIST_PATH: &str = "/sheep";

pub fn detail_path(id: i64) -> String {
    format!("/sheep/{}", id)
}

#[derive(Debug, Default, Deserialize)]
pub struct SheepListQuery {
    pub status: Option<String>,
    /// Tag number or name substring
    pub q: Option<String>,
    /// `M` or `F`
    pub gender: Option<String>,
    pub breed_id: Option<i64>,
    pub page: Option<i64>,
    pub group_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SheepListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheep: Option<Vec<SheepView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<BirthYearView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub status_choices: Vec<ChoiceOption>,
    /// Status filter as given, empty when unfiltered
    pub current_status: String,
    pub search: String,
}

#[derive(Debug, Serialize)]
pub struct SheepDetailResponse {
    pub sheep: SheepView,
    pub mother: Option<SheepRef>,
    pub father: Option<SheepRef>,
    pub health_records: Vec<HealthRecord>,
    /// Ewes only
    pub lambings: Option<Vec<LambingRecord>>,
    /// Ewes only
    pub breeding_as_ewe: Option<Vec<BreedingRecord>>,
    /// Rams only
    pub breeding_as_ram: Option<Vec<BreedingRecord>>,
    pub offspring: Vec<SheepRef>,
    pub images: Vec<StoredImage>,
}

/// GET /sheep
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<SheepListQuery>, QueryRejection>,
) -> ApiResult<Json<SheepListResponse>> {
    let Query(query) = query?;

    let current_status = query.status.unwrap_or_default().trim().to_string();
    let status = if current_status.is_empty() {
        None
    } else {
        Some(current_status.parse::<SheepStatus>()?)
    };
    let search = query.q.unwrap_or_default().trim().to_string();
    let gender = match query.gender.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Gender>()?),
    };

    let filter = sheep::SheepFilter {
        status,
        gender,
        breed_id: query.breed_id,
        search: (!search.is_empty()).then(|| search.clone()),
    };
    let today = today();

    let mut response = SheepListResponse {
        sheep: None,
        groups: None,
        pagination: None,
        status_choices: choices::<SheepStatus>(),
        current_status,
        search,
    };

    match query.group_by.as_deref().map(str::trim) {
        None | Some("") => {
            let total = sheep::count(&state.db, &filter).await?;
            let pagination =
                calculate_pagination(total, query.page.unwrap_or(1), state.settings.list_page_size);
            let rows = sheep::list(&state.db, &filter, Some(pagination.page_size), pagination.offset).await?;

            response.sheep = Some(rows.into_iter().map(|s| SheepView::new(s, today)).collect());
            response.pagination = Some(pagination);
        }
        Some("birth_year") => {
            let rows = sheep::list(&state.db, &filter, None, 0).await?;
            let groups = sheep::group_by_birth_year(rows);
            response.groups = Some(groups.into_iter().map(|g| BirthYearView::new(g, today)).collect());
        }
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown grouping '{}', expected 'birth_year'",
                other
            )))
        }
    }

    Ok(Json(response))
}

/// GET /sheep/:id
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SheepDetailResponse>> {
    let Path(id) = path?;
    let db = &state.db;
    let limit = state.settings.detail_recent_limit;

    let found = sheep::get(db, id).await?;

    let mother = match found.mother_id {
        Some(mother_id) => sheep::find_ref(db, mother_id).await?,
        None => None,
    };
    let father = match found.father_id {
        Some(father_id) => sheep::find_ref(db, father_id).await?,
        None => None,
    };

    let health_records = health::recent_for_sheep(db, id, limit).await?;

    let (lambings, breeding_as_ewe, breeding_as_ram) = match found.gender {
        Gender::Female => (
            Some(lambing::recent_for_ewe(db, id, limit).await?),
            Some(breeding::recent_as_ewe(db, id, limit).await?),
            None,
        ),
        Gender::Male => (None, None, Some(breeding::recent_as_ram(db, id, limit).await?)),
    };

    let offspring = sheep::offspring(db, id).await?;
    let images = images::list_for(db, ImageOwner::Sheep, id).await?;

    Ok(Json(SheepDetailResponse {
        sheep: SheepView::new(found, today()),
        mother,
        father,
        health_records,
        lambings,
        breeding_as_ewe,
        breeding_as_ram,
        offspring,
        images,
    }))
}

/// POST /sheep
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<SheepForm>, JsonRejection>,
) -> ApiResult<Mutation<SheepView>> {
    let Json(form) = payload?;
    let today = today();
    let input = form.validate(&state.db, None, today).await?;

    let created_sheep = sheep::create(&state.db, &input).await?;
    info!("Created sheep {} ({})", created_sheep.id, created_sheep.tag_number);

    Ok(created(
        format!("Sheep '{}' created successfully!", created_sheep.tag_number),
        LIST_PATH.to_string(),
        SheepView::new(created_sheep, today),
    ))
}

/// PUT /sheep/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SheepForm>, JsonRejection>,
) -> ApiResult<Mutation<SheepView>> {
    let Path(id) = path?;
    let Json(form) = payload?;
    // 404 before validation errors about a sheep that does not exist
    sheep::get(&state.db, id).await?;

    let today = today();
    let input = form.validate(&state.db, Some(id), today).await?;

    let updated = sheep::update(&state.db, id, &input).await?;
    info!("Updated sheep {} ({})", updated.id, updated.tag_number);

    Ok(done(
        format!("Sheep '{}' updated successfully!", updated.tag_number),
        detail_path(id),
        SheepView::new(updated, today),
    ))
}

/// DELETE /sheep/:id
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<SheepView>> {
    let Path(id) = path?;
    let removed = sheep::delete(&state.db, id).await?;
    info!("Deleted sheep {} ({})", removed.id, removed.tag_number);

    Ok(done(
        format!("Sheep '{}' deleted successfully!", removed.tag_number),
        LIST_PATH.to_string(),
        SheepView::new(removed, today()),
    ))
}
