//! Breed endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use flock_common::db::models::{Breed, SheepRef};
use flock_common::db::{breeds, sheep};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::response::{created, done, Mutation};
use crate::error::ApiResult;
use crate::forms::BreedForm;
use crate::AppState;

const LIST_PATH: &str = "/breeds";

#[derive(Debug, Default, Deserialize)]
pub struct BreedListQuery {
    /// Name or description substring
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BreedListResponse {
    pub breeds: Vec<Breed>,
}

#[derive(Debug, Serialize)]
pub struct BreedDetailResponse {
    pub breed: Breed,
    pub sheep: Vec<SheepRef>,
}

/// GET /breeds
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<BreedListQuery>, QueryRejection>,
) -> ApiResult<Json<BreedListResponse>> {
    let Query(query) = query?;
    let breeds = breeds::list(&state.db, query.q.as_deref()).await?;
    Ok(Json(BreedListResponse { breeds }))
}

/// GET /breeds/:id
pub async fn detail(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<BreedDetailResponse>> {
    let Path(id) = path?;
    let breed = breeds::get(&state.db, id).await?;

    let filter = sheep::SheepFilter {
        breed_id: Some(id),
        ..Default::default()
    };
    let members = sheep::list(&state.db, &filter, None, 0)
        .await?
        .into_iter()
        .map(|s| SheepRef {
            id: s.id,
            tag_number: s.tag_number,
            name: s.name,
            gender: s.gender,
        })
        .collect();

    Ok(Json(BreedDetailResponse {
        breed,
        sheep: members,
    }))
}

/// POST /breeds
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<BreedForm>, JsonRejection>,
) -> ApiResult<Mutation<Breed>> {
    let Json(form) = payload?;
    let input = form.validate()?;

    let breed = breeds::create(&state.db, &input).await?;
    info!("Created breed {} ({})", breed.id, breed.name);

    Ok(created(
        format!("Breed '{}' created successfully!", breed.name),
        LIST_PATH.to_string(),
        breed,
    ))
}

/// PUT /breeds/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BreedForm>, JsonRejection>,
) -> ApiResult<Mutation<Breed>> {
    let Path(id) = path?;
    let Json(form) = payload?;
    let input = form.validate()?;

    let breed = breeds::update(&state.db, id, &input).await?;
    info!("Updated breed {} ({})", breed.id, breed.name);

    Ok(done(
        format!("Breed '{}' updated successfully!", breed.name),
        LIST_PATH.to_string(),
        breed,
    ))
}

/// DELETE /breeds/:id
///
/// 409 while any sheep still has this breed.
pub async fn remove(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<Breed>> {
    let Path(id) = path?;
    let breed = breeds::delete(&state.db, id).await?;
    info!("Deleted breed {} ({})", breed.id, breed.name);

    Ok(done(
        format!("Breed '{}' deleted successfully!", breed.name),
        LIST_PATH.to_string(),
        breed,
    ))
}
