//! Shared response shapes

use axum::{http::StatusCode, Json};
use chrono::NaiveDate;
use flock_common::db::models::{sheep_label, Sheep};
use flock_common::db::sheep::BirthYearGroup;
use serde::Serialize;

/// Outcome of a create, update or delete
///
/// `message` is the flash text shown to the user, `redirect` the page the
/// client should go to next.
#[derive(Debug, Serialize)]
pub struct MutationResponse<T> {
    pub message: String,
    pub redirect: String,
    pub record: T,
}

pub type Mutation<T> = (StatusCode, Json<MutationResponse<T>>);

pub fn created<T>(message: String, redirect: String, record: T) -> Mutation<T> {
    (
        StatusCode::CREATED,
        Json(MutationResponse {
            message,
            redirect,
            record,
        }),
    )
}

pub fn done<T>(message: String, redirect: String, record: T) -> Mutation<T> {
    (
        StatusCode::OK,
        Json(MutationResponse {
            message,
            redirect,
            record,
        }),
    )
}

/// Sheep row plus derived fields
#[derive(Debug, Serialize)]
pub struct SheepView {
    #[serde(flatten)]
    pub sheep: Sheep,
    pub label: String,
    pub age_days: i64,
    pub age_years: Option<f64>,
}

impl SheepView {
    pub fn new(sheep: Sheep, today: NaiveDate) -> Self {
        Self {
            label: sheep_label(&sheep.tag_number, &sheep.name),
            age_days: sheep.age_days(today),
            age_years: sheep.age_years(today),
            sheep,
        }
    }
}

/// Sheep born in one year, as listed
#[derive(Debug, Serialize)]
pub struct BirthYearView {
    pub year: i32,
    pub count: usize,
    pub sheep: Vec<SheepView>,
}

impl BirthYearView {
    pub fn new(group: BirthYearGroup, today: NaiveDate) -> Self {
        Self {
            year: group.year,
            count: group.sheep.len(),
            sheep: group.sheep.into_iter().map(|s| SheepView::new(s, today)).collect(),
        }
    }
}
