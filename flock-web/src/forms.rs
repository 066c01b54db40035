//! Form validation
//!
//! Request bodies arrive as loosely typed forms (every field optional, dates
//! and choices as strings). Validation collects one message per bad field
//! and produces the typed inputs the repositories write. Rules that need
//! the database (parent gender, breeding record ownership) are checked here
//! too; the schema only enforces uniqueness and references.

use chrono::NaiveDate;
use flock_common::db::models::{
    BreedInput, BreedingInput, BreedingStatus, Gender, HealthInput, HealthRecordType,
    LambingInput, SheepInput, SheepStatus,
};
use flock_common::db::{breeding, breeds, lambing, sheep};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult, FieldError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exclusive upper bound of a recorded weight (lb)
const MAX_WEIGHT: f64 = 1000.0;

/// Largest lamb count accepted (small integer column)
const MAX_COUNT: i64 = 32_767;

/// Collects field errors while a form is converted
#[derive(Debug, Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn required_text(&mut self, field: &'static str, value: Option<String>, max: usize) -> String {
        let value = value.unwrap_or_default().trim().to_string();
        if value.is_empty() {
            self.fail(field, "This field is required.");
        } else {
            self.check_length(field, &value, max);
        }
        value
    }

    fn text(&mut self, field: &'static str, value: Option<String>, max: Option<usize>) -> String {
        let value = value.unwrap_or_default().trim().to_string();
        if let Some(max) = max {
            self.check_length(field, &value, max);
        }
        value
    }

    fn check_length(&mut self, field: &'static str, value: &str, max: usize) {
        let len = value.chars().count();
        if len > max {
            self.fail(
                field,
                format!("Ensure this value has at most {} characters (it has {}).", max, len),
            );
        }
    }

    fn date(&mut self, field: &'static str, value: Option<String>) -> Option<NaiveDate> {
        let raw = value.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                self.fail(field, "Enter a valid date (YYYY-MM-DD).");
                None
            }
        }
    }

    fn required_date(&mut self, field: &'static str, value: Option<String>) -> Option<NaiveDate> {
        let missing = value.as_deref().map_or(true, |v| v.trim().is_empty());
        if missing {
            self.fail(field, "This field is required.");
            return None;
        }
        self.date(field, value)
    }

    fn choice<T: FromStr>(&mut self, field: &'static str, value: Option<String>) -> Option<T> {
        let raw = value.unwrap_or_default();
        if raw.trim().is_empty() {
            return None;
        }
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(
                    field,
                    format!("Select a valid choice. {} is not one of the available choices.", raw.trim()),
                );
                None
            }
        }
    }

    fn required_choice<T: FromStr>(&mut self, field: &'static str, value: Option<String>) -> Option<T> {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            self.fail(field, "This field is required.");
            return None;
        }
        self.choice(field, value)
    }

    fn required<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.fail(field, "This field is required.");
        }
        value
    }

    /// Rounded to two places; the bound applies to the stored value
    fn weight(&mut self, field: &'static str, value: Option<f64>) -> Option<f64> {
        let w = (value? * 100.0).round() / 100.0;
        if !w.is_finite() || w < 0.0 || w >= MAX_WEIGHT {
            self.fail(field, "Enter a weight between 0 and 999.99 lb.");
            return None;
        }
        Some(w)
    }

    /// `None` when the value is outside `0..=MAX_COUNT`
    fn count(&mut self, field: &'static str, value: Option<i64>, default: i64) -> Option<i64> {
        let n = value.unwrap_or(default);
        if n < 0 {
            self.fail(field, "Ensure this value is greater than or equal to 0.");
            None
        } else if n > MAX_COUNT {
            self.fail(field, format!("Ensure this value is less than or equal to {}.", MAX_COUNT));
            None
        } else {
            Some(n)
        }
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors collected so far; only called once at least one was recorded
    fn into_error(self) -> ApiError {
        ApiError::Validation(self.errors)
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> ApiResult<T> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Look up a sheep reference and check its gender
///
/// Records a field error when the sheep is missing or has the wrong gender.
async fn check_sheep_gender(
    db: &SqlitePool,
    checker: &mut Checker,
    field: &'static str,
    id: i64,
    expected: Gender,
    role: &str,
) -> ApiResult<()> {
    match sheep::find_ref(db, id).await? {
        None => checker.fail(field, format!("Sheep {} does not exist.", id)),
        Some(found) if found.gender != expected => checker.fail(
            field,
            format!("{} must be {}; {} is not.", role, expected_label(expected), found),
        ),
        Some(_) => {}
    }
    Ok(())
}

fn expected_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "female",
        Gender::Male => "male",
    }
}

// ========================================
// Breed
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BreedForm {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl BreedForm {
    pub fn validate(self) -> ApiResult<BreedInput> {
        let mut c = Checker::default();
        let name = c.required_text("name", self.name, 100);
        let description = c.text("description", self.description, None);
        c.finish(|| BreedInput { name, description })
    }
}

// ========================================
// Sheep
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SheepForm {
    pub tag_number: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub breed_id: Option<i64>,
    pub weight_birth: Option<f64>,
    pub weight_current: Option<f64>,
    pub color: Option<String>,
    pub markings: Option<String>,
    pub mother_id: Option<i64>,
    pub father_id: Option<i64>,
    pub status: Option<String>,
    pub date_acquired: Option<String>,
    pub date_removed: Option<String>,
    pub removal_reason: Option<String>,
    pub notes: Option<String>,
}

impl SheepForm {
    /// Validate a sheep form; `editing` is the id of the sheep being updated
    pub async fn validate(self, db: &SqlitePool, editing: Option<i64>, today: NaiveDate) -> ApiResult<SheepInput> {
        let mut c = Checker::default();

        let tag_number = c.required_text("tag_number", self.tag_number, 50);
        let name = c.text("name", self.name, Some(100));
        let gender = c.required_choice::<Gender>("gender", self.gender);
        let date_of_birth = c.required_date("date_of_birth", self.date_of_birth);
        let breed_id = c.required("breed_id", self.breed_id);
        let weight_birth = c.weight("weight_birth", self.weight_birth);
        let weight_current = c.weight("weight_current", self.weight_current);
        let color = c.text("color", self.color, Some(100));
        let markings = c.text("markings", self.markings, None);
        let status = c.choice::<SheepStatus>("status", self.status).unwrap_or_default();
        let date_acquired = c.date("date_acquired", self.date_acquired).unwrap_or(today);
        let date_removed = c.date("date_removed", self.date_removed);
        let removal_reason = c.text("removal_reason", self.removal_reason, None);
        let notes = c.text("notes", self.notes, None);

        if let Some(breed_id) = breed_id {
            if !breeds::exists(db, breed_id).await? {
                c.fail("breed_id", format!("Breed {} does not exist.", breed_id));
            }
        }

        if let Some(mother_id) = self.mother_id {
            if Some(mother_id) == editing {
                c.fail("mother_id", "A sheep cannot be its own mother.");
            } else {
                check_sheep_gender(db, &mut c, "mother_id", mother_id, Gender::Female, "Mother").await?;
            }
        }
        if let Some(father_id) = self.father_id {
            if Some(father_id) == editing {
                c.fail("father_id", "A sheep cannot be its own father.");
            } else {
                check_sheep_gender(db, &mut c, "father_id", father_id, Gender::Male, "Father").await?;
            }
        }

        if let (Some(born), Some(removed)) = (date_of_birth, date_removed) {
            if removed < born {
                c.fail("date_removed", "Removal date cannot be before the date of birth.");
            }
        }

        match (gender, date_of_birth, breed_id) {
            (Some(gender), Some(date_of_birth), Some(breed_id)) if !c.has_errors() => Ok(SheepInput {
                tag_number,
                name,
                gender,
                date_of_birth,
                breed_id,
                weight_birth,
                weight_current,
                color,
                markings,
                mother_id: self.mother_id,
                father_id: self.father_id,
                status,
                date_acquired,
                date_removed,
                removal_reason,
                notes,
            }),
            _ => Err(c.into_error()),
        }
    }
}

// ========================================
// Breeding
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BreedingForm {
    pub ewe_id: Option<i64>,
    pub ram_id: Option<i64>,
    pub date_started: Option<String>,
    pub date_ended: Option<String>,
    pub expected_lambing_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl BreedingForm {
    /// Validate a breeding form; `editing` is the id of the record being updated
    pub async fn validate(self, db: &SqlitePool, editing: Option<i64>) -> ApiResult<BreedingInput> {
        let mut c = Checker::default();

        let ewe_id = c.required("ewe_id", self.ewe_id);
        let ram_id = c.required("ram_id", self.ram_id);
        let date_started = c.required_date("date_started", self.date_started);
        let date_ended = c.date("date_ended", self.date_ended);
        let expected_lambing_date = c.date("expected_lambing_date", self.expected_lambing_date);
        let status = c.choice::<BreedingStatus>("status", self.status).unwrap_or_default();
        let notes = c.text("notes", self.notes, None);

        if let Some(ewe_id) = ewe_id {
            check_sheep_gender(db, &mut c, "ewe_id", ewe_id, Gender::Female, "Ewe").await?;
        }
        if let Some(ram_id) = ram_id {
            check_sheep_gender(db, &mut c, "ram_id", ram_id, Gender::Male, "Ram").await?;
        }

        // A recorded lambing pins the ewe
        if let (Some(id), Some(ewe_id)) = (editing, ewe_id) {
            if let Some(linked) = lambing::for_breeding_record(db, id).await? {
                if linked.ewe_id != ewe_id {
                    c.fail(
                        "ewe_id",
                        format!("Ewe must stay {}; {} is recorded for this breeding.", linked.ewe_tag, linked),
                    );
                }
            }
        }

        if let (Some(started), Some(ended)) = (date_started, date_ended) {
            if ended < started {
                c.fail("date_ended", "End date cannot be before the start date.");
            }
        }

        match (ewe_id, ram_id, date_started) {
            (Some(ewe_id), Some(ram_id), Some(date_started)) if !c.has_errors() => Ok(BreedingInput {
                ewe_id,
                ram_id,
                date_started,
                date_ended,
                expected_lambing_date,
                status,
                notes,
            }),
            _ => Err(c.into_error()),
        }
    }
}

// ========================================
// Lambing
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LambingForm {
    pub breeding_record_id: Option<i64>,
    pub ewe_id: Option<i64>,
    pub date: Option<String>,
    pub assisted: Option<bool>,
    pub complications: Option<String>,
    pub total_born: Option<i64>,
    pub born_alive: Option<i64>,
    pub born_dead: Option<i64>,
    pub notes: Option<String>,
}

impl LambingForm {
    /// Validate a lambing form; `editing` is the id of the record being updated
    pub async fn validate(self, db: &SqlitePool, editing: Option<i64>) -> ApiResult<LambingInput> {
        let mut c = Checker::default();

        let ewe_id = c.required("ewe_id", self.ewe_id);
        let date = c.required_date("date", self.date);
        let complications = c.text("complications", self.complications, None);
        let total_born = c.count("total_born", self.total_born, 1);
        let born_alive = c.count("born_alive", self.born_alive, 1);
        let born_dead = c.count("born_dead", self.born_dead, 0);
        let notes = c.text("notes", self.notes, None);

        if let (Some(total_born), Some(born_alive), Some(born_dead)) = (total_born, born_alive, born_dead) {
            if born_alive + born_dead > total_born {
                c.fail(
                    "born_alive",
                    format!(
                        "Born alive ({}) plus born dead ({}) exceeds total born ({}).",
                        born_alive, born_dead, total_born
                    ),
                );
            }
        }

        if let Some(ewe_id) = ewe_id {
            check_sheep_gender(db, &mut c, "ewe_id", ewe_id, Gender::Female, "Ewe").await?;
        }

        if let Some(breeding_id) = self.breeding_record_id {
            match breeding::get(db, breeding_id).await {
                Ok(record) => {
                    if Some(record.ewe_id) != ewe_id {
                        c.fail(
                            "breeding_record_id",
                            format!("Breeding record {} is for a different ewe.", breeding_id),
                        );
                    }
                    let linked = lambing::for_breeding_record(db, breeding_id).await?;
                    if let Some(existing) = linked {
                        if Some(existing.id) != editing {
                            c.fail(
                                "breeding_record_id",
                                format!("Breeding record {} already has a lambing record.", breeding_id),
                            );
                        }
                    }
                }
                Err(flock_common::Error::NotFound(_)) => c.fail(
                    "breeding_record_id",
                    format!("Breeding record {} does not exist.", breeding_id),
                ),
                Err(e) => return Err(e.into()),
            }
        }

        match (ewe_id, date, total_born, born_alive, born_dead) {
            (Some(ewe_id), Some(date), Some(total_born), Some(born_alive), Some(born_dead)) if !c.has_errors() => Ok(LambingInput {
                breeding_record_id: self.breeding_record_id,
                ewe_id,
                date,
                assisted: self.assisted.unwrap_or(false),
                complications,
                total_born,
                born_alive,
                born_dead,
                notes,
            }),
            _ => Err(c.into_error()),
        }
    }
}

// ========================================
// Health
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HealthForm {
    pub sheep_id: Option<i64>,
    pub date: Option<String>,
    pub record_type: Option<String>,
    pub treatment: Option<String>,
    pub dosage: Option<String>,
    pub administered_by: Option<String>,
    pub requires_followup: Option<bool>,
    pub followup_date: Option<String>,
    pub notes: Option<String>,
}

impl HealthForm {
    pub async fn validate(self, db: &SqlitePool) -> ApiResult<HealthInput> {
        let mut c = Checker::default();

        let sheep_id = c.required("sheep_id", self.sheep_id);
        let date = c.required_date("date", self.date);
        let record_type = c.required_choice::<HealthRecordType>("record_type", self.record_type);
        let treatment = c.text("treatment", self.treatment, Some(255));
        let dosage = c.text("dosage", self.dosage, Some(100));
        let administered_by = c.text("administered_by", self.administered_by, Some(100));
        let followup_date = c.date("followup_date", self.followup_date);
        let notes = c.text("notes", self.notes, None);

        if let Some(sheep_id) = sheep_id {
            if sheep::find_ref(db, sheep_id).await?.is_none() {
                c.fail("sheep_id", format!("Sheep {} does not exist.", sheep_id));
            }
        }

        match (sheep_id, date, record_type) {
            (Some(sheep_id), Some(date), Some(record_type)) if !c.has_errors() => Ok(HealthInput {
                sheep_id,
                date,
                record_type,
                treatment,
                dosage,
                administered_by,
                requires_followup: self.requires_followup.unwrap_or(false),
                followup_date,
                notes,
            }),
            _ => Err(c.into_error()),
        }
    }
}

/// Caption field of an image upload
pub fn validate_caption(caption: String) -> ApiResult<String> {
    let mut c = Checker::default();
    let caption = c.text("caption", Some(caption), Some(255));
    c.finish(|| caption)
}
