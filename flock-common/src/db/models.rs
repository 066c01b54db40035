//! Database models
//!
//! Row types returned by the repository modules, the enumerated choice
//! fields stored as TEXT, and the validated input structs the repositories
//! write.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Enumerated field stored as a fixed TEXT code
pub trait Choice: Copy + 'static {
    /// Every value, in display order
    const ALL: &'static [Self];

    /// Code stored in the database and used on the wire
    fn as_str(self) -> &'static str;

    /// Human readable label
    fn label(self) -> &'static str;
}

/// One entry of a choice list, as offered to clients
#[derive(Debug, Clone, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// All options of a choice field
pub fn choices<T: Choice>() -> Vec<ChoiceOption> {
    T::ALL
        .iter()
        .map(|c| ChoiceOption {
            value: c.as_str(),
            label: c.label(),
        })
        .collect()
}

fn parse_choice<T: Choice>(s: &str, field: &str) -> Result<T, Error> {
    let s = s.trim();
    T::ALL
        .iter()
        .copied()
        .find(|c| c.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a valid {}", s, field)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Gender {
    #[serde(rename = "M")]
    #[sqlx(rename = "M")]
    Male,
    #[serde(rename = "F")]
    #[sqlx(rename = "F")]
    Female,
}

impl Choice for Gender {
    const ALL: &'static [Self] = &[Gender::Male, Gender::Female];

    fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "gender")
    }
}

/// Whether a sheep is still part of the flock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SheepStatus {
    #[default]
    Active,
    Sold,
    Deceased,
    Culled,
    Harvested,
}

impl Choice for SheepStatus {
    const ALL: &'static [Self] = &[
        SheepStatus::Active,
        SheepStatus::Sold,
        SheepStatus::Deceased,
        SheepStatus::Culled,
        SheepStatus::Harvested,
    ];

    fn as_str(self) -> &'static str {
        match self {
            SheepStatus::Active => "ACTIVE",
            SheepStatus::Sold => "SOLD",
            SheepStatus::Deceased => "DECEASED",
            SheepStatus::Culled => "CULLED",
            SheepStatus::Harvested => "HARVESTED",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SheepStatus::Active => "Active",
            SheepStatus::Sold => "Sold",
            SheepStatus::Deceased => "Deceased",
            SheepStatus::Culled => "Culled",
            SheepStatus::Harvested => "Harvested",
        }
    }
}

impl FromStr for SheepStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "status")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreedingStatus {
    #[default]
    Planned,
    InProgress,
    Successful,
    Unsuccessful,
    Cancelled,
}

impl Choice for BreedingStatus {
    const ALL: &'static [Self] = &[
        BreedingStatus::Planned,
        BreedingStatus::InProgress,
        BreedingStatus::Successful,
        BreedingStatus::Unsuccessful,
        BreedingStatus::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            BreedingStatus::Planned => "PLANNED",
            BreedingStatus::InProgress => "IN_PROGRESS",
            BreedingStatus::Successful => "SUCCESSFUL",
            BreedingStatus::Unsuccessful => "UNSUCCESSFUL",
            BreedingStatus::Cancelled => "CANCELLED",
        }
    }

    fn label(self) -> &'static str {
        match self {
            BreedingStatus::Planned => "Planned",
            BreedingStatus::InProgress => "In Progress",
            BreedingStatus::Successful => "Successful",
            BreedingStatus::Unsuccessful => "Unsuccessful",
            BreedingStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for BreedingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "breeding status")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthRecordType {
    Vaccination,
    Medication,
    Illness,
    Injury,
    ParasiteTreatment,
    HoofTrim,
    Shearing,
    Other,
}

impl Choice for HealthRecordType {
    const ALL: &'static [Self] = &[
        HealthRecordType::Vaccination,
        HealthRecordType::Medication,
        HealthRecordType::Illness,
        HealthRecordType::Injury,
        HealthRecordType::ParasiteTreatment,
        HealthRecordType::HoofTrim,
        HealthRecordType::Shearing,
        HealthRecordType::Other,
    ];

    fn as_str(self) -> &'static str {
        match self {
            HealthRecordType::Vaccination => "VACCINATION",
            HealthRecordType::Medication => "MEDICATION",
            HealthRecordType::Illness => "ILLNESS",
            HealthRecordType::Injury => "INJURY",
            HealthRecordType::ParasiteTreatment => "PARASITE_TREATMENT",
            HealthRecordType::HoofTrim => "HOOF_TRIM",
            HealthRecordType::Shearing => "SHEARING",
            HealthRecordType::Other => "OTHER",
        }
    }

    fn label(self) -> &'static str {
        match self {
            HealthRecordType::Vaccination => "Vaccination",
            HealthRecordType::Medication => "Medication",
            HealthRecordType::Illness => "Illness",
            HealthRecordType::Injury => "Injury",
            HealthRecordType::ParasiteTreatment => "Parasite Treatment",
            HealthRecordType::HoofTrim => "Hoof Trimming",
            HealthRecordType::Shearing => "Shearing",
            HealthRecordType::Other => "Other",
        }
    }
}

impl FromStr for HealthRecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "record type")
    }
}

/// Display label of a sheep: `"{tag} - {name}"`, or the bare tag
pub fn sheep_label(tag_number: &str, name: &str) -> String {
    if name.is_empty() {
        tag_number.to_string()
    } else {
        format!("{} - {}", tag_number, name)
    }
}

// ========================================
// Rows
// ========================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Breed {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl fmt::Display for Breed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Minimal identification of a sheep, used for parents and offspring
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SheepRef {
    pub id: i64,
    pub tag_number: String,
    pub name: String,
    pub gender: Gender,
}

impl fmt::Display for SheepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sheep_label(&self.tag_number, &self.name))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sheep {
    pub id: i64,
    pub tag_number: String,
    pub name: String,
    pub uuid: Uuid,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub breed_id: i64,
    pub breed_name: String,
    pub weight_birth: Option<f64>,
    pub weight_current: Option<f64>,
    pub color: String,
    pub markings: String,
    pub primary_image: Option<String>,
    pub mother_id: Option<i64>,
    pub father_id: Option<i64>,
    pub status: SheepStatus,
    pub date_acquired: NaiveDate,
    pub date_removed: Option<NaiveDate>,
    pub removal_reason: String,
    pub notes: String,
}

impl Sheep {
    pub fn label(&self) -> String {
        sheep_label(&self.tag_number, &self.name)
    }

    /// Age in whole days on `today`
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.date_of_birth).num_days()
    }

    /// Age in years rounded to one decimal
    ///
    /// A sheep born today has no age in years (`None`), matching the
    /// record views that leave the field blank on the day of birth.
    pub fn age_years(&self, today: NaiveDate) -> Option<f64> {
        age_years_from_days(self.age_days(today))
    }
}

/// Convert an age in days to years (365-day years, one decimal)
pub fn age_years_from_days(days: i64) -> Option<f64> {
    if days == 0 {
        return None;
    }
    Some((days as f64 / 365.0 * 10.0).round() / 10.0)
}

impl fmt::Display for Sheep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Photograph attached to a sheep or a lambing record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredImage {
    pub id: i64,
    /// Path relative to the media root
    pub image: String,
    pub tag_number: String,
    pub caption: String,
    pub date_added: NaiveDate,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BreedingRecord {
    pub id: i64,
    pub ewe_id: i64,
    pub ewe_tag: String,
    pub ewe_name: String,
    pub ram_id: i64,
    pub ram_tag: String,
    pub ram_name: String,
    pub date_started: NaiveDate,
    pub date_ended: Option<NaiveDate>,
    pub expected_lambing_date: Option<NaiveDate>,
    pub status: BreedingStatus,
    pub notes: String,
}

impl fmt::Display for BreedingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Breeding: {} × {} ({})",
            sheep_label(&self.ewe_tag, &self.ewe_name),
            sheep_label(&self.ram_tag, &self.ram_name),
            self.date_started
        )
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LambingRecord {
    pub id: i64,
    pub breeding_record_id: Option<i64>,
    pub ewe_id: i64,
    pub ewe_tag: String,
    pub ewe_name: String,
    pub date: NaiveDate,
    pub assisted: bool,
    pub complications: String,
    pub total_born: i64,
    pub born_alive: i64,
    pub born_dead: i64,
    pub primary_image: Option<String>,
    pub notes: String,
}

impl fmt::Display for LambingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lambing: {} on {}",
            sheep_label(&self.ewe_tag, &self.ewe_name),
            self.date
        )
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HealthRecord {
    pub id: i64,
    pub sheep_id: i64,
    pub sheep_tag: String,
    pub sheep_name: String,
    pub date: NaiveDate,
    pub record_type: HealthRecordType,
    pub treatment: String,
    pub dosage: String,
    pub administered_by: String,
    pub requires_followup: bool,
    pub followup_date: Option<NaiveDate>,
    pub notes: String,
}

impl fmt::Display for HealthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for {} on {}",
            self.record_type.label(),
            sheep_label(&self.sheep_tag, &self.sheep_name),
            self.date
        )
    }
}

// ========================================
// Validated inputs
// ========================================

#[derive(Debug, Clone)]
pub struct BreedInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SheepInput {
    pub tag_number: String,
    pub name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub breed_id: i64,
    pub weight_birth: Option<f64>,
    pub weight_current: Option<f64>,
    pub color: String,
    pub markings: String,
    pub mother_id: Option<i64>,
    pub father_id: Option<i64>,
    pub status: SheepStatus,
    pub date_acquired: NaiveDate,
    pub date_removed: Option<NaiveDate>,
    pub removal_reason: String,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct BreedingInput {
    pub ewe_id: i64,
    pub ram_id: i64,
    pub date_started: NaiveDate,
    pub date_ended: Option<NaiveDate>,
    pub expected_lambing_date: Option<NaiveDate>,
    pub status: BreedingStatus,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct LambingInput {
    pub breeding_record_id: Option<i64>,
    pub ewe_id: i64,
    pub date: NaiveDate,
    pub assisted: bool,
    pub complications: String,
    pub total_born: i64,
    pub born_alive: i64,
    pub born_dead: i64,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct HealthInput {
    pub sheep_id: i64,
    pub date: NaiveDate,
    pub record_type: HealthRecordType,
    pub treatment: String,
    pub dosage: String,
    pub administered_by: String,
    pub requires_followup: bool,
    pub followup_date: Option<NaiveDate>,
    pub notes: String,
}
