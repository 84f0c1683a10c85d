//! Entity types (spec §3), translated field-for-field from
//! `original_source/models/models.py`'s SQLAlchemy columns.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One entry in an agency's `cfr_references`: a title plus zero or more subdivision
/// selectors (chapter, subtitle, subchapter, part, ...). The selector set is open-ended,
/// so every non-`title` scalar field is carried in `selectors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReference {
    pub title: serde_json::Value,
    #[serde(flatten)]
    pub selectors: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agency {
    pub agency_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub display_name: String,
    pub sortable_name: Option<String>,
    #[sqlx(json)]
    pub docs: Vec<DocumentReference>,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Title {
    pub number: i32,
    pub name: String,
    pub latest_amended_on: Option<NaiveDate>,
    pub latest_issue_date: Option<NaiveDate>,
    pub up_to_date_as_of: Option<NaiveDate>,
    pub reserved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TitleVersion {
    pub title_number: i32,
    pub version_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub part: Option<String>,
    pub substantive: Option<bool>,
    pub removed: Option<bool>,
    pub subpart: Option<String>,
    pub r#type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: i64,
    pub title_number: i32,
    pub version_date: NaiveDate,
    pub status: JobStatus,
    pub attempt_count: i32,
    pub lock_id: Option<Uuid>,
    pub lock_acquired_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WordCountRecord {
    pub task_id: i64,
    pub title_number: i32,
    pub version_date: NaiveDate,
    pub r#type: String,
    pub code: String,
    #[sqlx(json)]
    pub word_statistics: HashMap<String, i64>,
}

/// `{id, short_name, display_name}` as carried by `TitleAgencyMap` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgencyInfo {
    pub id: String,
    pub short_name: String,
    pub display_name: String,
}

/// `title_number -> { subdivision_type -> set<code> }`, built by the Path Map Builder (C4).
pub type TitlePathMap = HashMap<i32, HashMap<String, HashSet<String>>>;

/// `title_number -> { subdivision_type -> { code -> set<AgencyInfo> } }`, built alongside
/// `TitlePathMap` by the Path Map Builder (C4) and consumed by the Aggregator (C8).
pub type TitleAgencyMap = HashMap<i32, HashMap<String, HashMap<String, HashSet<AgencyInfo>>>>;
