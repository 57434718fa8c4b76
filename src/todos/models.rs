//! Todo Models
//! Mission: Define todo records, their wire types, and the field validation

use serde::{Deserialize, Serialize};

/// Maximum title length accepted at the boundary
pub const TITLE_MAX_LEN: usize = 120;

/// A todo row as persisted
#[derive(Debug, Clone)]
pub struct TodoRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub inprogress: bool,
    pub completed: bool,
    /// Owner username; None only for legacy pre-owner rows
    pub owner: Option<String>,
    pub created_at: String,
}

/// Todo wire shape: {id, title, description, inprogress, completed, owner}
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub inprogress: bool,
    pub completed: bool,
    pub owner: Option<String>,
}

impl TodoResponse {
    pub fn from_record(record: &TodoRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            description: record.description.clone(),
            inprogress: record.inprogress,
            completed: record.completed,
            owner: record.owner.clone(),
        }
    }
}

/// Create / PUT body: a full representation, title required.
///
/// Any `owner` key in the body falls to serde's unknown-field tolerance and
/// is dropped; the owner is always the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct TodoWriteRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inprogress: bool,
    #[serde(default)]
    pub completed: bool,
}

/// PATCH body: provided fields are merged over the stored record
#[derive(Debug, Default, Deserialize)]
pub struct TodoPatchRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub inprogress: Option<bool>,
    pub completed: Option<bool>,
}

/// Recognized values of the list `status` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// completed = true
    Completed,
    /// inprogress = true AND completed = false
    InProgress,
    /// both flags false
    Open,
}

impl StatusFilter {
    /// Parse the query value; anything unrecognized means "no filter"
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "completed" => Some(StatusFilter::Completed),
            "inprogress" => Some(StatusFilter::InProgress),
            "open" => Some(StatusFilter::Open),
            _ => None,
        }
    }
}

/// Field validation failures surfaced as 400s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoValidationError {
    BlankTitle,
    TitleTooLong,
    ConflictingStatus,
}

/// Validate a full todo representation before it touches storage.
///
/// The status-exclusivity check also exists as a CHECK constraint in the
/// todos table; this is the boundary half of the pair.
pub fn validate_todo(
    title: &str,
    inprogress: bool,
    completed: bool,
) -> Result<(), TodoValidationError> {
    if title.trim().is_empty() {
        return Err(TodoValidationError::BlankTitle);
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(TodoValidationError::TitleTooLong);
    }
    if inprogress && completed {
        return Err(TodoValidationError::ConflictingStatus);
    }
    Ok(())
}
