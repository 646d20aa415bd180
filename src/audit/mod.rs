//! Audit trail storage layer abstraction

pub mod sqlite_store;
pub mod mock_store;


use crate::pagination::PaginatedResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        AuditError::Storage(e.to_string())
    }
}

/// What happened to the audited entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    Created,
    Updated,
    Deleted,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Created => "Created",
            AuditEventType::Updated => "Updated",
            AuditEventType::Deleted => "Deleted",
        }
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(AuditEventType::Created),
            "Updated" => Ok(AuditEventType::Updated),
            "Deleted" => Ok(AuditEventType::Deleted),
            _ => Err(format!("Unknown audit event type: {}", s)),
        }
    }
}

/// Which subsystem the audited entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditDataType {
    Locale,
    LocalizedValue,
}

impl AuditDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDataType::Locale => "Locale",
            AuditDataType::LocalizedValue => "LocalizedValue",
        }
    }
}

impl std::str::FromStr for AuditDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Locale" => Ok(AuditDataType::Locale),
            "LocalizedValue" => Ok(AuditDataType::LocalizedValue),
            _ => Err(format!("Unknown audit data type: {}", s)),
        }
    }
}

/// One append-only audit entry. Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Assigned by the store on insert.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub user_name: String,
    pub event_type: AuditEventType,
    pub data_type: AuditDataType,
    /// Natural key of the mutated entity, as a string.
    pub data_reference: String,
    /// Serialized old/new state.
    pub data_diff: String,
}

/// Filter for audit queries; all criteria are conjunctive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditFilter {
    /// Case-insensitive substring match.
    pub user_name: Option<String>,
    /// Exact match.
    pub correlation_id: Option<String>,
    /// Case-insensitive substring match against the data reference.
    pub reference_id: Option<String>,
    pub data_type: Option<AuditDataType>,
    pub action_type: Option<AuditEventType>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(user) = &self.user_name {
            if !record
                .user_name
                .to_lowercase()
                .contains(&user.to_lowercase())
            {
                return false;
            }
        }
        if let Some(correlation) = &self.correlation_id {
            if &record.correlation_id != correlation {
                return false;
            }
        }
        if let Some(reference) = &self.reference_id {
            if !record
                .data_reference
                .to_lowercase()
                .contains(&reference.to_lowercase())
            {
                return false;
            }
        }
        if let Some(data_type) = self.data_type {
            if record.data_type != data_type {
                return false;
            }
        }
        if let Some(action) = self.action_type {
            if record.event_type != action {
                return false;
            }
        }
        if let Some(start) = self.start_date_time {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date_time {
            if record.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Trait defining the audit storage interface. Insert is append-only and
/// synchronous with the mutation it describes.
pub trait AuditStore: Send + Sync {
    /// Append a record; the `id` field of the argument is ignored.
    fn insert(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Filtered retrieval, ordered by timestamp descending, with
    /// `total_size` computed before pagination.
    fn get_all(
        &self,
        filter: &AuditFilter,
        skip: Option<usize>,
        take: Option<usize>,
    ) -> Result<PaginatedResponse<AuditRecord>, AuditError>;
}

/// Shared by both backends: order newest first, count, then paginate.
pub(crate) fn paginate(
    mut records: Vec<AuditRecord>,
    filter: &AuditFilter,
    skip: Option<usize>,
    take: Option<usize>,
) -> PaginatedResponse<AuditRecord> {
    records.retain(|r| filter.matches(r));
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let total_size = records.len();

    let start = skip.unwrap_or(0);
    let contents = match (skip, take) {
        (Some(skip), Some(take)) => records.into_iter().skip(skip).take(take).collect(),
        _ => records,
    };

    PaginatedResponse::new(contents, start, total_size)
}
