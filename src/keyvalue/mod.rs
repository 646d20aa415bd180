//! Key/value metadata storage layer abstraction
//!
//! This module provides an abstraction over metadata storage backends,
//! allowing the system to use different storage implementations (SQLite,
//! in-memory mock, etc.) without affecting higher-level services.

pub mod sqlite_store;
pub mod mock_store;


use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of each key segment (category, collection, key).
pub const MAX_SEGMENT_LEN: usize = 100;
/// Maximum length of the serialized metadata payload.
pub const MAX_DATA_LEN: usize = 4096;
/// Maximum length of the serialized keywords payload.
pub const MAX_KEYWORDS_LEN: usize = 1024;

/// Errors produced by metadata storage and the bulk engine on top of it.
#[derive(Debug, Error, PartialEq)]
pub enum MetadataError {
    #[error("key(s) already exist: {}", .keys.join(", "))]
    AlreadyExists { keys: Vec<String> },
    #[error("key(s) not found: {}", .keys.join(", "))]
    NotFound { keys: Vec<String> },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for MetadataError {
    fn from(e: rusqlite::Error) -> Self {
        MetadataError::Storage(e.to_string())
    }
}

/// Composite key for a metadata record.
///
/// Comparison and lookup use the uppercase-normalized segments; the
/// originally supplied casing is kept as display fields and returned to
/// callers. Normalization never relies on the storage engine's collation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    category: String,
    collection: String,
    key: String,
    display_category: String,
    display_collection: String,
    display_key: String,
}

impl MetadataKey {
    pub fn new(category: &str, collection: &str, key: &str) -> Result<Self, MetadataError> {
        for (name, value) in [("category", category), ("collection", collection), ("key", key)] {
            if value.trim().is_empty() {
                return Err(MetadataError::Validation(format!("{} must not be empty", name)));
            }
            // Limits count characters, not bytes.
            if value.chars().count() > MAX_SEGMENT_LEN {
                return Err(MetadataError::Validation(format!(
                    "{} exceeds {} characters",
                    name, MAX_SEGMENT_LEN
                )));
            }
        }

        Ok(Self {
            category: normalize(category),
            collection: normalize(collection),
            key: normalize(key),
            display_category: category.to_string(),
            display_collection: collection.to_string(),
            display_key: key.to_string(),
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_category(&self) -> &str {
        &self.display_category
    }

    pub fn display_collection(&self) -> &str {
        &self.display_collection
    }

    pub fn display_key(&self) -> &str {
        &self.display_key
    }
}

/// Uppercase normalization used for all key comparisons.
pub fn normalize(value: &str) -> String {
    value.to_uppercase()
}

/// A metadata record as persisted: composite key plus the serialized data
/// map and optional serialized keywords list.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub key: MetadataKey,
    pub data: String,
    pub keywords: Option<String>,
}

impl MetadataRecord {
    pub fn new(key: MetadataKey, data: String, keywords: Option<String>) -> Result<Self, MetadataError> {
        if data.trim().is_empty() {
            return Err(MetadataError::Validation("data must not be empty".to_string()));
        }
        if data.chars().count() > MAX_DATA_LEN {
            return Err(MetadataError::Validation(format!(
                "data exceeds {} characters",
                MAX_DATA_LEN
            )));
        }
        if let Some(k) = &keywords {
            if k.chars().count() > MAX_KEYWORDS_LEN {
                return Err(MetadataError::Validation(format!(
                    "keywords exceed {} characters",
                    MAX_KEYWORDS_LEN
                )));
            }
        }

        Ok(Self { key, data, keywords })
    }
}

/// Case-insensitive substring match against the serialized keywords field.
/// Records without keywords never match a keyword filter.
pub fn keyword_matches(keywords: Option<&str>, keyword: Option<&str>) -> bool {
    match keyword {
        None => true,
        Some(kw) if kw.trim().is_empty() => true,
        Some(kw) => keywords
            .map(|k| k.to_uppercase().contains(&kw.to_uppercase()))
            .unwrap_or(false),
    }
}

/// The bulk update strategy selected explicitly per request, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkUpdateStrategy {
    /// Only keys already present in the category/collection are overwritten.
    /// Any requested key that is absent fails the whole operation, reporting
    /// the full missing set; nothing is partially committed.
    UpdateMatchedOnly,
    /// The collection's key set becomes exactly the requested set: requested
    /// keys are added or updated, every other existing key is deleted.
    Replace,
}

impl std::str::FromStr for BulkUpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UpdateMatchedOnly" => Ok(BulkUpdateStrategy::UpdateMatchedOnly),
            "Replace" => Ok(BulkUpdateStrategy::Replace),
            _ => Err(format!("Unknown bulk update strategy: {}", s)),
        }
    }
}

/// Trait defining the metadata storage interface.
///
/// Conflict detection relies on the store's uniqueness signal rather than a
/// check-then-act read; update/delete absence is detected via the
/// rows-affected count so concurrent writers cannot race the check.
pub trait KeyValueStore: Send + Sync {
    /// Point lookup by composite key.
    fn get(&self, key: &MetadataKey) -> Result<Option<MetadataRecord>, MetadataError>;

    /// Insert a new record; `AlreadyExists` when the normalized key is taken.
    fn insert(&self, record: &MetadataRecord) -> Result<(), MetadataError>;

    /// Overwrite an existing record; `NotFound` when the key is absent.
    fn update(&self, record: &MetadataRecord) -> Result<(), MetadataError>;

    /// Delete by key. Deleting an absent key is a no-op success.
    fn delete(&self, key: &MetadataKey) -> Result<(), MetadataError>;

    /// Set-membership check.
    fn exists(&self, key: &MetadataKey) -> Result<bool, MetadataError>;

    /// Distinct display categories in the store.
    fn categories(&self) -> Result<Vec<String>, MetadataError>;

    /// Distinct display collections within a category.
    fn collections(&self, category: &str) -> Result<Vec<String>, MetadataError>;

    /// All records in a category/collection, optionally keyword-filtered.
    fn get_key_values(
        &self,
        category: &str,
        collection: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError>;

    /// Exactly the requested keys; absent keys are simply missing from the
    /// result, keyword filter narrows further.
    fn find_by_keys(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError>;

    /// Insert every record whose key is free and return the display keys
    /// that already existed. Runs in one transaction but is not
    /// all-or-nothing by design: conflicting keys are skipped, the rest
    /// stay committed.
    fn bulk_insert(&self, records: &[MetadataRecord]) -> Result<Vec<String>, MetadataError>;

    /// Overwrite all given records inside one transaction after validating
    /// that every key exists; `NotFound` with the full missing set otherwise,
    /// committing nothing.
    fn bulk_update_matched(&self, records: &[MetadataRecord]) -> Result<(), MetadataError>;

    /// Replace the whole category/collection key set with the given records
    /// inside one transaction.
    fn replace_collection(
        &self,
        category: &str,
        collection: &str,
        records: &[MetadataRecord],
    ) -> Result<(), MetadataError>;

    /// Delete each key; absent keys are silently ignored.
    fn bulk_delete(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
    ) -> Result<(), MetadataError>;
}
