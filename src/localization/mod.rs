//! Localization storage layer abstraction
//!
//! Locales and localized values live behind one storage trait because the
//! consistency checks (default-locale coverage, reference guards) join both
//! row sets; a single backend keeps those queries on one consistent view.

pub mod sqlite_store;
pub mod mock_store;


use crate::pagination::PaginatedResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a locale id.
pub const MAX_LOCALE_LEN: usize = 100;
/// Maximum length of a localized value key.
pub const MAX_KEY_LEN: usize = 100;
/// Maximum length of a localized value.
pub const MAX_VALUE_LEN: usize = 4096;

/// A locale. At most one locale is the default at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub id: String,
    pub is_default: bool,
}

/// A translation for one key under one locale. Locale and key are the
/// immutable identity; only the value may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedValue {
    pub locale: String,
    pub key: String,
    pub value: String,
}

/// Outcomes of locale operations.
#[derive(Debug, Error, PartialEq)]
pub enum LocalesError {
    #[error("locale already exists")]
    AlreadyExists,
    #[error("locale does not exist")]
    DoesNotExist,
    #[error("cannot delete or demote the default locale")]
    CannotDeleteDefaultLocale,
    #[error("must provide localized value for keys: {}", .missing_keys.join(", "))]
    CannotSetLocaleAsDefault { missing_keys: Vec<String> },
    #[error("cannot delete a locale assigned to localized values")]
    CannotDeleteLocaleInUse,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for LocalesError {
    fn from(e: rusqlite::Error) -> Self {
        LocalesError::Storage(e.to_string())
    }
}

impl From<crate::audit::AuditError> for LocalesError {
    fn from(e: crate::audit::AuditError) -> Self {
        LocalesError::Storage(e.to_string())
    }
}

/// Outcomes of localized value operations.
#[derive(Debug, Error, PartialEq)]
pub enum LocalizedValuesError {
    #[error("localized value already exists")]
    AlreadyExists,
    #[error("localized value does not exist")]
    DoesNotExist,
    #[error("locale does not exist")]
    LocaleDoesNotExist,
    #[error("upsert failed for every locale")]
    UpsertFailed,
    #[error("upsert partially failed for locales: {}", .locales.join(", "))]
    UpsertPartiallyFailed { locales: Vec<String> },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for LocalizedValuesError {
    fn from(e: rusqlite::Error) -> Self {
        LocalizedValuesError::Storage(e.to_string())
    }
}

impl From<crate::audit::AuditError> for LocalizedValuesError {
    fn from(e: crate::audit::AuditError) -> Self {
        LocalizedValuesError::Storage(e.to_string())
    }
}

/// Whether a default-locale promotion inserted the target locale or updated
/// an existing row. Drives the audit event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Inserted,
    Updated,
}

/// Trait defining the localization storage interface.
///
/// Add/update/delete detect conflicts and absence via the store's
/// uniqueness and rows-affected signals so they stay race-safe against
/// concurrent writers.
pub trait LocalizationStore: Send + Sync {
    fn get_locale(&self, id: &str) -> Result<Option<Locale>, LocalesError>;

    fn get_all_locales(&self) -> Result<Vec<Locale>, LocalesError>;

    /// The single locale with `is_default = true`, if any.
    fn get_default_locale(&self) -> Result<Option<Locale>, LocalesError>;

    fn insert_locale(&self, locale: &Locale) -> Result<(), LocalesError>;

    fn update_locale(&self, locale: &Locale) -> Result<(), LocalesError>;

    fn delete_locale(&self, id: &str) -> Result<(), LocalesError>;

    /// Atomically demote the old default (when given) and insert-or-update
    /// the target as the new default. No committed state ever has zero or
    /// two defaults.
    fn promote_default(
        &self,
        old_default_id: Option<&str>,
        locale: &Locale,
    ) -> Result<PromotionOutcome, LocalesError>;

    /// Whether any localized value still references the locale.
    fn has_any_localized_values(&self, locale_id: &str) -> Result<bool, LocalesError>;

    fn get_value(&self, locale: &str, key: &str)
        -> Result<Option<LocalizedValue>, LocalizedValuesError>;

    fn add_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError>;

    fn update_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError>;

    fn delete_value(&self, locale: &str, key: &str) -> Result<(), LocalizedValuesError>;

    fn get_by_locale(&self, locale: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError>;

    /// All translations of one key across locales, used for cascade deletion.
    fn get_all_by_key(&self, key: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError>;

    /// Keys that have a value under the current default locale but none
    /// under the given locale. Empty when no default is configured.
    fn missing_keys(&self, locale_id: &str) -> Result<Vec<String>, LocalesError>;

    /// Every localized value, paginated over distinct keys ordered
    /// ascending; `total_size` counts distinct keys before pagination.
    fn get_all_values(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<PaginatedResponse<LocalizedValue>, LocalizedValuesError>;
}

impl Locale {
    pub fn validate(&self) -> Result<(), LocalesError> {
        if self.id.trim().is_empty() {
            return Err(LocalesError::Validation("locale id must not be empty".to_string()));
        }
        // Limits count characters, not bytes.
        if self.id.chars().count() > MAX_LOCALE_LEN {
            return Err(LocalesError::Validation(format!(
                "locale id exceeds {} characters",
                MAX_LOCALE_LEN
            )));
        }
        Ok(())
    }
}

impl LocalizedValue {
    pub fn validate(&self) -> Result<(), LocalizedValuesError> {
        if self.locale.trim().is_empty() {
            return Err(LocalizedValuesError::Validation(
                "locale must not be empty".to_string(),
            ));
        }
        if self.key.trim().is_empty() {
            return Err(LocalizedValuesError::Validation(
                "key must not be empty".to_string(),
            ));
        }
        if self.value.trim().is_empty() {
            return Err(LocalizedValuesError::Validation(
                "value must not be empty".to_string(),
            ));
        }
        if self.key.chars().count() > MAX_KEY_LEN {
            return Err(LocalizedValuesError::Validation(format!(
                "key exceeds {} characters",
                MAX_KEY_LEN
            )));
        }
        if self.value.chars().count() > MAX_VALUE_LEN {
            return Err(LocalizedValuesError::Validation(format!(
                "value exceeds {} characters",
                MAX_VALUE_LEN
            )));
        }
        Ok(())
    }
}
