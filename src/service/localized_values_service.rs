//! Localized value management service
//!
//! Values are created against existing locales only, audited under the
//! `{locale}.{key}` reference, and served to readers through a
//! read-through cache keyed by locale.

use crate::audit::AuditDataType;
use crate::cache::{CacheInvalidation, ReadCache};
use crate::localization::{LocalizationStore, LocalizedValue, LocalizedValuesError};
use crate::pagination::PaginatedResponse;
use crate::service::audit_service::AuditService;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// All translations of one key, grouped for catalogue-style listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedValuesByKey {
    pub key: String,
    pub values: Vec<LocalizedValue>,
}

pub struct LocalizedValuesService {
    store: Arc<dyn LocalizationStore>,
    audit: Arc<AuditService>,
    cache: Arc<ReadCache>,
}

impl LocalizedValuesService {
    pub fn new(
        store: Arc<dyn LocalizationStore>,
        audit: Arc<AuditService>,
        cache: Arc<ReadCache>,
    ) -> Self {
        Self { store, audit, cache }
    }

    pub fn get(&self, locale: &str, key: &str) -> Result<LocalizedValue, LocalizedValuesError> {
        self.store
            .get_value(locale, key)?
            .ok_or(LocalizedValuesError::DoesNotExist)
    }

    /// All values under one locale, read through the cache.
    pub fn get_by_locale(&self, locale: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        let cache_key = format!("localized-values:{}", locale);
        if let Some(values) = self.cache.get::<Vec<LocalizedValue>>(&cache_key) {
            return Ok(values);
        }

        let values = self.store.get_by_locale(locale)?;
        self.cache.put(&cache_key, &values);
        Ok(values)
    }

    pub fn get_all_by_key(&self, key: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        self.store.get_all_by_key(key)
    }

    /// Keys the default locale covers that the given locale does not.
    pub fn get_missing_keys(&self, locale: &str) -> Result<Vec<String>, LocalizedValuesError> {
        self.store
            .missing_keys(locale)
            .map_err(|e| LocalizedValuesError::Storage(e.to_string()))
    }

    /// Full catalogue paginated over distinct keys. `take` of zero means
    /// no pagination.
    pub fn get_all(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<PaginatedResponse<LocalizedValuesByKey>, LocalizedValuesError> {
        let page = self.store.get_all_values(skip, take)?;

        // Values arrive ordered by key, so grouping consecutive runs keeps
        // the store's key order.
        let mut groups: Vec<LocalizedValuesByKey> = Vec::new();
        for value in page.contents {
            match groups.last_mut() {
                Some(group) if group.key == value.key => group.values.push(value),
                _ => groups.push(LocalizedValuesByKey {
                    key: value.key.clone(),
                    values: vec![value],
                }),
            }
        }

        Ok(PaginatedResponse::new(groups, page.start, page.total_size))
    }

    pub fn add(
        &self,
        value: LocalizedValue,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalizedValuesError> {
        value.validate()?;
        self.ensure_locale_exists(&value.locale)?;

        self.store.add_value(&value)?;
        self.audit_value(correlation_id, user_name, Some(&value), None)?;
        self.cache.invalidate_all();
        info!("Created localized value '{}.{}'", value.locale, value.key);
        Ok(())
    }

    pub fn update(
        &self,
        value: LocalizedValue,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalizedValuesError> {
        value.validate()?;

        let existing = self
            .store
            .get_value(&value.locale, &value.key)?
            .ok_or(LocalizedValuesError::DoesNotExist)?;

        self.store.update_value(&value)?;
        self.audit_value(correlation_id, user_name, Some(&value), Some(&existing))?;
        self.cache.invalidate_all();
        info!("Updated localized value '{}.{}'", value.locale, value.key);
        Ok(())
    }

    pub fn delete(
        &self,
        locale: &str,
        key: &str,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalizedValuesError> {
        let existing = self
            .store
            .get_value(locale, key)?
            .ok_or(LocalizedValuesError::DoesNotExist)?;

        self.store.delete_value(locale, key)?;
        self.audit_value(correlation_id, user_name, None, Some(&existing))?;
        self.cache.invalidate_all();
        info!("Deleted localized value '{}.{}'", locale, key);
        Ok(())
    }

    /// Write one key's translations across several locales in a single
    /// call, inserting or updating per locale. Locales are attempted
    /// independently; failures are collected rather than aborting the rest.
    pub fn upsert_by_key(
        &self,
        key: &str,
        values_by_locale: &HashMap<String, String>,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalizedValuesError> {
        let existing = self.store.get_all_by_key(key)?;

        let mut locales: Vec<&String> = values_by_locale.keys().collect();
        locales.sort();

        let mut failed = Vec::new();
        for locale in &locales {
            let value = LocalizedValue {
                locale: (*locale).clone(),
                key: key.to_string(),
                value: values_by_locale[*locale].clone(),
            };
            let result = if existing.iter().any(|v| &v.locale == *locale) {
                self.update(value, user_name, correlation_id)
            } else {
                self.add(value, user_name, correlation_id)
            };
            if let Err(e) = result {
                warn!("Upsert of '{}.{}' failed: {}", locale, key, e);
                failed.push((*locale).clone());
            }
        }

        if !failed.is_empty() {
            if failed.len() == locales.len() {
                return Err(LocalizedValuesError::UpsertFailed);
            }
            return Err(LocalizedValuesError::UpsertPartiallyFailed { locales: failed });
        }
        Ok(())
    }

    fn ensure_locale_exists(&self, locale: &str) -> Result<(), LocalizedValuesError> {
        let found = self
            .store
            .get_locale(locale)
            .map_err(|e| LocalizedValuesError::Storage(e.to_string()))?;
        if found.is_none() {
            return Err(LocalizedValuesError::LocaleDoesNotExist);
        }
        Ok(())
    }

    fn audit_value(
        &self,
        correlation_id: &str,
        user_name: &str,
        new_state: Option<&LocalizedValue>,
        old_state: Option<&LocalizedValue>,
    ) -> Result<(), LocalizedValuesError> {
        let reference = new_state
            .or(old_state)
            .map(|v| format!("{}.{}", v.locale, v.key))
            .unwrap_or_default();
        let serialize = |v: Option<&LocalizedValue>| -> Result<Option<String>, LocalizedValuesError> {
            v.map(serde_json::to_string)
                .transpose()
                .map_err(|e| LocalizedValuesError::Storage(e.to_string()))
        };

        self.audit.record(
            correlation_id,
            user_name,
            &reference,
            AuditDataType::LocalizedValue,
            serialize(new_state)?,
            serialize(old_state)?,
        )?;
        Ok(())
    }
}
