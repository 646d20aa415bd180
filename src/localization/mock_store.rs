//! Mock implementation of the LocalizationStore trait for testing

use crate::localization::{
    Locale, LocalesError, LocalizationStore, LocalizedValue, LocalizedValuesError,
    PromotionOutcome,
};
use crate::pagination::PaginatedResponse;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    locales: BTreeMap<String, bool>,
    // keyed by (key, locale) so iteration orders by key first
    values: BTreeMap<(String, String), String>,
}

/// Mock implementation of LocalizationStore backed by in-memory maps, with
/// the same conflict and rows-affected semantics as the SQLite backend.
pub struct MockLocalizationStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockLocalizationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.locales.clear();
        inner.values.clear();
    }
}

impl Default for MockLocalizationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalizationStore for MockLocalizationStore {
    fn get_locale(&self, id: &str) -> Result<Option<Locale>, LocalesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.locales.get(id).map(|is_default| Locale {
            id: id.to_string(),
            is_default: *is_default,
        }))
    }

    fn get_all_locales(&self) -> Result<Vec<Locale>, LocalesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .locales
            .iter()
            .map(|(id, is_default)| Locale {
                id: id.clone(),
                is_default: *is_default,
            })
            .collect())
    }

    fn get_default_locale(&self) -> Result<Option<Locale>, LocalesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .locales
            .iter()
            .find(|(_, is_default)| **is_default)
            .map(|(id, _)| Locale {
                id: id.clone(),
                is_default: true,
            }))
    }

    fn insert_locale(&self, locale: &Locale) -> Result<(), LocalesError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.locales.contains_key(&locale.id) {
            return Err(LocalesError::AlreadyExists);
        }
        inner.locales.insert(locale.id.clone(), locale.is_default);
        Ok(())
    }

    fn update_locale(&self, locale: &Locale) -> Result<(), LocalesError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.locales.get_mut(&locale.id) {
            Some(is_default) => {
                *is_default = locale.is_default;
                Ok(())
            }
            None => Err(LocalesError::DoesNotExist),
        }
    }

    fn delete_locale(&self, id: &str) -> Result<(), LocalesError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.locales.remove(id).is_none() {
            return Err(LocalesError::DoesNotExist);
        }
        Ok(())
    }

    fn promote_default(
        &self,
        old_default_id: Option<&str>,
        locale: &Locale,
    ) -> Result<PromotionOutcome, LocalesError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(old_id) = old_default_id {
            if let Some(is_default) = inner.locales.get_mut(old_id) {
                *is_default = false;
            }
        }

        let outcome = if inner.locales.contains_key(&locale.id) {
            PromotionOutcome::Updated
        } else {
            PromotionOutcome::Inserted
        };
        inner.locales.insert(locale.id.clone(), true);
        Ok(outcome)
    }

    fn has_any_localized_values(&self, locale_id: &str) -> Result<bool, LocalesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.values.keys().any(|(_, locale)| locale == locale_id))
    }

    fn get_value(
        &self,
        locale: &str,
        key: &str,
    ) -> Result<Option<LocalizedValue>, LocalizedValuesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .values
            .get(&(key.to_string(), locale.to_string()))
            .map(|value| LocalizedValue {
                locale: locale.to_string(),
                key: key.to_string(),
                value: value.clone(),
            }))
    }

    fn add_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError> {
        let mut inner = self.inner.lock().unwrap();
        let composite = (value.key.clone(), value.locale.clone());
        if inner.values.contains_key(&composite) {
            return Err(LocalizedValuesError::AlreadyExists);
        }
        inner.values.insert(composite, value.value.clone());
        Ok(())
    }

    fn update_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError> {
        let mut inner = self.inner.lock().unwrap();
        let composite = (value.key.clone(), value.locale.clone());
        match inner.values.get_mut(&composite) {
            Some(stored) => {
                *stored = value.value.clone();
                Ok(())
            }
            None => Err(LocalizedValuesError::DoesNotExist),
        }
    }

    fn delete_value(&self, locale: &str, key: &str) -> Result<(), LocalizedValuesError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .values
            .remove(&(key.to_string(), locale.to_string()))
            .is_none()
        {
            return Err(LocalizedValuesError::DoesNotExist);
        }
        Ok(())
    }

    fn get_by_locale(&self, locale: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .values
            .iter()
            .filter(|((_, l), _)| l == locale)
            .map(|((key, l), value)| LocalizedValue {
                locale: l.clone(),
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn get_all_by_key(&self, key: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .values
            .iter()
            .filter(|((k, _), _)| k == key)
            .map(|((k, locale), value)| LocalizedValue {
                locale: locale.clone(),
                key: k.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn missing_keys(&self, locale_id: &str) -> Result<Vec<String>, LocalesError> {
        let inner = self.inner.lock().unwrap();
        let default_locale = inner
            .locales
            .iter()
            .find(|(_, is_default)| **is_default)
            .map(|(id, _)| id.clone());

        let Some(default_id) = default_locale else {
            return Ok(Vec::new());
        };

        let mut missing = Vec::new();
        for (key, locale) in inner.values.keys() {
            if locale == &default_id
                && !inner.values.contains_key(&(key.clone(), locale_id.to_string()))
                && !missing.contains(key)
            {
                missing.push(key.clone());
            }
        }
        Ok(missing)
    }

    fn get_all_values(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<PaginatedResponse<LocalizedValue>, LocalizedValuesError> {
        let inner = self.inner.lock().unwrap();

        let mut distinct_keys: Vec<String> = Vec::new();
        for (key, _) in inner.values.keys() {
            if !distinct_keys.contains(key) {
                distinct_keys.push(key.clone());
            }
        }
        let total_size = distinct_keys.len();

        let page_keys: Vec<String> = if take > 0 {
            distinct_keys.into_iter().skip(skip).take(take).collect()
        } else {
            distinct_keys
        };

        let values = inner
            .values
            .iter()
            .filter(|((key, _), _)| page_keys.contains(key))
            .map(|((key, locale), value)| LocalizedValue {
                locale: locale.clone(),
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        Ok(PaginatedResponse::new(values, skip, total_size))
    }
}
