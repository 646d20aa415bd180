//! Mock implementation of the KeyValueStore trait for testing

use crate::keyvalue::{
    keyword_matches, normalize, KeyValueStore, MetadataError, MetadataKey, MetadataRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type CompositeKey = (String, String, String);

/// Mock implementation of KeyValueStore backed by an in-memory map keyed by
/// the normalized composite key, mirroring the SQLite semantics.
pub struct MockKeyValueStore {
    data: Arc<Mutex<HashMap<CompositeKey, MetadataRecord>>>,
}

impl MockKeyValueStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Clear all data from the store (useful for test cleanup).
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    pub fn record_count(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    fn composite(key: &MetadataKey) -> CompositeKey {
        (
            key.category().to_string(),
            key.collection().to_string(),
            key.key().to_string(),
        )
    }
}

impl Default for MockKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MockKeyValueStore {
    fn get(&self, key: &MetadataKey) -> Result<Option<MetadataRecord>, MetadataError> {
        let data = self.data.lock().unwrap();
        Ok(data.get(&Self::composite(key)).cloned())
    }

    fn insert(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let mut data = self.data.lock().unwrap();
        let composite = Self::composite(&record.key);
        if data.contains_key(&composite) {
            return Err(MetadataError::AlreadyExists {
                keys: vec![record.key.display_key().to_string()],
            });
        }
        data.insert(composite, record.clone());
        Ok(())
    }

    fn update(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let mut data = self.data.lock().unwrap();
        let composite = Self::composite(&record.key);
        if !data.contains_key(&composite) {
            return Err(MetadataError::NotFound {
                keys: vec![record.key.display_key().to_string()],
            });
        }
        data.insert(composite, record.clone());
        Ok(())
    }

    fn delete(&self, key: &MetadataKey) -> Result<(), MetadataError> {
        let mut data = self.data.lock().unwrap();
        data.remove(&Self::composite(key));
        Ok(())
    }

    fn exists(&self, key: &MetadataKey) -> Result<bool, MetadataError> {
        let data = self.data.lock().unwrap();
        Ok(data.contains_key(&Self::composite(key)))
    }

    fn categories(&self) -> Result<Vec<String>, MetadataError> {
        let data = self.data.lock().unwrap();
        let mut categories: Vec<String> = Vec::new();
        for record in data.values() {
            let display = record.key.display_category().to_string();
            if !categories.contains(&display) {
                categories.push(display);
            }
        }
        Ok(categories)
    }

    fn collections(&self, category: &str) -> Result<Vec<String>, MetadataError> {
        let normalized = normalize(category);
        let data = self.data.lock().unwrap();
        let mut collections: Vec<String> = Vec::new();
        for record in data.values() {
            if record.key.category() == normalized {
                let display = record.key.display_collection().to_string();
                if !collections.contains(&display) {
                    collections.push(display);
                }
            }
        }
        Ok(collections)
    }

    fn get_key_values(
        &self,
        category: &str,
        collection: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        let category = normalize(category);
        let collection = normalize(collection);
        let data = self.data.lock().unwrap();
        Ok(data
            .values()
            .filter(|r| r.key.category() == category && r.key.collection() == collection)
            .filter(|r| keyword_matches(r.keywords.as_deref(), keyword))
            .cloned()
            .collect())
    }

    fn find_by_keys(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        let wanted: Vec<String> = keys.iter().map(|k| normalize(k)).collect();
        let category = normalize(category);
        let collection = normalize(collection);
        let data = self.data.lock().unwrap();
        Ok(data
            .values()
            .filter(|r| r.key.category() == category && r.key.collection() == collection)
            .filter(|r| wanted.iter().any(|k| k == r.key.key()))
            .filter(|r| keyword_matches(r.keywords.as_deref(), keyword))
            .cloned()
            .collect())
    }

    fn bulk_insert(&self, records: &[MetadataRecord]) -> Result<Vec<String>, MetadataError> {
        let mut data = self.data.lock().unwrap();
        let mut conflicting = Vec::new();
        for record in records {
            let composite = Self::composite(&record.key);
            if data.contains_key(&composite) {
                conflicting.push(record.key.display_key().to_string());
            } else {
                data.insert(composite, record.clone());
            }
        }
        Ok(conflicting)
    }

    fn bulk_update_matched(&self, records: &[MetadataRecord]) -> Result<(), MetadataError> {
        let mut data = self.data.lock().unwrap();

        let missing: Vec<String> = records
            .iter()
            .filter(|r| !data.contains_key(&Self::composite(&r.key)))
            .map(|r| r.key.display_key().to_string())
            .collect();

        if !missing.is_empty() {
            return Err(MetadataError::NotFound { keys: missing });
        }

        for record in records {
            data.insert(Self::composite(&record.key), record.clone());
        }
        Ok(())
    }

    fn replace_collection(
        &self,
        category: &str,
        collection: &str,
        records: &[MetadataRecord],
    ) -> Result<(), MetadataError> {
        let category = normalize(category);
        let collection = normalize(collection);
        let mut data = self.data.lock().unwrap();

        data.retain(|(cat, col, _), _| !(cat == &category && col == &collection));
        for record in records {
            data.insert(Self::composite(&record.key), record.clone());
        }
        Ok(())
    }

    fn bulk_delete(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
    ) -> Result<(), MetadataError> {
        let category = normalize(category);
        let collection = normalize(collection);
        let mut data = self.data.lock().unwrap();
        for key in keys {
            data.remove(&(category.clone(), collection.clone(), normalize(key)));
        }
        Ok(())
    }
}
