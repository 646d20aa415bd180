//! Metadata management service
//!
//! Translates between the API shape (a data map plus an optional keyword
//! list) and the persisted record shape (serialized payloads under a
//! normalized composite key), and drives the bulk engine.

use crate::cache::CacheInvalidation;
use crate::keyvalue::{
    normalize, BulkUpdateStrategy, KeyValueStore, MetadataError, MetadataKey, MetadataRecord,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Metadata as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataModel {
    pub data: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

pub struct MetadataService {
    store: Arc<dyn KeyValueStore>,
    cache: Arc<dyn CacheInvalidation>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn KeyValueStore>, cache: Arc<dyn CacheInvalidation>) -> Self {
        Self { store, cache }
    }

    pub fn get(
        &self,
        category: &str,
        collection: &str,
        key: &str,
    ) -> Result<Option<MetadataModel>, MetadataError> {
        let key = MetadataKey::new(category, collection, key)?;
        self.store.get(&key)?.map(to_model).transpose()
    }

    pub fn add(
        &self,
        category: &str,
        collection: &str,
        key: &str,
        model: &MetadataModel,
    ) -> Result<(), MetadataError> {
        let record = to_record(category, collection, key, model)?;
        self.store.insert(&record)?;
        self.cache.invalidate_all();
        info!("Added metadata {}/{}/{}", category, collection, key);
        Ok(())
    }

    pub fn update(
        &self,
        category: &str,
        collection: &str,
        key: &str,
        model: &MetadataModel,
    ) -> Result<(), MetadataError> {
        let record = to_record(category, collection, key, model)?;
        self.store.update(&record)?;
        self.cache.invalidate_all();
        info!("Updated metadata {}/{}/{}", category, collection, key);
        Ok(())
    }

    pub fn delete(&self, category: &str, collection: &str, key: &str) -> Result<(), MetadataError> {
        let key = MetadataKey::new(category, collection, key)?;
        self.store.delete(&key)?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Insert many records at once. Keys that already exist are skipped and
    /// reported in `AlreadyExists`; the remaining inserts stay committed.
    pub fn bulk_add(
        &self,
        category: &str,
        collection: &str,
        entries: &HashMap<String, MetadataModel>,
    ) -> Result<(), MetadataError> {
        let records = to_records(category, collection, entries)?;
        let conflicting = self.store.bulk_insert(&records)?;
        self.cache.invalidate_all();
        info!(
            "Bulk added {} record(s) to {}/{} ({} conflict(s))",
            records.len() - conflicting.len(),
            category,
            collection,
            conflicting.len()
        );
        if !conflicting.is_empty() {
            return Err(MetadataError::AlreadyExists { keys: conflicting });
        }
        Ok(())
    }

    pub fn bulk_update(
        &self,
        category: &str,
        collection: &str,
        entries: &HashMap<String, MetadataModel>,
        strategy: BulkUpdateStrategy,
    ) -> Result<(), MetadataError> {
        let records = to_records(category, collection, entries)?;
        match strategy {
            BulkUpdateStrategy::UpdateMatchedOnly => self.store.bulk_update_matched(&records)?,
            BulkUpdateStrategy::Replace => {
                self.store.replace_collection(category, collection, &records)?
            }
        }
        self.cache.invalidate_all();
        info!(
            "Bulk updated {}/{} with {} record(s) using {:?}",
            category,
            collection,
            records.len(),
            strategy
        );
        Ok(())
    }

    pub fn bulk_delete(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
    ) -> Result<(), MetadataError> {
        self.store.bulk_delete(category, collection, keys)?;
        self.cache.invalidate_all();
        Ok(())
    }

    pub fn get_categories(&self) -> Result<Vec<String>, MetadataError> {
        self.store.categories()
    }

    pub fn get_collections(&self, category: &str) -> Result<Vec<String>, MetadataError> {
        self.store.collections(category)
    }

    /// Whole collection keyed by display key, optionally keyword-filtered.
    pub fn get_key_values(
        &self,
        category: &str,
        collection: &str,
        keyword: Option<&str>,
    ) -> Result<HashMap<String, MetadataModel>, MetadataError> {
        let records = self.store.get_key_values(category, collection, keyword)?;
        records_to_map(records)
    }

    /// Subset lookup: only the requested keys, absent ones silently omitted.
    pub fn find_by_keys(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
        keyword: Option<&str>,
    ) -> Result<HashMap<String, MetadataModel>, MetadataError> {
        let records = self.store.find_by_keys(category, collection, keys, keyword)?;
        records_to_map(records)
    }
}

fn to_record(
    category: &str,
    collection: &str,
    key: &str,
    model: &MetadataModel,
) -> Result<MetadataRecord, MetadataError> {
    let key = MetadataKey::new(category, collection, key)?;
    if model.data.is_empty() {
        return Err(MetadataError::Validation("data must not be empty".to_string()));
    }
    let data = serde_json::to_string(&model.data)
        .map_err(|e| MetadataError::Validation(e.to_string()))?;
    let keywords = model
        .keywords
        .as_ref()
        .filter(|k| !k.is_empty())
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| MetadataError::Validation(e.to_string()))?;

    MetadataRecord::new(key, data, keywords)
}

fn to_records(
    category: &str,
    collection: &str,
    entries: &HashMap<String, MetadataModel>,
) -> Result<Vec<MetadataRecord>, MetadataError> {
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();

    // Two request keys that normalize to the same composite key would
    // collide with each other inside the store; reject up front.
    let mut seen = HashSet::new();
    let colliding: Vec<String> = keys
        .iter()
        .filter(|key| !seen.insert(normalize(key)))
        .map(|key| (*key).clone())
        .collect();
    if !colliding.is_empty() {
        return Err(MetadataError::Validation(format!(
            "keys collide after case normalization: {}",
            colliding.join(", ")
        )));
    }

    keys.iter()
        .map(|key| to_record(category, collection, key, &entries[*key]))
        .collect()
}

fn to_model(record: MetadataRecord) -> Result<MetadataModel, MetadataError> {
    let data = serde_json::from_str(&record.data)
        .map_err(|e| MetadataError::Storage(format!("corrupt data payload: {}", e)))?;
    let keywords = record
        .keywords
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| MetadataError::Storage(format!("corrupt keywords payload: {}", e)))?;
    Ok(MetadataModel { data, keywords })
}

fn records_to_map(
    records: Vec<MetadataRecord>,
) -> Result<HashMap<String, MetadataModel>, MetadataError> {
    records
        .into_iter()
        .map(|r| {
            let key = r.key.display_key().to_string();
            Ok((key, to_model(r)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoopCache;
    use crate::keyvalue::mock_store::MockKeyValueStore;

    fn service() -> (MetadataService, Arc<MockKeyValueStore>) {
        let store = Arc::new(MockKeyValueStore::new());
        let service = MetadataService::new(store.clone(), Arc::new(NoopCache));
        (service, store)
    }

    fn model(pairs: &[(&str, &str)], keywords: Option<&[&str]>) -> MetadataModel {
        MetadataModel {
            data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            keywords: keywords.map(|k| k.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_round_trip_preserves_model_shape() {
        let (service, _) = service();
        let m = model(&[("rate", "0.5")], Some(&["fx", "swap"]));

        service.add("Assets", "Fx", "EurUsd", &m).unwrap();
        let fetched = service.get("assets", "fx", "eurusd").unwrap().unwrap();
        assert_eq!(fetched, m);
    }

    #[test]
    fn test_add_rejects_empty_data_map() {
        let (service, _) = service();
        let result = service.add("cat", "col", "key", &model(&[], None));
        assert!(matches!(result, Err(MetadataError::Validation(_))));
    }

    #[test]
    fn test_bulk_add_surfaces_conflicts_but_keeps_inserts() {
        let (service, _) = service();
        service.add("cat", "col", "A", &model(&[("v", "1")], None)).unwrap();

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), model(&[("v", "2")], None));
        entries.insert("B".to_string(), model(&[("v", "3")], None));

        let result = service.bulk_add("cat", "col", &entries);
        assert_eq!(
            result,
            Err(MetadataError::AlreadyExists { keys: vec!["a".to_string()] })
        );
        // The non-conflicting key landed anyway.
        assert!(service.get("cat", "col", "B").unwrap().is_some());
        // The conflicting key kept its original payload.
        let kept = service.get("cat", "col", "A").unwrap().unwrap();
        assert_eq!(kept.data["v"], "1");
    }

    #[test]
    fn test_bulk_requests_reject_keys_colliding_after_normalization() {
        let (service, store) = service();

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), model(&[("v", "1")], None));
        entries.insert("A".to_string(), model(&[("v", "2")], None));

        let result = service.bulk_add("cat", "col", &entries);
        assert!(matches!(result, Err(MetadataError::Validation(_))));
        // Rejected before anything reaches the store.
        assert_eq!(store.record_count(), 0);

        let result = service.bulk_update("cat", "col", &entries, BulkUpdateStrategy::Replace);
        assert!(matches!(result, Err(MetadataError::Validation(_))));
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn test_bulk_update_matched_only_reports_all_missing_keys() {
        let (service, _) = service();
        service.add("cat", "col", "A", &model(&[("v", "1")], None)).unwrap();

        let mut entries = HashMap::new();
        entries.insert("A".to_string(), model(&[("v", "9")], None));
        entries.insert("B".to_string(), model(&[("v", "9")], None));
        entries.insert("C".to_string(), model(&[("v", "9")], None));

        let result =
            service.bulk_update("cat", "col", &entries, BulkUpdateStrategy::UpdateMatchedOnly);
        assert_eq!(
            result,
            Err(MetadataError::NotFound { keys: vec!["B".to_string(), "C".to_string()] })
        );
        // Nothing committed.
        assert_eq!(service.get("cat", "col", "A").unwrap().unwrap().data["v"], "1");
    }

    #[test]
    fn test_bulk_update_replace_swaps_the_key_set() {
        let (service, _) = service();
        service.add("cat", "col", "A", &model(&[("v", "1")], None)).unwrap();
        service.add("cat", "col", "B", &model(&[("v", "2")], None)).unwrap();

        let mut entries = HashMap::new();
        entries.insert("B".to_string(), model(&[("v", "20")], None));
        entries.insert("C".to_string(), model(&[("v", "30")], None));
        service
            .bulk_update("cat", "col", &entries, BulkUpdateStrategy::Replace)
            .unwrap();

        assert!(service.get("cat", "col", "A").unwrap().is_none());
        assert_eq!(service.get("cat", "col", "B").unwrap().unwrap().data["v"], "20");
        assert_eq!(service.get("cat", "col", "C").unwrap().unwrap().data["v"], "30");
    }

    #[test]
    fn test_keyword_filter_narrows_collection_queries() {
        let (service, _) = service();
        service
            .add("cat", "col", "A", &model(&[("v", "1")], Some(&["swap"])))
            .unwrap();
        service
            .add("cat", "col", "B", &model(&[("v", "2")], Some(&["rollover"])))
            .unwrap();
        service.add("cat", "col", "C", &model(&[("v", "3")], None)).unwrap();

        let all = service.get_key_values("cat", "col", None).unwrap();
        assert_eq!(all.len(), 3);

        let swaps = service.get_key_values("cat", "col", Some("SWAP")).unwrap();
        assert_eq!(swaps.len(), 1);
        assert!(swaps.contains_key("A"));
    }

    #[test]
    fn test_find_by_keys_omits_absent_keys() {
        let (service, _) = service();
        service.add("cat", "col", "A", &model(&[("v", "1")], None)).unwrap();

        let found = service
            .find_by_keys(
                "cat",
                "col",
                &["a".to_string(), "missing".to_string()],
                None,
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("A"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (service, _) = service();
        service.add("cat", "col", "A", &model(&[("v", "1")], None)).unwrap();
        service.delete("cat", "col", "A").unwrap();
        service.delete("cat", "col", "A").unwrap();
        assert!(service.get("cat", "col", "A").unwrap().is_none());
    }
}
