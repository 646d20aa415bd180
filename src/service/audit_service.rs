//! Audit recording service
//!
//! Mutating engines call this synchronously as part of the operation they
//! describe, so a successful operation implies a consistent audit trail.

use crate::audit::{
    AuditDataType, AuditError, AuditEventType, AuditFilter, AuditRecord, AuditStore,
};
use crate::pagination::PaginatedResponse;
use chrono::Utc;
use std::sync::Arc;

/// Audit recorder shared by the locale and localized value engines.
pub struct AuditService {
    store: Arc<dyn AuditStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one audit entry. The event type follows from which states are
    /// present: new only is a creation, old only a deletion, both an update.
    pub fn record(
        &self,
        correlation_id: &str,
        user_name: &str,
        data_reference: &str,
        data_type: AuditDataType,
        new_state: Option<String>,
        old_state: Option<String>,
    ) -> Result<(), AuditError> {
        let event_type = match (&old_state, &new_state) {
            (None, Some(_)) => AuditEventType::Created,
            (Some(_), None) => AuditEventType::Deleted,
            _ => AuditEventType::Updated,
        };

        let record = AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            correlation_id: correlation_id.to_string(),
            user_name: user_name.to_string(),
            event_type,
            data_type,
            data_reference: data_reference.to_string(),
            data_diff: diff(old_state, new_state),
        };

        self.store.insert(&record)
    }

    pub fn get_logs(
        &self,
        filter: &AuditFilter,
        skip: Option<usize>,
        take: Option<usize>,
    ) -> Result<PaginatedResponse<AuditRecord>, AuditError> {
        self.store.get_all(filter, skip, take)
    }
}

/// Serialized old/new diff. States arrive as entity JSON; embed them as
/// structured values rather than doubly-encoded strings.
fn diff(old_state: Option<String>, new_state: Option<String>) -> String {
    let parse = |s: Option<String>| -> serde_json::Value {
        match s {
            Some(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
            None => serde_json::Value::Null,
        }
    };

    serde_json::json!({
        "old": parse(old_state),
        "new": parse(new_state),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::mock_store::MockAuditStore;

    fn service_with_store() -> (AuditService, Arc<MockAuditStore>) {
        let store = Arc::new(MockAuditStore::new());
        (AuditService::new(store.clone()), store)
    }

    #[test]
    fn test_event_type_follows_from_states() {
        let (service, store) = service_with_store();

        service
            .record("c1", "alice", "en", AuditDataType::Locale, Some(r#"{"id":"en"}"#.to_string()), None)
            .unwrap();
        service
            .record(
                "c1",
                "alice",
                "en",
                AuditDataType::Locale,
                Some(r#"{"id":"en","isDefault":true}"#.to_string()),
                Some(r#"{"id":"en","isDefault":false}"#.to_string()),
            )
            .unwrap();
        service
            .record("c1", "alice", "en", AuditDataType::Locale, None, Some(r#"{"id":"en"}"#.to_string()))
            .unwrap();

        let logs = store.get_all(&AuditFilter::default(), None, None).unwrap();
        assert_eq!(logs.total_size, 3);
        let types: Vec<_> = logs.contents.iter().map(|r| r.event_type).collect();
        assert!(types.contains(&AuditEventType::Created));
        assert!(types.contains(&AuditEventType::Updated));
        assert!(types.contains(&AuditEventType::Deleted));
    }

    #[test]
    fn test_diff_embeds_states_as_json() {
        let d = diff(Some(r#"{"id":"en"}"#.to_string()), None);
        let parsed: serde_json::Value = serde_json::from_str(&d).unwrap();
        assert_eq!(parsed["old"]["id"], "en");
        assert!(parsed["new"].is_null());
    }
}
