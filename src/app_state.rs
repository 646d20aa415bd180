//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use log::info;
use std::sync::Arc;

use crate::audit::{mock_store::MockAuditStore, sqlite_store::SqliteAuditStore, AuditStore};
use crate::cache::ReadCache;
use crate::config::{AppConfig, DatabaseBackend};
use crate::database;
use crate::keyvalue::{
    mock_store::MockKeyValueStore, sqlite_store::SqliteKeyValueStore, KeyValueStore,
};
use crate::localization::{
    mock_store::MockLocalizationStore, sqlite_store::SqliteLocalizationStore, LocalizationStore,
};
use crate::service::audit_service::AuditService;
use crate::service::locales_service::LocalesService;
use crate::service::localized_values_service::LocalizedValuesService;
use crate::service::metadata_service::MetadataService;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub metadata_service: Arc<MetadataService>,
    pub locales_service: Arc<LocalesService>,
    pub localized_values_service: Arc<LocalizedValuesService>,
    pub audit_service: Arc<AuditService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with services configured from YAML config
    pub fn new() -> Self {
        let config = AppConfig::load().expect("Failed to load configuration");
        Self::from_config(config)
    }

    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Self {
        info!("Initializing application state with configuration");

        let (key_value_store, localization_store, audit_store): (
            Arc<dyn KeyValueStore>,
            Arc<dyn LocalizationStore>,
            Arc<dyn AuditStore>,
        ) = match config.database.backend {
            DatabaseBackend::SQLite => {
                info!(
                    "Using SQLite backend with db_path: {}",
                    config.database.db_path
                );
                let conn = database::open(&config.database.db_path)
                    .expect("Failed to open database");
                (
                    Arc::new(SqliteKeyValueStore::new(conn.clone())),
                    Arc::new(SqliteLocalizationStore::new(conn.clone())),
                    Arc::new(SqliteAuditStore::new(conn)),
                )
            }
            DatabaseBackend::Mock => {
                info!("Using mock backend");
                (
                    Arc::new(MockKeyValueStore::new()),
                    Arc::new(MockLocalizationStore::new()),
                    Arc::new(MockAuditStore::new()),
                )
            }
        };

        let cache = Arc::new(ReadCache::new());
        let audit_service = Arc::new(AuditService::new(audit_store));
        let metadata_service = Arc::new(MetadataService::new(key_value_store, cache.clone()));
        let locales_service = Arc::new(LocalesService::new(
            localization_store.clone(),
            audit_service.clone(),
            cache.clone(),
        ));
        let localized_values_service = Arc::new(LocalizedValuesService::new(
            localization_store,
            audit_service.clone(),
            cache,
        ));

        info!("Application state initialized successfully");
        Self {
            metadata_service,
            locales_service,
            localized_values_service,
            audit_service,
            config,
        }
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        let config = AppConfig {
            database: crate::config::DatabaseConfig {
                backend: DatabaseBackend::Mock,
                db_path: ":memory:".to_string(),
            },
            ..AppConfig::default()
        };
        Self::from_config(config)
    }
}
