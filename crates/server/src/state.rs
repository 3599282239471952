//! Application state shared across handlers.

use curiocity_core::config::AppConfig;
use curiocity_metadata::MetadataStore;
use curiocity_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This performs configuration validation. Panics if configuration is
    /// invalid, so a misconfigured server fails at startup rather than on
    /// the first request.
    ///
    /// # Panics
    ///
    /// Panics if storage or sweep configuration validation fails.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        if let Err(error) = config.storage.validate() {
            panic!("Invalid storage configuration: {}", error);
        }
        if let Err(error) = config.sweep.validate() {
            panic!("Invalid sweep configuration: {}", error);
        }

        Self {
            config: Arc::new(config),
            storage,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curiocity_core::config::AppConfig;
    use curiocity_metadata::SqliteStore;
    use curiocity_storage::FilesystemBackend;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_construction() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());

        let db_path = temp.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> =
            Arc::new(SqliteStore::new(&db_path, None).await.unwrap());

        let state = AppState::new(AppConfig::for_testing(), storage, metadata);
        assert_eq!(state.storage.backend_name(), "filesystem");
    }

    #[tokio::test]
    #[should_panic(expected = "Invalid sweep configuration")]
    async fn test_state_rejects_zero_batch_limit() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());

        let db_path = temp.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> =
            Arc::new(SqliteStore::new(&db_path, None).await.unwrap());

        let mut config = AppConfig::for_testing();
        config.sweep.batch_limit = 0;
        AppState::new(config, storage, metadata);
    }
}
