//! Application state shared across handlers.

use coffer_core::AppConfig;
use coffer_service::Services;
use coffer_storage::StoreSet;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Domain services.
    pub services: Services,
    /// The open stores, for health checks.
    pub stores: StoreSet,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services, stores: StoreSet) -> Self {
        Self {
            config: Arc::new(config),
            services,
            stores,
        }
    }

    /// Build state over the configured stores, with Argon2 hashing.
    pub async fn from_config(config: AppConfig) -> coffer_service::ServiceResult<Self> {
        let (services, stores) = Services::from_config(&config).await?;
        Ok(Self::new(config, services, stores))
    }
}
