use std::sync::Arc;

use tracing::warn;

use crate::auth::repo::UserRepo;
use crate::catalog::repo::CatalogRepo;
use crate::config::{AppConfig, StoreKind};
use crate::db::PgStore;
use crate::meals::repo::MealRepo;
use crate::memory::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub catalog: Arc<dyn CatalogRepo>,
    pub meals: Arc<dyn MealRepo>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        match config.store {
            StoreKind::Postgres => {
                let store = Arc::new(PgStore::connect(&config).await?);
                Ok(Self::from_store(config, store))
            }
            StoreKind::Memory => {
                warn!("STORE=memory: data lives only as long as this process");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Uses one backend for every repository.
    pub fn from_store<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserRepo + CatalogRepo + MealRepo + 'static,
    {
        Self {
            config: Arc::new(config),
            users: store.clone(),
            catalog: store.clone(),
            meals: store,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_store(config, Arc::new(MemoryStore::default()))
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::in_memory(AppConfig::for_tests())
    }
}
