use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AccessService, PromoService};

/// Shared application state handed to the API layer.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,
    pub store: Store,
    pub promo: PromoService,
    pub access: AccessService,
}

impl SharedState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self {
            promo: PromoService::new(store.clone()),
            access: AccessService::new(store.clone()),
            store,
            config: Arc::new(RwLock::new(config)),
        })
    }
}
