use std::sync::Arc;

use gallery::{MemoryStore, RatingStore, RedisStore};
use tracing::{info, warn};

use super::{
    config::{Config, StoreBackend},
    elo::EloCalculator,
    error::StartupError,
    limiter::ClientLimiter,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RatingStore>,
    pub limiter: ClientLimiter,
    pub elo: EloCalculator,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, StartupError> {
        let config = Config::load()?;

        let store: Arc<dyn RatingStore> = match config.store {
            StoreBackend::Redis => {
                info!("Connecting to Redis...");
                Arc::new(RedisStore::connect(&config.redis_url).await?)
            }
            StoreBackend::Memory => {
                warn!("Using in-memory store, ratings are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn RatingStore>) -> Arc<Self> {
        Arc::new(Self {
            limiter: ClientLimiter::from_config(&config),
            elo: EloCalculator::new(config.k_factor),
            config,
            store,
        })
    }
}
