use std::{future::Future, str::FromStr, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

#[cfg(feature = "couch-store")]
use crate::dao::game_store::couchdb::{CouchConfig, CouchGameStore};
#[cfg(feature = "mongo-store")]
use crate::dao::game_store::mongodb::{MongoConfig, MongoGameStore};
use crate::{
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::{StorageError, StorageResult},
    },
    state::SharedState,
};

const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// Delays used by [`run`].
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTiming {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub health_poll_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

/// Storage backend selected with `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
}

#[derive(Debug, Error)]
#[error("unknown or disabled storage backend `{0}`")]
pub struct UnknownBackend(String);

impl FromStr for StorageBackend {
    type Err = UnknownBackend;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(StorageBackend::Memory),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(StorageBackend::Couch),
            other => Err(UnknownBackend(other.to_owned())),
        }
    }
}

impl StorageBackend {
    /// Backend named by `STORAGE_BACKEND`, defaulting to the in-memory store.
    pub fn from_env() -> Result<Self, UnknownBackend> {
        std::env::var(STORAGE_BACKEND_ENV)
            .map(|value| value.parse())
            .unwrap_or(Ok(StorageBackend::Memory))
    }

    /// Connection factory handed to [`run`].
    ///
    /// The memory backend hands out the same map on every call so a reconnect keeps the data.
    pub fn connector(
        self,
    ) -> impl FnMut() -> BoxFuture<'static, StorageResult<Arc<dyn GameStore>>> + Send + 'static {
        let memory = MemoryGameStore::new();
        move || -> BoxFuture<'static, StorageResult<Arc<dyn GameStore>>> {
            match self {
                StorageBackend::Memory => {
                    let store: Arc<dyn GameStore> = Arc::new(memory.clone());
                    Box::pin(async move { Ok(store) })
                }
                #[cfg(feature = "mongo-store")]
                StorageBackend::Mongo => Box::pin(connect_mongo()),
                #[cfg(feature = "couch-store")]
                StorageBackend::Couch => Box::pin(connect_couch()),
            }
        }
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> StorageResult<Arc<dyn GameStore>> {
    let config = MongoConfig::from_env().await?;
    let store = MongoGameStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> StorageResult<Arc<dyn GameStore>> {
    let config = CouchConfig::from_env()?;
    let store = CouchGameStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, connect: F, timing: SupervisorTiming)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut connect = connect;
    let mut delay = timing.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = timing.initial_delay;

                watch_health(&state, store.as_ref(), &timing).await;
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(timing.max_delay);
    }
}

/// Poll `store` until it fails health checks and every reconnect attempt.
async fn watch_health(state: &SharedState, store: &dyn GameStore, timing: &SupervisorTiming) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
                sleep(timing.health_poll_interval).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store, timing).await {
                    return;
                }
                state.update_degraded(false).await;
                sleep(timing.health_poll_interval).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn GameStore, timing: &SupervisorTiming) -> bool {
    let mut reconnect_delay = timing.initial_delay;

    for attempt in 0..timing.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(timing.max_delay);
            }
        }
    }

    state.update_degraded(true).await;
    false
}
