use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the installed store and report whether the service is degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.game_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    if state.is_degraded() {
        HealthResponse::degraded(reachable)
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.storage_reachable);
    }

    #[tokio::test]
    async fn reports_ok_with_store() {
        let state =
            AppState::with_store(AppConfig::default(), Arc::new(MemoryGameStore::new())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert!(health.storage_reachable);
    }
}
