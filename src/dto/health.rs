use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Whether the last storage probe succeeded.
    pub storage_reachable: bool,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage_reachable: true,
        }
    }

    /// No usable store: store-backed routes answer 503.
    pub fn degraded(storage_reachable: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            storage_reachable,
        }
    }
}
