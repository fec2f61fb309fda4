/// OpenAPI documentation generation.
pub mod documentation;
/// Game creation, lookup and category listing.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Join/drop coordination under optimistic concurrency.
pub mod membership_service;
/// Background storage connection and degraded-mode tracking.
pub mod storage_supervisor;
