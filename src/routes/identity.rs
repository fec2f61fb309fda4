//! Caller identity resolved from the header set by the authenticating gateway.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::{AppError, ServiceError}, state::SharedState};

/// Principal of the authenticated caller (the gateway's email claim, typically).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<SharedState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = state.config().identity_header.as_str();
        let principal = parts
            .headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                ServiceError::Unauthenticated(format!("missing `{header}` header"))
            })?;

        Ok(Principal(principal.to_owned()))
    }
}
