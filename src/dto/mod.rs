use std::time::{SystemTime, UNIX_EPOCH};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod game;
pub mod health;
pub mod validation;

/// RFC 3339 rendering; times `time` cannot represent fall back to a marker string.
fn format_system_time(at: SystemTime) -> String {
    let offset = match at.duration_since(UNIX_EPOCH) {
        Ok(after) => time::Duration::try_from(after).ok(),
        Err(before) => time::Duration::try_from(before.duration()).ok().map(|d| -d),
    };
    offset
        .and_then(|offset| OffsetDateTime::UNIX_EPOCH.checked_add(offset))
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
