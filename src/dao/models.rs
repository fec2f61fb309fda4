use serde::{Deserialize, Serialize};
use serde_with::{TimestampSeconds, serde_as};
use std::time::SystemTime;
use uuid::Uuid;

/// Version assigned to a freshly created game.
pub const INITIAL_VERSION: u64 = 1;

/// Sign-up event persisted by the storage layer.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Principal that created the game.
    pub owner: String,
    /// Scheduled start, stored as seconds since the Unix epoch.
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub start_time: SystemTime,
    /// Free-form category used for listing (e.g. "volleyball").
    pub category: String,
    /// Expected duration of the game in minutes.
    pub duration_mins: u32,
    /// Where the game takes place.
    pub location: String,
    /// Display name of the game.
    pub name: String,
    /// Number of teams playing.
    pub num_teams: u32,
    /// Players per team.
    pub team_size: u32,
    /// Fee charged on sign-up, in cents.
    pub sign_up_fee_cents: u32,
    /// Fee split between players, in cents.
    pub split_fee_cents: u32,
    /// Principals holding a slot, in sign-up order.
    #[serde(default)]
    pub roster: Vec<String>,
    /// Principals waiting for a slot, in promotion order.
    #[serde(default)]
    pub waitlist: Vec<String>,
    /// Optimistic concurrency token, bumped on every stored update.
    pub version: u64,
}

impl GameEntity {
    /// Maximum roster size (`num_teams * team_size`).
    pub fn capacity(&self) -> usize {
        (self.num_teams as usize).saturating_mul(self.team_size as usize)
    }

    /// Whether the principal currently holds a roster slot.
    pub fn is_rostered(&self, principal: &str) -> bool {
        self.roster.iter().any(|p| p == principal)
    }

    /// Whether the principal is queued on the waitlist.
    pub fn is_waitlisted(&self, principal: &str) -> bool {
        self.waitlist.iter().any(|p| p == principal)
    }
}
