use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::GameEntity,
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload used to schedule a new game. The caller becomes its owner.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub category: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub location: String,
    /// RFC 3339 start time, e.g. `2026-05-01T18:00:00Z`.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub start_time: OffsetDateTime,
    #[validate(range(min = 1))]
    pub duration_mins: u32,
    #[validate(range(min = 1))]
    pub num_teams: u32,
    #[validate(range(min = 1))]
    pub team_size: u32,
    #[serde(default)]
    pub sign_up_fee_cents: u32,
    #[serde(default)]
    pub split_fee_cents: u32,
}

/// Public view of a game including its roster and waitlist.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub game_id: Uuid,
    pub owner: String,
    /// RFC 3339 start time.
    pub start_time: String,
    pub category: String,
    pub duration_mins: u32,
    pub location: String,
    pub name: String,
    pub num_teams: u32,
    pub team_size: u32,
    /// `numTeams * teamSize`.
    pub capacity: usize,
    pub sign_up_fee_cents: u32,
    pub split_fee_cents: u32,
    pub roster: Vec<String>,
    pub waitlist: Vec<String>,
    pub version: u64,
}

impl From<GameEntity> for GameResponse {
    fn from(game: GameEntity) -> Self {
        let capacity = game.capacity();
        Self {
            game_id: game.id,
            owner: game.owner,
            start_time: format_system_time(game.start_time),
            category: game.category,
            duration_mins: game.duration_mins,
            location: game.location,
            name: game.name,
            num_teams: game.num_teams,
            team_size: game.team_size,
            capacity,
            sign_up_fee_cents: game.sign_up_fee_cents,
            split_fee_cents: game.split_fee_cents,
            roster: game.roster,
            waitlist: game.waitlist,
            version: game.version,
        }
    }
}

/// Query string of `GET /games`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListGamesQuery {
    /// Category to list; required.
    #[serde(default)]
    pub category: String,
    /// Earliest start time as seconds since the Unix epoch. Defaults to two weeks ago.
    pub since: Option<i64>,
    /// Maximum number of games to return. Values below 1 use the default.
    pub max_results: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GameListResponse {
    pub games: Vec<GameResponse>,
}
