use std::time::{Duration, SystemTime};

use futures::{StreamExt, TryStreamExt};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::ListingConfig,
    dao::{
        game_store::GameStore,
        models::{GameEntity, INITIAL_VERSION},
    },
    dto::game::{CreateGameRequest, ListGamesQuery},
    error::ServiceError,
    state::SharedState,
};

/// Schedule a new game owned by `owner`.
pub async fn create_game(
    state: &SharedState,
    owner: &str,
    request: CreateGameRequest,
) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    create_game_in(store.as_ref(), owner, request).await
}

/// Load a game by id.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameEntity, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_game(id)
        .await?
        .ok_or_else(|| ServiceError::game_not_found(id))
}

/// Games of a category starting inside the listing window, soonest first.
pub async fn list_games(
    state: &SharedState,
    query: ListGamesQuery,
) -> Result<Vec<GameEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    list_games_in(
        store.as_ref(),
        &state.config().listing,
        query,
        SystemTime::now(),
    )
    .await
}

pub(crate) async fn create_game_in(
    store: &dyn GameStore,
    owner: &str,
    request: CreateGameRequest,
) -> Result<GameEntity, ServiceError> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(ServiceError::Unauthenticated("missing principal".into()));
    }
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;

    let CreateGameRequest {
        name,
        category,
        location,
        start_time,
        duration_mins,
        num_teams,
        team_size,
        sign_up_fee_cents,
        split_fee_cents,
    } = request;

    let game = GameEntity {
        id: Uuid::new_v4(),
        owner: owner.to_owned(),
        start_time: start_time.into(),
        category: category.trim().to_owned(),
        duration_mins,
        location: location.trim().to_owned(),
        name: name.trim().to_owned(),
        num_teams,
        team_size,
        sign_up_fee_cents,
        split_fee_cents,
        roster: Vec::new(),
        waitlist: Vec::new(),
        version: INITIAL_VERSION,
    };

    store.create_game(game.clone()).await?;
    info!(game_id = %game.id, category = %game.category, owner = %game.owner, "game created");
    Ok(game)
}

pub(crate) async fn list_games_in(
    store: &dyn GameStore,
    listing: &ListingConfig,
    query: ListGamesQuery,
    now: SystemTime,
) -> Result<Vec<GameEntity>, ServiceError> {
    let category = query.category.trim();
    if category.is_empty() {
        return Err(ServiceError::InvalidInput("category is required".into()));
    }

    let since = match query.since {
        Some(secs) => SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64),
        None => now
            .checked_sub(listing.lookback())
            .unwrap_or(SystemTime::UNIX_EPOCH),
    };
    let limit = effective_limit(listing, query.max_results);

    let games = store
        .games_by_category(category.to_owned(), since)
        .take(limit)
        .try_collect::<Vec<_>>()
        .await?;
    Ok(games)
}

fn effective_limit(listing: &ListingConfig, requested: Option<i64>) -> usize {
    let cap = listing.max_results_cap.max(1);
    match requested {
        Some(n) if n >= 1 => usize::try_from(n).unwrap_or(cap).min(cap),
        _ => listing.default_max_results.clamp(1, cap),
    }
}
