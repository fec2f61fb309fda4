use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    routing::{get, patch},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{CreateGameRequest, GameListResponse, GameResponse, ListGamesQuery},
    error::{AppError, ServiceError},
    routes::identity::Principal,
    services::{game_service, membership_service},
    state::{SharedState, membership::MembershipAction},
};

/// Routes handling game scheduling, lookup and sign-ups.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/join", patch(join_game))
        .route("/games/{id}/drop", patch(drop_game))
}

fn parse_game_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidInput(format!("`{raw}` is not a valid game id")).into())
}

/// Schedule a new game owned by the caller.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameResponse),
        (status = 400, description = "Invalid game definition"),
        (status = 401, description = "Missing caller identity"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    principal: Principal,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let game = game_service::create_game(&state, principal.as_str(), payload).await?;
    Ok((StatusCode::CREATED, Json(game.into())))
}

/// List games of a category, soonest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(ListGamesQuery),
    responses(
        (status = 200, description = "Games in the listing window", body = GameListResponse),
        (status = 400, description = "Missing category or malformed query")
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
    query: Result<Query<ListGamesQuery>, QueryRejection>,
) -> Result<Json<GameListResponse>, AppError> {
    let Query(query) = query?;
    let games = game_service::list_games(&state, query).await?;
    Ok(Json(GameListResponse {
        games: games.into_iter().map(Into::into).collect(),
    }))
}

/// Fetch a single game with its roster and waitlist.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game found", body = GameResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    let id = parse_game_id(&id)?;
    let game = game_service::get_game(&state, id).await?;
    Ok(Json(game.into()))
}

/// Sign the caller up: a roster slot when one is free, the waitlist otherwise.
#[utoipa::path(
    patch,
    path = "/games/{id}/join",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Caller is on the roster or waitlist", body = GameResponse),
        (status = 401, description = "Missing caller identity"),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Too many concurrent updates")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    change_membership(state, principal, &id, MembershipAction::Join).await
}

/// Withdraw the caller, promoting the next waitlisted player when a roster slot frees up.
#[utoipa::path(
    patch,
    path = "/games/{id}/drop",
    tag = "games",
    params(("id" = String, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Caller is no longer enrolled", body = GameResponse),
        (status = 401, description = "Missing caller identity"),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Too many concurrent updates")
    )
)]
pub async fn drop_game(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    change_membership(state, principal, &id, MembershipAction::Drop).await
}

async fn change_membership(
    state: SharedState,
    principal: Principal,
    raw_id: &str,
    action: MembershipAction,
) -> Result<Json<GameResponse>, AppError> {
    let id = parse_game_id(raw_id)?;
    let change =
        membership_service::change_membership(&state, id, principal.as_str(), action).await?;
    Ok(Json(change.game.into()))
}
