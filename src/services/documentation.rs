use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the pickup games API.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::list_games,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::drop_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::GameResponse,
            crate::dto::game::GameListResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game scheduling and roster sign-ups"),
    )
)]
pub struct ApiDoc;
