use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use validator::Validate;

use crate::{
    dto::score::{
        RoundsResponse, SaveScoreRequest, SaveScoreResponse, StatisticsQuery, StatisticsResponse,
    },
    error::{AppError, ErrorBody},
    services::score_service,
    state::SharedState,
};

/// Round recording and statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scores", get(list_scores).post(save_score))
        .route("/statistics", get(statistics))
}

/// Every stored round. Empty while logged out.
#[utoipa::path(
    get,
    path = "/api/scores",
    tag = "scores",
    responses(
        (status = 200, description = "Stored rounds", body = RoundsResponse),
        (status = 503, description = "Backend not ready or unreachable", body = ErrorBody)
    )
)]
pub async fn list_scores(
    State(state): State<SharedState>,
) -> Result<Json<RoundsResponse>, AppError> {
    let rounds = score_service::list_scores(&state).await?;
    Ok(Json(rounds))
}

/// Record a round for the logged-in user.
#[utoipa::path(
    post,
    path = "/api/scores",
    tag = "scores",
    request_body = SaveScoreRequest,
    responses(
        (status = 200, description = "Round stored", body = SaveScoreResponse),
        (status = 400, description = "Invalid round", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 503, description = "Backend not ready or unreachable", body = ErrorBody)
    )
)]
pub async fn save_score(
    State(state): State<SharedState>,
    Json(payload): Json<SaveScoreRequest>,
) -> Result<Json<SaveScoreResponse>, AppError> {
    payload.validate()?;
    let saved = score_service::save_score(&state, payload).await?;
    Ok(Json(saved))
}

/// Statistics over every round, or one player's rounds with `?player=`.
#[utoipa::path(
    get,
    path = "/api/statistics",
    tag = "scores",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Statistics", body = StatisticsResponse),
        (status = 503, description = "Backend not ready or unreachable", body = ErrorBody)
    )
)]
pub async fn statistics(
    State(state): State<SharedState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<StatisticsResponse>, AppError> {
    let stats = score_service::statistics(&state, query).await?;
    Ok(Json(stats))
}
