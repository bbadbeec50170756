use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::backend::BackendStatusResponse,
    error::{AppError, ErrorBody},
    services::backend_supervisor,
    state::SharedState,
};

/// Routes exposing the init machine and the user's retry/offline controls.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/backend", get(backend_status))
        .route("/backend/retry", post(retry_backend))
        .route("/backend/offline", post(go_offline))
}

/// Current init machine snapshot.
#[utoipa::path(
    get,
    path = "/api/backend",
    tag = "backend",
    responses((status = 200, description = "Init machine snapshot", body = BackendStatusResponse))
)]
pub async fn backend_status(State(state): State<SharedState>) -> Json<BackendStatusResponse> {
    let snapshot = state.snapshot().await;
    Json(BackendStatusResponse::new(snapshot, state.backend_kind().await))
}

/// Try the remote store again from the first attempt.
#[utoipa::path(
    post,
    path = "/api/backend/retry",
    tag = "backend",
    responses(
        (status = 200, description = "New initialization run started", body = BackendStatusResponse),
        (status = 409, description = "Nothing to retry", body = ErrorBody)
    )
)]
pub async fn retry_backend(
    State(state): State<SharedState>,
) -> Result<Json<BackendStatusResponse>, AppError> {
    let snapshot = backend_supervisor::retry(&state).await?;
    Ok(Json(BackendStatusResponse::new(
        snapshot,
        state.backend_kind().await,
    )))
}

/// Stop waiting for the remote store and use the local one.
#[utoipa::path(
    post,
    path = "/api/backend/offline",
    tag = "backend",
    responses(
        (status = 200, description = "Local store installed", body = BackendStatusResponse),
        (status = 409, description = "Initialization already settled", body = ErrorBody)
    )
)]
pub async fn go_offline(
    State(state): State<SharedState>,
) -> Result<Json<BackendStatusResponse>, AppError> {
    let snapshot = backend_supervisor::switch_to_offline(&state).await?;
    Ok(Json(BackendStatusResponse::new(
        snapshot,
        state.backend_kind().await,
    )))
}
