use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::auth::{
        AuthStatusResponse, GoogleCallbackQuery, GoogleSignInOptions, GoogleSignInResponse,
        GoogleTokenRequest, LoginRequest, RegisterRequest,
    },
    error::{AppError, ErrorBody},
    services::auth_service,
    state::SharedState,
};

/// Account and Google sign-in endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/status", get(auth_status))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_options))
        .route("/auth/google/token", post(google_token))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/google/signout", post(google_sign_out))
}

/// Who is logged in, and with which Google account.
#[utoipa::path(
    get,
    path = "/api/auth/status",
    tag = "auth",
    responses((status = 200, description = "Current session", body = AuthStatusResponse))
)]
pub async fn auth_status(State(state): State<SharedState>) -> Json<AuthStatusResponse> {
    Json(auth_service::status(&state).await)
}

/// Create an account and log it in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created and logged in", body = AuthStatusResponse),
        (status = 400, description = "Invalid registration form", body = ErrorBody),
        (status = 409, description = "Username or email already taken", body = ErrorBody),
        (status = 503, description = "Backend not ready or unreachable", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthStatusResponse>, AppError> {
    payload.validate()?;
    let status = auth_service::register(&state, payload).await?;
    Ok(Json(status))
}

/// Log in with a username or email address.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthStatusResponse),
        (status = 401, description = "Wrong password or not signed in", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthStatusResponse>, AppError> {
    payload.validate()?;
    let status = auth_service::login(&state, payload).await?;
    Ok(Json(status))
}

/// Forget the logged-in account.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out", body = AuthStatusResponse))
)]
pub async fn logout(State(state): State<SharedState>) -> Json<AuthStatusResponse> {
    Json(auth_service::logout(&state).await)
}

/// How to start Google sign-in with the installed backend.
#[utoipa::path(
    get,
    path = "/api/auth/google",
    tag = "auth",
    responses(
        (status = 200, description = "Sign-in mode and consent URL", body = GoogleSignInOptions),
        (status = 503, description = "Backend not ready", body = ErrorBody)
    )
)]
pub async fn google_options(
    State(state): State<SharedState>,
) -> Result<Json<GoogleSignInOptions>, AppError> {
    let options = auth_service::google_options(&state).await?;
    Ok(Json(options))
}

/// Finish popup sign-in with the access token the client obtained.
#[utoipa::path(
    post,
    path = "/api/auth/google/token",
    tag = "auth",
    request_body = GoogleTokenRequest,
    responses(
        (status = 200, description = "Signed in", body = GoogleSignInResponse),
        (status = 400, description = "Popup closed or wrong sign-in mode", body = ErrorBody),
        (status = 401, description = "Token rejected", body = ErrorBody)
    )
)]
pub async fn google_token(
    State(state): State<SharedState>,
    Json(payload): Json<GoogleTokenRequest>,
) -> Result<Json<GoogleSignInResponse>, AppError> {
    payload.validate()?;
    let response = auth_service::google_token(&state, payload).await?;
    Ok(Json(response))
}

/// Redirect target of the consent screen in redirect mode.
#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    tag = "auth",
    params(GoogleCallbackQuery),
    responses(
        (status = 200, description = "Signed in", body = GoogleSignInResponse),
        (status = 401, description = "State mismatch or code rejected", body = ErrorBody)
    )
)]
pub async fn google_callback(
    State(state): State<SharedState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Json<GoogleSignInResponse>, AppError> {
    let response = auth_service::google_callback(&state, query).await?;
    Ok(Json(response))
}

/// Sign out of Google (revoking the token) and of the application account.
#[utoipa::path(
    post,
    path = "/api/auth/google/signout",
    tag = "auth",
    responses(
        (status = 200, description = "Signed out", body = AuthStatusResponse),
        (status = 503, description = "Backend not ready", body = ErrorBody)
    )
)]
pub async fn google_sign_out(
    State(state): State<SharedState>,
) -> Result<Json<AuthStatusResponse>, AppError> {
    let status = auth_service::google_sign_out(&state).await?;
    Ok(Json(status))
}
