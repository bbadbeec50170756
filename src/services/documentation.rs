use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Golf Score Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::backend::backend_status,
        crate::routes::backend::retry_backend,
        crate::routes::backend::go_offline,
        crate::routes::auth::auth_status,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::google_options,
        crate::routes::auth::google_token,
        crate::routes::auth::google_callback,
        crate::routes::auth::google_sign_out,
        crate::routes::scores::list_scores,
        crate::routes::scores::save_score,
        crate::routes::scores::statistics,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::backend::BackendStatusResponse,
            crate::dto::auth::RegisterRequest,
            crate::dto::auth::LoginRequest,
            crate::dto::auth::UserSummary,
            crate::dto::auth::IdentityDto,
            crate::dto::auth::AuthStatusResponse,
            crate::dto::auth::GoogleSignInOptions,
            crate::dto::auth::GoogleTokenRequest,
            crate::dto::auth::GoogleSignInResponse,
            crate::dto::score::HoleBreakdownDto,
            crate::dto::score::SaveScoreRequest,
            crate::dto::score::SaveScoreResponse,
            crate::dto::score::RoundResponse,
            crate::dto::score::RoundsResponse,
            crate::dto::score::StatisticsResponse,
            crate::state::InitPhase,
            crate::state::FallbackReason,
            crate::state::Snapshot,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "backend", description = "Score backend initialization and offline mode"),
        (name = "auth", description = "Accounts and Google sign-in"),
        (name = "scores", description = "Rounds and statistics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_api_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/backend",
            "/api/auth/google/callback",
            "/api/scores",
            "/api/statistics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
