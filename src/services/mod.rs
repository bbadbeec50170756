/// Account login/registration and Google sign-in flows.
pub mod auth_service;
/// Init supervisor driving the remote store start-up and the offline fallback.
pub mod backend_supervisor;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Bounded retry policy shared by everything that retries.
pub mod retry;
/// Round recording, listing and statistics.
pub mod score_service;
