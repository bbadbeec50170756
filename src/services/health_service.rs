use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report which backend serves requests and where initialization stands.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let backend = state.backend_kind().await;
    let phase = state.phase().await;
    if !phase.is_initialized() {
        debug!(?phase, "health requested while the score backend is initializing");
    }
    HealthResponse::new(backend, phase)
}
