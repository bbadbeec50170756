use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::backend::BackendKind, state::InitPhase};

/// Health response returned by the `/api/health` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" with the remote store, "offline" on the local one, "initializing" otherwise.
    pub status: String,
    #[schema(value_type = Option<String>)]
    pub backend: Option<BackendKind>,
    pub init: InitPhase,
}

impl HealthResponse {
    pub fn new(backend: Option<BackendKind>, init: InitPhase) -> Self {
        let status = match (init.is_initialized(), backend) {
            (true, Some(BackendKind::Remote)) => "ok",
            (true, Some(BackendKind::Local)) => "offline",
            _ => "initializing",
        };
        Self {
            status: status.to_string(),
            backend,
            init,
        }
    }
}
