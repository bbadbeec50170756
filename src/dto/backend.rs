//! DTO definitions for the backend lifecycle endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::backend::BackendKind, state::Snapshot};

/// Init machine snapshot together with the installed backend.
#[derive(Debug, Serialize, ToSchema)]
pub struct BackendStatusResponse {
    #[serde(flatten)]
    pub init: Snapshot,
    /// Installed backend, absent while initialization is pending.
    #[schema(value_type = Option<String>)]
    pub backend: Option<BackendKind>,
    /// Whether data operations are accepted.
    pub initialized: bool,
}

impl BackendStatusResponse {
    pub fn new(init: Snapshot, backend: Option<BackendKind>) -> Self {
        Self {
            initialized: init.phase.is_initialized(),
            init,
            backend,
        }
    }
}
