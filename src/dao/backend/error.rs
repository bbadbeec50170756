//! Error taxonomy shared by every [`ScoreBackend`](super::ScoreBackend) implementation.

use std::{error::Error, fmt};

use serde::Serialize;
use thiserror::Error;

use crate::dao::{models::SignInMode, storage::StorageError};

/// Why a backend could not be brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitErrorKind {
    /// The remote client description (API discovery document) could not be loaded.
    ScriptNotLoaded,
    /// The authentication subsystem could not be reached or refused the client.
    AuthUnavailable,
    /// The remote side did not answer in time.
    NetworkTimeout,
    /// The provider refuses requests coming from this origin.
    CrossOriginBlocked,
    /// Required deployment settings are missing.
    Misconfigured,
}

impl InitErrorKind {
    /// Whether another attempt can reasonably succeed without operator action.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            InitErrorKind::CrossOriginBlocked | InitErrorKind::Misconfigured
        )
    }
}

impl fmt::Display for InitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InitErrorKind::ScriptNotLoaded => "client library not loaded",
            InitErrorKind::AuthUnavailable => "auth provider unavailable",
            InitErrorKind::NetworkTimeout => "network timeout",
            InitErrorKind::CrossOriginBlocked => "cross-origin request blocked",
            InitErrorKind::Misconfigured => "backend misconfigured",
        };
        f.write_str(label)
    }
}

/// Failure of [`ScoreBackend::init`](super::ScoreBackend::init).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct InitError {
    pub kind: InitErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl InitError {
    pub fn new(kind: InitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Failures of provider sign-in and of application login.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sign-in window was closed before completing")]
    PopupClosed,
    #[error("access to the Google account was denied")]
    AccessDenied,
    #[error("OAuth client rejected: {0}")]
    InvalidClient(String),
    #[error("access token or authorization code rejected by the provider")]
    InvalidToken,
    #[error("sign-in grant does not match the configured {expected} mode")]
    ModeMismatch { expected: SignInMode },
    #[error("not signed in")]
    NotAuthenticated,
    #[error("user not found")]
    UserNotFound,
    #[error("wrong password")]
    BadPassword,
    #[error("auth provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn provider(message: impl Into<String>) -> Self {
        AuthError::Provider {
            message: message.into(),
            source: None,
        }
    }
}

/// Failures of user registration.
#[derive(Debug, Error)]
pub enum RegError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures while storing a round.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures while reading rounds or users.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<FetchError> for RegError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotAuthenticated => RegError::NotAuthenticated,
            FetchError::Storage(source) => RegError::Storage(source),
        }
    }
}

impl From<FetchError> for AuthError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotAuthenticated => AuthError::NotAuthenticated,
            FetchError::Storage(source) => AuthError::Storage(source),
        }
    }
}

impl From<SaveError> for RegError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::NotAuthenticated => RegError::NotAuthenticated,
            SaveError::Storage(source) => RegError::Storage(source),
        }
    }
}
